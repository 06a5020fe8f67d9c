use crate::error::ValidationError;
use crate::services::validator::Validate;
use crate::types::{DefinitionId, PageRange, PageSpan};
use serde::Serialize;
use tracing::debug;

/// Longest definition list a session accepts.
pub const DEFAULT_MAX_DEFINITIONS: usize = 10;

/// Pages covered by an auto-derived definition.
pub const DEFAULT_CHUNK_PAGES: u32 = 10;

/// Ordered definitions plus whether they may be executed right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPlan<D> {
    pub definitions: Vec<D>,
    pub can_execute: bool,
}

pub struct OperationListPlanner;

impl OperationListPlanner {
    pub fn can_add(len: usize, max: usize, document_loaded: bool, is_processing: bool) -> bool {
        len < max && document_loaded && !is_processing
    }

    /// Range for a freshly added definition: the ten pages after the last
    /// entry, clamped to the document.
    pub fn next_default<D: PageSpan>(list: &[D], total_pages: u32) -> Result<PageRange, ValidationError> {
        let last_end = list.last().map(|d| d.end_page()).unwrap_or(0);
        let start = last_end.saturating_add(1).min(total_pages);
        let end = last_end.saturating_add(DEFAULT_CHUNK_PAGES).min(total_pages);
        PageRange::new(start, end, total_pages)
    }

    pub fn can_execute<D: Validate>(
        list: &[D],
        total_pages: u32,
        output_ready: bool,
        is_processing: bool,
    ) -> bool {
        !list.is_empty()
            && output_ready
            && !is_processing
            && list.iter().all(|d| d.is_valid(total_pages))
    }

    pub fn plan<D: Validate + Clone>(
        list: &[D],
        total_pages: u32,
        output_ready: bool,
        is_processing: bool,
    ) -> OperationPlan<D> {
        OperationPlan {
            definitions: list.to_vec(),
            can_execute: Self::can_execute(list, total_pages, output_ready, is_processing),
        }
    }

    /// First problem of every invalid entry, for display next to its row.
    pub fn problems<D: Validate + PageSpan>(
        list: &[D],
        total_pages: u32,
    ) -> Vec<(DefinitionId, ValidationError)> {
        list.iter()
            .filter_map(|d| d.check(total_pages).err().map(|e| (d.id(), e)))
            .collect()
    }

    /// Pairs of entries whose page spans intersect. Overlaps are allowed;
    /// this only lets callers warn about them.
    pub fn overlaps<D: PageSpan>(list: &[D]) -> Vec<(DefinitionId, DefinitionId)> {
        let mut pairs = Vec::new();
        for (i, a) in list.iter().enumerate() {
            for b in &list[i + 1..] {
                if a.start_page() <= b.end_page() && b.start_page() <= a.end_page() {
                    pairs.push((a.id(), b.id()));
                }
            }
        }
        pairs
    }
}

/// Bounded, ordered list of definitions with stable ids.
#[derive(Debug, Clone)]
pub struct DefinitionList<D> {
    items: Vec<D>,
    max: usize,
    next_id: DefinitionId,
}

impl<D: PageSpan> DefinitionList<D> {
    pub fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
            next_id: 1,
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max
    }

    pub fn items(&self) -> &[D] {
        &self.items
    }

    pub fn get(&self, id: DefinitionId) -> Option<&D> {
        self.items.iter().find(|d| d.id() == id)
    }

    /// Appends a definition covering the next default range. `build` receives
    /// the new id, the derived range and the 1-based position in the list.
    /// Returns `None` when the list is full or there is no page to cover.
    pub fn push_next(
        &mut self,
        total_pages: u32,
        build: impl FnOnce(DefinitionId, PageRange, usize) -> D,
    ) -> Option<DefinitionId> {
        if self.is_full() {
            return None;
        }
        let range = OperationListPlanner::next_default(&self.items, total_pages).ok()?;
        let id = self.next_id;
        self.next_id += 1;
        let position = self.items.len() + 1;
        self.items.push(build(id, range, position));
        debug!("Added definition {} covering pages {}", id, range);
        Some(id)
    }

    /// Appends a caller-built definition, assigning it a fresh id.
    pub fn push(&mut self, mut definition: D, assign_id: impl FnOnce(&mut D, DefinitionId)) -> Option<DefinitionId> {
        if self.is_full() {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        assign_id(&mut definition, id);
        self.items.push(definition);
        Some(id)
    }

    pub fn remove(&mut self, id: DefinitionId) -> Option<D> {
        let index = self.items.iter().position(|d| d.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn update(&mut self, id: DefinitionId, edit: impl FnOnce(&mut D)) -> bool {
        match self.items.iter_mut().find(|d| d.id() == id) {
            Some(definition) => {
                edit(definition);
                true
            }
            None => false,
        }
    }

    /// Moves an entry to `index` (clamped to the list), keeping the others in order.
    pub fn move_to(&mut self, id: DefinitionId, index: usize) -> bool {
        let Some(from) = self.items.iter().position(|d| d.id() == id) else {
            return false;
        };
        let item = self.items.remove(from);
        let to = index.min(self.items.len());
        self.items.insert(to, item);
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
