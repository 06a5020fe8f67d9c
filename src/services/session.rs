//! Editing state for each operation: the loaded document, the definition
//! list and the output target.
//!
//! Sessions are only reset after the executor reports success, so a failed
//! run keeps its configuration for another attempt.

use crate::error::{PdfWizardError, Result};
use crate::services::engine::PdfEngine;
use crate::services::executor::{CancelHandle, DocumentOperationExecutor, OperationRequest};
use crate::services::loader::DocumentLoader;
use crate::services::planner::{DefinitionList, OperationListPlanner, OperationPlan};
use crate::services::validator::{
    parse_font_size, parse_opacity_percent, FieldInput, RangeValidator, Validate,
};
use crate::types::{
    DefinitionId, DocumentInfo, FontFamily, HexColor, OperationKind, OutputManifest, OutputSpec,
    PageRange, PageSelection, PageSpan, RotateDefinition, RotationAngle, SplitDefinition,
    TextConfig, WatermarkDefinition, WatermarkPosition, WatermarkRotation,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Where results go. Split writes one file per definition and needs no filename.
#[derive(Debug, Clone)]
pub struct OutputTarget {
    kind: OperationKind,
    directory: Option<PathBuf>,
    filename: String,
}

impl OutputTarget {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            directory: None,
            filename: kind.default_filename().unwrap_or_default().to_string(),
        }
    }

    pub fn directory(&self) -> Option<&PathBuf> {
        self.directory.as_ref()
    }

    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) {
        self.directory = Some(directory.into());
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Name without the `.pdf` suffix.
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
    }

    fn needs_filename(&self) -> bool {
        self.kind.default_filename().is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.directory.is_some()
            && (!self.needs_filename() || RangeValidator::check_filename(&self.filename).is_ok())
    }

    pub fn spec(&self, overwrite: bool) -> Option<OutputSpec> {
        let directory = self.directory.clone()?;
        Some(OutputSpec {
            directory,
            filename: self
                .needs_filename()
                .then(|| self.filename.trim().to_string()),
            overwrite,
        })
    }

    /// Back to the default filename. The directory is kept.
    fn reset(&mut self) {
        self.filename = self.kind.default_filename().unwrap_or_default().to_string();
    }
}

/// Definition kinds that can be turned into a request for their operation.
pub trait RangeOperation: PageSpan + Validate + Clone {
    const KIND: OperationKind;

    fn set_id(&mut self, id: DefinitionId);

    fn request(source: PathBuf, definitions: Vec<Self>) -> OperationRequest;
}

impl RangeOperation for SplitDefinition {
    const KIND: OperationKind = OperationKind::Split;

    fn set_id(&mut self, id: DefinitionId) {
        self.id = id;
    }

    fn request(source: PathBuf, definitions: Vec<Self>) -> OperationRequest {
        OperationRequest::Split {
            source,
            definitions,
        }
    }
}

impl RangeOperation for RotateDefinition {
    const KIND: OperationKind = OperationKind::Rotate;

    fn set_id(&mut self, id: DefinitionId) {
        self.id = id;
    }

    fn request(source: PathBuf, definitions: Vec<Self>) -> OperationRequest {
        OperationRequest::Rotate {
            source,
            definitions,
        }
    }
}

/// A document plus an ordered list of page-range definitions.
///
/// `execute` borrows the session mutably, so no run of this session is in
/// flight while its queries are answered. Runs started elsewhere on a shared
/// executor show up in [`DocumentOperationExecutor::is_processing`] and are
/// refused with [`PdfWizardError::Busy`].
#[derive(Debug, Clone)]
pub struct DefinitionSession<D> {
    document: Option<DocumentInfo>,
    definitions: DefinitionList<D>,
    output: OutputTarget,
}

pub type SplitSession = DefinitionSession<SplitDefinition>;
pub type RotateSession = DefinitionSession<RotateDefinition>;

impl<D: RangeOperation> DefinitionSession<D> {
    pub fn new(max_definitions: usize) -> Self {
        Self {
            document: None,
            definitions: DefinitionList::new(max_definitions),
            output: OutputTarget::new(D::KIND),
        }
    }

    /// Loads a new document. Existing definitions referred to the old one
    /// and are dropped.
    pub fn select_document(&mut self, document: DocumentInfo) {
        info!(
            "Selected {} ({} pages) for {}",
            document.name,
            document.total_pages,
            D::KIND
        );
        self.document = Some(document);
        self.definitions.clear();
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref()
    }

    pub fn total_pages(&self) -> u32 {
        self.document.as_ref().map(|d| d.total_pages).unwrap_or(0)
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputTarget {
        &mut self.output
    }

    pub fn definitions(&self) -> &[D] {
        self.definitions.items()
    }

    pub fn can_add(&self) -> bool {
        OperationListPlanner::can_add(
            self.definitions.len(),
            self.definitions.max(),
            self.document.is_some(),
            false,
        )
    }

    /// Appends a caller-built definition. Refused when [`Self::can_add`] is false.
    pub fn push(&mut self, definition: D) -> Option<DefinitionId> {
        if !self.can_add() {
            return None;
        }
        self.definitions.push(definition, |d, id| d.set_id(id))
    }

    pub fn remove(&mut self, id: DefinitionId) -> Option<D> {
        self.definitions.remove(id)
    }

    pub fn set_span(&mut self, id: DefinitionId, start_page: u32, end_page: u32) -> bool {
        self.definitions
            .update(id, |d| d.set_span(start_page, end_page))
    }

    pub fn update(&mut self, id: DefinitionId, edit: impl FnOnce(&mut D)) -> bool {
        self.definitions.update(id, edit)
    }

    pub fn move_to(&mut self, id: DefinitionId, index: usize) -> bool {
        self.definitions.move_to(id, index)
    }

    pub fn can_execute(&self) -> bool {
        self.document.is_some()
            && OperationListPlanner::can_execute(
                self.definitions.items(),
                self.total_pages(),
                self.output.is_ready(),
                false,
            )
    }

    pub fn plan(&self) -> OperationPlan<D> {
        let mut plan = OperationListPlanner::plan(
            self.definitions.items(),
            self.total_pages(),
            self.output.is_ready(),
            false,
        );
        plan.can_execute &= self.document.is_some();
        plan
    }

    pub fn overlaps(&self) -> Vec<(DefinitionId, DefinitionId)> {
        OperationListPlanner::overlaps(self.definitions.items())
    }

    /// Runs the session's definitions through `executor`.
    ///
    /// On success the document and definitions are cleared and the filename
    /// goes back to its default. On failure everything is kept.
    pub async fn execute<E: PdfEngine>(
        &mut self,
        executor: &DocumentOperationExecutor<E>,
        cancel: &CancelHandle,
        overwrite: bool,
    ) -> Result<OutputManifest> {
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| PdfWizardError::invalid("no document selected"))?;
        let output = self
            .output
            .spec(overwrite)
            .ok_or_else(|| PdfWizardError::invalid("no output directory selected"))?;
        let request = D::request(document.path.clone(), self.definitions.items().to_vec());

        let result = executor.execute(request, &output, cancel).await;

        if result.is_ok() {
            self.reset();
        }
        result
    }

    fn reset(&mut self) {
        debug!("Resetting {} session", D::KIND);
        self.document = None;
        self.definitions.clear();
        self.output.reset();
    }
}

impl SplitSession {
    /// Adds a split for the next ten pages, named `split_<n>`.
    pub fn add_split(&mut self) -> Option<DefinitionId> {
        if !self.can_add() {
            return None;
        }
        let total = self.total_pages();
        self.definitions
            .push_next(total, |id, range: PageRange, position| SplitDefinition {
                id,
                start_page: range.start(),
                end_page: range.end(),
                filename: format!("split_{}", position),
            })
    }

    pub fn set_split_filename(&mut self, id: DefinitionId, filename: impl Into<String>) -> bool {
        let filename = filename.into();
        self.definitions.update(id, |d| d.filename = filename)
    }
}

impl RotateSession {
    /// Adds a 90 degree rotation for the next ten pages.
    pub fn add_rotation(&mut self) -> Option<DefinitionId> {
        if !self.can_add() {
            return None;
        }
        let total = self.total_pages();
        self.definitions
            .push_next(total, |id, range: PageRange, _| RotateDefinition {
                id,
                start_page: range.start(),
                end_page: range.end(),
                rotation: RotationAngle::default(),
            })
    }

    pub fn set_rotation(&mut self, id: DefinitionId, rotation: RotationAngle) -> bool {
        self.definitions.update(id, |d| d.rotation = rotation)
    }
}

/// Ordered list of files to concatenate.
#[derive(Debug, Clone)]
pub struct MergeSession {
    files: Vec<PathBuf>,
    output: OutputTarget,
}

impl Default for MergeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeSession {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            output: OutputTarget::new(OperationKind::Merge),
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        DocumentLoader::validate_pdf_file(&path)?;
        self.files.push(path);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn move_file(&mut self, from: usize, to: usize) -> bool {
        if from >= self.files.len() {
            return false;
        }
        let file = self.files.remove(from);
        let to = to.min(self.files.len());
        self.files.insert(to, file);
        true
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputTarget {
        &mut self.output
    }

    pub fn can_merge(&self) -> bool {
        !self.files.is_empty() && self.output.is_ready()
    }

    pub async fn execute<E: PdfEngine>(
        &mut self,
        executor: &DocumentOperationExecutor<E>,
        cancel: &CancelHandle,
        overwrite: bool,
    ) -> Result<OutputManifest> {
        let output = self
            .output
            .spec(overwrite)
            .ok_or_else(|| PdfWizardError::invalid("no output directory selected"))?;
        let request = OperationRequest::Merge {
            inputs: self.files.clone(),
        };

        let result = executor.execute(request, &output, cancel).await;

        if result.is_ok() {
            self.files.clear();
            self.output.reset();
        }
        result
    }
}

/// Watermark settings. Font size and opacity are edited as text and only
/// corrected when committed.
#[derive(Debug, Clone)]
pub struct WatermarkSession {
    document: Option<DocumentInfo>,
    style: TextConfig,
    font_size: FieldInput<u32>,
    opacity: FieldInput<f64>,
    page_range: PageSelection,
    output: OutputTarget,
}

impl Default for WatermarkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WatermarkSession {
    pub fn new() -> Self {
        let style = TextConfig::default();
        Self {
            font_size: FieldInput::new(style.font_size, parse_font_size),
            opacity: FieldInput::new(style.opacity_percent(), parse_opacity_percent),
            style,
            document: None,
            page_range: PageSelection::All,
            output: OutputTarget::new(OperationKind::Watermark),
        }
    }

    pub fn select_document(&mut self, document: DocumentInfo) {
        info!(
            "Selected {} ({} pages) for watermark",
            document.name, document.total_pages
        );
        self.document = Some(document);
    }

    pub fn document(&self) -> Option<&DocumentInfo> {
        self.document.as_ref()
    }

    pub fn total_pages(&self) -> u32 {
        self.document.as_ref().map(|d| d.total_pages).unwrap_or(0)
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.style.text = text.into();
    }

    pub fn set_font_color(&mut self, color: HexColor) {
        self.style.font_color = color;
    }

    pub fn set_rotation(&mut self, rotation: WatermarkRotation) {
        self.style.rotation = rotation;
    }

    pub fn set_position(&mut self, position: WatermarkPosition) {
        self.style.position = position;
    }

    pub fn set_font_family(&mut self, family: FontFamily) {
        self.style.font_family = family;
    }

    pub fn set_page_range(&mut self, selection: PageSelection) {
        self.page_range = selection;
    }

    pub fn font_size(&self) -> &FieldInput<u32> {
        &self.font_size
    }

    pub fn edit_font_size(&mut self, text: impl Into<String>) {
        self.font_size.edit(text);
    }

    pub fn commit_font_size(&mut self) -> u32 {
        self.font_size.commit()
    }

    pub fn opacity(&self) -> &FieldInput<f64> {
        &self.opacity
    }

    pub fn edit_opacity(&mut self, text: impl Into<String>) {
        self.opacity.edit(text);
    }

    pub fn commit_opacity(&mut self) -> f64 {
        self.opacity.commit()
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputTarget {
        &mut self.output
    }

    /// The definition as it would be executed now, using the last valid
    /// font size and opacity.
    pub fn definition(&self) -> WatermarkDefinition {
        let mut text_config = self.style.clone();
        text_config.font_size = self.font_size.value();
        text_config.set_opacity_percent(self.opacity.value());
        WatermarkDefinition {
            text_config,
            page_range: self.page_range.clone(),
        }
    }

    pub fn can_apply(&self) -> bool {
        self.document.is_some()
            && self.output.is_ready()
            && self.font_size.is_valid()
            && self.opacity.is_valid()
            && self.definition().is_valid(self.total_pages())
    }

    pub async fn execute<E: PdfEngine>(
        &mut self,
        executor: &DocumentOperationExecutor<E>,
        cancel: &CancelHandle,
        overwrite: bool,
    ) -> Result<OutputManifest> {
        let source = self
            .document
            .as_ref()
            .map(|d| d.path.clone())
            .ok_or_else(|| PdfWizardError::invalid("no document selected"))?;
        let output = self
            .output
            .spec(overwrite)
            .ok_or_else(|| PdfWizardError::invalid("no output directory selected"))?;
        self.font_size.check()?;
        self.opacity.check()?;
        let request = OperationRequest::Watermark {
            source,
            definition: self.definition(),
        };

        let result = executor.execute(request, &output, cancel).await;

        if result.is_ok() {
            self.document = None;
            self.output.reset();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::fixtures::write_test_pdf;
    use crate::services::engine::{LopdfEngine, PdfEngine};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn document(total_pages: u32) -> DocumentInfo {
        DocumentInfo {
            path: PathBuf::from("input.pdf"),
            name: "input.pdf".into(),
            size_bytes: 1024,
            last_modified: chrono::Utc::now(),
            total_pages,
        }
    }

    #[test]
    fn test_split_defaults() {
        let mut session = SplitSession::new(10);
        assert!(session.add_split().is_none());

        session.select_document(document(25));
        session.add_split().unwrap();
        session.add_split().unwrap();

        let defs: Vec<(u32, u32, &str)> = session
            .definitions()
            .iter()
            .map(|d| (d.start_page, d.end_page, d.filename.as_str()))
            .collect();
        assert_eq!(defs, vec![(1, 10, "split_1"), (11, 20, "split_2")]);
    }

    #[test]
    fn test_selecting_document_clears_definitions() {
        let mut session = RotateSession::new(10);
        session.select_document(document(30));
        session.add_rotation().unwrap();
        assert_eq!(session.definitions().len(), 1);

        session.select_document(document(5));
        assert!(session.definitions().is_empty());
    }

    #[test]
    fn test_rotation_scenario_becomes_executable() {
        let mut session = RotateSession::new(10);
        session.select_document(document(20));
        let first = session.add_rotation().unwrap();
        let second = session.add_rotation().unwrap();
        session.set_rotation(second, RotationAngle::CounterClockwise90);

        let defs: Vec<(u32, u32, i32)> = session
            .definitions()
            .iter()
            .map(|d| (d.start_page, d.end_page, d.rotation.degrees()))
            .collect();
        assert_eq!(defs, vec![(1, 10, 90), (11, 20, -90)]);

        // filename defaults to "rotated" but there is no directory yet
        assert!(!session.can_execute());
        session.output_mut().set_directory("/tmp/out");
        assert!(session.can_execute());

        session.output_mut().set_filename("  ");
        assert!(!session.can_execute());
        session.output_mut().set_filename("../turned");
        assert!(!session.can_execute());
        session.output_mut().set_filename("turned");
        assert!(session.can_execute());

        session.set_span(first, 0, 10);
        assert!(!session.plan().can_execute);
    }

    #[test]
    fn test_split_needs_no_filename() {
        let mut session = SplitSession::new(10);
        session.select_document(document(12));
        session.add_split().unwrap();
        session.output_mut().set_directory("/tmp/out");
        assert!(session.can_execute());
        assert_eq!(session.output().spec(false).unwrap().filename, None);
    }

    #[test]
    fn test_max_definitions() {
        let mut session = RotateSession::new(2);
        session.select_document(document(100));
        assert!(session.add_rotation().is_some());
        assert!(session.add_rotation().is_some());
        assert!(!session.can_add());
        assert!(session.add_rotation().is_none());
        assert_eq!(session.definitions().len(), 2);
    }

    #[test]
    fn test_merge_list_editing() {
        let dir = tempdir().unwrap();
        let mut session = MergeSession::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"%PDF-1.7").unwrap();
            session.add_file(path).unwrap();
        }
        assert!(session.add_file(dir.path().join("missing.pdf")).is_err());

        assert!(session.move_file(2, 0));
        assert!(session.remove(1).is_some());
        let names: Vec<String> = session
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.pdf", "b.pdf"]);

        assert!(!session.can_merge());
        session.output_mut().set_directory(dir.path());
        assert!(session.can_merge());
        assert_eq!(session.output().filename(), "merged");
    }

    #[test]
    fn test_watermark_fields_commit_to_last_valid_value() {
        let mut session = WatermarkSession::new();
        session.select_document(document(3));
        session.output_mut().set_directory("/tmp/out");
        assert!(session.can_apply());

        session.edit_font_size("5");
        assert!(!session.can_apply());
        assert_eq!(session.definition().text_config.font_size, 24);
        assert_eq!(session.commit_font_size(), 24);
        assert!(session.can_apply());

        session.edit_opacity("75");
        assert_eq!(session.definition().text_config.opacity, 0.75);

        session.set_page_range(PageSelection::Specific("4".into()));
        assert!(!session.can_apply());
    }

    #[tokio::test]
    async fn test_success_resets_and_failure_keeps_configuration() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        write_test_pdf(&input, 20);
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let engine = LopdfEngine::new();
        let info = engine.metadata(&input).unwrap();
        let executor = DocumentOperationExecutor::new(engine);

        let mut session = RotateSession::new(10);
        session.select_document(info);
        session.add_rotation().unwrap();
        session.output_mut().set_directory(&out);
        session.output_mut().set_filename("turned");

        // a stale range fails validation and nothing is reset
        let id = session.definitions()[0].id;
        session.set_span(id, 15, 25);
        assert!(session.execute(&executor, &CancelHandle::new(), false).await.is_err());
        assert_eq!(session.definitions().len(), 1);
        assert_eq!(session.output().filename(), "turned");
        assert!(!executor.is_processing());

        session.set_span(id, 15, 20);
        let manifest = session
            .execute(&executor, &CancelHandle::new(), false)
            .await
            .unwrap();
        assert_eq!(manifest.outputs, vec![out.join("turned.pdf")]);
        assert!(session.document().is_none());
        assert!(session.definitions().is_empty());
        assert_eq!(session.output().filename(), "rotated");
        assert_eq!(session.output().directory(), Some(&out));
    }

    #[tokio::test]
    async fn test_shared_executor_refuses_a_second_session() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        write_test_pdf(&input, 20);
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let engine = LopdfEngine::new();
        let info = engine.metadata(&input).unwrap();
        let executor = DocumentOperationExecutor::new(engine);

        let mut first = RotateSession::new(10);
        let mut second = RotateSession::new(10);
        for (session, name) in [(&mut first, "first"), (&mut second, "second")] {
            session.select_document(info.clone());
            session.add_rotation().unwrap();
            session.output_mut().set_directory(&out);
            session.output_mut().set_filename(name);
        }

        let cancel = CancelHandle::new();
        let (a, b) = tokio::join!(
            first.execute(&executor, &cancel, false),
            second.execute(&executor, &cancel, false)
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(PdfWizardError::Busy)));

        // the refused session keeps everything for a retry
        assert!(second.document().is_some());
        assert_eq!(second.output().filename(), "second");
        assert!(second.can_execute());
        assert!(!executor.is_processing());
        assert!(second.execute(&executor, &cancel, false).await.is_ok());
    }
}
