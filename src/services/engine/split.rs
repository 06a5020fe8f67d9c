use super::page_id;
use crate::error::{PdfWizardError, Result};
use lopdf::Document;

/// Copies pages `start..=end` of `source` into a standalone document.
///
/// Works on a clone: every other page is deleted (last first, so page
/// numbers stay stable), then unreachable objects are dropped.
pub(crate) fn extract_pages(source: &Document, start: u32, end: u32) -> Result<Document> {
    let page_count = source.get_pages().len() as u32;
    if start == 0 || start > end {
        return Err(PdfWizardError::invalid(format!(
            "invalid page span {}-{}",
            start, end
        )));
    }
    page_id(source, end)?;

    let mut part = source.clone();
    let mut to_delete: Vec<u32> = (1..=page_count)
        .filter(|p| *p < start || *p > end)
        .collect();
    to_delete.reverse();
    for page in to_delete {
        part.delete_pages(&[page]);
    }

    part.prune_objects();
    part.compress();
    Ok(part)
}
