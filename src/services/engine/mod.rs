//! PDF engine boundary.
//!
//! The planner and executor only talk to [`PdfEngine`]. [`LopdfEngine`] is the
//! implementation shipped with the crate.

mod merge;
mod rotate;
mod split;
mod watermark;

use crate::error::{PdfWizardError, Result};
use crate::services::loader::DocumentLoader;
use crate::services::range_parser::{PageRangeParser, PageSet};
use crate::types::{
    DocumentInfo, PageSelection, RotateDefinition, SplitDefinition, WatermarkDefinition,
};
use lopdf::{Document, Object, ObjectId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use watermark::{placement, Placement};

/// Operations the executor needs from a PDF library.
///
/// Calls are blocking. Page numbers are 1-indexed and ranges inclusive.
/// Implementations must not modify the input document.
pub trait PdfEngine: Send + Sync + 'static {
    fn metadata(&self, path: &Path) -> Result<DocumentInfo>;

    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()>;

    /// Writes one file per definition into `output_dir`, returned in list order.
    fn split(
        &self,
        input: &Path,
        definitions: &[SplitDefinition],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>>;

    fn rotate(&self, input: &Path, definitions: &[RotateDefinition], output: &Path) -> Result<()>;

    fn watermark(
        &self,
        input: &Path,
        definition: &WatermarkDefinition,
        output: &Path,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }

    fn load(path: &Path) -> Result<Document> {
        DocumentLoader::validate_pdf_file(path)?;
        Document::load(path).map_err(|e| {
            debug!("lopdf rejected {}: {}", path.display(), e);
            PdfWizardError::Pdf(e)
        })
    }

    fn save(doc: &mut Document, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).map_err(|e| PdfWizardError::Execution {
            reason: format!("failed to serialize {}: {}", path.display(), e),
        })?;
        fs::write(path, buffer)?;
        Ok(())
    }
}

impl PdfEngine for LopdfEngine {
    fn metadata(&self, path: &Path) -> Result<DocumentInfo> {
        let doc = Self::load(path)?;
        let total_pages = doc.get_pages().len() as u32;
        DocumentLoader::describe(path, total_pages)
    }

    fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(PdfWizardError::invalid("no input files provided"));
        }

        let mut documents = Vec::with_capacity(inputs.len());
        for (idx, path) in inputs.iter().enumerate() {
            let doc = Self::load(path).map_err(|e| PdfWizardError::Merge {
                reason: format!(
                    "PDF file {} ({}) cannot be processed: {}",
                    idx + 1,
                    path.display(),
                    e
                ),
            })?;
            documents.push(doc);
        }

        let mut merged = merge::merge_documents(documents)?;
        Self::save(&mut merged, output)?;
        info!("Merged {} files into {}", inputs.len(), output.display());
        Ok(())
    }

    fn split(
        &self,
        input: &Path,
        definitions: &[SplitDefinition],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let source = Self::load(input)?;
        let mut outputs = Vec::with_capacity(definitions.len());

        for (idx, definition) in definitions.iter().enumerate() {
            let mut part = split::extract_pages(&source, definition.start_page, definition.end_page)
                .map_err(|e| PdfWizardError::Execution {
                    reason: format!(
                        "failed to extract pages for split {} (pages {}-{}): {}",
                        idx + 1,
                        definition.start_page,
                        definition.end_page,
                        e
                    ),
                })?;
            let path = output_dir.join(definition.output_name());
            Self::save(&mut part, &path)?;
            debug!(
                "Wrote split {} (pages {}-{}) to {}",
                idx + 1,
                definition.start_page,
                definition.end_page,
                path.display()
            );
            outputs.push(path);
        }

        Ok(outputs)
    }

    fn rotate(&self, input: &Path, definitions: &[RotateDefinition], output: &Path) -> Result<()> {
        let mut doc = Self::load(input)?;
        rotate::apply_rotations(&mut doc, definitions)?;
        Self::save(&mut doc, output)
    }

    fn watermark(
        &self,
        input: &Path,
        definition: &WatermarkDefinition,
        output: &Path,
    ) -> Result<()> {
        let mut doc = Self::load(input)?;
        let total_pages = doc.get_pages().len() as u32;
        let pages = match &definition.page_range {
            PageSelection::All => PageSet::all(total_pages),
            PageSelection::Specific(expression) => PageRangeParser::parse(expression, total_pages)?,
        };
        watermark::stamp_pages(&mut doc, &definition.text_config, &pages)?;
        Self::save(&mut doc, output)
    }
}

/// Looks up a page attribute, following `/Parent` links for inherited values.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth > 64 {
            break;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok();
        depth += 1;
    }
    None
}

pub(crate) fn page_id(doc: &Document, page: u32) -> Result<ObjectId> {
    doc.get_pages().get(&page).copied().ok_or_else(|| {
        PdfWizardError::invalid(format!(
            "page {} does not exist (document has {} pages)",
            page,
            doc.get_pages().len()
        ))
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, Stream};
    use std::path::Path;

    /// In-memory PDF with `num_pages` letter-size pages, each labelled with its number.
    pub fn build_test_pdf(num_pages: u32) -> Document {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut page_ids = Vec::new();

        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let font = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]);
        let font_id = doc.add_object(font);
        let resources = Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
        )]);

        // MediaBox and Resources live on the tree root so that code paths
        // depending on inheritance are exercised.
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    pub fn write_test_pdf(path: &Path, num_pages: u32) {
        let mut doc = build_test_pdf(num_pages);
        doc.save(path).unwrap();
    }

    pub fn page_count(path: &Path) -> usize {
        Document::load(path).unwrap().get_pages().len()
    }
}
