//! # PDF Wizard Library
//!
//! Plans and runs page-range operations on PDF documents: merge, split,
//! rotate and watermark.
//!
//! Definitions are validated on every edit against the loaded document's
//! page count, and the executor re-validates them before handing the whole
//! list to the PDF engine in one call.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pdf_wizard::{
//!     CancelHandle, DocumentOperationExecutor, LopdfEngine, PdfEngine, RotateSession,
//!     RotationAngle,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = LopdfEngine::new();
//!     let document = engine.metadata("report.pdf".as_ref())?;
//!
//!     let mut session = RotateSession::new(10);
//!     session.select_document(document);
//!     let first = session.add_rotation().expect("document is loaded");
//!     let second = session.add_rotation().expect("below the maximum");
//!     session.set_rotation(second, RotationAngle::CounterClockwise90);
//!     session.output_mut().set_directory("./output");
//!
//!     let executor = DocumentOperationExecutor::new(engine);
//!     let manifest = session.execute(&executor, &CancelHandle::new(), false).await?;
//!     println!("Wrote {:?} (first entry {})", manifest.outputs, first);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export main types and services for easier usage
pub use config::{AppConfig, Language};
pub use error::{ErrorKind, PdfWizardError, Result, ValidationCategory, ValidationError};
pub use services::{
    CancelHandle, DocumentLoader, DocumentOperationExecutor, LopdfEngine, MergeSession,
    OperationListPlanner, OperationRequest, PageRangeParser, PageSet, PdfEngine, RangeValidator,
    RotateSession, SplitSession, WatermarkSession,
};
pub use types::{
    DocumentInfo, FontFamily, HexColor, OperationKind, OperationState, OutputManifest,
    OutputSpec, PageRange, PageSelection, RotateDefinition, RotationAngle, SplitDefinition,
    TextConfig, WatermarkDefinition, WatermarkPosition, WatermarkRotation,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Suffix appended to every output filename.
pub const PDF_EXTENSION: &str = ".pdf";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::engine::fixtures::{page_count, write_test_pdf};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_basic_workflow() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("report.pdf");
        write_test_pdf(&input, 20);
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let engine = LopdfEngine::new();
        let document = engine.metadata(&input).unwrap();
        assert_eq!(document.total_pages, 20);
        let executor = DocumentOperationExecutor::new(engine);

        // split into two parts with the default names
        let mut split = SplitSession::new(10);
        split.select_document(document.clone());
        split.add_split().unwrap();
        split.add_split().unwrap();
        split.output_mut().set_directory(&out);
        assert!(split.can_execute());

        let manifest = split
            .execute(&executor, &CancelHandle::new(), false)
            .await
            .unwrap();
        assert_eq!(
            manifest.outputs,
            vec![out.join("split_1.pdf"), out.join("split_2.pdf")]
        );
        assert_eq!(page_count(&manifest.outputs[0]), 10);
        assert_eq!(page_count(&manifest.outputs[1]), 10);

        // merge the parts back together
        let mut merge = MergeSession::new();
        for part in &manifest.outputs {
            merge.add_file(part).unwrap();
        }
        merge.output_mut().set_directory(&out);
        let merged = merge
            .execute(&executor, &CancelHandle::new(), false)
            .await
            .unwrap();
        assert_eq!(merged.outputs, vec![out.join("merged.pdf")]);
        assert_eq!(page_count(&out.join("merged.pdf")), 20);

        // watermark the first and last pages of the merged file
        let mut watermark = WatermarkSession::new();
        watermark.select_document(executor.engine().metadata(&out.join("merged.pdf")).unwrap());
        watermark.set_text("DRAFT");
        watermark.set_page_range(PageSelection::Specific("1-5,15-".into()));
        watermark.output_mut().set_directory(&out);
        assert!(watermark.can_apply());
        watermark
            .execute(&executor, &CancelHandle::new(), false)
            .await
            .unwrap();
        assert_eq!(page_count(&out.join("watermarked.pdf")), 20);

        assert_eq!(executor.state(), OperationState::Succeeded);
        assert_eq!(page_count(&input), 20);
    }

    #[test]
    fn test_range_check_without_engine() {
        let set = PageRangeParser::parse("1,3,5-10", 12).unwrap();
        assert_eq!(set.len(), 8);
        assert!(!PageRangeParser::is_valid("5-2", 12));
    }
}
