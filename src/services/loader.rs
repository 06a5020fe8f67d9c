use crate::error::{PdfWizardError, Result};
use crate::types::DocumentInfo;
use crate::PDF_EXTENSION;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub struct DocumentLoader;

impl DocumentLoader {
    pub fn is_pdf_path(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()) == PDF_EXTENSION)
            .unwrap_or(false)
    }

    /// Checks that `path` names an existing regular file with a `.pdf` extension.
    pub fn validate_pdf_file(path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(PdfWizardError::invalid("file path cannot be empty"));
        }

        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PdfWizardError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => PdfWizardError::Io(e),
        })?;

        if metadata.is_dir() {
            return Err(PdfWizardError::invalid(format!(
                "path is a directory, not a file: {}",
                path.display()
            )));
        }

        if !Self::is_pdf_path(path) {
            return Err(PdfWizardError::NotAPdf {
                path: path.display().to_string(),
            });
        }

        Ok(())
    }

    pub fn validate_output_directory(path: &Path) -> Result<()> {
        let metadata = fs::metadata(path).map_err(|e| PdfWizardError::OutputDirectory {
            reason: match e.kind() {
                std::io::ErrorKind::NotFound => {
                    format!("output directory does not exist: {}", path.display())
                }
                _ => format!("error accessing output directory: {}", e),
            },
        })?;

        if !metadata.is_dir() {
            return Err(PdfWizardError::OutputDirectory {
                reason: format!("output path is not a directory: {}", path.display()),
            });
        }

        Ok(())
    }

    /// File-system half of [`DocumentInfo`]; the page count comes from the engine.
    pub fn describe(path: &Path, total_pages: u32) -> Result<DocumentInfo> {
        let metadata = fs::metadata(path)?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Ok(DocumentInfo {
            path: path.to_path_buf(),
            name,
            size_bytes: metadata.len(),
            last_modified,
            total_pages,
        })
    }

    /// Expands command-line sources into an ordered list of PDF files.
    ///
    /// Files are kept in the order given. Directories contribute every PDF
    /// beneath them, walked depth first in file-name order.
    pub fn collect_inputs(sources: &[String]) -> Result<Vec<PathBuf>> {
        let mut collected = Vec::new();

        for source in sources {
            let path = Path::new(source);
            if path.is_dir() {
                let found: Vec<PathBuf> = WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(e) => {
                            warn!("Skipping unreadable entry under {}: {}", source, e);
                            None
                        }
                    })
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path())
                    .filter(|p| Self::is_pdf_path(p))
                    .collect();
                info!("Found {} PDF files in {}", found.len(), source);
                collected.extend(found);
            } else {
                Self::validate_pdf_file(path)?;
                debug!("Accepted input file: {}", source);
                collected.push(path.to_path_buf());
            }
        }

        Ok(collected)
    }
}
