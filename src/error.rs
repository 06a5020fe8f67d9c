use thiserror::Error;

/// Error raised while checking user input against a document.
///
/// These are computed, never thrown: callers show them next to the offending
/// field and keep the session alive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Page range cannot be empty")]
    EmptyRange,

    #[error("Invalid page range format: {token}")]
    InvalidFormat { token: String },

    #[error("Page {page} is out of range (1-{total_pages})")]
    OutOfRange { page: i64, total_pages: u32 },

    #[error("Start page ({start}) must be less than or equal to end page ({end})")]
    RangeOrder { start: u32, end: u32 },

    #[error("No document loaded")]
    NoDocument,

    #[error("{field}: {reason}")]
    FieldConstraint { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCategory {
    Parse,
    RangeBounds,
    FieldConstraint,
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::FieldConstraint {
            field,
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ValidationCategory {
        match self {
            Self::EmptyRange | Self::InvalidFormat { .. } => ValidationCategory::Parse,
            Self::OutOfRange { .. } | Self::RangeOrder { .. } | Self::NoDocument => {
                ValidationCategory::RangeBounds
            }
            Self::FieldConstraint { .. } => ValidationCategory::FieldConstraint,
        }
    }
}

#[derive(Error, Debug)]
pub enum PdfWizardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("File is not a PDF: {path}")]
    NotAPdf { path: String },

    #[error("Output directory error: {reason}")]
    OutputDirectory { reason: String },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to merge PDFs: {reason}")]
    Merge { reason: String },

    #[error("Operation failed: {reason}")]
    Execution { reason: String },

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Coarse classification so callers can tell I/O trouble from a broken PDF
/// or a bad request without matching on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    MalformedPdf,
    InvalidArgument,
    Cancelled,
}

impl PdfWizardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) | Self::FileNotFound { .. } | Self::OutputDirectory { .. } => ErrorKind::Io,
            Self::Pdf(_) | Self::NotAPdf { .. } | Self::Merge { .. } => ErrorKind::MalformedPdf,
            Self::Cancelled | Self::Timeout { .. } => ErrorKind::Cancelled,
            Self::Json(_)
            | Self::InvalidArgument { .. }
            | Self::Validation(_)
            | Self::Busy
            | Self::Config { .. } => ErrorKind::InvalidArgument,
            Self::Execution { .. } | Self::Anyhow(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfWizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_categories() {
        assert_eq!(ValidationError::EmptyRange.category(), ValidationCategory::Parse);
        assert_eq!(
            ValidationError::RangeOrder { start: 5, end: 2 }.category(),
            ValidationCategory::RangeBounds
        );
        assert_eq!(
            ValidationError::field("filename", "cannot be empty").category(),
            ValidationCategory::FieldConstraint
        );
    }

    #[test]
    fn test_out_of_range_message_names_bound() {
        let err = ValidationError::OutOfRange {
            page: 13,
            total_pages: 12,
        };
        assert_eq!(err.to_string(), "Page 13 is out of range (1-12)");
    }

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let io = PdfWizardError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        let pdf = PdfWizardError::NotAPdf {
            path: "a.txt".into(),
        };
        let arg = PdfWizardError::invalid("no pages");
        assert_eq!(io.kind(), ErrorKind::Io);
        assert_eq!(pdf.kind(), ErrorKind::MalformedPdf);
        assert_eq!(arg.kind(), ErrorKind::InvalidArgument);
        assert_eq!(PdfWizardError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
