use crate::error::ValidationError;
use crate::services::range_parser::PageRangeParser;
use crate::types::{
    PageRange, PageSelection, RotateDefinition, SplitDefinition, TextConfig, WatermarkDefinition,
};
use std::ffi::OsStr;
use std::fmt;
use std::path::Path;

pub const MIN_FONT_SIZE: u32 = 12;
pub const MAX_FONT_SIZE: u32 = 72;
pub const MIN_OPACITY_PERCENT: f64 = 0.0;
pub const MAX_OPACITY_PERCENT: f64 = 100.0;

/// A definition that can be checked against a document's page count.
///
/// Checks are pure and cheap; they run on every edit.
pub trait Validate {
    fn check(&self, total_pages: u32) -> Result<(), ValidationError>;

    fn is_valid(&self, total_pages: u32) -> bool {
        self.check(total_pages).is_ok()
    }
}

pub struct RangeValidator;

impl RangeValidator {
    pub fn check_span(start_page: u32, end_page: u32, total_pages: u32) -> Result<(), ValidationError> {
        PageRange::new(start_page, end_page, total_pages).map(|_| ())
    }

    pub fn check_split(definition: &SplitDefinition, total_pages: u32) -> Result<(), ValidationError> {
        Self::check_span(definition.start_page, definition.end_page, total_pages)?;
        Self::check_filename(&definition.filename)
    }

    /// An output name must be a bare file name, so it can only land in the
    /// output directory.
    pub fn check_filename(filename: &str) -> Result<(), ValidationError> {
        let name = filename.trim();
        if name.is_empty() {
            return Err(ValidationError::field("filename", "cannot be empty"));
        }
        if name.contains(['/', '\\']) || Path::new(name).file_name() != Some(OsStr::new(name)) {
            return Err(ValidationError::field(
                "filename",
                format!("'{}' must be a plain file name without directories", name),
            ));
        }
        Ok(())
    }

    /// The angle itself is already constrained by [`crate::types::RotationAngle`].
    pub fn check_rotate(definition: &RotateDefinition, total_pages: u32) -> Result<(), ValidationError> {
        Self::check_span(definition.start_page, definition.end_page, total_pages)
    }

    pub fn check_font_size(font_size: u32) -> Result<(), ValidationError> {
        if font_size < MIN_FONT_SIZE {
            return Err(ValidationError::field(
                "fontSize",
                format!("must be at least {} pt", MIN_FONT_SIZE),
            ));
        }
        if font_size > MAX_FONT_SIZE {
            return Err(ValidationError::field(
                "fontSize",
                format!("must be at most {} pt", MAX_FONT_SIZE),
            ));
        }
        Ok(())
    }

    pub fn check_opacity_percent(percent: f64) -> Result<(), ValidationError> {
        if !(MIN_OPACITY_PERCENT..=MAX_OPACITY_PERCENT).contains(&percent) {
            return Err(ValidationError::field(
                "opacity",
                format!(
                    "must be between {}% and {}%",
                    MIN_OPACITY_PERCENT, MAX_OPACITY_PERCENT
                ),
            ));
        }
        Ok(())
    }

    pub fn check_text_config(config: &TextConfig) -> Result<(), ValidationError> {
        if config.text.trim().is_empty() {
            return Err(ValidationError::field("text", "watermark text cannot be empty"));
        }
        Self::check_font_size(config.font_size)?;
        Self::check_opacity_percent(config.opacity_percent())
    }

    pub fn check_watermark(definition: &WatermarkDefinition, total_pages: u32) -> Result<(), ValidationError> {
        Self::check_text_config(&definition.text_config)?;
        match &definition.page_range {
            PageSelection::All => Ok(()),
            PageSelection::Specific(expression) => {
                PageRangeParser::parse(expression, total_pages).map(|_| ())
            }
        }
    }

    pub fn validate_split(definition: &SplitDefinition, total_pages: u32) -> bool {
        Self::check_split(definition, total_pages).is_ok()
    }

    pub fn validate_rotate(definition: &RotateDefinition, total_pages: u32) -> bool {
        Self::check_rotate(definition, total_pages).is_ok()
    }

    pub fn validate_watermark(definition: &WatermarkDefinition, total_pages: u32) -> bool {
        Self::check_watermark(definition, total_pages).is_ok()
    }
}

impl Validate for SplitDefinition {
    fn check(&self, total_pages: u32) -> Result<(), ValidationError> {
        RangeValidator::check_split(self, total_pages)
    }
}

impl Validate for RotateDefinition {
    fn check(&self, total_pages: u32) -> Result<(), ValidationError> {
        RangeValidator::check_rotate(self, total_pages)
    }
}

impl Validate for WatermarkDefinition {
    fn check(&self, total_pages: u32) -> Result<(), ValidationError> {
        RangeValidator::check_watermark(self, total_pages)
    }
}

/// Text input bound to a typed value.
///
/// Edits are never coerced: an interim `5` while typing `50` stays on screen
/// and only makes [`FieldInput::is_valid`] false. Correction to the last valid
/// value happens in [`FieldInput::commit`], i.e. when the field loses focus.
#[derive(Clone)]
pub struct FieldInput<T> {
    raw: String,
    value: T,
    parse: fn(&str) -> Result<T, ValidationError>,
}

impl<T: Copy + fmt::Display> FieldInput<T> {
    pub fn new(initial: T, parse: fn(&str) -> Result<T, ValidationError>) -> Self {
        Self {
            raw: initial.to_string(),
            value: initial,
            parse,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Last valid value.
    pub fn value(&self) -> T {
        self.value
    }

    pub fn edit(&mut self, text: impl Into<String>) {
        self.raw = text.into();
        if let Ok(value) = (self.parse)(&self.raw) {
            self.value = value;
        }
    }

    pub fn check(&self) -> Result<T, ValidationError> {
        (self.parse)(&self.raw)
    }

    pub fn is_valid(&self) -> bool {
        self.check().is_ok()
    }

    pub fn commit(&mut self) -> T {
        match self.check() {
            Ok(value) => self.value = value,
            Err(_) => self.raw = self.value.to_string(),
        }
        self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for FieldInput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldInput")
            .field("raw", &self.raw)
            .field("value", &self.value)
            .finish()
    }
}

pub fn parse_font_size(text: &str) -> Result<u32, ValidationError> {
    let value: u32 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::field("fontSize", format!("'{}' is not a number", text)))?;
    RangeValidator::check_font_size(value)?;
    Ok(value)
}

pub fn parse_opacity_percent(text: &str) -> Result<f64, ValidationError> {
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| ValidationError::field("opacity", format!("'{}' is not a number", text)))?;
    RangeValidator::check_opacity_percent(value)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RotationAngle, WatermarkRotation};

    fn split(start: u32, end: u32, filename: &str) -> SplitDefinition {
        SplitDefinition {
            id: 1,
            start_page: start,
            end_page: end,
            filename: filename.into(),
        }
    }

    #[test]
    fn test_split_rules() {
        assert!(RangeValidator::validate_split(&split(1, 10, "part1"), 10));
        assert!(!RangeValidator::validate_split(&split(0, 3, "part1"), 10));
        assert!(!RangeValidator::validate_split(&split(4, 3, "part1"), 10));
        assert!(!RangeValidator::validate_split(&split(1, 11, "part1"), 10));
        assert!(!RangeValidator::validate_split(&split(1, 3, "   "), 10));
    }

    #[test]
    fn test_filename_must_stay_in_output_directory() {
        assert!(RangeValidator::check_filename(" part 1 ").is_ok());
        assert!(RangeValidator::check_filename("v1.2").is_ok());
        for name in ["../escaped", "/tmp/abs", "sub/part", "sub\\part", "..", "."] {
            let err = RangeValidator::check_filename(name).unwrap_err();
            assert_eq!(err.category(), crate::error::ValidationCategory::FieldConstraint, "{}", name);
        }
        assert!(!RangeValidator::validate_split(&split(1, 3, "../part1"), 10));
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let def = split(2, 5, "chapter");
        let first = def.is_valid(8);
        for _ in 0..5 {
            assert_eq!(def.is_valid(8), first);
        }
        assert!(first);
    }

    #[test]
    fn test_rotate_rules() {
        let def = RotateDefinition {
            id: 1,
            start_page: 3,
            end_page: 3,
            rotation: RotationAngle::Half,
        };
        assert!(RangeValidator::validate_rotate(&def, 3));
        assert!(!RangeValidator::validate_rotate(&def, 2));
    }

    #[test]
    fn test_font_size_boundaries() {
        assert!(RangeValidator::check_font_size(12).is_ok());
        assert!(RangeValidator::check_font_size(72).is_ok());
        assert!(RangeValidator::check_font_size(11).is_err());
        assert!(RangeValidator::check_font_size(73).is_err());
    }

    #[test]
    fn test_opacity_boundaries() {
        assert!(RangeValidator::check_opacity_percent(0.0).is_ok());
        assert!(RangeValidator::check_opacity_percent(100.0).is_ok());
        assert!(RangeValidator::check_opacity_percent(-1.0).is_err());
        assert!(RangeValidator::check_opacity_percent(101.0).is_err());
        assert!(RangeValidator::check_opacity_percent(f64::NAN).is_err());
    }

    #[test]
    fn test_watermark_rules() {
        let mut def = WatermarkDefinition::default();
        assert!(def.is_valid(5));

        def.text_config.rotation = WatermarkRotation::Deg45;
        def.page_range = PageSelection::Specific("1,3-".into());
        assert!(def.is_valid(5));

        def.page_range = PageSelection::Specific("6".into());
        assert!(!def.is_valid(5));

        def.page_range = PageSelection::Specific(String::new());
        assert_eq!(def.check(5), Err(ValidationError::EmptyRange));

        def.page_range = PageSelection::All;
        def.text_config.text = "  ".into();
        assert!(!def.is_valid(5));

        def.text_config.text = "DRAFT".into();
        def.text_config.set_opacity_percent(100.0);
        assert!(def.is_valid(5));
        def.text_config.set_opacity_percent(101.0);
        assert!(!def.is_valid(5));
    }

    #[test]
    fn test_field_input_does_not_coerce_while_typing() {
        let mut field = FieldInput::new(24, parse_font_size);
        field.edit("5");
        assert_eq!(field.raw(), "5");
        assert!(!field.is_valid());
        assert_eq!(field.value(), 24);

        field.edit("50");
        assert!(field.is_valid());
        assert_eq!(field.value(), 50);
        assert_eq!(field.commit(), 50);
        assert_eq!(field.raw(), "50");
    }

    #[test]
    fn test_field_input_resets_on_invalid_commit() {
        let mut field = FieldInput::new(50.0, parse_opacity_percent);
        field.edit("150");
        assert!(!field.is_valid());
        assert_eq!(field.commit(), 50.0);
        assert_eq!(field.raw(), "50");
        assert!(field.is_valid());

        field.edit("");
        assert!(!field.is_valid());
        field.commit();
        assert_eq!(field.raw(), "50");
    }
}
