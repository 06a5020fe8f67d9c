use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

pub type DefinitionId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub name: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub total_pages: u32,
}

/// Inclusive, 1-indexed page interval that fits inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageRange {
    start: u32,
    end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32, total_pages: u32) -> Result<Self, ValidationError> {
        if total_pages == 0 {
            return Err(ValidationError::NoDocument);
        }
        for page in [start, end] {
            if page < 1 || page > total_pages {
                return Err(ValidationError::OutOfRange {
                    page: page as i64,
                    total_pages,
                });
            }
        }
        if start > end {
            return Err(ValidationError::RangeOrder { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(page: u32, total_pages: u32) -> Result<Self, ValidationError> {
        Self::new(page, page, total_pages)
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn overlaps(&self, other: &PageRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Anything that covers a start/end page pair in a definition list.
pub trait PageSpan {
    fn id(&self) -> DefinitionId;
    fn start_page(&self) -> u32;
    fn end_page(&self) -> u32;
    fn set_span(&mut self, start_page: u32, end_page: u32);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitDefinition {
    #[serde(default)]
    pub id: DefinitionId,
    pub start_page: u32,
    pub end_page: u32,
    /// Output name without the `.pdf` suffix.
    pub filename: String,
}

impl SplitDefinition {
    pub fn output_name(&self) -> String {
        format!("{}{}", self.filename.trim(), crate::PDF_EXTENSION)
    }
}

impl PageSpan for SplitDefinition {
    fn id(&self) -> DefinitionId {
        self.id
    }
    fn start_page(&self) -> u32 {
        self.start_page
    }
    fn end_page(&self) -> u32 {
        self.end_page
    }
    fn set_span(&mut self, start_page: u32, end_page: u32) {
        self.start_page = start_page;
        self.end_page = end_page;
    }
}

/// Rotation applied by the rotate operation. Only quarter and half turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum RotationAngle {
    Clockwise90,
    CounterClockwise90,
    Half,
}

impl RotationAngle {
    pub fn degrees(self) -> i32 {
        match self {
            Self::Clockwise90 => 90,
            Self::CounterClockwise90 => -90,
            Self::Half => 180,
        }
    }
}

impl Default for RotationAngle {
    fn default() -> Self {
        Self::Clockwise90
    }
}

impl TryFrom<i32> for RotationAngle {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            90 => Ok(Self::Clockwise90),
            -90 => Ok(Self::CounterClockwise90),
            180 => Ok(Self::Half),
            other => Err(ValidationError::field(
                "rotation",
                format!("invalid rotation angle {} (must be 90, -90, or 180)", other),
            )),
        }
    }
}

impl From<RotationAngle> for i32 {
    fn from(angle: RotationAngle) -> Self {
        angle.degrees()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateDefinition {
    #[serde(default)]
    pub id: DefinitionId,
    pub start_page: u32,
    pub end_page: u32,
    pub rotation: RotationAngle,
}

impl PageSpan for RotateDefinition {
    fn id(&self) -> DefinitionId {
        self.id
    }
    fn start_page(&self) -> u32 {
        self.start_page
    }
    fn end_page(&self) -> u32 {
        self.end_page
    }
    fn set_span(&mut self, start_page: u32, end_page: u32) {
        self.start_page = start_page;
        self.end_page = end_page;
    }
}

/// Angle of the watermark text. Deliberately separate from [`RotationAngle`]:
/// the two accept different sets of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum WatermarkRotation {
    None,
    Deg45,
    Deg90,
    Neg45,
    Neg90,
    Deg180,
}

impl WatermarkRotation {
    pub fn degrees(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Deg45 => 45,
            Self::Deg90 => 90,
            Self::Neg45 => -45,
            Self::Neg90 => -90,
            Self::Deg180 => 180,
        }
    }
}

impl Default for WatermarkRotation {
    fn default() -> Self {
        Self::None
    }
}

impl TryFrom<i32> for WatermarkRotation {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            45 => Ok(Self::Deg45),
            90 => Ok(Self::Deg90),
            -45 => Ok(Self::Neg45),
            -90 => Ok(Self::Neg90),
            180 => Ok(Self::Deg180),
            other => Err(ValidationError::field(
                "rotation",
                format!(
                    "invalid watermark angle {} (must be 0, 45, 90, -45, -90, or 180)",
                    other
                ),
            )),
        }
    }
}

impl From<WatermarkRotation> for i32 {
    fn from(angle: WatermarkRotation) -> Self {
        angle.degrees()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    #[default]
    Center,
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 9] = [
        Self::Center,
        Self::TopLeft,
        Self::TopCenter,
        Self::TopRight,
        Self::MiddleLeft,
        Self::MiddleRight,
        Self::BottomLeft,
        Self::BottomCenter,
        Self::BottomRight,
    ];
}

impl FromStr for WatermarkPosition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "center" | "c" => Ok(Self::Center),
            "top-left" | "upper-left" | "tl" => Ok(Self::TopLeft),
            "top-center" | "upper-center" | "tc" => Ok(Self::TopCenter),
            "top-right" | "upper-right" | "tr" => Ok(Self::TopRight),
            "middle-left" | "l" => Ok(Self::MiddleLeft),
            "middle-right" | "r" => Ok(Self::MiddleRight),
            "bottom-left" | "lower-left" | "bl" => Ok(Self::BottomLeft),
            "bottom-center" | "lower-center" | "bc" => Ok(Self::BottomCenter),
            "bottom-right" | "lower-right" | "br" => Ok(Self::BottomRight),
            other => Err(ValidationError::field(
                "position",
                format!("unknown position '{}'", other),
            )),
        }
    }
}

/// The standard 14 Type1 faces offered for watermarks (minus the ones the
/// picker never listed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    #[serde(rename = "Helvetica-Bold")]
    HelveticaBold,
    #[serde(rename = "Helvetica-Oblique")]
    HelveticaOblique,
    #[serde(rename = "Times-Roman")]
    TimesRoman,
    #[serde(rename = "Times-Bold")]
    TimesBold,
    #[serde(rename = "Times-Italic")]
    TimesItalic,
    Courier,
    #[serde(rename = "Courier-Bold")]
    CourierBold,
    #[serde(rename = "Courier-Oblique")]
    CourierOblique,
    Symbol,
}

impl FontFamily {
    pub const ALL: [FontFamily; 10] = [
        Self::Helvetica,
        Self::HelveticaBold,
        Self::HelveticaOblique,
        Self::TimesRoman,
        Self::TimesBold,
        Self::TimesItalic,
        Self::Courier,
        Self::CourierBold,
        Self::CourierOblique,
        Self::Symbol,
    ];

    /// PostScript base font name.
    pub fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::TimesRoman => "Times-Roman",
            Self::TimesBold => "Times-Bold",
            Self::TimesItalic => "Times-Italic",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::Symbol => "Symbol",
        }
    }

    /// Rough average glyph width as a fraction of the font size.
    pub fn average_advance(self) -> f32 {
        match self {
            Self::Courier | Self::CourierBold | Self::CourierOblique => 0.6,
            Self::TimesRoman | Self::TimesBold | Self::TimesItalic => 0.5,
            Self::HelveticaBold => 0.58,
            Self::Helvetica | Self::HelveticaOblique | Self::Symbol => 0.55,
        }
    }
}

impl FromStr for FontFamily {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|font| font.base_font().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::field("fontFamily", format!("unknown font '{}'", s)))
    }
}

impl fmt::Display for FontFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_font())
    }
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const GRAY: HexColor = HexColor {
        r: 0x80,
        g: 0x80,
        b: 0x80,
    };

    /// Components scaled to the 0..=1 range used by PDF color operators.
    pub fn to_unit_rgb(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::GRAY
    }
}

impl FromStr for HexColor {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = hex_pattern().captures(s.trim()).ok_or_else(|| {
            ValidationError::field("fontColor", format!("invalid hex color '{}'", s))
        })?;
        let channel = |idx: usize| u8::from_str_radix(&caps[idx], 16).unwrap_or(0);
        Ok(Self {
            r: channel(1),
            g: channel(2),
            b: channel(3),
        })
    }
}

impl TryFrom<String> for HexColor {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextConfig {
    pub text: String,
    pub font_size: u32,
    pub font_color: HexColor,
    /// Fraction in `0.0..=1.0`; edited by users as a percentage.
    pub opacity: f64,
    pub rotation: WatermarkRotation,
    pub position: WatermarkPosition,
    pub font_family: FontFamily,
}

impl TextConfig {
    pub fn opacity_percent(&self) -> f64 {
        self.opacity * 100.0
    }

    pub fn set_opacity_percent(&mut self, percent: f64) {
        self.opacity = percent / 100.0;
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            text: "CONFIDENTIAL".to_string(),
            font_size: 24,
            font_color: HexColor::GRAY,
            opacity: 0.5,
            rotation: WatermarkRotation::None,
            position: WatermarkPosition::Center,
            font_family: FontFamily::Helvetica,
        }
    }
}

/// Which pages a watermark lands on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageSelection {
    #[default]
    All,
    Specific(String),
}

impl From<String> for PageSelection {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Specific(value)
        }
    }
}

impl From<PageSelection> for String {
    fn from(selection: PageSelection) -> Self {
        match selection {
            PageSelection::All => "all".to_string(),
            PageSelection::Specific(expr) => expr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkDefinition {
    pub text_config: TextConfig,
    pub page_range: PageSelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Merge,
    Split,
    Rotate,
    Watermark,
}

impl OperationKind {
    /// Filename offered when a session starts or after a successful run.
    pub fn default_filename(self) -> Option<&'static str> {
        match self {
            Self::Merge => Some("merged"),
            Self::Rotate => Some("rotated"),
            Self::Watermark => Some("watermarked"),
            Self::Split => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Rotate => "rotate",
            Self::Watermark => "watermark",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub directory: PathBuf,
    /// Single-file operations only; given without the `.pdf` suffix.
    pub filename: Option<String>,
    pub overwrite: bool,
}

impl OutputSpec {
    pub fn output_path(&self) -> Option<PathBuf> {
        self.filename
            .as_ref()
            .map(|name| self.directory.join(format!("{}{}", name.trim(), crate::PDF_EXTENSION)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputManifest {
    pub operation: OperationKind,
    pub sources: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
    pub definitions: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    #[default]
    Idle,
    Validating,
    Executing,
    Succeeded,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Validating | Self::Executing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_bounds() {
        assert!(PageRange::new(1, 10, 10).is_ok());
        assert_eq!(
            PageRange::new(0, 3, 10),
            Err(ValidationError::OutOfRange {
                page: 0,
                total_pages: 10
            })
        );
        assert_eq!(
            PageRange::new(5, 2, 10),
            Err(ValidationError::RangeOrder { start: 5, end: 2 })
        );
        assert_eq!(PageRange::new(1, 1, 0), Err(ValidationError::NoDocument));
    }

    #[test]
    fn test_page_range_overlap_and_display() {
        let a = PageRange::new(1, 5, 20).unwrap();
        let b = PageRange::new(5, 9, 20).unwrap();
        let c = PageRange::new(10, 10, 20).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.to_string(), "1-5");
        assert_eq!(c.to_string(), "10");
        assert_eq!(b.len(), 5);
    }

    #[test]
    fn test_rotation_vocabularies_stay_distinct() {
        assert!(RotationAngle::try_from(45).is_err());
        assert!(RotationAngle::try_from(0).is_err());
        assert_eq!(RotationAngle::try_from(-90).unwrap().degrees(), -90);
        assert_eq!(WatermarkRotation::try_from(45).unwrap(), WatermarkRotation::Deg45);
        assert!(WatermarkRotation::try_from(270).is_err());
    }

    #[test]
    fn test_rotate_definition_rejects_bad_angle_on_deserialize() {
        let ok = r#"{"startPage":1,"endPage":2,"rotation":180}"#;
        let bad = r#"{"startPage":1,"endPage":2,"rotation":45}"#;
        assert!(serde_json::from_str::<RotateDefinition>(ok).is_ok());
        assert!(serde_json::from_str::<RotateDefinition>(bad).is_err());
    }

    #[test]
    fn test_hex_color_parsing() {
        assert_eq!("#808080".parse::<HexColor>().unwrap(), HexColor::GRAY);
        assert_eq!(
            "ff0000".parse::<HexColor>().unwrap(),
            HexColor { r: 255, g: 0, b: 0 }
        );
        assert!("#GG0000".parse::<HexColor>().is_err());
        assert!("#FFF".parse::<HexColor>().is_err());
        assert_eq!(HexColor { r: 1, g: 2, b: 255 }.to_string(), "#0102FF");
    }

    #[test]
    fn test_position_aliases() {
        assert_eq!("tl".parse::<WatermarkPosition>().unwrap(), WatermarkPosition::TopLeft);
        assert_eq!(
            "Bottom-Center".parse::<WatermarkPosition>().unwrap(),
            WatermarkPosition::BottomCenter
        );
        assert!("middle".parse::<WatermarkPosition>().is_err());
    }

    #[test]
    fn test_font_family_names() {
        assert_eq!("times-bold".parse::<FontFamily>().unwrap(), FontFamily::TimesBold);
        assert!("Arial".parse::<FontFamily>().is_err());
        let json = serde_json::to_string(&FontFamily::CourierOblique).unwrap();
        assert_eq!(json, "\"Courier-Oblique\"");
    }

    #[test]
    fn test_watermark_definition_wire_format() {
        let json = r##"{
            "textConfig": {
                "text": "DRAFT",
                "fontSize": 36,
                "fontColor": "#FF0000",
                "opacity": 0.25,
                "rotation": -45,
                "position": "top-right",
                "fontFamily": "Times-Roman"
            },
            "pageRange": "1,3,5-"
        }"##;
        let def: WatermarkDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.text_config.rotation, WatermarkRotation::Neg45);
        assert_eq!(def.text_config.position, WatermarkPosition::TopRight);
        assert_eq!(def.page_range, PageSelection::Specific("1,3,5-".into()));
        assert_eq!(def.text_config.opacity_percent(), 25.0);

        let all: PageSelection = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, PageSelection::All);
    }

    #[test]
    fn test_output_spec_appends_extension() {
        let spec = OutputSpec {
            directory: PathBuf::from("/tmp/out"),
            filename: Some(" rotated ".into()),
            overwrite: false,
        };
        assert_eq!(spec.output_path(), Some(PathBuf::from("/tmp/out/rotated.pdf")));
    }
}
