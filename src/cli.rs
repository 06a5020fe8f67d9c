use clap::{Args, Parser, Subcommand};
use pdf_wizard::{FontFamily, RotationAngle, WatermarkPosition, WatermarkRotation};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "pdf-wizard")]
#[command(about = "Merge, split, rotate and watermark PDF documents by page range")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output directory (defaults to the configured one, then ./output)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Use this config file instead of the per-user one
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Abort an operation that takes longer than this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Force overwrite existing output files
    #[arg(long, global = true)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show page count and file details of a PDF
    Info(InfoArgs),

    /// Concatenate PDF files in the given order
    Merge(MergeArgs),

    /// Split a PDF into one file per page range
    Split(SplitArgs),

    /// Rotate page ranges of a PDF
    Rotate(RotateArgs),

    /// Stamp text onto the pages of a PDF
    Watermark(WatermarkArgs),

    /// Check a page-range expression such as "1,3,5-10" without touching any file
    CheckRange(CheckRangeArgs),

    /// Show or change persisted settings
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct InfoArgs {
    /// PDF file to inspect
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Write the details to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Input PDF files or directories of PDF files, in merge order
    #[arg(required = true, value_name = "SOURCE")]
    pub sources: Vec<String>,

    /// Output filename without the .pdf suffix
    #[arg(short, long, default_value = "merged")]
    pub filename: String,

    /// Write the output manifest to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SplitArgs {
    /// PDF file to split
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Page range and optional filename, e.g. "1-3:intro" (repeatable).
    /// Without any, the document is cut into ten-page parts.
    #[arg(short, long = "range", value_name = "START-END[:NAME]", value_parser = parse_split_range)]
    pub ranges: Vec<RangeArg<Option<String>>>,

    /// Write the output manifest to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RotateArgs {
    /// PDF file to rotate
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Page range and angle (90, -90 or 180), e.g. "1-10:90" (repeatable).
    /// The angle defaults to 90.
    #[arg(
        short,
        long = "range",
        required = true,
        value_name = "START-END[:ANGLE]",
        allow_hyphen_values = true,
        value_parser = parse_rotate_range
    )]
    pub ranges: Vec<RangeArg<RotationAngle>>,

    /// Output filename without the .pdf suffix
    #[arg(short, long, default_value = "rotated")]
    pub filename: String,

    /// Write the output manifest to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct WatermarkArgs {
    /// PDF file to watermark
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Watermark text
    #[arg(short, long, default_value = "CONFIDENTIAL")]
    pub text: String,

    /// Font size in points (12 to 72)
    #[arg(long, default_value = "24")]
    pub font_size: String,

    /// Text color as #RRGGBB
    #[arg(long, default_value = "#808080")]
    pub color: String,

    /// Opacity in percent (0 to 100)
    #[arg(long, default_value = "50")]
    pub opacity: String,

    /// Text angle: 0, 45, 90, -45, -90 or 180
    #[arg(long, default_value = "0", allow_hyphen_values = true, value_parser = parse_watermark_rotation)]
    pub rotation: WatermarkRotation,

    /// Anchor such as center, top-left or bottom-right
    #[arg(long, default_value = "center", value_parser = WatermarkPosition::from_str)]
    pub position: WatermarkPosition,

    /// One of the standard PDF fonts, e.g. Helvetica or Times-Bold
    #[arg(long, default_value = "Helvetica", value_parser = FontFamily::from_str)]
    pub font: FontFamily,

    /// Pages to stamp: "all" or an expression like "1,3,5-10"
    #[arg(short, long, default_value = "all")]
    pub pages: String,

    /// Output filename without the .pdf suffix
    #[arg(short, long, default_value = "watermarked")]
    pub filename: String,

    /// Write the output manifest to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckRangeArgs {
    /// Expression to check, e.g. "1,3,5-10" or "8-"
    #[arg(value_name = "EXPRESSION")]
    pub expression: String,

    /// Page count to check against
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub pages: Option<u32>,

    /// Take the page count from this PDF
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current settings
    Show,

    /// Print the config file location
    Path,

    /// Set the interface language (en, zh, ar, fr, ja)
    SetLanguage {
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Set or clear the default output directory
    SetOutputDir {
        #[arg(value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

/// A `START-END[:VALUE]` command-line range. A single page may be given as `N`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeArg<T> {
    pub start: u32,
    pub end: u32,
    pub value: T,
}

fn parse_span(span: &str) -> Result<(u32, u32), String> {
    let page = |text: &str| {
        text.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{}' is not a page number", text.trim()))
    };
    match span.split_once('-') {
        Some((start, end)) => Ok((page(start)?, page(end)?)),
        None => {
            let single = page(span)?;
            Ok((single, single))
        }
    }
}

fn parse_split_range(arg: &str) -> Result<RangeArg<Option<String>>, String> {
    let (span, name) = match arg.split_once(':') {
        Some((span, name)) => (span, Some(name.trim().to_string())),
        None => (arg, None),
    };
    let (start, end) = parse_span(span)?;
    Ok(RangeArg {
        start,
        end,
        value: name.filter(|n| !n.is_empty()),
    })
}

fn parse_rotate_range(arg: &str) -> Result<RangeArg<RotationAngle>, String> {
    let (span, angle) = match arg.split_once(':') {
        Some((span, angle)) => {
            let degrees: i32 = angle
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not an angle", angle.trim()))?;
            (span, RotationAngle::try_from(degrees).map_err(|e| e.to_string())?)
        }
        None => (arg, RotationAngle::default()),
    };
    let (start, end) = parse_span(span)?;
    Ok(RangeArg {
        start,
        end,
        value: angle,
    })
}

fn parse_watermark_rotation(arg: &str) -> Result<WatermarkRotation, String> {
    let degrees: i32 = arg
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not an angle", arg.trim()))?;
    WatermarkRotation::try_from(degrees).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_split_range_arguments() {
        assert_eq!(
            parse_split_range("1-3:intro").unwrap(),
            RangeArg {
                start: 1,
                end: 3,
                value: Some("intro".to_string())
            }
        );
        assert_eq!(parse_split_range("7").unwrap().value, None);
        assert_eq!(parse_split_range("4-9: ").unwrap().value, None);
        assert!(parse_split_range("a-3").is_err());
    }

    #[test]
    fn test_rotate_range_arguments() {
        let arg = parse_rotate_range("11-20:-90").unwrap();
        assert_eq!((arg.start, arg.end), (11, 20));
        assert_eq!(arg.value, RotationAngle::CounterClockwise90);
        assert_eq!(parse_rotate_range("1-10").unwrap().value, RotationAngle::Clockwise90);
        assert!(parse_rotate_range("1-10:45").is_err());
    }

    #[test]
    fn test_parse_rotate_command() {
        let cli = Cli::try_parse_from([
            "pdf-wizard",
            "rotate",
            "input.pdf",
            "--range",
            "1-10:90",
            "--range",
            "11-20:-90",
            "--force",
        ])
        .unwrap();
        assert!(cli.force);
        match cli.command {
            Commands::Rotate(args) => {
                assert_eq!(args.ranges.len(), 2);
                assert_eq!(args.filename, "rotated");
            }
            _ => panic!("expected rotate"),
        }
    }
}
