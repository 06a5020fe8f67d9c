use super::inherited_attribute;
use crate::error::{PdfWizardError, Result};
use crate::services::range_parser::PageSet;
use crate::types::{FontFamily, TextConfig, WatermarkPosition};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Distance kept between edge-anchored text and the page boundary, in points.
const MARGIN: f32 = 36.0;

/// Letter size, used when a page has no usable MediaBox.
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

const FONT_RESOURCE: &str = "PWFont";
const GSTATE_RESOURCE: &str = "PWGS";

/// Where the watermark text goes on a page.
///
/// The text matrix is rotated around `anchor`; `offset` then moves the text
/// origin (in rotated text space) so the text is aligned on the anchor the
/// way its position asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub anchor: (f32, f32),
    pub offset: (f32, f32),
}

/// Computes the placement of a line of text on a page.
///
/// `media_box` is `[llx, lly, urx, ury]`. The horizontal anchor is the left
/// margin, the page centre or the right margin; the vertical one works the
/// same way with the top and bottom margins.
pub fn placement(
    media_box: [f32; 4],
    position: WatermarkPosition,
    text_width: f32,
    font_size: f32,
) -> Placement {
    let [llx, lly, urx, ury] = media_box;
    let (fx, fy) = alignment(position);

    let usable_width = (urx - llx - 2.0 * MARGIN).max(0.0);
    let usable_height = (ury - lly - 2.0 * MARGIN).max(0.0);

    Placement {
        anchor: (
            llx + MARGIN + fx * usable_width,
            lly + MARGIN + fy * usable_height,
        ),
        offset: (-fx * text_width, -fy * font_size),
    }
}

/// Horizontal and vertical alignment fractions: 0 is left/bottom, 1 is right/top.
fn alignment(position: WatermarkPosition) -> (f32, f32) {
    match position {
        WatermarkPosition::TopLeft => (0.0, 1.0),
        WatermarkPosition::TopCenter => (0.5, 1.0),
        WatermarkPosition::TopRight => (1.0, 1.0),
        WatermarkPosition::MiddleLeft => (0.0, 0.5),
        WatermarkPosition::Center => (0.5, 0.5),
        WatermarkPosition::MiddleRight => (1.0, 0.5),
        WatermarkPosition::BottomLeft => (0.0, 0.0),
        WatermarkPosition::BottomCenter => (0.5, 0.0),
        WatermarkPosition::BottomRight => (1.0, 0.0),
    }
}

/// Stamps `config` onto every page in `pages`.
pub(crate) fn stamp_pages(doc: &mut Document, config: &TextConfig, pages: &PageSet) -> Result<()> {
    let font_id = doc.add_object(font_dictionary(config.font_family));
    let gstate_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"ExtGState".to_vec())),
        ("ca", Object::Real(config.opacity as f32)),
        ("CA", Object::Real(config.opacity as f32)),
    ]));

    let page_ids = doc.get_pages();
    let encoded = encode_text(&config.text, config.font_family);
    let text_width =
        encoded.len() as f32 * config.font_size as f32 * config.font_family.average_advance();

    for page in pages.iter() {
        let page_id = *page_ids.get(&page).ok_or_else(|| {
            PdfWizardError::invalid(format!(
                "page {} does not exist (document has {} pages)",
                page,
                page_ids.len()
            ))
        })?;

        install_resources(doc, page_id, font_id, gstate_id)?;

        let media_box = media_box(doc, page_id);
        let place = placement(
            media_box,
            config.position,
            text_width,
            config.font_size as f32,
        );
        let content = text_stream(config, &encoded, place);
        wrap_contents(doc, page_id, content)?;
    }

    debug!(
        "Stamped '{}' on {} of {} pages",
        config.text,
        pages.len(),
        page_ids.len()
    );
    Ok(())
}

fn font_dictionary(family: FontFamily) -> Dictionary {
    let mut font = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(family.base_font().as_bytes().to_vec())),
    ]);
    if family != FontFamily::Symbol {
        font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    }
    font
}

/// Maps text to single-byte codes. Characters outside Latin-1 become `?`.
fn encode_text(text: &str, family: FontFamily) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7e => code as u8,
            code @ 0xa0..=0xff if family != FontFamily::Symbol => code as u8,
            _ => b'?',
        })
        .collect()
}

fn escape_literal(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len() + 8);
    for &b in bytes {
        if matches!(b, b'(' | b')' | b'\\') {
            escaped.push(b'\\');
        }
        escaped.push(b);
    }
    escaped
}

fn text_stream(config: &TextConfig, encoded: &[u8], place: Placement) -> Vec<u8> {
    let (r, g, b) = config.font_color.to_unit_rgb();
    let radians = (config.rotation.degrees() as f32).to_radians();
    let (sin, cos) = radians.sin_cos();

    let mut stream = Vec::new();
    stream.extend_from_slice(b"Q\nq\n");
    stream.extend_from_slice(format!("/{} gs\n", GSTATE_RESOURCE).as_bytes());
    stream.extend_from_slice(b"BT\n");
    stream.extend_from_slice(format!("/{} {} Tf\n", FONT_RESOURCE, config.font_size).as_bytes());
    stream.extend_from_slice(format!("{:.4} {:.4} {:.4} rg\n", r, g, b).as_bytes());
    stream.extend_from_slice(
        format!(
            "{:.4} {:.4} {:.4} {:.4} {:.2} {:.2} Tm\n",
            cos, sin, -sin, cos, place.anchor.0, place.anchor.1
        )
        .as_bytes(),
    );
    stream.extend_from_slice(format!("{:.2} {:.2} Td\n", place.offset.0, place.offset.1).as_bytes());
    stream.push(b'(');
    stream.extend_from_slice(&escape_literal(encoded));
    stream.extend_from_slice(b") Tj\nET\nQ\n");
    stream
}

fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let resolved = match inherited_attribute(doc, page_id, b"MediaBox") {
        Some(Object::Reference(id)) => doc.get_object(id).ok().cloned(),
        other => other,
    };
    let values: Option<Vec<f32>> = resolved
        .as_ref()
        .and_then(|obj| obj.as_array().ok())
        .map(|items| items.iter().filter_map(number).collect());

    match values.as_deref() {
        Some([llx, lly, urx, ury]) if urx > llx && ury > lly => [*llx, *lly, *urx, *ury],
        _ => FALLBACK_MEDIA_BOX,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

/// Resolves a dictionary that may be stored inline or behind a reference.
fn resolve_dict(doc: &Document, value: Option<Object>) -> Dictionary {
    match value {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc.get_dictionary(id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// Gives the page its own copy of its resources with the watermark font and
/// graphics state added. Shared resource dictionaries are left untouched.
fn install_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    gstate_id: ObjectId,
) -> Result<()> {
    let mut resources = resolve_dict(doc, inherited_attribute(doc, page_id, b"Resources"));

    let mut fonts = resolve_dict(doc, resources.get(b"Font").ok().cloned());
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let mut states = resolve_dict(doc, resources.get(b"ExtGState").ok().cloned());
    states.set(GSTATE_RESOURCE, Object::Reference(gstate_id));
    resources.set("ExtGState", Object::Dictionary(states));

    let page = doc.get_dictionary_mut(page_id).map_err(|e| PdfWizardError::Execution {
        reason: format!("page object {:?} is not a dictionary: {}", page_id, e),
    })?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Brackets the existing content in `q`/`Q` so its graphics state cannot
/// leak into the watermark, then appends the watermark stream.
fn wrap_contents(doc: &mut Document, page_id: ObjectId, watermark: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(reference @ Object::Reference(_)) => vec![reference.clone()],
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), watermark));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(stamp_id));

    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Array(contents));
    Ok(())
}
