//! Compositing of resolved values onto the source document.
//!
//! Text is drawn through appended content streams; the signature goes in as
//! an RGB image XObject with an SMask alpha channel. Document load and
//! final serialization are fatal; everything per-field is caught, logged,
//! and skipped so one bad field cannot abort the whole document.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::coords::{PageGeometry, PageRect};
use crate::error::FormFillError;
use crate::fields::{FieldKind, FieldValue};
use crate::fonts::{DisplayFont, EmbeddedFont};
use crate::profile::SignatureAsset;
use crate::raster::page_geometry;

pub const TEXT_FONT_SIZE: f64 = 13.0;
pub const TEXT_INSET_PT: f64 = 6.0;
pub const SIGNATURE_INSET_PT: f64 = 5.0;
pub const SIGNATURE_MAX_WIDTH_PT: f64 = 150.0;
pub const SIGNATURE_MAX_HEIGHT_PT: f64 = 50.0;

/// Ink color distinguishing filled-in values from the form itself.
const INK_RGB: (f64, f64, f64) = (0.10, 0.20, 0.60);

/// Resource name the display font is registered under.
const FONT_RESOURCE: &str = "FFill";

/// A resolved field mapped into page space, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedField {
    pub kind: FieldKind,
    pub value: FieldValue,
    pub rect: PageRect,
}

/// Result of one compositing call.
#[derive(Debug)]
pub struct CompositeOutcome {
    pub pdf: Vec<u8>,
    /// Kinds actually drawn, in draw order.
    pub drawn: Vec<FieldKind>,
    /// Fields skipped over zero-area boxes, missing assets, or per-field
    /// embed failures.
    pub skipped: usize,
}

/// Draw every placed field onto page 1 of the document and serialize.
pub fn compose(
    pdf_bytes: &[u8],
    placed: &[PlacedField],
    signature: Option<&SignatureAsset>,
    font: &DisplayFont,
) -> Result<CompositeOutcome, FormFillError> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| FormFillError::MalformedDocument(e.to_string()))?;
    let page_id = doc
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| FormFillError::MalformedDocument("document has no pages".to_string()))?;
    let page = page_geometry(&doc, page_id).map_err(FormFillError::MalformedDocument)?;

    let mut drawn = Vec::new();
    let mut skipped = 0usize;
    let mut ops = String::new();
    let mut text_used = false;
    let mut sig_index = 0usize;

    for field in placed {
        let rect = clamp_rect(&field.rect, page);
        if rect.width <= 0.0 || rect.height <= 0.0 {
            debug!(kind = ?field.kind, "zero-area box, nothing to draw");
            skipped += 1;
            continue;
        }
        match &field.value {
            FieldValue::Text(text) => {
                ops.push_str(&text_ops(text, &rect));
                text_used = true;
                drawn.push(field.kind);
            }
            FieldValue::Signature => {
                let Some(asset) = signature else {
                    skipped += 1;
                    continue;
                };
                match embed_signature(&mut doc, page_id, asset, sig_index) {
                    Ok(name) => {
                        sig_index += 1;
                        ops.push_str(&signature_ops(&name, asset, &rect));
                        drawn.push(field.kind);
                    }
                    Err(reason) => {
                        warn!(%reason, "signature embed failed, skipping field");
                        skipped += 1;
                    }
                }
            }
        }
    }

    if text_used {
        let font_id = add_font_object(&mut doc, font).map_err(FormFillError::MalformedDocument)?;
        register_font(&mut doc, page_id, font_id).map_err(FormFillError::MalformedDocument)?;
    }
    if !ops.is_empty() {
        append_content(&mut doc, page_id, ops.into_bytes())
            .map_err(FormFillError::MalformedDocument)?;
    }

    let mut pdf = Vec::new();
    doc.save_to(&mut pdf)
        .map_err(|e| FormFillError::MalformedDocument(format!("failed to serialize: {e}")))?;
    Ok(CompositeOutcome { pdf, drawn, skipped })
}

/// Clamp a rect into the page; boxes partially outside shrink to fit,
/// boxes fully outside collapse to zero area.
fn clamp_rect(rect: &PageRect, page: PageGeometry) -> PageRect {
    let x = rect.x.clamp(0.0, page.width_pt);
    let y = rect.y.clamp(0.0, page.height_pt);
    PageRect {
        x,
        y,
        width: rect.width.min(page.width_pt - x).max(0.0),
        height: rect.height.min(page.height_pt - y).max(0.0),
    }
}

/// Clip the signature's drawn size to the fixed maximum, preserving the
/// asset's aspect ratio. The detected box bounds position, not size.
pub fn clip_signature_size(width_px: u32, height_px: u32) -> (f64, f64) {
    let w = f64::from(width_px.max(1));
    let h = f64::from(height_px.max(1));
    let scale = (SIGNATURE_MAX_WIDTH_PT / w)
        .min(SIGNATURE_MAX_HEIGHT_PT / h)
        .min(1.0);
    (w * scale, h * scale)
}

/// Escape special characters for PDF string literals.
fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            _ if c.is_ascii() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

fn text_ops(text: &str, rect: &PageRect) -> String {
    let (r, g, b) = INK_RGB;
    let x = rect.x + TEXT_INSET_PT;
    let y = rect.y + TEXT_INSET_PT;
    format!(
        "q\nBT\n/{font} {size} Tf\n{r} {g} {b} rg\n{x:.2} {y:.2} Td\n({text}) Tj\nET\nQ\n",
        font = FONT_RESOURCE,
        size = TEXT_FONT_SIZE,
        text = escape_pdf_string(text),
    )
}

fn signature_ops(name: &str, asset: &SignatureAsset, rect: &PageRect) -> String {
    let (w, h) = clip_signature_size(asset.width_px(), asset.height_px());
    let x = rect.x + SIGNATURE_INSET_PT;
    let y = rect.y + SIGNATURE_INSET_PT;
    format!("q\n{w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm\n/{name} Do\nQ\n")
}

fn zlib(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| e.to_string())?;
    encoder.finish().map_err(|e| e.to_string())
}

/// Decode the signature PNG and add it to the document as an RGB image
/// XObject with an SMask alpha channel, registered on the page's resources.
/// Returns the resource name to reference from the content stream.
fn embed_signature(
    doc: &mut Document,
    page_id: ObjectId,
    asset: &SignatureAsset,
    index: usize,
) -> Result<String, String> {
    let img = image::load_from_memory(asset.png())
        .map_err(|e| e.to_string())?
        .to_rgba8();
    let (width, height) = img.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in img.pixels() {
        let [r, g, b, a] = pixel.0;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        zlib(&alpha)?,
    ));
    let xobject_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => Object::Reference(smask_id),
        },
        zlib(&rgb)?,
    ));

    let name = format!("FillSig{index}");
    with_resources(doc, page_id, |resources| {
        if !resources.has(b"XObject") {
            resources.set("XObject", Object::Dictionary(Dictionary::new()));
        }
        let xobjects = resources
            .get_mut(b"XObject")
            .map_err(|e| e.to_string())?
            .as_dict_mut()
            .map_err(|e| e.to_string())?;
        xobjects.set(name.as_bytes().to_vec(), Object::Reference(xobject_id));
        Ok(())
    })?;
    Ok(name)
}

/// Add the display font object to the document. Standard fonts are a bare
/// Type1 dictionary; fetched fonts embed their program via FontFile2.
fn add_font_object(doc: &mut Document, font: &DisplayFont) -> Result<ObjectId, String> {
    match font {
        DisplayFont::Standard(base_font) => Ok(doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => *base_font,
        })),
        DisplayFont::Embedded(embedded) => add_embedded_font(doc, embedded),
    }
}

fn add_embedded_font(doc: &mut Document, font: &EmbeddedFont) -> Result<ObjectId, String> {
    let raw_len = font.data.len() as i64;
    let file_id = doc.add_object(Stream::new(
        dictionary! {
            "Length1" => raw_len,
            "Filter" => "FlateDecode",
        },
        zlib(&font.data)?,
    ));
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => "Handscript",
        // Nonsymbolic | Italic
        "Flags" => 96,
        "FontBBox" => vec![(-200).into(), (-250).into(), 1100.into(), 950.into()],
        "ItalicAngle" => Object::Real(-12.0),
        "Ascent" => 800,
        "Descent" => -200,
        "CapHeight" => 700,
        "StemV" => 80,
        "FontFile2" => Object::Reference(file_id),
    });
    let widths: Vec<Object> = font.widths.iter().map(|w| Object::Integer(*w)).collect();
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => "Handscript",
        "FirstChar" => 32,
        "LastChar" => 126,
        "Widths" => widths,
        "FontDescriptor" => Object::Reference(descriptor_id),
        "Encoding" => "WinAnsiEncoding",
    }))
}

fn register_font(doc: &mut Document, page_id: ObjectId, font_id: ObjectId) -> Result<(), String> {
    with_resources(doc, page_id, |resources| {
        if !resources.has(b"Font") {
            resources.set("Font", Object::Dictionary(Dictionary::new()));
        }
        let fonts = resources
            .get_mut(b"Font")
            .map_err(|e| e.to_string())?
            .as_dict_mut()
            .map_err(|e| e.to_string())?;
        fonts.set(FONT_RESOURCE, Object::Reference(font_id));
        Ok(())
    })
}

/// Run `f` against the page's Resources dictionary, resolving the indirect
/// case and creating the dictionary when absent.
fn with_resources<F>(doc: &mut Document, page_id: ObjectId, f: F) -> Result<(), String>
where
    F: FnOnce(&mut Dictionary) -> Result<(), String>,
{
    let resources_ref = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| e.to_string())?;
        match page.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    if let Some(resources_id) = resources_ref {
        let resources = doc
            .get_object_mut(resources_id)
            .map_err(|e| e.to_string())?
            .as_dict_mut()
            .map_err(|e| e.to_string())?;
        f(resources)
    } else {
        let page = doc
            .get_object_mut(page_id)
            .map_err(|e| e.to_string())?
            .as_dict_mut()
            .map_err(|e| e.to_string())?;
        if !page.has(b"Resources") {
            page.set("Resources", Object::Dictionary(Dictionary::new()));
        }
        let resources = page
            .get_mut(b"Resources")
            .map_err(|e| e.to_string())?
            .as_dict_mut()
            .map_err(|e| e.to_string())?;
        f(resources)
    }
}

/// Append a content stream after the page's existing content, preserving
/// whatever Contents shape the page already has.
fn append_content(doc: &mut Document, page_id: ObjectId, ops: Vec<u8>) -> Result<(), String> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), ops));
    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| e.to_string())?
        .as_dict_mut()
        .map_err(|e| e.to_string())?;
    let new_contents = match page.remove(b"Contents") {
        Some(Object::Reference(existing)) => Object::Array(vec![
            Object::Reference(existing),
            Object::Reference(stream_id),
        ]),
        Some(Object::Array(mut array)) => {
            array.push(Object::Reference(stream_id));
            Object::Array(array)
        }
        _ => Object::Reference(stream_id),
    };
    page.set("Contents", new_contents);
    Ok(())
}
