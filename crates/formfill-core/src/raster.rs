//! First-page rasterization for the detection request.
//!
//! The rasterizer validates the source document and computes the target
//! pixel dimensions from the page geometry; pixel production itself is a
//! swappable `RenderBackend`. The preview is encoded as JPEG — the exact
//! dimensions produced here feed the coordinate mapper, so they travel with
//! the image.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{Document, Object, ObjectId};
use tracing::debug;

use crate::coords::PageGeometry;
use crate::error::FormFillError;

/// Encoded preview image plus the exact pixel dimensions produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Raster output together with the page geometry it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPage {
    pub image: RasterImage,
    pub page: PageGeometry,
}

/// Produces the pixels for a page preview. The rendering surface is scoped
/// to the call and released on return, success or failure.
pub trait RenderBackend: Send + Sync {
    fn render(
        &self,
        pdf_bytes: &[u8],
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbImage, FormFillError>;
}

/// Placeholder backend for environments without a PDFium library: renders a
/// white page. The detector finds nothing on it, which exercises the
/// fallback field layout, so the degraded path stays demonstrable.
pub struct BlankBackend;

impl RenderBackend for BlankBackend {
    fn render(
        &self,
        _pdf_bytes: &[u8],
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbImage, FormFillError> {
        Ok(RgbImage::from_pixel(
            width_px,
            height_px,
            image::Rgb([255, 255, 255]),
        ))
    }
}

/// Renders via PDFium (Chromium's PDF library). Requires the pdfium dynamic
/// library on the system.
#[cfg(feature = "pdfium")]
pub struct PdfiumBackend;

#[cfg(feature = "pdfium")]
impl RenderBackend for PdfiumBackend {
    fn render(
        &self,
        pdf_bytes: &[u8],
        width_px: u32,
        _height_px: u32,
    ) -> Result<RgbImage, FormFillError> {
        use pdfium_render::prelude::*;

        let pdfium = Pdfium::default();
        let doc = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(|e| FormFillError::Rasterization(e.to_string()))?;
        let page = doc
            .pages()
            .get(0)
            .map_err(|e| FormFillError::Rasterization(e.to_string()))?;
        let bitmap = page
            .render_with_config(&PdfRenderConfig::new().set_target_width(width_px as i32))
            .map_err(|e| FormFillError::Rasterization(e.to_string()))?;
        Ok(bitmap.as_image().to_rgb8())
    }
}

/// Renders page 1 of a PDF to a JPEG preview at a caller-chosen scale.
pub struct Rasterizer {
    backend: Arc<dyn RenderBackend>,
    jpeg_quality: u8,
}

impl Rasterizer {
    pub fn new(backend: Arc<dyn RenderBackend>, jpeg_quality: u8) -> Self {
        Self {
            backend,
            jpeg_quality,
        }
    }

    /// Render the first page at `scale` (pixels per point) and encode it.
    ///
    /// Fails with `Rasterization` when the bytes are not a parsable PDF or
    /// the document has no pages.
    pub fn rasterize(&self, pdf_bytes: &[u8], scale: f64) -> Result<RasterPage, FormFillError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| FormFillError::Rasterization(format!("not a readable PDF: {e}")))?;
        let pages = doc.get_pages();
        let first_page_id = pages
            .values()
            .next()
            .copied()
            .ok_or_else(|| FormFillError::Rasterization("document has no pages".to_string()))?;
        let page =
            page_geometry(&doc, first_page_id).map_err(FormFillError::Rasterization)?;

        let width_px = (page.width_pt * scale).round().max(1.0) as u32;
        let height_px = (page.height_pt * scale).round().max(1.0) as u32;
        let rendered = self.backend.render(pdf_bytes, width_px, height_px)?;

        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality);
        encoder
            .encode_image(&rendered)
            .map_err(|e| FormFillError::Rasterization(e.to_string()))?;
        debug!(
            width_px,
            height_px,
            encoded = bytes.len(),
            "rasterized first page"
        );

        Ok(RasterPage {
            image: RasterImage {
                bytes,
                width_px: rendered.width(),
                height_px: rendered.height(),
            },
            page,
        })
    }
}

/// Read a page's MediaBox, walking up the Pages tree for inherited values.
/// Falls back to letter size when no MediaBox is present anywhere.
pub(crate) fn page_geometry(doc: &Document, page_id: ObjectId) -> Result<PageGeometry, String> {
    let mut current = page_id;
    loop {
        let dict = doc
            .get_object(current)
            .and_then(Object::as_dict)
            .map_err(|e| e.to_string())?;

        if let Some(geometry) = dict.get(b"MediaBox").ok().and_then(|obj| {
            let arr = match obj {
                Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
                other => other.as_array().ok()?,
            };
            media_box_geometry(arr)
        }) {
            return Ok(geometry);
        }

        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(PageGeometry::letter()),
        }
    }
}

fn media_box_geometry(arr: &[Object]) -> Option<PageGeometry> {
    if arr.len() != 4 {
        return None;
    }
    let n = |obj: &Object| match obj {
        Object::Real(v) => Some(f64::from(*v)),
        Object::Integer(v) => Some(*v as f64),
        _ => None,
    };
    let (x1, y1, x2, y2) = (n(&arr[0])?, n(&arr[1])?, n(&arr[2])?, n(&arr[3])?);
    Some(PageGeometry {
        width_pt: (x2 - x1).abs(),
        height_pt: (y2 - y1).abs(),
    })
}

/// Minimal one-page letter-size PDF. Test helper shared across modules.
#[cfg(test)]
pub(crate) fn one_page_pdf() -> Vec<u8> {
    use lopdf::dictionary;

    let mut doc = Document::with_version("1.7");
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    });
    if let Ok(page) = doc.get_object_mut(page_id) {
        if let Ok(dict) = page.as_dict_mut() {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
