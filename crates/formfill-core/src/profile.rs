//! Caller-supplied inputs: the personal-data record and the signature image.

use image::GenericImageView;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of the person's data, as entered in the form UI.
///
/// Absent values are empty strings, never `None`, so concatenation during
/// canonicalization needs no unwrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalRecord {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub gender: String,
    pub marital_status: String,
    pub cell_phone: String,
    pub work_phone: String,
    pub home_address: String,
    pub state: String,
    pub zip_code: String,
}

impl PersonalRecord {
    /// Whitespace-collapsed `first middle last`, empty segments elided.
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A drawn signature exported from the capture widget: PNG bytes plus the
/// intrinsic pixel dimensions. Owned by the caller; the pipeline only
/// borrows it for the duration of one compositing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAsset {
    png: Vec<u8>,
    width_px: u32,
    height_px: u32,
}

/// PNG magic bytes: 89 50 4E 47 0D 0A 1A 0A
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

impl SignatureAsset {
    /// Validate and wrap PNG bytes, reading the intrinsic dimensions.
    pub fn from_png(png: Vec<u8>) -> Result<Self, &'static str> {
        if png.len() < PNG_MAGIC.len() || !png.starts_with(&PNG_MAGIC) {
            return Err("signature image is not a PNG");
        }
        let decoded = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|_| "signature PNG could not be decoded")?;
        let (width_px, height_px) = decoded.dimensions();
        if width_px == 0 || height_px == 0 {
            return Err("signature image has zero extent");
        }
        Ok(Self {
            png,
            width_px,
            height_px,
        })
    }

    /// Bypass validation; test helper for exercising per-field failure
    /// handling downstream.
    #[cfg(test)]
    pub(crate) fn from_raw_unchecked(png: Vec<u8>, width_px: u32, height_px: u32) -> Self {
        Self {
            png,
            width_px,
            height_px,
        }
    }

    pub fn png(&self) -> &[u8] {
        &self.png
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }
}

/// Encode a tiny opaque RGBA image as PNG bytes. Test helper shared across
/// modules.
#[cfg(test)]
pub(crate) fn tiny_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 0, 0, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
