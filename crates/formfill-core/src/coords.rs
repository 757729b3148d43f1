//! Coordinate transformation between raster image space and PDF page space.
//!
//! Raster space has its origin at the top-left with Y growing downward;
//! PDF page space has its origin at the bottom-left with Y growing upward.
//! Both conversions here are pure arithmetic: out-of-range boxes pass
//! through untouched and are clamped at draw time, not here.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in source-image pixel space.
///
/// Invariant `x2 >= x1`, `y2 >= y1`; a violation collapses to a zero-area
/// rectangle when mapped, which downstream skips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Dimensions of the PDF's first page in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f64,
    pub height_pt: f64,
}

impl PageGeometry {
    pub fn letter() -> Self {
        Self {
            width_pt: 612.0,
            height_pt: 792.0,
        }
    }

    pub fn a4() -> Self {
        Self {
            width_pt: 595.0,
            height_pt: 842.0,
        }
    }
}

/// Rectangle in page space: origin bottom-left, units points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    /// Y coordinate of the rectangle's top edge.
    pub fn top(&self) -> f64 {
        self.y + self.height
    }
}

/// Map a detected box from image pixel space into page space using the
/// per-axis ratio of page dimension to image dimension, flipping Y.
pub fn image_to_page(
    bbox: &BoundingBox,
    page: PageGeometry,
    image_w_px: f64,
    image_h_px: f64,
) -> PageRect {
    let sx = page.width_pt / image_w_px;
    let sy = page.height_pt / image_h_px;
    PageRect {
        x: bbox.x1 * sx,
        y: page.height_pt - bbox.y2 * sy,
        width: ((bbox.x2 - bbox.x1) * sx).max(0.0),
        height: ((bbox.y2 - bbox.y1) * sy).max(0.0),
    }
}

/// Degenerate path for the common case: the bitmap was rendered straight
/// from the page at a known scale factor, so mapping is a division by that
/// factor plus the axis flip.
pub fn scaled_to_page(bbox: &BoundingBox, page: PageGeometry, scale: f64) -> PageRect {
    PageRect {
        x: bbox.x1 / scale,
        y: page.height_pt - bbox.y2 / scale,
        width: ((bbox.x2 - bbox.x1) / scale).max(0.0),
        height: ((bbox.y2 - bbox.y1) / scale).max(0.0),
    }
}
