//! Automatic form filling for flat (non-interactive) PDF forms.
//!
//! This crate takes a scanned or flattened one-page PDF form, asks an
//! external document-understanding model where the labeled fields sit,
//! reconciles those labels against a personal-data record, and composites
//! text and a signature image onto the original page:
//!
//! ```text
//! PDF bytes → raster preview → field detection → canonicalization
//!           → coordinate mapping → compositing → filled PDF bytes
//! ```
//!
//! All state is invocation-scoped; the pipeline object holds only read-only
//! configuration and can be shared freely across concurrent calls.

pub mod coords;
pub mod detect;
pub mod error;
pub mod fields;
pub mod fonts;
pub mod overlay;
pub mod pipeline;
pub mod profile;
pub mod raster;

pub use coords::{image_to_page, scaled_to_page, BoundingBox, PageGeometry, PageRect};
pub use detect::{
    fallback_fields, parse_detection_response, DetectedField, Detection, DetectorConfig,
    FallbackFields, FieldDetector,
};
pub use error::FormFillError;
pub use fields::{canonicalize, FieldKind, FieldValue, ResolveContext, ResolvedField};
pub use fonts::{acquire_display_font, DisplayFont};
pub use overlay::{compose, CompositeOutcome, PlacedField};
pub use pipeline::{
    assess_completeness, Completeness, FillOutcome, FormFillPipeline, PipelineConfig,
    OUTPUT_FILENAME,
};
pub use profile::{PersonalRecord, SignatureAsset};
pub use raster::{BlankBackend, RasterImage, RasterPage, Rasterizer, RenderBackend};

#[cfg(feature = "pdfium")]
pub use raster::PdfiumBackend;
