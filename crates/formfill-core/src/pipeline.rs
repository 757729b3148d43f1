//! The end-to-end fill pipeline and its completeness signal.
//!
//! One invocation runs rasterize → detect → canonicalize → map → acquire
//! font → composite, sequentially. Every entity involved is scoped to the
//! invocation: the pipeline object carries only read-only configuration and
//! HTTP clients, so it can be shared across concurrent calls, and dropping
//! the returned future abandons the in-flight work cleanly.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::coords::image_to_page;
use crate::detect::{DetectorConfig, FieldDetector};
use crate::error::FormFillError;
use crate::fields::{canonicalize, FieldKind, ResolveContext};
use crate::fonts::{acquire_display_font, DEFAULT_FONT_MIRRORS};
use crate::overlay::{compose, PlacedField};
use crate::profile::{PersonalRecord, SignatureAsset};
use crate::raster::{Rasterizer, RenderBackend};

/// Deterministic name for the output artifact offered to the caller.
pub const OUTPUT_FILENAME: &str = "filled.pdf";

/// Primary success indicator surfaced to the end user: whether the basic
/// field set (a name, a phone, the address, the signature) was resolved and
/// drawn. An invocation can finish without errors and still be incomplete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Incomplete,
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub detector: DetectorConfig,
    /// Preview magnification, pixels per point. Higher trades payload size
    /// for fidelity.
    pub raster_scale: f64,
    pub jpeg_quality: u8,
    pub font_mirrors: Vec<String>,
    pub font_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            raster_scale: 2.0,
            jpeg_quality: 85,
            font_mirrors: DEFAULT_FONT_MIRRORS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            font_timeout: Duration::from_secs(10),
        }
    }
}

/// Result of a successful invocation.
#[derive(Debug)]
pub struct FillOutcome {
    pub pdf: Vec<u8>,
    pub completeness: Completeness,
    /// The detector produced nothing usable and the fixed fallback layout
    /// was used instead.
    pub was_fallback: bool,
    pub drawn: Vec<FieldKind>,
    pub skipped: usize,
}

/// The fill pipeline. Stateless between invocations.
pub struct FormFillPipeline {
    rasterizer: Rasterizer,
    detector: FieldDetector,
    client: reqwest::Client,
    config: PipelineConfig,
}

impl FormFillPipeline {
    pub fn new(config: PipelineConfig, backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            rasterizer: Rasterizer::new(backend, config.jpeg_quality),
            detector: FieldDetector::new(config.detector.clone()),
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Fill one flat form. `today` is injected rather than read from the
    /// wall clock so date fields stay testable.
    pub async fn run(
        &self,
        pdf: &[u8],
        credential: &str,
        record: &PersonalRecord,
        signature: Option<&SignatureAsset>,
        today: NaiveDate,
    ) -> Result<FillOutcome, FormFillError> {
        let raster = self.rasterizer.rasterize(pdf, self.config.raster_scale)?;
        let detection = self.detector.detect(&raster.image, credential).await?;
        if detection.was_fallback {
            warn!("detector produced nothing usable, using the fixed fallback layout");
        }

        let ctx = ResolveContext { today, signature };
        let resolved = canonicalize(detection.fields, record, &ctx);

        let placed: Vec<PlacedField> = resolved
            .into_iter()
            .filter_map(|r| {
                let value = r.value?;
                let rect = image_to_page(
                    &r.field.bbox,
                    raster.page,
                    f64::from(raster.image.width_px),
                    f64::from(raster.image.height_px),
                );
                Some(PlacedField {
                    kind: r.kind,
                    value,
                    rect,
                })
            })
            .collect();

        let font = acquire_display_font(
            &self.client,
            &self.config.font_mirrors,
            self.config.font_timeout,
        )
        .await;

        let outcome = compose(pdf, &placed, signature, &font)?;
        let completeness = assess_completeness(&outcome.drawn);
        info!(
            drawn = outcome.drawn.len(),
            skipped = outcome.skipped,
            fallback = detection.was_fallback,
            ?completeness,
            "fill finished"
        );

        Ok(FillOutcome {
            pdf: outcome.pdf,
            completeness,
            was_fallback: detection.was_fallback,
            drawn: outcome.drawn,
            skipped: outcome.skipped,
        })
    }
}

/// Complete iff the drawn kinds cover a name, a phone, the address and the
/// signature.
pub fn assess_completeness(drawn: &[FieldKind]) -> Completeness {
    let has = |kind: FieldKind| drawn.contains(&kind);
    let name = has(FieldKind::FirstName) || has(FieldKind::FullName);
    let phone = has(FieldKind::CellPhone) || has(FieldKind::WorkPhone);
    if name && phone && has(FieldKind::Address) && has(FieldKind::Signature) {
        Completeness::Complete
    } else {
        Completeness::Incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_set_is_complete() {
        let drawn = vec![
            FieldKind::FirstName,
            FieldKind::CellPhone,
            FieldKind::Address,
            FieldKind::Signature,
        ];
        assert_eq!(assess_completeness(&drawn), Completeness::Complete);
    }

    #[test]
    fn test_full_name_and_work_phone_also_count() {
        let drawn = vec![
            FieldKind::FullName,
            FieldKind::WorkPhone,
            FieldKind::Address,
            FieldKind::Signature,
        ];
        assert_eq!(assess_completeness(&drawn), Completeness::Complete);
    }

    #[test]
    fn test_missing_signature_is_incomplete() {
        let drawn = vec![
            FieldKind::FirstName,
            FieldKind::CellPhone,
            FieldKind::Address,
        ];
        assert_eq!(assess_completeness(&drawn), Completeness::Incomplete);
    }

    #[test]
    fn test_empty_draw_list_is_incomplete() {
        assert_eq!(assess_completeness(&[]), Completeness::Incomplete);
    }

    #[test]
    fn test_extra_kinds_do_not_hurt() {
        let drawn = vec![
            FieldKind::FirstName,
            FieldKind::LastName,
            FieldKind::CellPhone,
            FieldKind::Address,
            FieldKind::ZipCode,
            FieldKind::Date,
            FieldKind::Signature,
        ];
        assert_eq!(assess_completeness(&drawn), Completeness::Complete);
    }

    #[test]
    fn test_completeness_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Completeness::Complete).unwrap(),
            "\"complete\""
        );
        assert_eq!(
            serde_json::to_string(&Completeness::Incomplete).unwrap(),
            "\"incomplete\""
        );
    }

    #[test]
    fn test_default_config_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.raster_scale, 2.0);
        assert_eq!(config.jpeg_quality, 85);
        assert!(!config.font_mirrors.is_empty());
    }
}
