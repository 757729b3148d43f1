//! Field detection via an external document-understanding model.
//!
//! The upstream response comes in two shapes in the wild — an ordered array
//! of `{word, bbox}` records, or a map of label → `{bbox, confidence?}` —
//! and both are decoded once, at this boundary, into a uniform field list.
//! When the model returns nothing usable, a fixed fallback field layout
//! keeps the pipeline demonstrable; the result is flagged so callers can
//! report an incomplete fill instead of a complete one.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use tracing::{debug, info};

use crate::coords::BoundingBox;
use crate::error::FormFillError;
use crate::raster::RasterImage;

/// Confidence assigned when the upstream omits one.
pub const DEFAULT_CONFIDENCE: f64 = 0.9;

/// A labeled box reported by the detector, in source-image pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedField {
    /// Lowercased label as reported upstream.
    pub raw_label: String,
    pub bbox: BoundingBox,
    /// In `[0, 1]`.
    pub confidence: f64,
}

/// Detection result. `was_fallback` distinguishes the built-in degraded
/// layout from real model output.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub fields: Vec<DetectedField>,
    pub was_fallback: bool,
}

/// Whether an empty detection substitutes the fixed fallback layout or
/// fails the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackFields {
    Enabled,
    Disabled,
}

/// Configuration for the detection call.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Inference endpoint receiving the preview image.
    pub endpoint: String,
    /// Bound on the whole request. No retries: a failed attempt is terminal
    /// for the invocation.
    pub timeout: Duration,
    pub fallback: FallbackFields,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models/microsoft/layoutlmv3-base"
                .to_string(),
            timeout: Duration::from_secs(20),
            fallback: FallbackFields::Enabled,
        }
    }
}

/// Invokes the external model and normalizes its response.
pub struct FieldDetector {
    config: DetectorConfig,
    client: reqwest::Client,
}

impl FieldDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// POST the preview image and parse the response into detected fields.
    ///
    /// Fails fast with `Authentication` before any network I/O when the
    /// credential does not match the upstream token shape.
    pub async fn detect(
        &self,
        image: &RasterImage,
        credential: &str,
    ) -> Result<Detection, FormFillError> {
        validate_credential(credential)?;

        let body = serde_json::json!({ "inputs": BASE64.encode(&image.bytes) });
        debug!(endpoint = %self.config.endpoint, payload = image.bytes.len(), "requesting field detection");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(credential)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| FormFillError::Upstream {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FormFillError::Upstream {
                status: Some(status.as_u16()),
                message,
            });
        }

        let text = response.text().await.map_err(|e| FormFillError::Upstream {
            status: None,
            message: e.to_string(),
        })?;
        let fields = parse_detection_response(&text)?;
        info!(count = fields.len(), "field detection parsed");

        apply_fallback(fields, self.config.fallback)
    }
}

/// The upstream token shape: `hf_` followed by a non-empty alphanumeric
/// suffix. Checked before the call is attempted.
pub fn validate_credential(credential: &str) -> Result<(), FormFillError> {
    let suffix = credential.strip_prefix("hf_").ok_or_else(|| {
        FormFillError::Authentication("expected an hf_-prefixed token".to_string())
    })?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(FormFillError::Authentication(
            "token suffix must be non-empty and alphanumeric".to_string(),
        ));
    }
    Ok(())
}

/// One record of the array-shaped response.
#[derive(Deserialize)]
struct WordEntry {
    word: String,
    bbox: Option<[f64; 4]>,
    confidence: Option<f64>,
}

/// One value of the map-shaped response.
#[derive(Deserialize)]
struct LabeledEntry {
    bbox: Option<[f64; 4]>,
    confidence: Option<f64>,
}

/// Both supported response shapes, decoded in one place.
#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionResponse {
    Words(Vec<WordEntry>),
    Labeled(BTreeMap<String, LabeledEntry>),
}

/// Decode either response shape into a uniform field list.
///
/// Entries without a `bbox` are discarded silently; labels are lowercased.
pub fn parse_detection_response(body: &str) -> Result<Vec<DetectedField>, FormFillError> {
    let decoded: DetectionResponse =
        serde_json::from_str(body).map_err(|e| FormFillError::Upstream {
            status: None,
            message: format!("unrecognized response shape: {e}"),
        })?;

    let fields = match decoded {
        DetectionResponse::Words(entries) => entries
            .into_iter()
            .filter_map(|entry| {
                entry.bbox.map(|b| DetectedField {
                    raw_label: entry.word.to_lowercase(),
                    bbox: BoundingBox::new(b[0], b[1], b[2], b[3]),
                    confidence: entry.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                })
            })
            .collect(),
        DetectionResponse::Labeled(map) => map
            .into_iter()
            .filter_map(|(label, entry)| {
                entry.bbox.map(|b| DetectedField {
                    raw_label: label.to_lowercase(),
                    bbox: BoundingBox::new(b[0], b[1], b[2], b[3]),
                    confidence: entry.confidence.unwrap_or(DEFAULT_CONFIDENCE),
                })
            })
            .collect(),
    };

    Ok(fields)
}

/// Apply the zero-field policy: substitute the fixed layout when enabled,
/// fail otherwise.
pub fn apply_fallback(
    fields: Vec<DetectedField>,
    mode: FallbackFields,
) -> Result<Detection, FormFillError> {
    if !fields.is_empty() {
        return Ok(Detection {
            fields,
            was_fallback: false,
        });
    }
    match mode {
        FallbackFields::Enabled => Ok(Detection {
            fields: fallback_fields(),
            was_fallback: true,
        }),
        FallbackFields::Disabled => Err(FormFillError::NoFieldsDetected),
    }
}

/// The fixed five-field fallback layout, positioned for a letter-size page
/// rasterized at 2x (1224 x 1584 px).
pub fn fallback_fields() -> Vec<DetectedField> {
    const LAYOUT: [(&str, [f64; 4]); 5] = [
        ("first_name", [150.0, 200.0, 400.0, 240.0]),
        ("last_name", [150.0, 270.0, 400.0, 310.0]),
        ("phone", [150.0, 340.0, 400.0, 380.0]),
        ("address", [150.0, 410.0, 620.0, 450.0]),
        ("signature", [150.0, 900.0, 450.0, 980.0]),
    ];
    LAYOUT
        .iter()
        .map(|(label, b)| DetectedField {
            raw_label: (*label).to_string(),
            bbox: BoundingBox::new(b[0], b[1], b[2], b[3]),
            confidence: DEFAULT_CONFIDENCE,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_credential_accepts_token_shape() {
        assert!(validate_credential("hf_abc123XYZ").is_ok());
    }

    #[test]
    fn test_credential_rejects_missing_prefix() {
        assert!(matches!(
            validate_credential("sk_abc123"),
            Err(FormFillError::Authentication(_))
        ));
    }

    #[test]
    fn test_credential_rejects_empty_suffix() {
        assert!(validate_credential("hf_").is_err());
    }

    #[test]
    fn test_credential_rejects_non_alphanumeric_suffix() {
        assert!(validate_credential("hf_abc def").is_err());
        assert!(validate_credential("hf_abc\n").is_err());
    }

    #[test]
    fn test_parse_word_array_shape() {
        let body = r#"[
            {"word": "First_Name", "bbox": [100.0, 150.0, 200.0, 170.0]},
            {"word": "SIGNATURE", "bbox": [100.0, 400.0, 250.0, 450.0], "confidence": 0.75}
        ]"#;
        let fields = parse_detection_response(body).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].raw_label, "first_name");
        assert_eq!(fields[0].confidence, DEFAULT_CONFIDENCE);
        assert_eq!(fields[1].raw_label, "signature");
        assert_eq!(fields[1].confidence, 0.75);
        assert_eq!(fields[1].bbox, BoundingBox::new(100.0, 400.0, 250.0, 450.0));
    }

    #[test]
    fn test_parse_labeled_map_shape() {
        let body = r#"{
            "Last Name": {"bbox": [10, 20, 110, 40]},
            "phone": {"bbox": [10, 60, 110, 80], "confidence": 0.5}
        }"#;
        let mut fields = parse_detection_response(body).unwrap();
        fields.sort_by(|a, b| a.raw_label.cmp(&b.raw_label));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].raw_label, "last name");
        assert_eq!(fields[1].raw_label, "phone");
        assert_eq!(fields[1].confidence, 0.5);
    }

    #[test]
    fn test_entries_without_bbox_discarded_silently() {
        let body = r#"[
            {"word": "name", "bbox": [0, 0, 10, 10]},
            {"word": "orphan"}
        ]"#;
        let fields = parse_detection_response(body).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].raw_label, "name");
    }

    #[test]
    fn test_unrecognized_shape_is_upstream_error() {
        assert!(matches!(
            parse_detection_response("42"),
            Err(FormFillError::Upstream { .. })
        ));
        assert!(matches!(
            parse_detection_response("not json at all"),
            Err(FormFillError::Upstream { .. })
        ));
    }

    #[test]
    fn test_empty_array_parses_to_no_fields() {
        assert_eq!(parse_detection_response("[]").unwrap().len(), 0);
    }

    #[test]
    fn test_fallback_substitutes_fixed_layout() {
        let detection = apply_fallback(Vec::new(), FallbackFields::Enabled).unwrap();
        assert!(detection.was_fallback);
        let labels: Vec<&str> = detection
            .fields
            .iter()
            .map(|f| f.raw_label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec!["first_name", "last_name", "phone", "address", "signature"]
        );
    }

    #[test]
    fn test_fallback_disabled_fails() {
        assert!(matches!(
            apply_fallback(Vec::new(), FallbackFields::Disabled),
            Err(FormFillError::NoFieldsDetected)
        ));
    }

    #[test]
    fn test_nonempty_detection_is_not_fallback() {
        let fields = fallback_fields();
        let detection = apply_fallback(fields.clone(), FallbackFields::Disabled).unwrap();
        assert!(!detection.was_fallback);
        assert_eq!(detection.fields, fields);
    }

    #[tokio::test]
    async fn test_detect_fails_before_network_on_bad_credential() {
        // Endpoint is unroutable; a network attempt would error differently.
        let detector = FieldDetector::new(DetectorConfig {
            endpoint: "http://127.0.0.1:1/unreachable".to_string(),
            timeout: Duration::from_millis(100),
            fallback: FallbackFields::Enabled,
        });
        let image = RasterImage {
            bytes: vec![0xFF, 0xD8],
            width_px: 10,
            height_px: 10,
        };
        let err = detector.detect(&image, "bad-token").await.unwrap_err();
        assert!(matches!(err, FormFillError::Authentication(_)));
    }
}
