//! API handlers for the formfill server

use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServerError;
use crate::AppState;

use formfill_core::{
    Completeness, FallbackFields, FieldKind, FormFillPipeline, PersonalRecord, SignatureAsset,
    OUTPUT_FILENAME,
};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "formfill-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Fill request body
#[derive(Deserialize)]
pub struct FillApiRequest {
    /// Base64-encoded source PDF
    pub pdf: String,

    /// Upstream model credential
    pub credential: String,

    /// Personal data to fill in; missing fields default to empty
    #[serde(default)]
    pub record: PersonalRecord,

    /// Base64-encoded signature PNG
    pub signature: Option<String>,

    /// Processing date; defaults to the server's local date
    pub date: Option<NaiveDate>,

    /// Per-request override of the fallback-layout toggle
    pub fallback_fields: Option<bool>,
}

/// Fill response
#[derive(Serialize)]
pub struct FillApiResponse {
    pub success: bool,
    /// Base64-encoded output PDF
    pub data: String,
    pub filename: &'static str,
    pub completeness: Completeness,
    pub was_fallback: bool,
    pub drawn: Vec<FieldKind>,
    pub skipped: usize,
}

/// Handler: POST /api/fill
pub async fn handle_fill(
    State(state): State<AppState>,
    Json(request): Json<FillApiRequest>,
) -> Result<Json<FillApiResponse>, ServerError> {
    let pdf = BASE64
        .decode(&request.pdf)
        .map_err(|e| ServerError::InvalidRequest(format!("pdf is not valid base64: {e}")))?;

    let signature = request
        .signature
        .as_deref()
        .map(|b64| {
            let bytes = BASE64.decode(b64).map_err(|e| {
                ServerError::InvalidRequest(format!("signature is not valid base64: {e}"))
            })?;
            SignatureAsset::from_png(bytes)
                .map_err(|e| ServerError::InvalidRequest(format!("signature: {e}")))
        })
        .transpose()?;

    let today = request
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    // The pipeline is stateless, so a per-request instance is cheap and
    // keeps per-request config overrides isolated.
    let mut config = state.config.clone();
    if let Some(enabled) = request.fallback_fields {
        config.detector.fallback = if enabled {
            FallbackFields::Enabled
        } else {
            FallbackFields::Disabled
        };
    }
    let pipeline = FormFillPipeline::new(config, state.backend.clone());

    info!(pdf_bytes = pdf.len(), has_signature = signature.is_some(), "fill requested");
    let outcome = pipeline
        .run(
            &pdf,
            &request.credential,
            &request.record,
            signature.as_ref(),
            today,
        )
        .await?;

    Ok(Json(FillApiResponse {
        success: true,
        data: BASE64.encode(&outcome.pdf),
        filename: OUTPUT_FILENAME,
        completeness: outcome.completeness,
        was_fallback: outcome.was_fallback,
        drawn: outcome.drawn,
        skipped: outcome.skipped,
    }))
}
