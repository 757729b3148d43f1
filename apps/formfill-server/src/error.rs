//! Error types for the formfill server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use formfill_core::FormFillError;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Pipeline(#[from] FormFillError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::Pipeline(err) => match err {
                FormFillError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AUTHENTICATION"),
                FormFillError::Upstream { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM"),
                FormFillError::Rasterization(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "BAD_SOURCE")
                }
                FormFillError::MalformedDocument(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "BAD_SOURCE")
                }
                FormFillError::NoFieldsDetected => (StatusCode::NOT_FOUND, "NO_FIELDS"),
            },
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
