//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::PipelineError;
use crate::report::ExportError;

/// Error response body: `{ "error": message }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Upload exceeds {limit_bytes} bytes")]
    PayloadTooLarge { limit_bytes: usize },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Failed to render PDF: {0}")]
    Export(#[from] ExportError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::PayloadTooLarge { limit_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "File too large. Maximum size is {} MB.",
                    limit_bytes / (1024 * 1024)
                ),
            ),
            ApiError::Pipeline(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, err.to_string())
            }
            ApiError::Export(err) => {
                tracing::error!(error = %err, "PDF export failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to render PDF.".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
