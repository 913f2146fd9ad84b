//! `POST /export/pdf`: printable rendering of extracted results.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::error::ApiError;
use crate::pipeline::ExtractionResult;
use crate::report::{group_by_heading, render_pdf};

pub const EXPORT_FILE_NAME: &str = "lab-report.pdf";

/// Group the posted rows by heading and return them as a PDF attachment.
pub async fn pdf(Json(payload): Json<ExtractionResult>) -> Result<Response, ApiError> {
    let grouped = group_by_heading(&payload.results);

    // printpdf is synchronous; keep it off the async workers.
    let bytes = tokio::task::spawn_blocking(move || render_pdf(&grouped))
        .await
        .map_err(|e| ApiError::Internal(format!("PDF render task failed: {e}")))??;

    tracing::info!(rows = payload.results.len(), size = bytes.len(), "Exported report PDF");

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
