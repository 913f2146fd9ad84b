//! `POST /extract`: upload a lab report and get its structured results.
//!
//! Multipart body with a single `file` field. The upload is staged to disk,
//! handed to the pipeline, and removed once the pipeline returns.

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::{ExtractionResult, StagedUpload};

pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub data: ExtractionResult,
}

struct IncomingFile {
    name: String,
    media_type: String,
    bytes: Vec<u8>,
}

pub async fn extract(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let mut incoming: Option<IncomingFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, ctx.max_upload_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if incoming.is_some() {
            return Err(ApiError::BadRequest(
                "Only one file may be uploaded per request.".into(),
            ));
        }

        let name = field.file_name().unwrap_or("document").to_string();
        let media_type = resolve_media_type(field.content_type(), &name);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, ctx.max_upload_bytes))?;

        incoming = Some(IncomingFile {
            name,
            media_type,
            bytes: bytes.to_vec(),
        });
    }

    let file = incoming.ok_or_else(|| ApiError::BadRequest("No file uploaded.".into()))?;

    tracing::info!(
        file = %file.name,
        media_type = %file.media_type,
        size = file.bytes.len(),
        "Received lab report upload"
    );

    let upload = StagedUpload::stage(&ctx.upload_dir, &file.name, &file.media_type, &file.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to stage upload: {e}")))?;

    let data = ctx.pipeline.run(upload).await?;
    Ok(Json(ExtractResponse { data }))
}

/// Declared part content type, normalized. Falls back to a guess from the
/// filename when the client sent none or a generic binary type.
pub fn resolve_media_type(content_type: Option<&str>, file_name: &str) -> String {
    let declared = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    declared.unwrap_or_else(|| {
        mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    })
}

fn multipart_error(err: MultipartError, limit_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit_bytes }
    } else {
        tracing::warn!(error = %err, "Malformed multipart upload");
        ApiError::BadRequest("Failed to read file data.".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins() {
        assert_eq!(
            resolve_media_type(Some("application/pdf"), "scan.png"),
            "application/pdf"
        );
    }

    #[test]
    fn declared_type_normalized() {
        assert_eq!(
            resolve_media_type(Some(" Application/PDF; name=x "), "x"),
            "application/pdf"
        );
    }

    #[test]
    fn missing_type_guessed_from_name() {
        assert_eq!(resolve_media_type(None, "report.pdf"), "application/pdf");
        assert_eq!(resolve_media_type(None, "scan.png"), "image/png");
    }

    #[test]
    fn octet_stream_guessed_from_name() {
        assert_eq!(
            resolve_media_type(Some("application/octet-stream"), "report.PDF"),
            "application/pdf"
        );
    }

    #[test]
    fn unknown_stays_octet_stream() {
        assert_eq!(
            resolve_media_type(None, "blob"),
            "application/octet-stream"
        );
    }
}
