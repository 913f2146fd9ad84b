//! Lab report pipeline: validate → pre-check → extract, one request at a time.
//!
//! ```text
//! Received ──▶ Validated ──▶ PreChecked ──▶ Extracted ──▶ Completed
//!     └────────────┴─────────────┴──────▶ Failed(PipelineError)
//! ```
//!
//! The staged upload is owned by [`LabReportPipeline::run`] and dropped on
//! every exit path, which deletes the temporary file exactly once.

use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;

use super::document::{DocumentError, DocumentPart};
use super::extractor::{ExtractionEngine, ExtractionError};
use super::inference::InferenceClient;
use super::precheck::PreCheckGate;
use super::staging::StagedUpload;
use super::types::ExtractionResult;

/// The only media type the pipeline accepts.
pub const ACCEPTED_MEDIA_TYPE: &str = "application/pdf";

/// Lifecycle position of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    PreChecked,
    Extracted,
    Completed,
}

/// Error category, used to derive the boundary status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    ExtractionFailure,
    IoFailure,
}

/// Fixed kind → status lookup.
const STATUS_TABLE: [(PipelineErrorKind, u16); 3] = [
    (PipelineErrorKind::InvalidInput, 415),
    (PipelineErrorKind::ExtractionFailure, 500),
    (PipelineErrorKind::IoFailure, 500),
];

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid file type. Only PDF allowed.")]
    InvalidMediaType { media_type: String },

    #[error("Document does not appear to be a valid quantitative medical lab report.")]
    NotALabReport,

    #[error("AI Extraction failed.")]
    Extraction(#[source] ExtractionError),

    #[error("Failed to read uploaded document.")]
    Io(#[source] DocumentError),
}

impl PipelineError {
    pub fn kind(&self) -> PipelineErrorKind {
        match self {
            PipelineError::InvalidMediaType { .. } | PipelineError::NotALabReport => {
                PipelineErrorKind::InvalidInput
            }
            PipelineError::Extraction(_) => PipelineErrorKind::ExtractionFailure,
            PipelineError::Io(_) => PipelineErrorKind::IoFailure,
        }
    }

    /// HTTP-style severity: 415 for rejected input, 500 for internal failure.
    pub fn status_code(&self) -> u16 {
        let kind = self.kind();
        STATUS_TABLE
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| *status)
            .unwrap_or(500)
    }

    /// Last stage reached before the failure.
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::InvalidMediaType { .. } => PipelineStage::Received,
            PipelineError::Io(_) | PipelineError::NotALabReport => PipelineStage::Validated,
            PipelineError::Extraction(_) => PipelineStage::PreChecked,
        }
    }
}

pub struct LabReportPipeline {
    gate: PreCheckGate,
    engine: ExtractionEngine,
}

impl LabReportPipeline {
    pub fn new(gate: PreCheckGate, engine: ExtractionEngine) -> Self {
        Self { gate, engine }
    }

    /// Gate and engine sharing one inference client.
    pub fn with_client(
        client: Arc<dyn InferenceClient>,
        precheck_model: &str,
        extraction_models: Vec<String>,
    ) -> Self {
        Self::new(
            PreCheckGate::new(client.clone(), precheck_model),
            ExtractionEngine::new(client, extraction_models),
        )
    }

    /// Run one upload through the pipeline. Consumes the upload so its
    /// temporary file is released when this returns.
    pub async fn run(&self, upload: StagedUpload) -> Result<ExtractionResult, PipelineError> {
        let span = tracing::info_span!(
            "lab_report_pipeline",
            upload = %upload.original_name(),
            media_type = %upload.media_type(),
        );

        async {
            let result = self.process(&upload).await;
            match &result {
                Ok(data) => tracing::info!(
                    stage = ?PipelineStage::Completed,
                    rows = data.results.len(),
                    "Lab report processed"
                ),
                Err(e) => log_failure(e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process(&self, upload: &StagedUpload) -> Result<ExtractionResult, PipelineError> {
        // Received → Validated
        if upload.media_type() != ACCEPTED_MEDIA_TYPE {
            return Err(PipelineError::InvalidMediaType {
                media_type: upload.media_type().to_string(),
            });
        }
        advance(PipelineStage::Validated);

        let doc = DocumentPart::from_path(upload.path(), upload.media_type())
            .await
            .map_err(PipelineError::Io)?;

        // Validated → PreChecked
        if !self.gate.is_plausible_lab_report(&doc).await {
            return Err(PipelineError::NotALabReport);
        }
        advance(PipelineStage::PreChecked);

        // PreChecked → Extracted
        let data = self
            .engine
            .extract(&doc)
            .await
            .map_err(PipelineError::Extraction)?;
        advance(PipelineStage::Extracted);

        Ok(data)
    }
}

/// Rejected input is routine and logged at `info`; internal failures are not.
fn log_failure(e: &PipelineError) {
    let cause = std::error::Error::source(e).map(|s| s.to_string());
    match e.kind() {
        PipelineErrorKind::InvalidInput => tracing::info!(
            stage = ?e.stage(),
            status = e.status_code(),
            error = %e,
            "Lab report rejected"
        ),
        PipelineErrorKind::ExtractionFailure | PipelineErrorKind::IoFailure => tracing::error!(
            stage = ?e.stage(),
            status = e.status_code(),
            error = %e,
            cause = ?cause,
            "Lab report processing failed"
        ),
    }
}

fn advance(stage: PipelineStage) {
    tracing::debug!(stage = ?stage, "Pipeline stage reached");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use crate::pipeline::backoff::RecordingBackoff;
    use crate::pipeline::inference::{InferenceError, MockInferenceClient};
    use crate::report::group_by_heading;

    const FAST: &str = "fast";
    const A: &str = "model-a";
    const B: &str = "model-b";

    const HDL_JSON: &str = r#"{"results":[{"heading":"Lipid Profile","test_name":"HDL","result":"45","unit":"mg/dL","biological_reference_interval":"40-60"}]}"#;

    fn pipeline(client: &Arc<MockInferenceClient>) -> LabReportPipeline {
        LabReportPipeline::new(
            PreCheckGate::new(client.clone(), FAST),
            ExtractionEngine::new(client.clone(), vec![A.into(), B.into()])
                .with_backoff(Arc::new(RecordingBackoff::new())),
        )
    }

    async fn stage(dir: &Path, name: &str, media_type: &str) -> (StagedUpload, PathBuf) {
        let upload = StagedUpload::stage(dir, name, media_type, b"%PDF-1.4 lab")
            .await
            .unwrap();
        let path = upload.path().to_path_buf();
        (upload, path)
    }

    #[tokio::test]
    async fn non_pdf_is_415_without_inference() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockInferenceClient::new().respond(FAST, "YES"));
        let (upload, path) = stage(dir.path(), "scan.png", "image/png").await;

        let err = pipeline(&client).run(upload).await.unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert_eq!(err.to_string(), "Invalid file type. Only PDF allowed.");
        assert_eq!(err.stage(), PipelineStage::Received);
        assert_eq!(client.call_count(), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn gate_rejection_is_415_and_skips_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockInferenceClient::new()
                .respond(FAST, "NO")
                .respond(A, HDL_JSON),
        );
        let (upload, path) = stage(dir.path(), "invoice.pdf", ACCEPTED_MEDIA_TYPE).await;

        let err = pipeline(&client).run(upload).await.unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert_eq!(
            err.to_string(),
            "Document does not appear to be a valid quantitative medical lab report."
        );
        assert_eq!(client.calls_for(A), 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn gate_error_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockInferenceClient::new()
                .unavailable(FAST)
                .respond(A, HDL_JSON),
        );
        let (upload, _) = stage(dir.path(), "report.pdf", ACCEPTED_MEDIA_TYPE).await;

        let err = pipeline(&client).run(upload).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotALabReport));
        assert_eq!(client.calls_for(A), 0);
        assert_eq!(client.calls_for(B), 0);
    }

    #[tokio::test]
    async fn extraction_failure_is_500_with_cause() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockInferenceClient::new()
                .respond(FAST, "YES")
                .fail(A, InferenceError::Connection("x".into()))
                .fail(B, InferenceError::Connection("x".into())),
        );
        let (upload, path) = stage(dir.path(), "report.pdf", ACCEPTED_MEDIA_TYPE).await;

        let err = pipeline(&client).run(upload).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "AI Extraction failed.");
        assert_eq!(err.kind(), PipelineErrorKind::ExtractionFailure);
        let cause = std::error::Error::source(&err).unwrap();
        assert_eq!(cause.to_string(), "extraction failed on all models");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_staged_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockInferenceClient::new().respond(FAST, "YES"));
        let (upload, path) = stage(dir.path(), "report.pdf", ACCEPTED_MEDIA_TYPE).await;
        std::fs::remove_file(&path).unwrap();

        let err = pipeline(&client).run(upload).await.unwrap_err();
        assert_eq!(err.kind(), PipelineErrorKind::IoFailure);
        assert_eq!(err.status_code(), 500);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn valid_report_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockInferenceClient::new()
                .respond(FAST, "YES")
                .respond(A, HDL_JSON),
        );
        let (upload, path) = stage(dir.path(), "lipids.pdf", ACCEPTED_MEDIA_TYPE).await;

        let data = pipeline(&client).run(upload).await.unwrap();
        assert!(!path.exists());

        let grouped = group_by_heading(&data.results);
        assert_eq!(grouped.total_entries(), 1);
        assert_eq!(grouped.total_sections(), 1);
        let rows = grouped.get("Lipid Profile").unwrap();
        assert_eq!(rows, data.results.as_slice());
        assert_eq!(client.call_count(), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    #[tokio::test]
    async fn input_rejection_logs_at_info() {
        let (logs, _guard) = capture();
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockInferenceClient::new());
        let (upload, _) = stage(dir.path(), "scan.png", "image/png").await;

        pipeline(&client).run(upload).await.unwrap_err();

        let text = logs.text();
        assert!(text.contains("INFO") && text.contains("Lab report rejected"));
        assert!(!text.contains("ERROR"));
    }

    #[tokio::test]
    async fn extraction_failure_logs_at_error() {
        let (logs, _guard) = capture();
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(
            MockInferenceClient::new()
                .respond(FAST, "YES")
                .fail(A, InferenceError::Connection("x".into()))
                .fail(B, InferenceError::Connection("x".into())),
        );
        let (upload, _) = stage(dir.path(), "report.pdf", ACCEPTED_MEDIA_TYPE).await;

        pipeline(&client).run(upload).await.unwrap_err();

        let text = logs.text();
        let line = text
            .lines()
            .find(|l| l.contains("Lab report processing failed"))
            .expect("failure logged");
        assert!(line.contains("ERROR"));
        assert!(line.contains("extraction failed on all models"));
        assert!(!text.contains("Lab report rejected"));
    }

    #[test]
    fn status_table_covers_every_kind() {
        for kind in [
            PipelineErrorKind::InvalidInput,
            PipelineErrorKind::ExtractionFailure,
            PipelineErrorKind::IoFailure,
        ] {
            assert!(STATUS_TABLE.iter().any(|(k, _)| *k == kind));
        }
    }
}
