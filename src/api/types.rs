//! Shared state for the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::inference::{GeminiClient, InferenceClient, InferenceError};
use crate::pipeline::LabReportPipeline;

/// Shared context for all API routes, handed to handlers as axum state.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<LabReportPipeline>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(pipeline: LabReportPipeline, upload_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            upload_dir,
            max_upload_bytes,
        }
    }

    /// Wire a Gemini-backed pipeline from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, InferenceError> {
        let client: Arc<dyn InferenceClient> = Arc::new(GeminiClient::new(
            &config.gemini_base_url,
            &config.api_key,
            config.request_timeout_secs,
        )?);
        let pipeline = LabReportPipeline::with_client(
            client,
            &config.precheck_model,
            config.extraction_models.clone(),
        );
        Ok(Self::new(
            pipeline,
            config.upload_dir.clone(),
            config.max_upload_bytes,
        ))
    }
}
