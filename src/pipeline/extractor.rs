//! Structured extraction over a fallback chain of models.
//!
//! Each model gets up to [`MAX_ATTEMPTS_PER_MODEL`] attempts:
//! - transient provider failures (unavailable / 503) wait
//!   `BACKOFF_UNIT × attempt` and retry the same model
//! - malformed output retries immediately with a fresh call
//! - anything else abandons the model
//!
//! The first parsed result wins; later models are never called.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use super::backoff::{Backoff, TokioBackoff};
use super::document::DocumentPart;
use super::inference::{GenerateOptions, InferenceClient, InferenceError, PromptPart};
use super::schema::{lab_report_schema, SchemaNode};
use super::types::ExtractionResult;

/// Attempt cap per model before falling back to the next one.
pub const MAX_ATTEMPTS_PER_MODEL: u32 = 3;

/// Linear backoff unit between transient-failure retries.
pub const BACKOFF_UNIT: Duration = Duration::from_millis(1000);

const EXTRACTION_PROMPT: &str = "Extract lab report values accurately.";

const EXTRACTION_SYSTEM_INSTRUCTION: &str =
    "Extract heading, test_name, result, unit, reference interval. Return valid JSON only.";

static TRANSIENT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)unavailable|\b503\b").expect("valid regex"));

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("Model {model} gave up after {attempts} attempt(s): {source}")]
    ModelExhausted {
        model: String,
        attempts: u32,
        #[source]
        source: Box<ExtractionError>,
    },

    #[error("extraction failed on all models")]
    AllModelsFailed,
}

/// How a failed attempt is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    Transient,
    Malformed,
    Fatal,
}

impl FailureClass {
    fn of(error: &ExtractionError) -> Self {
        match error {
            ExtractionError::Inference(e) if TRANSIENT_MARKER.is_match(&e.to_string()) => {
                FailureClass::Transient
            }
            ExtractionError::MalformedResponse(_) => FailureClass::Malformed,
            _ => FailureClass::Fatal,
        }
    }
}

pub struct ExtractionEngine {
    client: Arc<dyn InferenceClient>,
    models: Vec<String>,
    backoff: Arc<dyn Backoff>,
    schema: SchemaNode,
}

impl ExtractionEngine {
    /// `models` is the fallback chain, tried in order.
    pub fn new(client: Arc<dyn InferenceClient>, models: Vec<String>) -> Self {
        Self {
            client,
            models,
            backoff: Arc::new(TokioBackoff),
            schema: lab_report_schema(),
        }
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.backoff = backoff;
        self
    }

    pub async fn extract(&self, doc: &DocumentPart) -> Result<ExtractionResult, ExtractionError> {
        for model in &self.models {
            match self.extract_with_model(model, doc).await {
                Ok(result) => {
                    tracing::info!(
                        model = %model,
                        rows = result.results.len(),
                        "Extraction succeeded"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    tracing::warn!(model = %model, error = %e, "Model failed, falling back");
                }
            }
        }

        tracing::error!(models = ?self.models, "Extraction failed on all models");
        Err(ExtractionError::AllModelsFailed)
    }

    async fn extract_with_model(
        &self,
        model: &str,
        doc: &DocumentPart,
    ) -> Result<ExtractionResult, ExtractionError> {
        let mut attempts = 0;

        let last_error = loop {
            attempts += 1;
            tracing::debug!(model, attempt = attempts, "Extraction attempt");

            let error = match self.attempt(model, doc).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if attempts >= MAX_ATTEMPTS_PER_MODEL {
                break error;
            }

            match FailureClass::of(&error) {
                FailureClass::Transient => {
                    let delay = BACKOFF_UNIT * attempts;
                    tracing::warn!(
                        model,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Provider unavailable, backing off"
                    );
                    self.backoff.wait(delay).await;
                }
                FailureClass::Malformed => {
                    tracing::warn!(
                        model,
                        attempt = attempts,
                        error = %error,
                        "Extraction output did not match schema, retrying"
                    );
                }
                FailureClass::Fatal => break error,
            }
        };

        Err(ExtractionError::ModelExhausted {
            model: model.to_string(),
            attempts,
            source: Box::new(last_error),
        })
    }

    async fn attempt(
        &self,
        model: &str,
        doc: &DocumentPart,
    ) -> Result<ExtractionResult, ExtractionError> {
        let parts = [PromptPart::Text(EXTRACTION_PROMPT), PromptPart::Document(doc)];
        let options = GenerateOptions {
            system_instruction: Some(EXTRACTION_SYSTEM_INSTRUCTION),
            response_schema: Some(&self.schema),
        };

        let text = self.client.generate(model, &parts, &options).await?;
        parse_extraction_response(&text)
    }
}

/// Parse model output as an [`ExtractionResult`].
///
/// JSON mode normally returns a bare object; a ```json fenced block is
/// accepted too.
pub fn parse_extraction_response(text: &str) -> Result<ExtractionResult, ExtractionError> {
    let json = strip_code_fence(text.trim());
    serde_json::from_str(json).map_err(|e| ExtractionError::MalformedResponse(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
