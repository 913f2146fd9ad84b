use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::types::{GenerateOptions, InferenceClient, PromptPart};
use super::InferenceError;

/// A call observed by [`MockInferenceClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub model: String,
    pub prompt: String,
    pub document_media_type: Option<String>,
    pub system_instruction: Option<String>,
    pub structured: bool,
}

/// Mock inference client for testing. Replays scripted outcomes per model
/// in order and records every call it receives.
#[derive(Default)]
pub struct MockInferenceClient {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, InferenceError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `model`.
    pub fn respond(self, model: &str, text: &str) -> Self {
        self.push(model, Ok(text.to_string()));
        self
    }

    /// Queue a failure for `model`.
    pub fn fail(self, model: &str, error: InferenceError) -> Self {
        self.push(model, Err(error));
        self
    }

    /// Queue a provider 503, the shape of a transient outage.
    pub fn unavailable(self, model: &str) -> Self {
        self.fail(
            model,
            InferenceError::Provider {
                status: 503,
                message: "UNAVAILABLE: The model is overloaded. Please try again later.".into(),
            },
        )
    }

    fn push(&self, model: &str, outcome: Result<String, InferenceError>) {
        lock(&self.scripts)
            .entry(model.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls_for(&self, model: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.model == model).count()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn generate(
        &self,
        model: &str,
        parts: &[PromptPart<'_>],
        options: &GenerateOptions<'_>,
    ) -> Result<String, InferenceError> {
        let mut prompt = String::new();
        let mut document_media_type = None;
        for part in parts {
            match part {
                PromptPart::Text(text) => prompt.push_str(text),
                PromptPart::Document(doc) => {
                    document_media_type = Some(doc.media_type().to_string())
                }
            }
        }

        lock(&self.calls).push(RecordedCall {
            model: model.to_string(),
            prompt,
            document_media_type,
            system_instruction: options.system_instruction.map(str::to_string),
            structured: options.response_schema.is_some(),
        });

        lock(&self.scripts)
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(InferenceError::HttpClient(format!(
                    "no scripted response for model {model}"
                )))
            })
    }
}
