use async_trait::async_trait;

use super::InferenceError;
use crate::pipeline::document::DocumentPart;
use crate::pipeline::schema::SchemaNode;

/// One element of a prompt: instruction text or an attached document.
#[derive(Debug, Clone, Copy)]
pub enum PromptPart<'a> {
    Text(&'a str),
    Document(&'a DocumentPart),
}

/// Per-call generation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions<'a> {
    pub system_instruction: Option<&'a str>,
    /// When set, the model is asked for JSON conforming to this schema.
    pub response_schema: Option<&'a SchemaNode>,
}

/// Generative model client abstraction (allows mocking).
///
/// Given a model, prompt parts and options, return the model's text.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        parts: &[PromptPart<'_>],
        options: &GenerateOptions<'_>,
    ) -> Result<String, InferenceError>;
}
