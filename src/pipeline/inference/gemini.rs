use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::types::{GenerateOptions, InferenceClient, PromptPart};
use super::InferenceError;
use crate::pipeline::schema::SchemaNode;

/// Public Gemini REST endpoint.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client over HTTPS.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

// ──────────────────────────────────────────────
// Wire types
// ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ──────────────────────────────────────────────
// Translation
// ──────────────────────────────────────────────

fn build_request<'a>(
    parts: &'a [PromptPart<'a>],
    options: &GenerateOptions<'a>,
) -> GenerateContentRequest<'a> {
    let parts = parts
        .iter()
        .map(|part| match *part {
            PromptPart::Text(text) => Part {
                text: Some(text),
                inline_data: None,
            },
            PromptPart::Document(doc) => Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: doc.media_type(),
                    data: doc.to_base64(),
                }),
            },
        })
        .collect();

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts,
        }],
        system_instruction: options.system_instruction.map(|text| Content {
            role: None,
            parts: vec![Part {
                text: Some(text),
                inline_data: None,
            }],
        }),
        generation_config: options.response_schema.map(|schema| GenerationConfig {
            response_mime_type: "application/json",
            response_schema: to_gemini_schema(schema),
        }),
    }
}

/// Translate a neutral schema into Gemini's OpenAPI-subset schema object.
pub fn to_gemini_schema(node: &SchemaNode) -> Value {
    match node {
        SchemaNode::String => json!({ "type": "STRING" }),
        SchemaNode::Array(items) => json!({
            "type": "ARRAY",
            "items": to_gemini_schema(items),
        }),
        SchemaNode::Object(fields) => {
            let properties: serde_json::Map<String, Value> = fields
                .iter()
                .map(|f| (f.name.clone(), to_gemini_schema(&f.node)))
                .collect();
            let ordering: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
            let mut schema = json!({
                "type": "OBJECT",
                "properties": properties,
                "propertyOrdering": ordering,
            });
            let required = node.required_fields();
            if !required.is_empty() {
                schema["required"] = json!(required);
            }
            schema
        }
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: GenerateContentResponse) -> Result<String, InferenceError> {
    let content = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or(InferenceError::EmptyResponse)?;

    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(text)
}

/// Build a provider error from a non-2xx response body. Keeps Google's
/// status token (`UNAVAILABLE`, `INVALID_ARGUMENT`, ...) in the message.
fn provider_error(status: u16, body: &str) -> InferenceError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.error.status.is_empty() => {
            format!("{}: {}", env.error.status, env.error.message)
        }
        Ok(env) => env.error.message,
        Err(_) => body.trim().to_string(),
    };
    InferenceError::Provider { status, message }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        parts: &[PromptPart<'_>],
        options: &GenerateOptions<'_>,
    ) -> Result<String, InferenceError> {
        let body = build_request(parts, options);

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    InferenceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    InferenceError::Timeout(self.timeout_secs)
                } else {
                    InferenceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::ResponseParsing(e.to_string()))?;

        response_text(parsed)
    }
}
