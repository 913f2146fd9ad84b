//! Pre-check gate: a cheap YES/NO classification that must pass before the
//! expensive structured extraction runs.
//!
//! The gate is fail-closed. A transport error, a provider error or any answer
//! other than exactly `YES` rejects the document.

use std::sync::Arc;

use super::document::DocumentPart;
use super::inference::{GenerateOptions, InferenceClient, PromptPart};

const PRECHECK_PROMPT: &str = "\
Analyze this document. Does it contain structured, quantitative laboratory data \
(numbers, units, reference ranges) from a clinical analysis? The document must contain \
key medical keywords like HDL, LDL, Lipid profile, CBC, or Hemoglobin. Reject documents \
that only contain qualitative information or obviously non-standard mock data.\n\
Answer strictly with 'YES' or 'NO' only.";

pub struct PreCheckGate {
    client: Arc<dyn InferenceClient>,
    model: String,
}

impl PreCheckGate {
    pub fn new(client: Arc<dyn InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Ask the fast model whether `doc` is a quantitative lab report.
    pub async fn is_plausible_lab_report(&self, doc: &DocumentPart) -> bool {
        let parts = [PromptPart::Text(PRECHECK_PROMPT), PromptPart::Document(doc)];

        match self
            .client
            .generate(&self.model, &parts, &GenerateOptions::default())
            .await
        {
            Ok(answer) => {
                let accepted = is_affirmative(&answer);
                tracing::info!(
                    model = %self.model,
                    accepted,
                    "Pre-check verdict received"
                );
                accepted
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.model,
                    error = %e,
                    "Pre-check failed, treating document as invalid"
                );
                false
            }
        }
    }
}

/// True iff the normalized answer is exactly `YES`.
fn is_affirmative(answer: &str) -> bool {
    answer.trim().to_uppercase() == "YES"
}
