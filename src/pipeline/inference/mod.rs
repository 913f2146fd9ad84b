pub mod gemini;
pub mod mock;
pub mod types;

pub use gemini::*;
pub use mock::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference provider is not reachable at {0}")]
    Connection(String),

    #[error("Inference provider returned error (status {status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Provider returned no candidate text")]
    EmptyResponse,
}
