use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::inference::gemini::GEMINI_DEFAULT_BASE_URL;

/// Application-level constants
pub const APP_NAME: &str = "labscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_EXTRACTION_MODELS: &str = "gemini-2.5-flash,gemini-2.5-pro";
pub const DEFAULT_PRECHECK_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "labscribe=info,labscribe_lib=info,tower_http=info"
}

/// Where staged uploads live unless `LABSCRIBE_UPLOAD_DIR` overrides it.
pub fn default_upload_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("uploads")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("LABSCRIBE_EXTRACTION_MODELS lists no models")]
    NoModels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: String,
    pub gemini_base_url: String,
    /// Extraction fallback chain, tried in order.
    pub extraction_models: Vec<String>,
    pub precheck_model: String,
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = var("GEMINI_API_KEY").ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?;

        let gemini_base_url =
            var("LABSCRIBE_GEMINI_BASE_URL").unwrap_or_else(|| GEMINI_DEFAULT_BASE_URL.to_string());

        let extraction_models = parse_model_list(
            &var("LABSCRIBE_EXTRACTION_MODELS")
                .unwrap_or_else(|| DEFAULT_EXTRACTION_MODELS.to_string()),
        );
        if extraction_models.is_empty() {
            return Err(ConfigError::NoModels);
        }

        let precheck_model = var("LABSCRIBE_PRECHECK_MODEL")
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PRECHECK_MODEL.to_string());

        let bind_addr = parse_var(
            "LABSCRIBE_BIND_ADDR",
            var("LABSCRIBE_BIND_ADDR"),
            DEFAULT_BIND_ADDR.parse().ok(),
        )?;

        let upload_dir = var("LABSCRIBE_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_upload_dir);

        let max_upload_mb: usize = parse_var(
            "LABSCRIBE_MAX_UPLOAD_MB",
            var("LABSCRIBE_MAX_UPLOAD_MB"),
            Some(DEFAULT_MAX_UPLOAD_MB),
        )?;

        let request_timeout_secs: u64 = parse_var(
            "LABSCRIBE_REQUEST_TIMEOUT_SECS",
            var("LABSCRIBE_REQUEST_TIMEOUT_SECS"),
            Some(DEFAULT_REQUEST_TIMEOUT_SECS),
        )?;

        Ok(Self {
            api_key,
            gemini_base_url,
            extraction_models,
            precheck_model,
            bind_addr,
            upload_dir,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
            request_timeout_secs,
        })
    }
}

fn parse_var<T>(
    name: &'static str,
    raw: Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            value: value.clone(),
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::MissingVar(name)),
    }
}

/// Split a comma-separated model list, dropping blanks.
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
