//! Document part adapter: an uploaded file as bytes plus its declared media type.

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Provider-agnostic payload submitted to the inference capability alongside
/// a text prompt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPart {
    payload: Vec<u8>,
    media_type: String,
}

impl DocumentPart {
    pub fn from_bytes(payload: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            media_type: media_type.into(),
        }
    }

    /// Read the whole file into memory. The media type is taken as declared;
    /// no sniffing is done here.
    pub async fn from_path(
        path: impl AsRef<Path>,
        media_type: impl Into<String>,
    ) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let payload = tokio::fs::read(path)
            .await
            .map_err(|source| DocumentError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_bytes(payload, media_type))
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Standard base64 of the payload, the inline-data encoding used on the wire.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.payload)
    }
}
