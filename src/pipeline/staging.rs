//! Temporary on-disk copy of an upload, scoped to one request.
//!
//! The file is removed when the [`StagedUpload`] is dropped, whichever way
//! the pipeline ended. Removal failures are logged and never surface as
//! request errors.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

/// Maximum length of the sanitized original filename.
const MAX_FILENAME_LEN: usize = 100;

/// Distinct names tried for one upload before giving up.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    original_name: String,
    media_type: String,
}

impl StagedUpload {
    /// Write `bytes` to a new file `{dir}/{timestamp_millis}-{original_name}`,
    /// creating `dir` when missing. An existing file is never reused: on a
    /// name clash a counter is inserted (`{timestamp_millis}-{n}-{name}`).
    pub async fn stage(
        dir: &Path,
        original_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<Self, std::io::Error> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self::stage_at(dir, timestamp, original_name, media_type, bytes).await
    }

    async fn stage_at(
        dir: &Path,
        timestamp_millis: i64,
        original_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<Self, std::io::Error> {
        tokio::fs::create_dir_all(dir).await?;

        for n in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(staged_file_name(timestamp_millis, n, original_name));
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            // From here the file is ours; Drop removes it if the write fails.
            let upload = Self {
                path,
                original_name: original_name.to_string(),
                media_type: media_type.to_string(),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            tracing::debug!(path = %upload.path.display(), size = bytes.len(), "Upload staged");
            return Ok(upload);
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free staging name for {original_name} after {MAX_NAME_ATTEMPTS} attempts"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Staged upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged upload"
            ),
        }
    }
}

/// `{timestamp}-{sanitized name}` for the first candidate,
/// `{timestamp}-{n}-{sanitized name}` after a clash.
pub fn staged_file_name(timestamp_millis: i64, n: u32, original_name: &str) -> String {
    let name = sanitize_filename(original_name);
    if n == 0 {
        format!("{timestamp_millis}-{name}")
    } else {
        format!("{timestamp_millis}-{n}-{name}")
    }
}

/// Strip path components and unsafe characters from a client-supplied name.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // No `..` sequences, and no leading dot (hidden files).
    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.');

    let sanitized: String = sanitized.chars().take(MAX_FILENAME_LEN).collect();

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized
    }
}
