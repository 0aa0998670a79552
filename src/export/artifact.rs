use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::export::ledger::{ObjectUrl, ResourceLedger};
use crate::foundation::error::{FlipbookError, FlipbookResult};

const MAX_NAME_CHARS: usize = 64;

/// Finished export: encoded bytes plus what a download needs. Never mutated after creation.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    bytes: Arc<[u8]>,
    mime: &'static str,
    extension: &'static str,
    file_name: String,
    duration: Duration,
    frame_count: u64,
}

impl ExportArtifact {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        mime: &'static str,
        extension: &'static str,
        file_name: String,
        duration: Duration,
        frame_count: u64,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            mime,
            extension,
            file_name,
            duration,
            frame_count,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    /// Suggested download file name, extension included.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Playback duration the encoder was asked to produce.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of frames the encoder received (0 for pass-through artifacts).
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Publish the bytes as a ledger-tracked object URL.
    pub async fn object_url(&self, ledger: &ResourceLedger) -> FlipbookResult<ObjectUrl> {
        ledger.create_object_url(&self.bytes, self.extension).await
    }

    /// Write the artifact into `dir` under its suggested file name.
    pub async fn save_to(&self, dir: &Path) -> FlipbookResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            FlipbookError::Other(anyhow::anyhow!("create '{}': {e}", dir.display()))
        })?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await.map_err(|e| {
            FlipbookError::Other(anyhow::anyhow!("write '{}': {e}", path.display()))
        })?;
        Ok(path)
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Download name from a user-supplied code, or `animated-video-<now_ms>` when none is usable.
///
/// Characters outside `[A-Za-z0-9._-]` become `-`; the result is capped at 64 characters.
pub fn suggest_file_name(code: Option<&str>, extension: &str, now_ms: u64) -> String {
    let stem = code
        .map(sanitize_stem)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("animated-video-{now_ms}"));
    let suffix = format!(".{extension}");
    if stem.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()) {
        stem
    } else {
        format!("{stem}{suffix}")
    }
}

fn sanitize_stem(code: &str) -> String {
    let mapped: String = code
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_NAME_CHARS)
        .collect();
    mapped
        .trim_matches(|c| c == '-' || c == '.')
        .to_owned()
}

#[cfg(test)]
#[path = "../../tests/unit/export/artifact.rs"]
mod tests;
