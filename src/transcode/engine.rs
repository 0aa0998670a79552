use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;

use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Versions reported by the codec tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineInfo {
    pub ffmpeg_version: String,
    pub ffprobe_version: String,
}

/// Handle to the system `ffmpeg`/`ffprobe` pair.
///
/// Initialization runs once, on the first [`CodecEngine::ready`]. Its outcome is cached: a failed
/// probe makes every later call fail with an init error, and a new engine must be built to retry.
#[derive(Debug)]
pub struct CodecEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    state: OnceCell<Result<EngineInfo, String>>,
}

impl Default for CodecEngine {
    fn default() -> Self {
        Self::system()
    }
}

impl CodecEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            state: OnceCell::new(),
        }
    }

    /// Engine resolving both tools from `PATH`.
    pub fn system() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe(&self) -> &Path {
        &self.ffprobe
    }

    /// Wait for the one-time initialization and return its outcome.
    pub async fn ready(&self) -> FlipbookResult<&EngineInfo> {
        let state = self
            .state
            .get_or_init(|| async {
                let res = self.probe().await;
                match &res {
                    Ok(info) => tracing::info!(ffmpeg = %info.ffmpeg_version, "codec engine ready"),
                    Err(e) => tracing::error!(error = %e, "codec engine failed to initialize"),
                }
                res
            })
            .await;
        state.as_ref().map_err(|e| FlipbookError::init(e.clone()))
    }

    /// Return `true` once initialization has run and failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.state.get(), Some(Err(_)))
    }

    async fn probe(&self) -> Result<EngineInfo, String> {
        let ffmpeg_version = tool_version(&self.ffmpeg).await?;
        let ffprobe_version = tool_version(&self.ffprobe).await?;
        Ok(EngineInfo {
            ffmpeg_version,
            ffprobe_version,
        })
    }
}

async fn tool_version(program: &Path) -> Result<String, String> {
    let out = tokio::process::Command::new(program)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to run '{}': {e}", program.display()))?;
    if !out.status.success() {
        return Err(format!(
            "'{} -version' exited with status {}",
            program.display(),
            out.status
        ));
    }
    let stdout = String::from_utf8_lossy(&out.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/engine.rs"]
mod tests;
