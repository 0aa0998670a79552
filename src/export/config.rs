use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::color::Color;
use crate::capture::ffmpeg::VideoContainer;
use crate::foundation::core::{Fps, RecordingWindow};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::render::layers::LayerStack;
use crate::transcode::bridge::TranscodeOptions;

const MAX_DURATION_MS: u64 = 10 * 60 * 1000;
const MAX_FPS: u32 = 60;
const MAX_LAYER_TIMEOUT_MS: u64 = 60_000;

/// Requested output kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Re-encoded video container.
    #[default]
    Video,
    /// Re-encoded animated GIF.
    Gif,
    /// Video when a caption is present, otherwise the original animated image unchanged.
    Auto,
}

/// What a session will actually produce once layers are known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputPlan {
    Video(VideoContainer),
    Gif,
    Passthrough,
}

/// Export session configuration. Loaded from JSON; every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    /// Recording window length.
    pub duration_ms: u64,
    /// Paint and sample rate.
    pub fps: u32,
    pub format: ExportFormat,
    pub container: VideoContainer,
    /// Run the source through the transcode bridge before compositing.
    pub transcode: Option<TranscodeOptions>,
    /// How long `preparing` waits for layer images before rendering starts without them.
    pub layer_load_timeout_ms: u64,
    /// User-supplied code or name for the download file.
    pub file_code: Option<String>,
    /// Color transparent pixels are flattened onto in opaque outputs.
    pub matte: Color,
    pub layers: LayerStack,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            fps: 30,
            format: ExportFormat::Video,
            container: VideoContainer::Webm,
            transcode: None,
            layer_load_timeout_ms: 5_000,
            file_code: None,
            matte: Color::BLACK,
            layers: LayerStack::default(),
        }
    }
}

impl ExportConfig {
    /// Read a JSON config file.
    pub fn from_json_file(path: &Path) -> FlipbookResult<Self> {
        use anyhow::Context as _;
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| FlipbookError::validation(format!("config '{}': {e}", path.display())))
    }

    pub fn validate(&self) -> FlipbookResult<()> {
        if self.duration_ms == 0 || self.duration_ms > MAX_DURATION_MS {
            return Err(FlipbookError::validation(format!(
                "duration_ms must be in 1..={MAX_DURATION_MS}"
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(FlipbookError::validation(format!(
                "fps must be in 1..={MAX_FPS}"
            )));
        }
        if self.layer_load_timeout_ms > MAX_LAYER_TIMEOUT_MS {
            return Err(FlipbookError::validation(format!(
                "layer_load_timeout_ms must be at most {MAX_LAYER_TIMEOUT_MS}"
            )));
        }
        if let Some(opts) = &self.transcode {
            opts.validate()?;
        }
        if let Some(text) = &self.layers.text {
            if !text.font_size.is_finite() || text.font_size <= 0.0 {
                return Err(FlipbookError::validation("text font_size must be positive"));
            }
            if !text.outline_width.is_finite() || text.outline_width < 0.0 {
                return Err(FlipbookError::validation(
                    "text outline_width must be zero or positive",
                ));
            }
        }
        Ok(())
    }

    pub fn fps(&self) -> FlipbookResult<Fps> {
        Fps::new(self.fps, 1)
    }

    pub fn window(&self) -> FlipbookResult<RecordingWindow> {
        RecordingWindow::new(Duration::from_millis(self.duration_ms))
    }

    pub fn layer_load_timeout(&self) -> Duration {
        Duration::from_millis(self.layer_load_timeout_ms)
    }

    /// Resolve the output kind for the configured layers.
    pub fn output_plan(&self) -> OutputPlan {
        match self.format {
            ExportFormat::Video => OutputPlan::Video(self.container),
            ExportFormat::Gif => OutputPlan::Gif,
            ExportFormat::Auto if self.layers.has_text() => OutputPlan::Video(self.container),
            ExportFormat::Auto => OutputPlan::Passthrough,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/config.rs"]
mod tests;
