use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::export::ledger::scratch_path;
use crate::foundation::core::{Fps, FrameSize};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::source::animated::{AnimatedSource, RasterFrame};
use crate::transcode::engine::CodecEngine;

/// Pixel format of the intermediate video.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Yuv420p,
    Yuv444p,
}

impl PixelFormat {
    pub fn as_ffmpeg(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv444p => "yuv444p",
        }
    }
}

fn default_max_duration_sec() -> f64 {
    10.0
}

/// Options for [`transcode_to_video`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscodeOptions {
    /// Longer sources are truncated to this many seconds.
    #[serde(default = "default_max_duration_sec")]
    pub max_duration_sec: f64,
    #[serde(default)]
    pub pixel_format: PixelFormat,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            max_duration_sec: default_max_duration_sec(),
            pixel_format: PixelFormat::default(),
        }
    }
}

impl TranscodeOptions {
    pub fn validate(&self) -> FlipbookResult<()> {
        if !self.max_duration_sec.is_finite() || self.max_duration_sec <= 0.0 {
            return Err(FlipbookError::validation(
                "transcode max_duration_sec must be a positive number",
            ));
        }
        Ok(())
    }
}

/// Stream parameters reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub size: FrameSize,
    pub fps: Fps,
    pub duration_sec: f64,
}

/// Temporary files removed when dropped.
struct Scratch(Vec<PathBuf>);

impl Scratch {
    fn path(&mut self, stem: &str, ext: &str) -> PathBuf {
        let p = scratch_path(stem, ext);
        self.0.push(p.clone());
        p
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for p in &self.0 {
            let _ = std::fs::remove_file(p);
        }
    }
}

/// Re-encode an animated image as an H.264 MP4 with even dimensions.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = bytes.len(), pix_fmt = opts.pixel_format.as_ffmpeg()))]
pub async fn transcode_to_video(
    engine: &CodecEngine,
    bytes: &[u8],
    opts: TranscodeOptions,
) -> FlipbookResult<Vec<u8>> {
    opts.validate()?;
    engine.ready().await?;
    if bytes.is_empty() {
        return Err(FlipbookError::transcode("input is empty"));
    }

    let in_ext = image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("bin");
    let mut scratch = Scratch(Vec::new());
    let input = scratch.path("transcode-in", in_ext);
    let output = scratch.path("transcode-out", "mp4");
    write_scratch(&input, bytes).await?;

    let mut cmd = tokio::process::Command::new(engine.ffmpeg());
    cmd.args(["-v", "error", "-y", "-i"])
        .arg(&input)
        .args(["-t", &format!("{:.3}", opts.max_duration_sec)])
        .args([
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            opts.pixel_format.as_ffmpeg(),
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-movflags",
            "+faststart",
        ])
        .arg(&output);
    run_tool(&mut cmd, "ffmpeg transcode").await?;

    let video = tokio::fs::read(&output)
        .await
        .map_err(|e| FlipbookError::transcode(format!("read transcoded video: {e}")))?;
    tracing::debug!(out_bytes = video.len(), "transcode finished");
    Ok(video)
}

/// Probe a video file for its first video stream.
pub async fn probe_video(engine: &CodecEngine, path: &Path) -> FlipbookResult<VideoInfo> {
    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    engine.ready().await?;
    let mut cmd = tokio::process::Command::new(engine.ffprobe());
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_streams",
        "-show_format",
    ])
    .arg(path);
    let stdout = run_tool(&mut cmd, "ffprobe").await?;

    let parsed: ProbeOut = serde_json::from_slice(&stdout)
        .map_err(|e| FlipbookError::transcode(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FlipbookError::transcode("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| FlipbookError::transcode("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| FlipbookError::transcode("missing video height from ffprobe"))?;
    let (num, den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| FlipbookError::transcode("invalid video r_frame_rate"))?;
    let fps = Fps::new(num, den).map_err(|e| FlipbookError::transcode(e.to_string()))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoInfo {
        size: FrameSize::new(width, height),
        fps,
        duration_sec,
    })
}

/// Decode every frame of a video into a frame source for the compositor.
///
/// Frame `k` is shown for `fps.frame_start(k + 1) - fps.frame_start(k)`.
#[tracing::instrument(level = "debug", skip_all, fields(bytes = video.len()))]
pub async fn decode_video_frames(
    engine: &CodecEngine,
    video: &[u8],
) -> FlipbookResult<AnimatedSource> {
    engine.ready().await?;
    let mut scratch = Scratch(Vec::new());
    let input = scratch.path("decode-in", "mp4");
    write_scratch(&input, video).await?;

    let info = probe_video(engine, &input).await?;
    let frame_len = info
        .size
        .rgba_len()
        .map_err(|e| FlipbookError::transcode(e.to_string()))?;
    if frame_len == 0 {
        return Err(FlipbookError::transcode(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }

    let mut cmd = tokio::process::Command::new(engine.ffmpeg());
    cmd.args(["-v", "error", "-i"])
        .arg(&input)
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"]);
    let raw = run_tool(&mut cmd, "ffmpeg decode").await?;
    if !raw.len().is_multiple_of(frame_len) {
        return Err(FlipbookError::transcode(format!(
            "decoded video has invalid size: got {} bytes, expected multiples of {frame_len}",
            raw.len()
        )));
    }

    let frames = raw
        .chunks_exact(frame_len)
        .enumerate()
        .map(|(k, px)| {
            let k64 = k as u64;
            let duration = info.fps.frame_start(k64 + 1) - info.fps.frame_start(k64);
            // Video frames are opaque, so straight and premultiplied RGBA coincide.
            RasterFrame::new(k, info.size, px.to_vec(), duration)
        })
        .collect::<FlipbookResult<Vec<_>>>()?;
    tracing::debug!(frames = frames.len(), fps = info.fps.as_f64(), "video decoded");

    AnimatedSource::from_frames(video.to_vec(), info.size, frames)
}

async fn write_scratch(path: &Path, bytes: &[u8]) -> FlipbookResult<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| FlipbookError::transcode(format!("write '{}': {e}", path.display())))
}

async fn run_tool(cmd: &mut tokio::process::Command, what: &str) -> FlipbookResult<Vec<u8>> {
    let out = cmd
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| FlipbookError::transcode(format!("failed to run {what}: {e}")))?;
    if !out.status.success() {
        return Err(FlipbookError::transcode(format!(
            "{what} exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(out.stdout)
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
#[path = "../../tests/unit/transcode/bridge.rs"]
mod tests;
