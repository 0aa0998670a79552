use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::encoder::{
    EncodedStream, StreamConfig, StreamEncoder, check_frame, flatten_premul_over_bg_to_opaque_rgba8,
};
use crate::export::ledger::scratch_path;
use crate::foundation::core::Fps;
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::render::canvas::CompositeFrame;

/// Video container produced by [`FfmpegStreamEncoder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    /// VP9 in WebM.
    #[default]
    Webm,
    /// H.264 in MP4.
    Mp4,
}

impl VideoContainer {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Webm => "video/webm",
            Self::Mp4 => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Mp4 => "mp4",
        }
    }

    fn codec_args(self) -> &'static [&'static str] {
        match self {
            Self::Webm => &[
                "-c:v",
                "libvpx-vp9",
                "-pix_fmt",
                "yuv420p",
                "-b:v",
                "0",
                "-crf",
                "32",
                "-row-mt",
                "1",
            ],
            Self::Mp4 => &[
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ],
        }
    }
}

/// Encoder that spawns the system `ffmpeg` and streams flattened RGBA8 frames to its stdin.
///
/// The pipe runs at the constant sample rate, so every sample slot gets exactly one raw frame: a
/// slot with no pushed frame repeats the last one, and `finish` holds the last frame until the end
/// timestamp. Odd canvas sizes are padded to even dimensions for the 4:2:0 output.
pub struct FfmpegStreamEncoder {
    ffmpeg: PathBuf,
    container: VideoContainer,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    out_path: Option<PathBuf>,

    scratch: Vec<u8>,
    cfg: Option<StreamConfig>,
    last_ts: Option<Duration>,
    written: u64,
}

impl FfmpegStreamEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, container: VideoContainer) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            container,
            child: None,
            stdin: None,
            stderr_drain: None,
            out_path: None,
            scratch: Vec::new(),
            cfg: None,
            last_ts: None,
            written: 0,
        }
    }

    /// Write the flattened frame in `scratch` until `slots` raw frames have been sent.
    fn write_through(&mut self, slots: u64) -> FlipbookResult<()> {
        use std::io::Write as _;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FlipbookError::capture("ffmpeg encoder is already finalized"));
        };
        while self.written < slots {
            stdin.write_all(&self.scratch).map_err(|e| {
                FlipbookError::capture(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
            self.written += 1;
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(path) = self.out_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl StreamEncoder for FfmpegStreamEncoder {
    #[tracing::instrument(level = "debug", skip_all, fields(container = ?self.container))]
    fn begin(&mut self, cfg: StreamConfig) -> FlipbookResult<()> {
        if cfg.size.is_empty() {
            return Err(FlipbookError::validation(
                "ffmpeg encoder width/height must be non-zero",
            ));
        }

        let out_path = scratch_path("capture", self.container.extension());
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Input: raw RGBA8 frames, flattened in push_frame since ffmpeg does not understand premul.
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.size.width, cfg.size.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"])
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
            .args(self.container.codec_args())
            .arg(&out_path);

        let mut child = cmd.spawn().map_err(|e| {
            FlipbookError::capture(format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                self.ffmpeg.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FlipbookError::capture("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FlipbookError::capture("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        self.scratch = vec![0u8; cfg.size.rgba_len()?];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.out_path = Some(out_path);
        self.cfg = Some(cfg);
        self.last_ts = None;
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, ts: Duration, frame: &CompositeFrame) -> FlipbookResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| FlipbookError::capture("ffmpeg encoder not started"))?;
        if let Some(last) = self.last_ts
            && ts <= last
        {
            return Err(FlipbookError::capture(
                "ffmpeg encoder received out-of-order timestamp",
            ));
        }
        check_frame(&cfg, frame)?;
        let slot = cfg.fps.frame_at(ts);

        // Slots skipped since the previous push hold the frame already in `scratch`.
        if self.last_ts.is_some() {
            self.write_through(slot)?;
        }
        self.last_ts = Some(ts);

        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.rgba8_premul, cfg.background)?;
        self.write_through(slot.saturating_add(1).max(self.written + 1))
    }

    fn finish(&mut self, end_ts: Duration) -> FlipbookResult<EncodedStream> {
        if let Some(cfg) = self.cfg
            && self.last_ts.is_some()
        {
            let held = self.write_through(slots_before(cfg.fps, end_ts));
            if let Err(err) = held {
                self.abort();
                return Err(err);
            }
        }
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| FlipbookError::capture("ffmpeg encoder not started"))?;

        let status = child.wait().map_err(|e| {
            FlipbookError::capture(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| FlipbookError::capture("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| FlipbookError::capture(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            self.cleanup();
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(FlipbookError::capture(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        if self.last_ts.is_none() {
            self.cleanup();
            return Err(FlipbookError::capture("no frames were captured"));
        }

        let out_path = self
            .out_path
            .clone()
            .ok_or_else(|| FlipbookError::capture("ffmpeg output path missing"))?;
        let bytes = std::fs::read(&out_path);
        self.cleanup();
        let bytes = bytes.map_err(|e| {
            FlipbookError::capture(format!("read encoded '{}': {e}", out_path.display()))
        })?;
        tracing::debug!(
            bytes = bytes.len(),
            frames = self.written,
            end_ms = end_ts.as_millis() as u64,
            "ffmpeg capture finished"
        );

        self.cfg = None;
        Ok(EncodedStream {
            bytes,
            mime: self.container.mime(),
            extension: self.container.extension(),
        })
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.cleanup();
        self.cfg = None;
    }
}

impl Drop for FfmpegStreamEncoder {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.abort();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate as `num/den`.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Number of sample slots starting before `end`.
fn slots_before(fps: Fps, end: Duration) -> u64 {
    if end.is_zero() {
        0
    } else {
        fps.frame_at(end - Duration::from_nanos(1)) + 1
    }
}

/// Return `true` when `ffmpeg` can be invoked as `program`.
pub fn is_ffmpeg_available(program: &std::path::Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/capture/ffmpeg.rs"]
mod tests;
