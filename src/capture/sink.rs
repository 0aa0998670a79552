use std::time::Duration;

use crate::capture::encoder::{StreamConfig, StreamEncoder};
use crate::export::artifact::{ExportArtifact, suggest_file_name, unix_millis};
use crate::export::ledger::{ResourceLedger, StreamTrack};
use crate::foundation::core::{Fps, FrameSize, RecordingWindow};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::render::canvas::Canvas;

/// Recording parameters shared by every capture of a session.
#[derive(Clone, Debug)]
pub struct CaptureSettings {
    /// Sample clock rate.
    pub fps: Fps,
    /// Stop condition shared with the paint loop.
    pub window: RecordingWindow,
    /// Straight RGBA8 color used to flatten transparency for opaque outputs.
    pub background: [u8; 4],
    /// User-supplied code used for the suggested file name.
    pub file_code: Option<String>,
}

/// Binds a sample clock and an incremental encoder to the canvas.
#[derive(Clone, Debug)]
pub struct CaptureSink {
    settings: CaptureSettings,
}

impl CaptureSink {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }

    /// Start recording a canvas of `size`. The encoder is started and a live stream track is
    /// registered with `ledger` before this returns.
    #[tracing::instrument(level = "debug", skip_all, fields(w = size.width, h = size.height))]
    pub fn begin(
        &self,
        size: FrameSize,
        mut encoder: Box<dyn StreamEncoder>,
        ledger: &ResourceLedger,
    ) -> FlipbookResult<CaptureHandle> {
        encoder
            .begin(StreamConfig {
                size,
                fps: self.settings.fps,
                background: self.settings.background,
            })
            .map_err(into_capture)?;
        Ok(CaptureHandle {
            encoder: Some(encoder),
            track: ledger.open_track(),
            settings: self.settings.clone(),
            next_slot: 0,
            captured: 0,
            dropped: 0,
        })
    }
}

/// Live recording. Exists only while the session is rendering.
pub struct CaptureHandle {
    encoder: Option<Box<dyn StreamEncoder>>,
    track: StreamTrack,
    settings: CaptureSettings,
    next_slot: u64,
    captured: u64,
    dropped: u64,
}

impl CaptureHandle {
    /// Sample `canvas` if the sample clock has a due slot at `elapsed`.
    ///
    /// Returns `true` when a frame was handed to the encoder. Slots that passed without an
    /// observation are counted as dropped and never resubmitted. Nothing is sampled once `elapsed`
    /// leaves the recording window.
    pub fn observe(&mut self, canvas: &Canvas, elapsed: Duration) -> FlipbookResult<bool> {
        if !self.settings.window.contains(elapsed) {
            return Ok(false);
        }
        let slot = self.settings.fps.frame_at(elapsed);
        if slot < self.next_slot {
            return Ok(false);
        }
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(FlipbookError::capture("capture stream is no longer recording"));
        };

        if slot > self.next_slot {
            let missed = slot - self.next_slot;
            self.dropped += missed;
            tracing::debug!(missed, slot, "sample slots dropped");
        }
        let ts = self.settings.fps.frame_start(slot);
        if let Err(err) = encoder.push_frame(ts, &canvas.snapshot()) {
            tracing::warn!(error = %err, "encoder failed; discarding capture");
            self.discard();
            return Err(into_capture(err));
        }
        self.next_slot = slot + 1;
        self.captured += 1;
        Ok(true)
    }

    /// Frames handed to the encoder so far.
    pub fn captured_frames(&self) -> u64 {
        self.captured
    }

    /// Sample slots that passed without an observation.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Return `true` while the stream track is live.
    pub fn is_recording(&self) -> bool {
        self.track.is_live()
    }

    /// Stop the stream and finalize the encoder off the paint task.
    ///
    /// On failure all partial output is discarded and a capture error is returned.
    pub async fn end(mut self) -> FlipbookResult<ExportArtifact> {
        self.track.stop();
        let Some(mut encoder) = self.encoder.take() else {
            return Err(FlipbookError::capture("capture stream already failed"));
        };
        let end_ts = self.settings.window.duration();

        let finished = tokio::task::spawn_blocking(move || {
            let res = encoder.finish(end_ts);
            if res.is_err() {
                encoder.abort();
            }
            res
        })
        .await
        .map_err(|e| FlipbookError::capture(format!("encoder finalize task failed: {e}")))?;
        let stream = finished.map_err(into_capture)?;

        tracing::info!(
            frames = self.captured,
            dropped = self.dropped,
            bytes = stream.bytes.len(),
            mime = stream.mime,
            "capture finalized"
        );
        let file_name = suggest_file_name(
            self.settings.file_code.as_deref(),
            stream.extension,
            unix_millis(),
        );
        Ok(ExportArtifact::new(
            stream.bytes,
            stream.mime,
            stream.extension,
            file_name,
            end_ts,
            self.captured,
        ))
    }

    /// Stop recording and discard everything captured.
    pub fn abort(mut self) {
        self.discard();
    }

    fn discard(&mut self) {
        if let Some(mut encoder) = self.encoder.take() {
            encoder.abort();
        }
        self.track.stop();
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.discard();
    }
}

fn into_capture(err: FlipbookError) -> FlipbookError {
    match err {
        FlipbookError::Capture(_) => err,
        other => FlipbookError::capture(other.to_string()),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/sink.rs"]
mod tests;
