use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::foundation::core::{Fps, FrameSize};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::canvas::CompositeFrame;

/// Configuration handed to a [`StreamEncoder`] when recording starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Canvas size for the whole recording.
    pub size: FrameSize,
    /// Sample clock rate.
    pub fps: Fps,
    /// Straight RGBA8 color used to flatten transparent pixels for opaque containers.
    pub background: [u8; 4],
}

/// Finished encoder output.
#[derive(Clone, Debug)]
pub struct EncodedStream {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

/// Incremental encoder fed by the capture sink.
///
/// Ordering contract: `push_frame` timestamps are strictly increasing and lie inside
/// `[0, end_ts)` of the final `finish` call.
pub trait StreamEncoder: Send {
    /// Called once before any frame is pushed.
    fn begin(&mut self, cfg: StreamConfig) -> FlipbookResult<()>;
    /// Push one sampled canvas frame presented at `ts`.
    fn push_frame(&mut self, ts: Duration, frame: &CompositeFrame) -> FlipbookResult<()>;
    /// Flush and return the encoded container. The last frame is shown until `end_ts`.
    fn finish(&mut self, end_ts: Duration) -> FlipbookResult<EncodedStream>;
    /// Discard everything recorded so far and release encoder resources.
    fn abort(&mut self);
}

/// One frame kept by [`InMemoryEncoder`].
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub ts: Duration,
    pub frame: CompositeFrame,
}

/// Shared view of the frames an [`InMemoryEncoder`] received.
#[derive(Clone, Debug, Default)]
pub struct CapturedFrames(Arc<Mutex<Vec<CapturedFrame>>>);

impl CapturedFrames {
    /// Copy of the frames received so far, in push order.
    pub fn snapshot(&self) -> Vec<CapturedFrame> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoder that keeps raw frames, for tests and debugging.
///
/// `finish` returns the straight-alpha frames concatenated as raw RGBA8.
#[derive(Debug, Default)]
pub struct InMemoryEncoder {
    cfg: Option<StreamConfig>,
    frames: CapturedFrames,
}

impl InMemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle that stays readable after the encoder has been moved into a capture sink.
    pub fn frames(&self) -> CapturedFrames {
        self.frames.clone()
    }

    pub fn config(&self) -> Option<StreamConfig> {
        self.cfg
    }
}

impl StreamEncoder for InMemoryEncoder {
    fn begin(&mut self, cfg: StreamConfig) -> FlipbookResult<()> {
        self.cfg = Some(cfg);
        self.frames
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }

    fn push_frame(&mut self, ts: Duration, frame: &CompositeFrame) -> FlipbookResult<()> {
        if self.cfg.is_none() {
            return Err(FlipbookError::capture("in-memory encoder not started"));
        }
        self.frames
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(CapturedFrame {
                ts,
                frame: frame.clone(),
            });
        Ok(())
    }

    fn finish(&mut self, _end_ts: Duration) -> FlipbookResult<EncodedStream> {
        if self.cfg.take().is_none() {
            return Err(FlipbookError::capture("in-memory encoder not started"));
        }
        let bytes = self
            .frames
            .snapshot()
            .iter()
            .flat_map(|f| f.frame.to_straight_rgba8())
            .collect();
        Ok(EncodedStream {
            bytes,
            mime: "application/octet-stream",
            extension: "rgba",
        })
    }

    fn abort(&mut self) {
        self.cfg = None;
        self.frames
            .0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Validate a pushed frame against the recording configuration.
pub(crate) fn check_frame(cfg: &StreamConfig, frame: &CompositeFrame) -> FlipbookResult<()> {
    if frame.size != cfg.size {
        return Err(FlipbookError::capture(format!(
            "frame size mismatch: got {}x{}, expected {}x{}",
            frame.size.width, frame.size.height, cfg.size.width, cfg.size.height
        )));
    }
    if frame.rgba8_premul.len() != cfg.size.rgba_len()? {
        return Err(FlipbookError::capture(
            "frame data size mismatch with width*height*4",
        ));
    }
    Ok(())
}

/// Flatten premultiplied RGBA8 over an opaque background color.
pub(crate) fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> FlipbookResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(FlipbookError::capture(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/capture/encoder.rs"]
mod tests;
