use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::capture::encoder::{
    EncodedStream, StreamConfig, StreamEncoder, check_frame, flatten_premul_over_bg_to_opaque_rgba8,
};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::render::canvas::CompositeFrame;

/// Quantizer speed passed to the GIF encoder (1 is best quality, 30 is fastest).
const GIF_SPEED: i32 = 10;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Animated GIF encoder with infinite repeat.
///
/// Each frame is held back until the next timestamp (or `end_ts`) is known, then written with a
/// delay of `cs(next) - cs(ts)` where `cs` rounds to whole centiseconds. Rounding the absolute
/// times rather than each delta keeps the total playback time equal to `cs(end_ts)`.
pub struct GifStreamEncoder {
    out: SharedBuf,
    encoder: Option<GifEncoder<SharedBuf>>,
    cfg: Option<StreamConfig>,
    pending: Option<(Duration, Vec<u8>)>,
    written: usize,
}

impl GifStreamEncoder {
    pub fn new() -> Self {
        Self {
            out: SharedBuf::default(),
            encoder: None,
            cfg: None,
            pending: None,
            written: 0,
        }
    }

    fn write_pending(&mut self, next_ts: Duration) -> FlipbookResult<()> {
        let Some((ts, rgba)) = self.pending.take() else {
            return Ok(());
        };
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| FlipbookError::capture("gif encoder not started"))?;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| FlipbookError::capture("gif encoder is already finalized"))?;

        let cs = centis(next_ts).saturating_sub(centis(ts)).max(1);
        let delay_ms = u32::try_from(cs * 10).unwrap_or(u32::MAX);
        let buffer = RgbaImage::from_raw(cfg.size.width, cfg.size.height, rgba)
            .ok_or_else(|| FlipbookError::capture("gif frame buffer has unexpected length"))?;
        encoder
            .encode_frame(Frame::from_parts(
                buffer,
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms, 1),
            ))
            .map_err(|e| FlipbookError::capture(format!("gif encode frame: {e}")))?;
        self.written += 1;
        Ok(())
    }
}

impl Default for GifStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn centis(t: Duration) -> u64 {
    let ms = t.as_nanos() / 1_000_000;
    let rem = t.as_nanos() % 10_000_000;
    let cs = ms / 10 + u128::from(rem >= 5_000_000);
    u64::try_from(cs).unwrap_or(u64::MAX)
}

impl StreamEncoder for GifStreamEncoder {
    fn begin(&mut self, cfg: StreamConfig) -> FlipbookResult<()> {
        if cfg.size.is_empty() {
            return Err(FlipbookError::validation(
                "gif encoder width/height must be non-zero",
            ));
        }
        if cfg.size.width > u32::from(u16::MAX) || cfg.size.height > u32::from(u16::MAX) {
            return Err(FlipbookError::validation("gif frames are limited to 65535x65535"));
        }
        self.out.take();
        let mut encoder = GifEncoder::new_with_speed(self.out.clone(), GIF_SPEED);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| FlipbookError::capture(format!("gif set repeat: {e}")))?;
        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.pending = None;
        self.written = 0;
        Ok(())
    }

    fn push_frame(&mut self, ts: Duration, frame: &CompositeFrame) -> FlipbookResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| FlipbookError::capture("gif encoder not started"))?;
        check_frame(&cfg, frame)?;
        if let Some((last, _)) = &self.pending
            && ts <= *last
        {
            return Err(FlipbookError::capture(
                "gif encoder received out-of-order timestamp",
            ));
        }
        self.write_pending(ts)?;

        let mut rgba = vec![0u8; frame.rgba8_premul.len()];
        flatten_premul_over_bg_to_opaque_rgba8(&mut rgba, &frame.rgba8_premul, cfg.background)?;
        self.pending = Some((ts, rgba));
        Ok(())
    }

    fn finish(&mut self, end_ts: Duration) -> FlipbookResult<EncodedStream> {
        if self.cfg.is_none() {
            return Err(FlipbookError::capture("gif encoder not started"));
        }
        self.write_pending(end_ts)?;
        if self.written == 0 {
            self.abort();
            return Err(FlipbookError::capture("no frames were captured"));
        }
        // Dropping the encoder writes the trailer.
        drop(self.encoder.take());
        self.cfg = None;
        Ok(EncodedStream {
            bytes: self.out.take(),
            mime: "image/gif",
            extension: "gif",
        })
    }

    fn abort(&mut self) {
        self.encoder = None;
        self.cfg = None;
        self.pending = None;
        self.out.take();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/gif.rs"]
mod tests;
