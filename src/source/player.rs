use std::time::Duration;

use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::source::animated::{FrameSequence, RasterFrame};

/// Maps paint-loop elapsed time onto the looping frame sequence.
///
/// Frame `k` of the sequence is shown from the sum of the durations of frames `0..k` until that
/// sum plus its own duration. A frame that fails to decode is skipped and the previous good frame
/// keeps showing; only a source that never produced a good frame is fatal.
pub struct FramePlayer {
    seq: FrameSequence,
    current: Option<RasterFrame>,
    current_end: Duration,
    skipped: u64,
}

impl FramePlayer {
    /// Wrap a fresh sequence. Nothing is decoded until the first [`FramePlayer::frame_at`].
    pub fn new(seq: FrameSequence) -> Self {
        Self {
            seq,
            current: None,
            current_end: Duration::ZERO,
            skipped: 0,
        }
    }

    /// Frame due at `elapsed`. Calls must be made with non-decreasing `elapsed`.
    pub fn frame_at(&mut self, elapsed: Duration) -> FlipbookResult<&RasterFrame> {
        while self.current.is_none() || elapsed >= self.current_end {
            if self.current.is_some()
                && let Some(period) = self.seq.loop_duration()
                && !period.is_zero()
            {
                // Whole loops elapsed since the current frame ended land on the same frame.
                let behind = elapsed - self.current_end;
                let loops = behind.as_nanos() / period.as_nanos();
                if loops > 0 {
                    let skip = u32::try_from(loops).unwrap_or(u32::MAX);
                    self.current_end += period.saturating_mul(skip);
                }
            }

            match self.seq.next() {
                Some(Ok(frame)) => {
                    self.current_end += frame.duration;
                    self.current = Some(frame);
                }
                Some(Err(err)) => {
                    if self.current.is_none() && self.seq.decoded_len() == 0 {
                        return Err(err);
                    }
                    self.skipped += 1;
                    tracing::warn!(error = %err, "skipping undecodable frame");
                }
                None => return Err(FlipbookError::decode("frame sequence ended")),
            }
        }
        self.current
            .as_ref()
            .ok_or_else(|| FlipbookError::decode("no frame decoded"))
    }

    /// Number of frames skipped because they failed to decode.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped
    }

    /// Rewind playback to the first frame at elapsed zero.
    pub fn rewind(&mut self) {
        self.seq.restart();
        self.current = None;
        self.current_end = Duration::ZERO;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/player.rs"]
mod tests;
