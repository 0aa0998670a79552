use std::time::Duration;

use crate::foundation::error::{FlipbookError, FlipbookResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> FlipbookResult<Self> {
        if den == 0 {
            return Err(FlipbookError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(FlipbookError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame, rounded down to whole nanoseconds.
    pub fn frame_interval(self) -> Duration {
        self.frame_start(1)
    }

    /// Start time of frame `k`, `floor(k * den / num)` seconds at nanosecond precision.
    ///
    /// Computed from `k` directly so boundaries never drift, e.g. frame 30 at 30 fps starts at
    /// exactly one second.
    pub fn frame_start(self, k: u64) -> Duration {
        let nanos = u128::from(k) * u128::from(self.den) * NANOS_PER_SEC / u128::from(self.num);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Index of the frame whose interval contains `t`. Inverse of [`Fps::frame_start`].
    pub fn frame_at(self, t: Duration) -> u64 {
        let guess = t.as_nanos() * u128::from(self.num) / (u128::from(self.den) * NANOS_PER_SEC);
        let mut k = u64::try_from(guess).unwrap_or(u64::MAX);
        while k < u64::MAX && self.frame_start(k + 1) <= t {
            k += 1;
        }
        k
    }
}

/// Pixel dimensions of a frame or canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FrameSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameSize {
    /// Create a size value. Zero dimensions are allowed and describe an empty canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of a tightly packed RGBA8 buffer of this size.
    pub fn rgba_len(self) -> FlipbookResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| FlipbookError::validation("frame size overflows rgba8 buffer length"))
    }

    /// Return `true` when either dimension is zero.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channel array in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Fixed wall-clock recording window shared by the paint loop and the capture sink.
///
/// Both sides stop at the same condition so the capture never keeps sampling a canvas that is no
/// longer being painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordingWindow {
    duration: Duration,
}

impl RecordingWindow {
    /// Create a validated window.
    pub fn new(duration: Duration) -> FlipbookResult<Self> {
        if duration.is_zero() {
            return Err(FlipbookError::validation(
                "recording duration must be non-zero",
            ));
        }
        Ok(Self { duration })
    }

    /// Window length.
    pub fn duration(self) -> Duration {
        self.duration
    }

    /// Return `true` while `elapsed` is still inside the window.
    pub fn contains(self, elapsed: Duration) -> bool {
        elapsed < self.duration
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
