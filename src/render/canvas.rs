use std::time::Duration;

use crate::foundation::core::FrameSize;
use crate::foundation::error::FlipbookResult;
use crate::foundation::math::unpremultiply_rgba8_in_place;

/// Off-screen premultiplied RGBA8 backing store painted by the compositor.
#[derive(Debug)]
pub struct Canvas {
    size: FrameSize,
    data: Vec<u8>,
    painted_at: Option<Duration>,
    resets: u64,
}

impl Canvas {
    /// Allocate a transparent canvas.
    pub fn new(size: FrameSize) -> FlipbookResult<Self> {
        Ok(Self {
            size,
            data: vec![0u8; size.rgba_len()?],
            painted_at: None,
            resets: 0,
        })
    }

    /// Current bitmap size.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// Reallocate the bitmap when `size` differs. Returns `true` when a reset happened.
    ///
    /// A reset drops the old buffer entirely; nothing painted at the previous size survives.
    pub fn resize(&mut self, size: FrameSize) -> FlipbookResult<bool> {
        if size == self.size {
            return Ok(false);
        }
        self.data = vec![0u8; size.rgba_len()?];
        self.size = size;
        self.painted_at = None;
        self.resets += 1;
        Ok(true)
    }

    /// Number of hard resets caused by size changes.
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Clear every pixel to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Premultiplied pixels, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Time stamp of the most recent paint, if any.
    pub fn painted_at(&self) -> Option<Duration> {
        self.painted_at
    }

    pub(crate) fn stamp(&mut self, time: Duration) {
        self.painted_at = Some(time);
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        pixel_at(&self.data, self.size, x, y)
    }

    /// Copy the current contents into a transient frame.
    pub fn snapshot(&self) -> CompositeFrame {
        CompositeFrame {
            size: self.size,
            rgba8_premul: self.data.clone(),
            painted_at: self.painted_at.unwrap_or_default(),
        }
    }
}

/// One resolved pixel buffer for one instant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeFrame {
    pub size: FrameSize,
    pub rgba8_premul: Vec<u8>,
    pub painted_at: Duration,
}

impl CompositeFrame {
    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        pixel_at(&self.rgba8_premul, self.size, x, y)
    }

    /// Straight-alpha copy of the pixels, as encoders expect.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.rgba8_premul.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }
}

fn pixel_at(data: &[u8], size: FrameSize, x: u32, y: u32) -> Option<[u8; 4]> {
    if x >= size.width || y >= size.height {
        return None;
    }
    let i = (y as usize * size.width as usize + x as usize) * 4;
    let p = data.get(i..i + 4)?;
    Some([p[0], p[1], p[2], p[3]])
}

#[cfg(test)]
#[path = "../../tests/unit/render/canvas.rs"]
mod tests;
