use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::{AnimationDecoder, ImageFormat};

use crate::foundation::core::FrameSize;
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Shortest display duration a decoded frame may have.
///
/// Many GIF encoders write a delay of 0; replaying that literally would spin the paint loop.
pub const MIN_FRAME_DURATION: Duration = Duration::from_millis(10);

/// Display duration assigned to the single frame of a still image.
pub const STILL_FRAME_DURATION: Duration = Duration::from_millis(100);

pub(crate) type FrameIter = Box<dyn Iterator<Item = image::ImageResult<image::Frame>>>;

/// Container kind of an [`AnimatedSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// Animated (or single-frame) GIF.
    Gif,
    /// PNG, animated when it carries APNG chunks.
    Png,
    /// WebP, animated or still.
    WebP,
    /// Any other still image format the `image` crate decodes.
    Still(ImageFormat),
    /// Frames decoded from an intermediate video container.
    Video,
}

impl SourceFormat {
    /// MIME type of the original bytes.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Still(format) => format.to_mime_type(),
            Self::Video => "video/mp4",
        }
    }

    /// Preferred file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Still(format) => format.extensions_str().first().copied().unwrap_or("img"),
            Self::Video => "mp4",
        }
    }
}

/// One decoded raster frame plus how long it stays on screen.
#[derive(Clone, Debug)]
pub struct RasterFrame {
    /// Position of the frame within one loop of the source.
    pub index: usize,
    /// Frame dimensions (always the source's logical size).
    pub size: FrameSize,
    /// Premultiplied RGBA8 pixels, row-major, tightly packed.
    pub rgba8_premul: Arc<Vec<u8>>,
    /// Display duration, never below [`MIN_FRAME_DURATION`].
    pub duration: Duration,
}

impl RasterFrame {
    /// Build a frame from premultiplied pixels.
    pub fn new(
        index: usize,
        size: FrameSize,
        rgba8_premul: Vec<u8>,
        duration: Duration,
    ) -> FlipbookResult<Self> {
        if rgba8_premul.len() != size.rgba_len()? {
            return Err(FlipbookError::decode(format!(
                "frame {index} has {} bytes, expected {}x{} rgba8",
                rgba8_premul.len(),
                size.width,
                size.height
            )));
        }
        Ok(Self {
            index,
            size,
            rgba8_premul: Arc::new(rgba8_premul),
            duration: duration.max(MIN_FRAME_DURATION),
        })
    }

    /// Fully transparent frame, used when a source decodes to zero frames.
    pub fn transparent(size: FrameSize) -> FlipbookResult<Self> {
        Self::new(0, size, vec![0u8; size.rgba_len()?], STILL_FRAME_DURATION)
    }

    fn from_image_frame(index: usize, size: FrameSize, frame: image::Frame) -> FlipbookResult<Self> {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let duration = if denom == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(u64::from(numer) * 1_000_000 / u64::from(denom))
        };
        let (left, top) = (frame.left(), frame.top());
        let buffer = frame.into_buffer();

        let mut rgba = if left == 0 && top == 0 && buffer.dimensions() == (size.width, size.height)
        {
            buffer.into_raw()
        } else {
            // Sub-rectangle frame: place it onto a transparent canvas of the logical size.
            let mut canvas = image::RgbaImage::new(size.width, size.height);
            image::imageops::replace(&mut canvas, &buffer, i64::from(left), i64::from(top));
            canvas.into_raw()
        };
        premultiply_rgba8_in_place(&mut rgba);
        Self::new(index, size, rgba, duration)
    }
}

/// Immutable handle to an animated image (or decoded video) and its logical size.
#[derive(Clone, Debug)]
pub struct AnimatedSource {
    bytes: Arc<[u8]>,
    format: SourceFormat,
    size: FrameSize,
    predecoded: Option<Arc<[RasterFrame]>>,
}

impl AnimatedSource {
    /// Sniff the container and read the logical dimensions. Frames decode lazily.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> FlipbookResult<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let image_format = image::guess_format(&bytes)
            .map_err(|e| FlipbookError::decode(format!("unrecognized image container: {e}")))?;
        let format = match image_format {
            ImageFormat::Gif => SourceFormat::Gif,
            ImageFormat::Png => SourceFormat::Png,
            ImageFormat::WebP => SourceFormat::WebP,
            other => SourceFormat::Still(other),
        };

        let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes[..]), image_format)
            .into_dimensions()
            .map_err(|e| FlipbookError::decode(format!("read {} header: {e}", format.mime())))?;

        Ok(Self {
            bytes,
            format,
            size: FrameSize::new(width, height),
            predecoded: None,
        })
    }

    /// Build a source from frames that were already decoded (e.g. from a transcoded video).
    pub fn from_frames(
        bytes: impl Into<Arc<[u8]>>,
        size: FrameSize,
        frames: Vec<RasterFrame>,
    ) -> FlipbookResult<Self> {
        if let Some(bad) = frames.iter().find(|f| f.size != size) {
            return Err(FlipbookError::decode(format!(
                "frame {} is {}x{}, expected {}x{}",
                bad.index, bad.size.width, bad.size.height, size.width, size.height
            )));
        }
        Ok(Self {
            bytes: bytes.into(),
            format: SourceFormat::Video,
            size,
            predecoded: Some(frames.into()),
        })
    }

    /// Original encoded bytes.
    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    /// Detected container kind.
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Logical frame size.
    pub fn size(&self) -> FrameSize {
        self.size
    }

    /// MIME type of the original bytes.
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    /// Start a fresh, infinite frame sequence from the first frame.
    pub fn sequence(&self) -> FlipbookResult<FrameSequence> {
        if let Some(frames) = &self.predecoded {
            return Ok(FrameSequence {
                size: self.size,
                decoder: None,
                frames: frames.to_vec(),
                pos: 0,
            });
        }
        Ok(FrameSequence::decoding(self.size, self.open_decoder()?))
    }

    fn open_decoder(&self) -> FlipbookResult<FrameIter> {
        let cursor = Cursor::new(self.bytes.clone());
        let err = |e: image::ImageError| FlipbookError::decode(format!("open decoder: {e}"));
        let frames: FrameIter = match self.format {
            SourceFormat::Gif => {
                let decoder = image::codecs::gif::GifDecoder::new(cursor).map_err(err)?;
                Box::new(decoder.into_frames())
            }
            SourceFormat::Png => {
                let decoder = image::codecs::png::PngDecoder::new(cursor).map_err(err)?;
                if decoder.is_apng().map_err(err)? {
                    Box::new(decoder.apng().map_err(err)?.into_frames())
                } else {
                    self.still_frame()
                }
            }
            SourceFormat::WebP => {
                let decoder = image::codecs::webp::WebPDecoder::new(cursor).map_err(err)?;
                if decoder.has_animation() {
                    Box::new(decoder.into_frames())
                } else {
                    self.still_frame()
                }
            }
            SourceFormat::Still(_) | SourceFormat::Video => self.still_frame(),
        };
        Ok(frames)
    }

    fn still_frame(&self) -> FrameIter {
        let bytes = self.bytes.clone();
        Box::new(std::iter::once_with(move || {
            let img = image::load_from_memory(&bytes)?.to_rgba8();
            let delay = image::Delay::from_saturating_duration(STILL_FRAME_DURATION);
            Ok(image::Frame::from_parts(img, 0, 0, delay))
        }))
    }
}

/// Lazy, infinite, restartable sequence of frames.
///
/// The first pass pulls frames from the decoder and caches them; every later pass replays the
/// cache, so for an `N`-frame source element `k` and element `k + N` are the same frame.
pub struct FrameSequence {
    size: FrameSize,
    decoder: Option<FrameIter>,
    frames: Vec<RasterFrame>,
    pos: usize,
}

impl FrameSequence {
    pub(crate) fn decoding(size: FrameSize, decoder: FrameIter) -> Self {
        Self {
            size,
            decoder: Some(decoder),
            frames: Vec::new(),
            pos: 0,
        }
    }

    /// Rewind to the first frame. Frames decoded so far are reused.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    /// Number of frames decoded so far.
    pub fn decoded_len(&self) -> usize {
        self.frames.len()
    }

    /// Total duration of one loop, known once the first pass has finished.
    pub fn loop_duration(&self) -> Option<Duration> {
        if self.decoder.is_some() || self.frames.is_empty() {
            return None;
        }
        Some(self.frames.iter().map(|f| f.duration).sum())
    }
}

impl Iterator for FrameSequence {
    type Item = FlipbookResult<RasterFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos < self.frames.len() {
            let frame = self.frames[self.pos].clone();
            self.pos += 1;
            if self.decoder.is_none() && self.pos == self.frames.len() {
                self.pos = 0;
            }
            return Some(Ok(frame));
        }

        if let Some(decoder) = self.decoder.as_mut() {
            match decoder.next() {
                Some(Ok(frame)) => {
                    let index = self.frames.len();
                    return match RasterFrame::from_image_frame(index, self.size, frame) {
                        Ok(raster) => {
                            self.frames.push(raster.clone());
                            self.pos += 1;
                            Some(Ok(raster))
                        }
                        Err(e) => {
                            self.decoder = None;
                            self.pos = 0;
                            Some(Err(e))
                        }
                    };
                }
                Some(Err(e)) => {
                    self.decoder = None;
                    self.pos = 0;
                    return Some(Err(FlipbookError::decode(format!(
                        "frame {}: {e}",
                        self.frames.len()
                    ))));
                }
                None => self.decoder = None,
            }
        }

        if self.frames.is_empty() {
            match RasterFrame::transparent(self.size) {
                Ok(frame) => self.frames.push(frame),
                Err(e) => return Some(Err(e)),
            }
        }
        self.pos = 0;
        self.next()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/animated.rs"]
mod tests;
