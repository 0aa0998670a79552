//! Flipbook composites animated drawings with static layers and exports them as video.
//!
//! An animated image (GIF, APNG, WebP or a still) produced by an external animation service is
//! played back frame by frame, painted onto an off-screen canvas together with optional layers, and
//! sampled by a capture sink that encodes the stream as it is painted.
//!
//! # Pipeline overview
//!
//! 1. **Source**: `AnimatedSource -> FrameSequence` (lazy, looping, timed raster frames)
//! 2. **Composite**: `RasterFrame + LayerStack -> Canvas` (fixed paint order, premultiplied RGBA8)
//! 3. **Capture**: `Canvas -> StreamEncoder` (own sample clock, system `ffmpeg` or in-process GIF)
//! 4. **Export**: `ExportSession` drives the paint loop for a fixed window and yields an
//!    [`ExportArtifact`] behind a ledger-tracked [`ObjectUrl`]
//!
//! The optional transcode bridge re-encodes a source through `ffmpeg` and decodes it back into
//! frames before compositing.
#![forbid(unsafe_code)]

mod assets;
mod capture;
mod export;
mod foundation;
mod remote;
mod render;
mod source;
mod transcode;

pub use assets::color::Color;
pub use assets::decode::{LayerImage, decode_image, load_layer_image};
pub use capture::encoder::{
    CapturedFrame, CapturedFrames, EncodedStream, InMemoryEncoder, StreamConfig, StreamEncoder,
};
pub use capture::ffmpeg::{FfmpegStreamEncoder, VideoContainer, is_ffmpeg_available};
pub use capture::gif::GifStreamEncoder;
pub use capture::sink::{CaptureHandle, CaptureSettings, CaptureSink};
pub use export::artifact::{ExportArtifact, suggest_file_name, unix_millis};
pub use export::config::{ExportConfig, ExportFormat, OutputPlan};
pub use export::ledger::{ObjectUrl, ResourceLedger, StreamTrack};
pub use export::session::{ExportController, ExportSession, SessionFailure, SessionState};
pub use export::ticker::{CancelToken, PaintTicker};
pub use foundation::core::{Fps, FrameSize, RecordingWindow, Rgba8Premul};
pub use foundation::error::{ErrorKind, FlipbookError, FlipbookResult};
pub use remote::animate::{AnimateClient, AnimateResponse};
pub use render::canvas::{Canvas, CompositeFrame};
pub use render::composite::{PremulRgba8, blit_over_at, fill_over_in_place, over, over_in_place};
pub use render::compositor::{Compositor, LayerImageCache, SlotStatus};
pub use render::layers::{LayerSlot, LayerStack, PAINT_ORDER, TextLayer};
pub use render::text::TextRasterizer;
pub use source::animated::{
    AnimatedSource, FrameSequence, MIN_FRAME_DURATION, RasterFrame, STILL_FRAME_DURATION,
    SourceFormat,
};
pub use source::player::FramePlayer;
pub use transcode::bridge::{
    PixelFormat, TranscodeOptions, VideoInfo, decode_video_frames, probe_video,
    transcode_to_video,
};
pub use transcode::engine::{CodecEngine, EngineInfo};
