use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::assets::decode::{LayerImage, load_layer_image};
use crate::foundation::core::FrameSize;
use crate::foundation::error::FlipbookResult;
use crate::foundation::math::Fnv1a64;
use crate::render::canvas::Canvas;
use crate::render::composite::{blit_over_at, fill_over_in_place, over_in_place};
use crate::render::layers::{LayerSlot, LayerStack, PAINT_ORDER, TextLayer};
use crate::render::text::TextRasterizer;
use crate::source::animated::RasterFrame;

type PendingImage = oneshot::Receiver<FlipbookResult<LayerImage>>;

enum SlotImage {
    Pending(PendingImage),
    Ready {
        image: LayerImage,
        scaled: Option<(FrameSize, Arc<Vec<u8>>)>,
    },
    Failed,
}

/// Load state of an image slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotStatus {
    Absent,
    Pending,
    Ready,
    Failed,
}

/// Decoded background/overlay images, loaded once per session.
#[derive(Default)]
pub struct LayerImageCache {
    slots: HashMap<LayerSlot, SlotImage>,
}

impl LayerImageCache {
    /// Empty cache; every image slot reads as absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start loading every image slot of `stack` on the runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_loads(stack: &LayerStack) -> Self {
        let mut cache = Self::new();
        for slot in [LayerSlot::BackgroundImage, LayerSlot::OverlayImage] {
            if let Some(path) = stack.image_path(slot) {
                cache.insert_pending(slot, spawn_load(path.clone()));
            }
        }
        cache
    }

    /// Register an image that is still loading.
    pub fn insert_pending(&mut self, slot: LayerSlot, rx: PendingImage) {
        self.slots.insert(slot, SlotImage::Pending(rx));
    }

    /// Register an already decoded image.
    pub fn insert_ready(&mut self, slot: LayerSlot, image: LayerImage) {
        self.slots.insert(
            slot,
            SlotImage::Ready {
                image,
                scaled: None,
            },
        );
    }

    /// Current load state of `slot`.
    pub fn status(&self, slot: LayerSlot) -> SlotStatus {
        match self.slots.get(&slot) {
            None => SlotStatus::Absent,
            Some(SlotImage::Pending(_)) => SlotStatus::Pending,
            Some(SlotImage::Ready { .. }) => SlotStatus::Ready,
            Some(SlotImage::Failed) => SlotStatus::Failed,
        }
    }

    /// Return `true` while at least one image is still loading.
    pub fn has_pending(&self) -> bool {
        self.slots
            .values()
            .any(|s| matches!(s, SlotImage::Pending(_)))
    }

    /// Pick up loads that completed since the last call without waiting.
    pub fn poll(&mut self) {
        for (slot, state) in self.slots.iter_mut() {
            let SlotImage::Pending(rx) = state else {
                continue;
            };
            match rx.try_recv() {
                Ok(res) => *state = resolve(*slot, res),
                Err(oneshot::error::TryRecvError::Empty) => {}
                Err(oneshot::error::TryRecvError::Closed) => {
                    tracing::warn!(?slot, "layer image loader went away; omitting layer");
                    *state = SlotImage::Failed;
                }
            }
        }
    }

    /// Wait up to `timeout` for pending loads. Loads still running afterwards stay pending and are
    /// picked up by later ticks.
    pub async fn settle(&mut self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        for (slot, state) in self.slots.iter_mut() {
            let SlotImage::Pending(rx) = state else {
                continue;
            };
            match tokio::time::timeout_at(deadline, &mut *rx).await {
                Ok(Ok(res)) => *state = resolve(*slot, res),
                Ok(Err(_)) => {
                    tracing::warn!(?slot, "layer image loader went away; omitting layer");
                    *state = SlotImage::Failed;
                }
                Err(_) => tracing::debug!(?slot, "layer image still loading"),
            }
        }
    }

    fn scaled(&mut self, slot: LayerSlot, size: FrameSize) -> FlipbookResult<Option<Arc<Vec<u8>>>> {
        let Some(SlotImage::Ready { image, scaled }) = self.slots.get_mut(&slot) else {
            return Ok(None);
        };
        if let Some((cached_size, px)) = scaled
            && *cached_size == size
        {
            return Ok(Some(px.clone()));
        }
        let px = Arc::new(image.premul_scaled_to(size)?);
        *scaled = Some((size, px.clone()));
        Ok(Some(px))
    }
}

fn spawn_load(path: PathBuf) -> PendingImage {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let res = load_layer_image(&path).await;
        let _ = tx.send(res);
    });
    rx
}

fn resolve(slot: LayerSlot, res: FlipbookResult<LayerImage>) -> SlotImage {
    match res {
        Ok(image) => {
            tracing::debug!(?slot, size = ?image.size(), "layer image ready");
            SlotImage::Ready {
                image,
                scaled: None,
            }
        }
        Err(err) => {
            tracing::warn!(?slot, error = %err, "layer image failed to load; omitting layer");
            SlotImage::Failed
        }
    }
}

/// Paints one composite frame per call onto a caller-owned [`Canvas`].
///
/// Holds only cached decoded layer images and caption rasters between calls.
pub struct Compositor {
    images: LayerImageCache,
    text: TextRasterizer,
    caption: Option<(u64, Arc<Vec<u8>>)>,
}

impl Compositor {
    pub fn new(images: LayerImageCache) -> Self {
        Self {
            images,
            text: TextRasterizer::new(),
            caption: None,
        }
    }

    pub fn images(&self) -> &LayerImageCache {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut LayerImageCache {
        &mut self.images
    }

    /// Paint `frame` and every present layer of `stack` onto `canvas`, stamped with `time`.
    ///
    /// The canvas follows the frame's size. Image layers that are still loading are skipped for
    /// this call only.
    pub fn composite(
        &mut self,
        canvas: &mut Canvas,
        frame: &RasterFrame,
        stack: &LayerStack,
        time: Duration,
    ) -> FlipbookResult<()> {
        if canvas.resize(frame.size)? {
            tracing::debug!(
                width = frame.size.width,
                height = frame.size.height,
                "canvas reset for new frame size"
            );
        }
        self.images.poll();
        canvas.clear();
        let size = canvas.size();

        for slot in PAINT_ORDER {
            match slot {
                LayerSlot::BackgroundFill => {
                    if let Some(color) = stack.background_fill {
                        fill_over_in_place(canvas.data_mut(), color.to_rgba8_premul());
                    }
                }
                LayerSlot::BackgroundImage | LayerSlot::OverlayImage => {
                    if let Some(px) = self.images.scaled(slot, size)? {
                        over_in_place(canvas.data_mut(), &px, 1.0)?;
                    }
                }
                LayerSlot::PrimaryFrame => {
                    blit_over_at(
                        canvas.data_mut(),
                        size,
                        &frame.rgba8_premul,
                        frame.size,
                        0,
                        0,
                    )?;
                }
                LayerSlot::Text => {
                    if let Some(layer) = stack.text.as_ref().filter(|_| stack.has_text()) {
                        let px = self.caption_raster(layer, size)?;
                        over_in_place(canvas.data_mut(), &px, 1.0)?;
                    }
                }
            }
        }

        canvas.stamp(time);
        Ok(())
    }

    fn caption_raster(&mut self, layer: &TextLayer, size: FrameSize) -> FlipbookResult<Arc<Vec<u8>>> {
        let key = caption_key(layer, size);
        if let Some((cached, px)) = &self.caption
            && *cached == key
        {
            return Ok(px.clone());
        }
        let px = Arc::new(self.text.rasterize(layer, size)?);
        self.caption = Some((key, px.clone()));
        Ok(px)
    }
}

fn caption_key(layer: &TextLayer, size: FrameSize) -> u64 {
    let mut h = Fnv1a64::new_default();
    h.write_u32(size.width);
    h.write_u32(size.height);
    h.write_bytes(layer.text.as_bytes());
    h.write_u8(0);
    h.write_u32(layer.font_size.to_bits());
    h.write_bytes(&layer.fill.to_rgba8());
    match layer.outline {
        Some(c) => {
            h.write_u8(1);
            h.write_bytes(&c.to_rgba8());
        }
        None => h.write_u8(0),
    }
    h.write_u32(layer.outline_width.to_bits());
    h.finish()
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
