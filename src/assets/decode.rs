use std::path::Path;
use std::sync::Arc;

use crate::foundation::core::FrameSize;
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// Decoded static image used by background and overlay layers.
///
/// Pixels stay straight-alpha so they can be resampled before premultiplication.
#[derive(Clone, Debug)]
pub struct LayerImage {
    rgba: Arc<image::RgbaImage>,
}

impl LayerImage {
    /// Wrap an already decoded straight-alpha image.
    pub fn from_rgba(rgba: image::RgbaImage) -> Self {
        Self {
            rgba: Arc::new(rgba),
        }
    }

    /// Natural size of the image.
    pub fn size(&self) -> FrameSize {
        let (width, height) = self.rgba.dimensions();
        FrameSize::new(width, height)
    }

    /// Premultiplied RGBA8 pixels stretched to `size`.
    pub fn premul_scaled_to(&self, size: FrameSize) -> FlipbookResult<Vec<u8>> {
        if size.is_empty() {
            return Ok(Vec::new());
        }
        let mut data = if self.size() == size {
            self.rgba.as_raw().clone()
        } else {
            image::imageops::resize(
                self.rgba.as_ref(),
                size.width,
                size.height,
                image::imageops::FilterType::Triangle,
            )
            .into_raw()
        };
        if data.len() != size.rgba_len()? {
            return Err(FlipbookError::load("resampled layer image has unexpected length"));
        }
        premultiply_rgba8_in_place(&mut data);
        Ok(data)
    }
}

/// Decode a static layer image from memory.
pub fn decode_image(bytes: &[u8]) -> FlipbookResult<LayerImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| FlipbookError::load(format!("decode image from memory: {e}")))?;
    Ok(LayerImage::from_rgba(dyn_img.to_rgba8()))
}

/// Read and decode a layer image without blocking the paint task.
#[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_layer_image(path: &Path) -> FlipbookResult<LayerImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FlipbookError::load(format!("read '{}': {e}", path.display())))?;
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| FlipbookError::load(format!("image decode task failed: {e}")))?
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
