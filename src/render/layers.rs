use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assets::color::Color;

/// Paint slots of a composite frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerSlot {
    BackgroundFill,
    BackgroundImage,
    PrimaryFrame,
    OverlayImage,
    Text,
}

/// Bottom-to-top paint order. Never reordered at runtime.
pub const PAINT_ORDER: [LayerSlot; 5] = [
    LayerSlot::BackgroundFill,
    LayerSlot::BackgroundImage,
    LayerSlot::PrimaryFrame,
    LayerSlot::OverlayImage,
    LayerSlot::Text,
];

/// Fixed-slot layer configuration. Only presence and content change; the order never does.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerStack {
    /// Solid color painted under everything.
    pub background_fill: Option<Color>,
    /// Image stretched to the canvas under the animation.
    pub background_image: Option<PathBuf>,
    /// Image stretched to the canvas over the animation.
    pub overlay_image: Option<PathBuf>,
    /// Caption painted last.
    pub text: Option<TextLayer>,
}

impl LayerStack {
    /// Return `true` when a non-blank caption will be painted.
    pub fn has_text(&self) -> bool {
        self.text.as_ref().is_some_and(|t| !t.text.trim().is_empty())
    }

    /// Image path configured for an image slot.
    pub fn image_path(&self, slot: LayerSlot) -> Option<&PathBuf> {
        match slot {
            LayerSlot::BackgroundImage => self.background_image.as_ref(),
            LayerSlot::OverlayImage => self.overlay_image.as_ref(),
            _ => None,
        }
    }
}

fn default_font_size() -> f32 {
    80.0
}

fn default_fill() -> Color {
    Color::rgba(78.0 / 255.0, 86.0 / 255.0, 192.0 / 255.0, 1.0)
}

fn default_outline() -> Option<Color> {
    Some(Color::WHITE)
}

fn default_outline_width() -> f32 {
    8.0
}

/// Caption layer. Font family and weight are fixed; size and colors are configurable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextLayer {
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_fill")]
    pub fill: Color,
    #[serde(default = "default_outline")]
    pub outline: Option<Color>,
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,
}

impl TextLayer {
    /// Caption with the default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size: default_font_size(),
            fill: default_fill(),
            outline: default_outline(),
            outline_width: default_outline_width(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/layers.rs"]
mod tests;
