use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use crate::foundation::core::FrameSize;
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::render::layers::TextLayer;

const FONT_FAMILY: &str = "Arial, Helvetica, sans-serif";

/// Rasterizes caption layers through `usvg`/`resvg`.
///
/// The system font database is loaded on first use and shared afterwards.
#[derive(Default)]
pub struct TextRasterizer {
    fontdb: OnceLock<Arc<usvg::fontdb::Database>>,
}

impl TextRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn fontdb(&self) -> Arc<usvg::fontdb::Database> {
        self.fontdb
            .get_or_init(|| {
                let mut db = usvg::fontdb::Database::new();
                db.load_system_fonts();
                tracing::debug!(faces = db.len(), "loaded system fonts");
                Arc::new(db)
            })
            .clone()
    }

    /// Number of font faces available for captions.
    pub fn face_count(&self) -> usize {
        self.fontdb().len()
    }

    /// Premultiplied RGBA8 raster of `layer` at canvas `size`.
    ///
    /// The caption is centered horizontally and vertically centered on `height * 5 / 6`. The
    /// outline pass is painted first, then the fill pass on top.
    #[tracing::instrument(level = "debug", skip_all, fields(chars = layer.text.chars().count()))]
    pub fn rasterize(&self, layer: &TextLayer, size: FrameSize) -> FlipbookResult<Vec<u8>> {
        if size.is_empty() {
            return Ok(Vec::new());
        }
        let svg = caption_svg(layer, size);
        let opts = usvg::Options {
            fontdb: self.fontdb(),
            font_resolver: caption_font_resolver(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| FlipbookError::Other(anyhow::anyhow!("parse caption svg: {e}")))?;

        let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width, size.height)
            .ok_or_else(|| FlipbookError::validation("failed to allocate caption pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::identity(),
            &mut pixmap.as_mut(),
        );
        Ok(pixmap.take())
    }
}

fn caption_svg(layer: &TextLayer, size: FrameSize) -> String {
    let (w, h) = (size.width, size.height);
    let cx = f64::from(w) / 2.0;
    let cy = f64::from(h) * 5.0 / 6.0;
    let font_size = if layer.font_size.is_finite() && layer.font_size > 0.0 {
        layer.font_size
    } else {
        80.0
    };
    let text = escape_xml(&layer.text);
    let common = format!(
        r#"x="{cx}" y="{cy}" font-family="{FONT_FAMILY}" font-weight="bold" font-size="{font_size}" text-anchor="middle" dominant-baseline="middle""#
    );

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    if let Some(outline) = layer.outline
        && layer.outline_width > 0.0
        && layer.outline_width.is_finite()
    {
        let _ = write!(
            svg,
            r#"<text {common} fill="none" stroke="{}" stroke-opacity="{}" stroke-width="{}" stroke-linejoin="round">{text}</text>"#,
            outline.to_hex_rgb(),
            outline.a.clamp(0.0, 1.0),
            layer.outline_width,
        );
    }
    let _ = write!(
        svg,
        r#"<text {common} fill="{}" fill-opacity="{}">{text}</text></svg>"#,
        layer.fill.to_hex_rgb(),
        layer.fill.a.clamp(0.0, 1.0),
    );
    svg
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn caption_font_resolver() -> usvg::FontResolver<'static> {
    use usvg::FontResolver;

    FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<usvg::fontdb::Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(s) => usvg::fontdb::Family::Name(s),
                });
            }
            families.push(usvg::fontdb::Family::SansSerif);

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style: usvg::fontdb::Style::Normal,
            };
            if let Some(id) = fontdb.query(&query) {
                return Some(id);
            }
            // Fall back to the first installed face.
            fontdb.faces().next().map(|f| f.id)
        }),
        select_fallback: FontResolver::default_fallback_selector(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
