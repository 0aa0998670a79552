use super::*;

#[test]
fn svg_escapes_markup_in_caption() {
    let svg = caption_svg(&TextLayer::new("<b>&\"x\"</b>"), FrameSize::new(100, 60));
    assert!(svg.contains("&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;"));
    assert!(!svg.contains("<b>"));
}

#[test]
fn outline_pass_precedes_fill_pass() {
    let svg = caption_svg(&TextLayer::new("hi"), FrameSize::new(120, 60));
    let stroke = svg.find("stroke=").unwrap();
    let fill = svg.find("fill=\"#4e56c0\"").unwrap();
    assert!(stroke < fill);
    assert!(svg.contains(r#"y="50""#));
    assert!(svg.contains(r#"x="60""#));
}

#[test]
fn no_outline_emits_single_text_element() {
    let mut layer = TextLayer::new("hi");
    layer.outline = None;
    let svg = caption_svg(&layer, FrameSize::new(10, 10));
    assert_eq!(svg.matches("<text").count(), 1);
}

#[test]
fn raster_matches_canvas_size() {
    let raster = TextRasterizer::new();
    let size = FrameSize::new(400, 300);
    let px = raster.rasterize(&TextLayer::new("Hello"), size).unwrap();
    assert_eq!(px.len(), size.rgba_len().unwrap());

    // Upper third stays clear whether or not fonts are installed.
    let upper = &px[..(100 * 400 * 4)];
    assert!(upper.chunks_exact(4).all(|p| p[3] == 0));

    if raster.face_count() > 0 {
        assert!(px.chunks_exact(4).any(|p| p[3] > 0));
    }
}

#[test]
fn empty_canvas_rasterizes_to_nothing() {
    let raster = TextRasterizer::new();
    let px = raster
        .rasterize(&TextLayer::new("x"), FrameSize::new(0, 10))
        .unwrap();
    assert!(px.is_empty());
}
