use super::*;
use crate::assets::color::Color;

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

fn frame_from(size: FrameSize, f: impl Fn(u32, u32) -> [u8; 4]) -> RasterFrame {
    let mut px = Vec::with_capacity(size.rgba_len().unwrap());
    for y in 0..size.height {
        for x in 0..size.width {
            px.extend_from_slice(&f(x, y));
        }
    }
    RasterFrame::new(0, size, px, Duration::from_millis(100)).unwrap()
}

fn image_from(size: FrameSize, f: impl Fn(u32, u32) -> [u8; 4]) -> LayerImage {
    LayerImage::from_rgba(image::RgbaImage::from_fn(size.width, size.height, |x, y| {
        image::Rgba(f(x, y))
    }))
}

fn red_stack() -> LayerStack {
    LayerStack {
        background_fill: Some(Color::rgba(1.0, 0.0, 0.0, 1.0)),
        ..Default::default()
    }
}

#[test]
fn background_fill_shows_through_transparent_source() {
    let size = FrameSize::new(4, 4);
    // White square in the top-left quadrant, transparent elsewhere.
    let frame = frame_from(size, |x, y| if x < 2 && y < 2 { WHITE } else { [0; 4] });
    let mut canvas = Canvas::new(size).unwrap();
    let mut comp = Compositor::new(LayerImageCache::new());

    comp.composite(&mut canvas, &frame, &red_stack(), Duration::ZERO)
        .unwrap();

    assert_eq!(canvas.pixel(0, 0), Some(WHITE));
    assert_eq!(canvas.pixel(3, 3), Some(RED));
    assert_eq!(canvas.pixel(2, 0), Some(RED));
}

#[test]
fn layers_paint_in_fixed_z_order() {
    let size = FrameSize::new(4, 1);
    // Column 0: only the fill. Column 1: background image. Column 2: frame. Column 3: overlay.
    let bg = image_from(size, |x, _| if x >= 1 { GREEN } else { [0; 4] });
    let frame = frame_from(size, |x, _| if x >= 2 { BLUE } else { [0; 4] });
    let overlay = image_from(size, |x, _| if x >= 3 { WHITE } else { [0; 4] });

    let mut cache = LayerImageCache::new();
    cache.insert_ready(LayerSlot::BackgroundImage, bg);
    cache.insert_ready(LayerSlot::OverlayImage, overlay);
    let mut comp = Compositor::new(cache);
    let mut canvas = Canvas::new(size).unwrap();

    let stack = LayerStack {
        background_image: Some(PathBuf::from("bg.png")),
        overlay_image: Some(PathBuf::from("overlay.png")),
        ..red_stack()
    };
    comp.composite(&mut canvas, &frame, &stack, Duration::ZERO)
        .unwrap();

    assert_eq!(canvas.pixel(0, 0), Some(RED));
    assert_eq!(canvas.pixel(1, 0), Some(GREEN));
    assert_eq!(canvas.pixel(2, 0), Some(BLUE));
    assert_eq!(canvas.pixel(3, 0), Some(WHITE));
}

#[test]
fn composite_is_deterministic() {
    let size = FrameSize::new(8, 6);
    let frame = frame_from(size, |x, y| [(x * 20) as u8, (y * 30) as u8, 90, 200]);
    let mut cache = LayerImageCache::new();
    cache.insert_ready(
        LayerSlot::OverlayImage,
        image_from(FrameSize::new(3, 3), |x, _| [0, 0, 255, (x * 80) as u8]),
    );
    let mut comp = Compositor::new(cache);
    let stack = red_stack();
    let t = Duration::from_millis(133);

    let mut a = Canvas::new(size).unwrap();
    comp.composite(&mut a, &frame, &stack, t).unwrap();
    let first = a.snapshot();
    comp.composite(&mut a, &frame, &stack, t).unwrap();
    assert_eq!(a.snapshot(), first);

    let mut b = Canvas::new(FrameSize::new(1, 1)).unwrap();
    comp.composite(&mut b, &frame, &stack, t).unwrap();
    assert_eq!(b.snapshot(), first);
}

#[test]
fn size_change_resets_canvas() {
    let mut canvas = Canvas::new(FrameSize::new(2, 2)).unwrap();
    let mut comp = Compositor::new(LayerImageCache::new());
    let big = frame_from(FrameSize::new(2, 2), |_, _| GREEN);
    comp.composite(&mut canvas, &big, &LayerStack::default(), Duration::ZERO)
        .unwrap();

    let small = frame_from(FrameSize::new(1, 3), |_, _| [0; 4]);
    comp.composite(
        &mut canvas,
        &small,
        &LayerStack::default(),
        Duration::from_millis(33),
    )
    .unwrap();

    assert_eq!(canvas.size(), FrameSize::new(1, 3));
    assert_eq!(canvas.resets(), 1);
    assert!(canvas.data().iter().all(|&b| b == 0));
    assert_eq!(canvas.painted_at(), Some(Duration::from_millis(33)));
}

#[tokio::test]
async fn pending_image_is_skipped_until_ready() {
    let size = FrameSize::new(2, 2);
    let (tx, rx) = oneshot::channel();
    let mut cache = LayerImageCache::new();
    cache.insert_pending(LayerSlot::OverlayImage, rx);
    let mut comp = Compositor::new(cache);
    let mut canvas = Canvas::new(size).unwrap();
    let frame = frame_from(size, |_, _| BLUE);
    let stack = LayerStack::default();

    comp.composite(&mut canvas, &frame, &stack, Duration::ZERO)
        .unwrap();
    assert_eq!(canvas.pixel(0, 0), Some(BLUE));
    assert_eq!(comp.images().status(LayerSlot::OverlayImage), SlotStatus::Pending);

    tx.send(Ok(image_from(size, |_, _| GREEN))).unwrap();
    comp.composite(&mut canvas, &frame, &stack, Duration::from_millis(33))
        .unwrap();
    assert_eq!(canvas.pixel(0, 0), Some(GREEN));
    assert_eq!(comp.images().status(LayerSlot::OverlayImage), SlotStatus::Ready);
}

#[tokio::test]
async fn missing_overlay_file_is_omitted() {
    let stack = LayerStack {
        overlay_image: Some(PathBuf::from("/definitely/not/here/overlay.png")),
        ..Default::default()
    };
    let mut cache = LayerImageCache::spawn_loads(&stack);
    cache.settle(Duration::from_secs(5)).await;
    assert_eq!(cache.status(LayerSlot::OverlayImage), SlotStatus::Failed);
    assert_eq!(cache.status(LayerSlot::BackgroundImage), SlotStatus::Absent);

    let size = FrameSize::new(2, 2);
    let mut comp = Compositor::new(cache);
    let mut canvas = Canvas::new(size).unwrap();
    comp.composite(&mut canvas, &frame_from(size, |_, _| BLUE), &stack, Duration::ZERO)
        .unwrap();
    assert_eq!(canvas.pixel(1, 1), Some(BLUE));
}

#[tokio::test(start_paused = true)]
async fn settle_gives_up_after_timeout() {
    let (_tx, rx) = oneshot::channel();
    let mut cache = LayerImageCache::new();
    cache.insert_pending(LayerSlot::BackgroundImage, rx);
    cache.settle(Duration::from_millis(50)).await;
    assert!(cache.has_pending());
}

#[test]
fn caption_key_tracks_content_and_size() {
    let layer = TextLayer::new("hi");
    let a = caption_key(&layer, FrameSize::new(10, 10));
    assert_eq!(a, caption_key(&layer, FrameSize::new(10, 10)));
    assert_ne!(a, caption_key(&layer, FrameSize::new(10, 11)));
    assert_ne!(a, caption_key(&TextLayer::new("ho"), FrameSize::new(10, 10)));
}
