use super::*;

#[test]
fn resize_to_same_size_is_noop() {
    let mut canvas = Canvas::new(FrameSize::new(2, 2)).unwrap();
    canvas.data_mut()[0] = 9;
    assert!(!canvas.resize(FrameSize::new(2, 2)).unwrap());
    assert_eq!(canvas.data()[0], 9);
    assert_eq!(canvas.resets(), 0);
}

#[test]
fn resize_drops_old_pixels() {
    let mut canvas = Canvas::new(FrameSize::new(2, 2)).unwrap();
    canvas.data_mut().fill(200);
    canvas.stamp(Duration::from_millis(5));

    assert!(canvas.resize(FrameSize::new(3, 1)).unwrap());
    assert_eq!(canvas.data().len(), 12);
    assert!(canvas.data().iter().all(|&b| b == 0));
    assert_eq!(canvas.painted_at(), None);
    assert_eq!(canvas.resets(), 1);
}

#[test]
fn snapshot_is_detached_from_canvas() {
    let mut canvas = Canvas::new(FrameSize::new(1, 1)).unwrap();
    canvas.data_mut().copy_from_slice(&[10, 20, 30, 255]);
    canvas.stamp(Duration::from_millis(40));
    let snap = canvas.snapshot();
    canvas.clear();

    assert_eq!(snap.pixel(0, 0), Some([10, 20, 30, 255]));
    assert_eq!(snap.painted_at, Duration::from_millis(40));
    assert_eq!(canvas.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(canvas.pixel(1, 0), None);
}

#[test]
fn straight_copy_unpremultiplies() {
    let frame = CompositeFrame {
        size: FrameSize::new(1, 1),
        rgba8_premul: vec![64, 0, 0, 128],
        painted_at: Duration::ZERO,
    };
    assert_eq!(frame.to_straight_rgba8(), vec![128, 0, 0, 128]);
}
