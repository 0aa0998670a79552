use super::*;

#[test]
fn paint_order_is_bottom_to_top() {
    assert_eq!(PAINT_ORDER[0], LayerSlot::BackgroundFill);
    assert_eq!(PAINT_ORDER[2], LayerSlot::PrimaryFrame);
    assert_eq!(PAINT_ORDER[4], LayerSlot::Text);
}

#[test]
fn blank_text_counts_as_absent() {
    let mut stack = LayerStack::default();
    assert!(!stack.has_text());
    stack.text = Some(TextLayer::new("   "));
    assert!(!stack.has_text());
    stack.text = Some(TextLayer::new("Happy birthday"));
    assert!(stack.has_text());
}

#[test]
fn text_defaults_apply_when_deserializing() {
    let stack: LayerStack = serde_json::from_str(
        r##"{ "background_fill": "#ff0000", "text": { "text": "hi" } }"##,
    )
    .unwrap();
    let text = stack.text.unwrap();
    assert_eq!(text.font_size, 80.0);
    assert_eq!(text.fill.to_hex_rgb(), "#4e56c0");
    assert_eq!(text.outline, Some(Color::WHITE));
    assert_eq!(stack.background_fill.unwrap().to_rgba8(), [255, 0, 0, 255]);
}

#[test]
fn unknown_fields_are_rejected() {
    let res: Result<LayerStack, _> = serde_json::from_str(r#"{ "foreground": "x" }"#);
    assert!(res.is_err());
}

#[test]
fn image_path_only_for_image_slots() {
    let stack = LayerStack {
        overlay_image: Some(PathBuf::from("frame.png")),
        ..Default::default()
    };
    assert_eq!(
        stack.image_path(LayerSlot::OverlayImage),
        Some(&PathBuf::from("frame.png"))
    );
    assert_eq!(stack.image_path(LayerSlot::Text), None);
}
