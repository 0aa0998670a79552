use std::io::Cursor;

use super::*;

fn png_bytes(img: image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[test]
fn decode_image_png_dimensions_and_premul() {
    let img = image::RgbaImage::from_raw(1, 1, vec![100u8, 50u8, 200u8, 128u8]).unwrap();
    let prepared = decode_image(&png_bytes(img)).unwrap();
    assert_eq!(prepared.size(), FrameSize::new(1, 1));
    assert_eq!(
        prepared.premul_scaled_to(FrameSize::new(1, 1)).unwrap(),
        vec![
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn scaling_a_solid_image_keeps_its_color() {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]));
    let prepared = LayerImage::from_rgba(img);
    let scaled = prepared.premul_scaled_to(FrameSize::new(6, 4)).unwrap();
    assert_eq!(scaled.len(), 6 * 4 * 4);
    for px in scaled.chunks_exact(4) {
        assert_eq!(px, &[0, 255, 0, 255]);
    }
}

#[test]
fn garbage_bytes_are_a_load_error() {
    let err = decode_image(b"not an image").unwrap_err();
    assert!(matches!(err, FlipbookError::Load(_)));
}

#[tokio::test]
async fn missing_file_is_a_load_error() {
    let err = load_layer_image(Path::new("/definitely/not/here/overlay.png"))
        .await
        .unwrap_err();
    assert!(matches!(err, FlipbookError::Load(_)));
}
