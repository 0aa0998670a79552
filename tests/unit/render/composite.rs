use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_alpha_0_is_noop() {
    let dst = [10, 20, 30, 40];
    let src = [255, 255, 255, 0];
    assert_eq!(over(dst, src, 1.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_half_alpha_blends() {
    let dst = [0, 0, 255, 255];
    let src = [128, 0, 0, 128];
    let out = over(dst, src, 1.0);
    assert_eq!(out[3], 255);
    assert_eq!(out[0], 128);
    assert_eq!(out[2], 127);
}

#[test]
fn over_in_place_rejects_length_mismatch() {
    let mut dst = vec![0u8; 8];
    assert!(over_in_place(&mut dst, &[0u8; 4], 1.0).is_err());
}

#[test]
fn fill_over_covers_every_pixel() {
    let mut dst = vec![0u8; 4 * 6];
    fill_over_in_place(&mut dst, Rgba8Premul::from_straight_rgba(255, 0, 0, 255));
    assert!(dst.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
}

#[test]
fn fill_with_transparent_color_is_noop() {
    let mut dst = vec![7u8; 8];
    fill_over_in_place(&mut dst, Rgba8Premul::transparent());
    assert_eq!(dst, vec![7u8; 8]);
}

#[test]
fn blit_clips_to_destination() {
    let dst_size = FrameSize::new(3, 3);
    let mut dst = vec![0u8; 36];
    let src_size = FrameSize::new(2, 2);
    let src = [0u8, 255, 0, 255].repeat(4);

    blit_over_at(&mut dst, dst_size, &src, src_size, 2, 2).unwrap();

    let px = |x: usize, y: usize| &dst[(y * 3 + x) * 4..(y * 3 + x) * 4 + 4];
    assert_eq!(px(2, 2), [0, 255, 0, 255]);
    assert_eq!(px(1, 1), [0, 0, 0, 0]);
    assert_eq!(px(2, 1), [0, 0, 0, 0]);
}

#[test]
fn blit_fully_outside_is_noop() {
    let mut dst = vec![0u8; 16];
    let src = vec![255u8; 16];
    blit_over_at(
        &mut dst,
        FrameSize::new(2, 2),
        &src,
        FrameSize::new(2, 2),
        -5,
        0,
    )
    .unwrap();
    assert!(dst.iter().all(|&b| b == 0));
}
