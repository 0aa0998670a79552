use crate::foundation::core::{FrameSize, Rgba8Premul};
use crate::foundation::error::{FlipbookError, FlipbookResult};
use crate::foundation::math::mul_div255_u8;

pub type PremulRgba8 = [u8; 4];

/// Source-over for one premultiplied pixel, with an extra layer opacity.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// Composite `src` over `dst`; both are full-canvas premultiplied buffers.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> FlipbookResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(FlipbookError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 255 && opacity >= 1.0 {
            d.copy_from_slice(s);
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Composite a solid color over every pixel of `dst`.
pub fn fill_over_in_place(dst: &mut [u8], color: Rgba8Premul) {
    let src = color.to_array();
    if src[3] == 0 {
        return;
    }
    for d in dst.chunks_exact_mut(4) {
        let out = over([d[0], d[1], d[2], d[3]], src, 1.0);
        d.copy_from_slice(&out);
    }
}

/// Composite an image of `src_size` over `dst` with its top-left corner at `(x, y)`.
///
/// Pixels falling outside the destination are clipped.
pub fn blit_over_at(
    dst: &mut [u8],
    dst_size: FrameSize,
    src: &[u8],
    src_size: FrameSize,
    x: i64,
    y: i64,
) -> FlipbookResult<()> {
    if dst.len() != dst_size.rgba_len()? || src.len() != src_size.rgba_len()? {
        return Err(FlipbookError::validation(
            "blit_over_at expects buffers matching width*height*4",
        ));
    }
    if dst_size == src_size && x == 0 && y == 0 {
        return over_in_place(dst, src, 1.0);
    }

    let dw = i64::from(dst_size.width);
    let dh = i64::from(dst_size.height);
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + i64::from(src_size.width)).min(dw);
    let y1 = (y + i64::from(src_size.height)).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let src_stride = src_size.width as usize * 4;
    let dst_stride = dst_size.width as usize * 4;
    let span = (x1 - x0) as usize * 4;
    for dy in y0..y1 {
        let sy = (dy - y) as usize;
        let sx = (x0 - x) as usize;
        let s_off = sy * src_stride + sx * 4;
        let d_off = dy as usize * dst_stride + x0 as usize * 4;
        over_in_place(
            &mut dst[d_off..d_off + span],
            &src[s_off..s_off + span],
            1.0,
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
