use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::render::surface::RenderSurface;

pub(crate) type PremulRgba8 = [u8; 4];

/// Premultiplied source-over.
pub(crate) fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        out[i] = add_sat_u8(src[i], mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Source-over a `src_w × src_h` premultiplied buffer onto `dst` with its top-left at
/// `(x0, y0)`. Parts falling outside the surface are clipped.
pub(crate) fn over_region(
    dst: &mut RenderSurface,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    x0: u32,
    y0: u32,
) -> QrLogoResult<()> {
    let expected = (src_w as usize)
        .checked_mul(src_h as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| QrLogoError::invalid_dimension("composite buffer size overflow"))?;
    if src.len() != expected {
        return Err(QrLogoError::invalid_dimension(
            "over_region expects src matching src_w*src_h*4",
        ));
    }

    let w = src_w.min(dst.width.saturating_sub(x0));
    let h = src_h.min(dst.height.saturating_sub(y0));
    for y in 0..h {
        for x in 0..w {
            let si = ((y as usize) * (src_w as usize) + (x as usize)) * 4;
            let s = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let di = dst.index(x0 + x, y0 + y);
            let d = [
                dst.data[di],
                dst.data[di + 1],
                dst.data[di + 2],
                dst.data[di + 3],
            ];
            dst.data[di..di + 4].copy_from_slice(&over(d, s));
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
