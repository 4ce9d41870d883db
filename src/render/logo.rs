use image::imageops::FilterType;
use kurbo::Shape;

use crate::assets::decode::DecodedLogo;
use crate::foundation::core::Rgb;
use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::qr::encoder::EcLevel;
use crate::render::composite::over_region;
use crate::render::surface::RenderSurface;

/// Upper bound on the logo footprint as a share of the surface edge.
pub const MAX_LOGO_FRACTION: f64 = 0.30;

/// Default logo footprint (450px -> 68px).
pub const DEFAULT_LOGO_FRACTION: f64 = 0.15;

/// Check a footprint fraction against the hard bound and against what `ec_level` can recover.
///
/// The occluded share of the symbol is `fraction²` (footprint box over surface area).
pub fn validate_logo_fraction(fraction: f64, ec_level: EcLevel) -> QrLogoResult<()> {
    if !fraction.is_finite() || fraction <= 0.0 || fraction > MAX_LOGO_FRACTION {
        return Err(QrLogoError::validation(format!(
            "logo fraction must be in (0, {MAX_LOGO_FRACTION}], got {fraction}"
        )));
    }
    let occluded = fraction * fraction;
    if occluded > ec_level.recoverable_fraction() {
        return Err(QrLogoError::validation(format!(
            "logo fraction {fraction} occludes {:.1}% of the symbol, level {ec_level:?} \
             recovers at most {:.0}%",
            occluded * 100.0,
            ec_level.recoverable_fraction() * 100.0
        )));
    }
    Ok(())
}

/// Edge length of the logo footprint in pixels.
pub fn footprint_diameter(size: u32, fraction: f64) -> u32 {
    ((f64::from(size) * fraction).round() as u32).clamp(1, size.max(1))
}

/// Draw a filled `background` circle and the logo, both centered on `surface`.
#[tracing::instrument(skip(surface, logo), fields(logo_w = logo.width, logo_h = logo.height))]
pub(crate) fn overlay(
    surface: &mut RenderSurface,
    logo: DecodedLogo,
    background: Rgb,
    fraction: f64,
) -> QrLogoResult<()> {
    let size = surface.width.min(surface.height);
    let d = footprint_diameter(size, fraction);
    let x0 = (surface.width - d) / 2;
    let y0 = (surface.height - d) / 2;

    let backing = circle_backing(d, background)?;
    over_region(surface, &backing, d, d, x0, y0)?;

    let (lw, lh) = fit_within(logo.width, logo.height, d);
    let scaled = image::imageops::resize(&logo.into_image()?, lw, lh, FilterType::Lanczos3);
    let mut scaled = scaled.into_raw();
    clamp_premul_in_place(&mut scaled);
    over_region(
        surface,
        &scaled,
        lw,
        lh,
        x0 + (d - lw) / 2,
        y0 + (d - lh) / 2,
    )?;

    tracing::debug!(diameter = d, x0, y0, "logo composited");
    Ok(())
}

/// Anti-aliased disc of diameter `d`, as a `d × d` premultiplied RGBA8 buffer.
fn circle_backing(d: u32, color: Rgb) -> QrLogoResult<Vec<u8>> {
    let side: u16 = d
        .try_into()
        .map_err(|_| QrLogoError::invalid_dimension("logo footprint exceeds u16"))?;

    let r = f64::from(d) / 2.0;
    let circle = kurbo::Circle::new((r, r), r);
    let mut path = vello_cpu::kurbo::BezPath::new();
    for el in circle.path_elements(0.1) {
        path.push(el);
    }

    let mut ctx = vello_cpu::RenderContext::new(side, side);
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        color.r, color.g, color.b, 255,
    ));
    ctx.fill_path(&path);
    ctx.flush();

    let mut pixmap = vello_cpu::Pixmap::new(side, side);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(pixmap.data_as_u8_slice().to_vec())
}

/// Largest `(w, h)` with the source aspect ratio that fits in `d × d`.
fn fit_within(w: u32, h: u32, d: u32) -> (u32, u32) {
    let scale = f64::from(d) / f64::from(w.max(h).max(1));
    let fw = ((f64::from(w) * scale).round() as u32).clamp(1, d);
    let fh = ((f64::from(h) * scale).round() as u32).clamp(1, d);
    (fw, fh)
}

// Lanczos ringing can push a color channel above alpha, which is not valid premultiplied data.
fn clamp_premul_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3];
        for c in &mut px[..3] {
            *c = (*c).min(a);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/logo.rs"]
mod tests;
