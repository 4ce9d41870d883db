use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb;
use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::qr::encoder::ModuleMatrix;
use crate::render::surface::RenderSurface;

/// One quiet-zone band: outputs up to `max_size` pixels get `margin` modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginBand {
    /// Inclusive upper bound of the band, in pixels.
    pub max_size: u32,
    /// Quiet zone width in modules.
    pub margin: u32,
}

/// Size-dependent quiet zone. A size falls in the tightest band whose `max_size` covers it; sizes
/// above every band get `fallback`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginPolicy {
    /// Bands, in any order.
    pub bands: Vec<MarginBand>,
    /// Margin for sizes above the last band.
    pub fallback: u32,
}

impl Default for MarginPolicy {
    fn default() -> Self {
        Self {
            bands: vec![
                MarginBand {
                    max_size: 300,
                    margin: 1,
                },
                MarginBand {
                    max_size: 500,
                    margin: 2,
                },
            ],
            fallback: 3,
        }
    }
}

impl MarginPolicy {
    /// Quiet zone in modules for an output of `size` pixels.
    pub fn margin_for_size(&self, size: u32) -> u32 {
        self.bands
            .iter()
            .filter(|b| size <= b.max_size)
            .min_by_key(|b| b.max_size)
            .map_or(self.fallback, |b| b.margin)
    }
}

/// Pixel geometry of a rasterized symbol.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterLayout {
    /// Output edge length in pixels.
    pub size: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    /// Matrix modules per side.
    pub dimension: u32,
    /// Pixels per module (may be fractional).
    pub scale: f64,
}

impl RasterLayout {
    /// Compute the layout, failing when a module would be narrower than one pixel.
    pub fn new(dimension: usize, size: u32, margin: u32) -> QrLogoResult<Self> {
        let dimension = u32::try_from(dimension)
            .map_err(|_| QrLogoError::invalid_dimension("module matrix too large"))?;
        let total = dimension
            .checked_add(margin.saturating_mul(2))
            .ok_or_else(|| QrLogoError::invalid_dimension("margin too large"))?;
        if size == 0 || total == 0 {
            return Err(QrLogoError::invalid_dimension("size must be > 0"));
        }
        if size < total {
            return Err(QrLogoError::invalid_dimension(format!(
                "{size}px cannot hold {dimension} modules plus a {margin}-module margin \
                 (needs at least {total}px)"
            )));
        }
        Ok(Self {
            size,
            margin,
            dimension,
            scale: f64::from(size) / f64::from(total),
        })
    }

    /// Module coordinate covering pixel index `p`, or `None` inside the quiet zone.
    fn module_at(&self, p: u32) -> Option<usize> {
        let total = u64::from(self.dimension) + 2 * u64::from(self.margin);
        let cell = (u64::from(p) * total / u64::from(self.size))
            .checked_sub(u64::from(self.margin))?;
        if cell >= u64::from(self.dimension) {
            return None;
        }
        usize::try_from(cell).ok()
    }
}

/// Paint `matrix` onto a fresh `size × size` surface.
#[tracing::instrument(skip(matrix), fields(dimension = matrix.dimension()))]
pub fn render(
    matrix: &ModuleMatrix,
    size: u32,
    margin: u32,
    dark: Rgb,
    light: Rgb,
) -> QrLogoResult<RenderSurface> {
    let layout = RasterLayout::new(matrix.dimension(), size, margin)?;
    let mut surface = RenderSurface::filled(size, size, light.to_rgba8_premul())?;
    let dark_px = dark.to_rgba8_premul().to_array();

    // Pixel -> module lookups are identical for rows and columns.
    let cells: Vec<Option<usize>> = (0..size).map(|p| layout.module_at(p)).collect();

    for (y, row) in cells.iter().enumerate() {
        let Some(my) = row else { continue };
        for (x, col) in cells.iter().enumerate() {
            let Some(mx) = col else { continue };
            if matrix.is_dark(*mx, *my) {
                let i = (y * size as usize + x) * 4;
                surface.data[i..i + 4].copy_from_slice(&dark_px);
            }
        }
    }

    tracing::debug!(scale = layout.scale, "rasterized");
    Ok(surface)
}

#[cfg(test)]
#[path = "../../tests/unit/render/raster.rs"]
mod tests;
