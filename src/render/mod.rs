pub(crate) mod composite;
/// Circular logo overlay.
pub mod logo;
/// Module matrix rasterization.
pub mod raster;
/// Pixel surfaces.
pub mod surface;
