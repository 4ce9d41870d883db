//! qrlogo renders QR codes with a centered circular logo and hands them out as revocable blobs.
//!
//! The public API is session-oriented:
//!
//! - Configure a [`Session`] with [`SessionOpts`]
//! - Edit the [`GenerationRequest`] through the session setters
//! - Call [`Session::generate`] and read the image through the returned [`ExportHandle`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;
mod qr;

/// Encoded image serialization and blob handles.
pub mod export;
/// Rasterization and logo compositing.
pub mod render;
/// Session-oriented generation API.
pub mod session;

pub use crate::foundation::core::{Rgb, Rgba8Premul};
pub use crate::foundation::error::{QrLogoError, QrLogoResult};

pub use crate::export::blob::{BlobStore, ExportHandle};
pub use crate::export::png::{EncodedImage, ExportFormat, ExportQuality};
pub use crate::qr::encoder::{EcLevel, MatrixEncoder, ModuleMatrix, QrcodeEncoder};
pub use crate::render::raster::{MarginBand, MarginPolicy, RasterLayout};
pub use crate::render::surface::RenderSurface;
pub use crate::session::request::{GenerationRequest, SessionOpts};
pub use crate::session::state::{PipelineStage, Session, SessionPhase, SharedSession};
