use image::ImageEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use serde::{Deserialize, Serialize};

use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::render::surface::RenderSurface;

/// Output container. Only PNG is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless PNG.
    #[default]
    Png,
}

impl ExportFormat {
    /// MIME type of the encoded bytes.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }
}

/// Encoder effort. PNG is lossless at every setting; higher effort yields smaller files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportQuality {
    /// Maximum compression.
    #[default]
    Best,
    /// Encoder default.
    Default,
    /// Fastest encode.
    Fast,
}

/// Serialized image, not yet published to a blob store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Container format.
    pub format: ExportFormat,
}

/// Serialize `surface` into `format`.
#[tracing::instrument(skip(surface), fields(width = surface.width, height = surface.height))]
pub fn export(
    surface: &RenderSurface,
    format: ExportFormat,
    quality: ExportQuality,
) -> QrLogoResult<EncodedImage> {
    let straight = surface.to_straight_rgba8();
    let mut bytes = Vec::new();
    match format {
        ExportFormat::Png => {
            let compression = match quality {
                ExportQuality::Best => CompressionType::Best,
                ExportQuality::Default => CompressionType::Default,
                ExportQuality::Fast => CompressionType::Fast,
            };
            PngEncoder::new_with_quality(&mut bytes, compression, FilterType::Adaptive)
                .write_image(
                    &straight,
                    surface.width,
                    surface.height,
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| QrLogoError::encoding(format!("png encode failed: {e}")))?;
        }
    }

    if bytes.is_empty() {
        return Err(QrLogoError::encoding("encoder produced no data"));
    }
    tracing::debug!(bytes = bytes.len(), "surface exported");
    Ok(EncodedImage {
        bytes,
        width: surface.width,
        height: surface.height,
        format,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/export/png.rs"]
mod tests;
