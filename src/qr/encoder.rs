use serde::{Deserialize, Serialize};

use crate::foundation::error::{QrLogoError, QrLogoResult};

/// QR error-correction level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EcLevel {
    /// ~7% recoverable.
    L,
    /// ~15% recoverable.
    M,
    /// ~25% recoverable.
    Q,
    /// ~30% recoverable. Default, since a logo may occlude part of the symbol.
    #[default]
    H,
}

impl EcLevel {
    /// Approximate share of symbol area that can be damaged and still decode.
    pub fn recoverable_fraction(self) -> f64 {
        match self {
            Self::L => 0.07,
            Self::M => 0.15,
            Self::Q => 0.25,
            Self::H => 0.30,
        }
    }

    fn to_qrcode(self) -> qrcode::EcLevel {
        match self {
            Self::L => qrcode::EcLevel::L,
            Self::M => qrcode::EcLevel::M,
            Self::Q => qrcode::EcLevel::Q,
            Self::H => qrcode::EcLevel::H,
        }
    }
}

/// Square grid of dark (`true`) / light (`false`) modules, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleMatrix {
    dimension: usize,
    modules: Vec<bool>,
}

impl ModuleMatrix {
    /// Build a matrix from row-major modules. `modules.len()` must be `dimension²`.
    pub fn from_modules(dimension: usize, modules: Vec<bool>) -> QrLogoResult<Self> {
        if dimension == 0 {
            return Err(QrLogoError::validation("module matrix must be non-empty"));
        }
        if dimension.checked_mul(dimension) != Some(modules.len()) {
            return Err(QrLogoError::validation(format!(
                "module matrix expects {dimension}x{dimension} modules, got {}",
                modules.len()
            )));
        }
        Ok(Self { dimension, modules })
    }

    /// Modules per side.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether the module at column `x`, row `y` is dark. Out-of-range reads are light.
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        if x >= self.dimension || y >= self.dimension {
            return false;
        }
        self.modules[y * self.dimension + x]
    }
}

/// Text-to-matrix service consumed by the pipeline.
pub trait MatrixEncoder: Send + Sync {
    /// Encode `text` at `ec_level`. Fails with [`QrLogoError::EncodingCapacity`] when the data
    /// does not fit the largest symbol.
    fn encode(&self, text: &str, ec_level: EcLevel) -> QrLogoResult<ModuleMatrix>;
}

/// [`MatrixEncoder`] backed by the `qrcode` crate (smallest fitting version, automatic mask).
#[derive(Clone, Copy, Debug, Default)]
pub struct QrcodeEncoder;

impl MatrixEncoder for QrcodeEncoder {
    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    fn encode(&self, text: &str, ec_level: EcLevel) -> QrLogoResult<ModuleMatrix> {
        let level = ec_level.to_qrcode();
        let code = qrcode::QrCode::with_error_correction_level(text.as_bytes(), level)
            .map_err(|e| match e {
                qrcode::types::QrError::DataTooLong => QrLogoError::encoding_capacity(format!(
                    "{} bytes do not fit a QR symbol at level {ec_level:?}",
                    text.len()
                )),
                other => QrLogoError::encoding_capacity(other.to_string()),
            })?;

        let dimension = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        tracing::debug!(dimension, "encoded module matrix");
        ModuleMatrix::from_modules(dimension, modules)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/qr/encoder.rs"]
mod tests;
