use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::export::png::ExportQuality;
use crate::foundation::core::Rgb;
use crate::foundation::error::{QrLogoError, QrLogoResult};
use crate::qr::encoder::EcLevel;
use crate::render::logo::{DEFAULT_LOGO_FRACTION, MAX_LOGO_FRACTION, validate_logo_fraction};
use crate::render::raster::MarginPolicy;

/// Session-wide configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionOpts {
    /// Smallest accepted output edge in pixels.
    pub min_size: u32,
    /// Largest accepted output edge in pixels.
    pub max_size: u32,
    /// Logo footprint as a share of the output edge.
    pub logo_fraction: f64,
    /// Quiet zone bands.
    pub margin: MarginPolicy,
    /// PNG encoder effort.
    pub export_quality: ExportQuality,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            min_size: 128,
            max_size: 4096,
            logo_fraction: DEFAULT_LOGO_FRACTION,
            margin: MarginPolicy::default(),
            export_quality: ExportQuality::Best,
        }
    }
}

impl SessionOpts {
    /// Check internal consistency.
    pub fn validate(&self) -> QrLogoResult<()> {
        if self.min_size == 0 {
            return Err(QrLogoError::validation("min_size must be > 0"));
        }
        if self.min_size > self.max_size {
            return Err(QrLogoError::validation("min_size must be <= max_size"));
        }
        if self.max_size > u32::from(u16::MAX) {
            return Err(QrLogoError::validation(format!(
                "max_size must be <= {}",
                u16::MAX
            )));
        }
        if !self.logo_fraction.is_finite()
            || self.logo_fraction <= 0.0
            || self.logo_fraction > MAX_LOGO_FRACTION
        {
            return Err(QrLogoError::validation(format!(
                "logo_fraction must be in (0, {MAX_LOGO_FRACTION}]"
            )));
        }
        Ok(())
    }

    /// Load and validate options from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> QrLogoResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open options '{}'", path.display()))?;
        let opts: Self = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| QrLogoError::validation(format!("parse options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Clamp `size` into `[min_size, max_size]`.
    pub fn clamp_size(&self, size: u32) -> u32 {
        size.clamp(self.min_size, self.max_size)
    }
}

/// Parameters of one generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationRequest {
    /// Text (usually a URL) to encode. Must be non-empty.
    pub text: String,
    /// Output edge in pixels.
    pub size: u32,
    /// Color of dark modules.
    pub dark_color: Rgb,
    /// Color of light modules, the quiet zone and the logo backing.
    pub light_color: Rgb,
    /// Error-correction level.
    pub ec_level: EcLevel,
    /// Raw logo bytes in any format `image` can decode.
    #[serde(skip)]
    pub logo: Option<Arc<Vec<u8>>>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            size: 450,
            dark_color: Rgb::new(0xE8, 0x58, 0xF4),
            light_color: Rgb::WHITE,
            ec_level: EcLevel::H,
            logo: None,
        }
    }
}

impl GenerationRequest {
    /// Request for `text` with default styling.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Reject requests that must not reach the pipeline.
    pub fn validate(&self, opts: &SessionOpts) -> QrLogoResult<()> {
        if self.text.is_empty() {
            return Err(QrLogoError::validation("text must not be empty"));
        }
        if self.size < opts.min_size || self.size > opts.max_size {
            return Err(QrLogoError::validation(format!(
                "size {} outside [{}, {}]",
                self.size, opts.min_size, opts.max_size
            )));
        }
        if self.logo.is_some() {
            validate_logo_fraction(opts.logo_fraction, self.ec_level)?;
        }
        Ok(())
    }

    /// Load a request from JSON.
    ///
    /// The file may carry a `logo` path, resolved relative to the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> QrLogoResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open request '{}'", path.display()))?;
        let mut value: serde_json::Value = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| QrLogoError::validation(format!("parse request JSON: {e}")))?;

        let logo = match value.as_object_mut().and_then(|o| o.remove("logo")) {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(rel)) => Some(PathBuf::from(rel)),
            Some(_) => return Err(QrLogoError::validation("request 'logo' must be a path")),
        };
        let mut request: Self = serde_json::from_value(value)
            .map_err(|e| QrLogoError::validation(format!("invalid request: {e}")))?;

        if let Some(logo) = logo {
            let root = path.parent().unwrap_or_else(|| Path::new("."));
            request.logo = Some(Arc::new(read_logo_file(&root.join(logo))?));
        }
        Ok(request)
    }
}

pub(crate) fn read_logo_file(path: &Path) -> QrLogoResult<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read logo '{}'", path.display()))?;
    Ok(bytes)
}

#[cfg(test)]
#[path = "../../tests/unit/session/request.rs"]
mod tests;
