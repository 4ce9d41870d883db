/// Result alias used across qrlogo.
pub type QrLogoResult<T> = Result<T, QrLogoError>;

/// Error taxonomy for request validation and the generation pipeline.
#[derive(thiserror::Error, Debug)]
pub enum QrLogoError {
    /// Request rejected before any pipeline stage ran.
    #[error("validation error: {0}")]
    Validation(String),

    /// Text does not fit a QR symbol at the requested error-correction level.
    #[error("encoding capacity error: {0}")]
    EncodingCapacity(String),

    /// Output size too small for the module grid.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// Logo bytes could not be decoded as an image.
    #[error("logo decode error: {0}")]
    LogoDecode(String),

    /// Surface serialization failed or produced no data.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A generation is already in flight on this session.
    #[error("a generation is already in progress")]
    Busy,

    /// Underlying I/O or third-party failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QrLogoError {
    /// Build a [`QrLogoError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`QrLogoError::EncodingCapacity`].
    pub fn encoding_capacity(msg: impl Into<String>) -> Self {
        Self::EncodingCapacity(msg.into())
    }

    /// Build a [`QrLogoError::InvalidDimension`].
    pub fn invalid_dimension(msg: impl Into<String>) -> Self {
        Self::InvalidDimension(msg.into())
    }

    /// Build a [`QrLogoError::LogoDecode`].
    pub fn logo_decode(msg: impl Into<String>) -> Self {
        Self::LogoDecode(msg.into())
    }

    /// Build a [`QrLogoError::Encoding`].
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
