//! Error types for mosaicforge-tiles.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transforming a single image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The scale multiplier was zero, negative, or could not be parsed.
    #[error("invalid scale: {0}")]
    InvalidScale(String),

    /// The requested transform cannot produce any output (bad crop, empty palette, ...).
    #[error("degenerate transform: {0}")]
    TransformDegenerate(String),

    /// The palette file could not be read or contains no usable entries.
    #[error("palette error: {0}")]
    Palette(String),

    /// The source image was not found.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Image decoding or encoding failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid scale error.
    pub fn invalid_scale(message: impl Into<String>) -> Self {
        Self::InvalidScale(message.into())
    }

    /// Create a degenerate transform error.
    pub fn degenerate(message: impl Into<String>) -> Self {
        Self::TransformDegenerate(message.into())
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
