//! Error types for model loading and texture resolution.
//!
//! [`LoadError`] is what callers of [`crate::cache::ModelCache::load`] see. It only
//! carries the two fatal cases; everything else that can go wrong while building a
//! model degrades to a placeholder and is reported through [`TextureError`] in the log.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal failures of a model load. Nothing is published to the cache when one of these is returned.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The scene file does not exist on disk.
    #[error("model file does not exist: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The importer could not produce a scene, or the scene graph is malformed.
    #[error("failed to load model {}: {source:#}", path.display())]
    ParseFailure {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl LoadError {
    pub(crate) fn parse(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        LoadError::ParseFailure {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable texture failures. These never leave the resolver; each one turns into
/// the checker placeholder and a warning.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("unsupported embedded texture *{index} with format '{hint}', re-export as PNG/JPEG")]
    UnsupportedEmbeddedFormat { index: usize, hint: String },

    #[error("embedded reference '{reference}' out of range ({available} embedded textures)")]
    EmbeddedIndexOutOfRange { reference: String, available: usize },

    #[error("texture not found: '{requested}' in {}", root.display())]
    ExternalTextureNotFound { requested: String, root: PathBuf },

    #[error("failed to decode image: {source}")]
    ImageDecodeFailure {
        #[from]
        source: image::ImageError,
    },

    #[error("raw pixel data too short: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },
}
