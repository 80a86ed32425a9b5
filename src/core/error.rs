//! Error types for the photo store
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Main error type for the photo store
#[derive(Error, Debug)]
pub enum StoreError {
    /// A file could not be opened, read, or stat'ed while fingerprinting
    #[error("Failed to read '{path}': {message}")]
    ReadError { path: String, message: String },

    /// The metadata cache could not be serialized or written
    #[error("Cache error: {0}")]
    CacheError(String),

    /// An output tree directory could not be created
    #[error("Failed to prepare output directory '{path}': {message}")]
    TreeError { path: String, message: String },

    /// No output directory was configured
    #[error("No output directory specified. Use --output or set [output].directory in the config file.")]
    MissingOutputDirectory,

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err.to_string())
    }
}

impl StoreError {
    /// Build a `ReadError` for `path` from any displayable cause
    pub fn read(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        StoreError::ReadError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
