//! Error types for wordtrail-core

use thiserror::Error;

/// Main error type for the wordtrail-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A single document could not be listed or read
    #[error("document error for {path}: {message}")]
    Document { path: String, message: String },

    /// Cache layer failure (size estimation, type mismatch)
    #[error("cache error: {0}")]
    Cache(String),

    /// Invalid glob pattern for a filesystem source
    #[error("invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

impl Error {
    /// Build a per-document error.
    pub fn document(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Document {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for wordtrail-core
pub type Result<T> = std::result::Result<T, Error>;
