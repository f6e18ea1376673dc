//! Error types for CoralIngest.
//!
//! Library crates use [`CoralIngestError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all CoralIngest operations.
#[derive(Debug, thiserror::Error)]
pub enum CoralIngestError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Browser launch, CDP, or page navigation error.
    #[error("navigation error: {0}")]
    Navigation(String),

    /// Network/HTTP error outside the browser (image downloads, geocoding).
    #[error("network error: {0}")]
    Network(String),

    /// Markup parsing or field extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or media store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Geocoding provider error.
    #[error("geocode error: {0}")]
    Geocode(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CoralIngestError>;

impl CoralIngestError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
