//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = IntervecError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, IO, or
/// pipeline execution.
#[derive(Debug, Error)]
pub enum IntervecError {
    /// Training or phrase configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A token file could not be decoded in either the streaming or the
    /// legacy whole-document encoding.
    #[error("malformed token file {path:?}: {source}")]
    Decode {
        /// Staged token file that failed both decode strategies.
        path: PathBuf,
        /// Parse error from the whole-document fallback.
        source: serde_json::Error,
    },
    /// Cancellation was observed at a suspension point.
    #[error("interrupted while {0}")]
    Interrupted(&'static str),
    /// Error bubbled up from the `zip` container layer.
    #[error("archive error: {0}")]
    Archive(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for IntervecError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive(err.to_string())
    }
}

impl From<serde_json::Error> for IntervecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl IntervecError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Returns `true` when the error was caused by an observed cancellation.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}
