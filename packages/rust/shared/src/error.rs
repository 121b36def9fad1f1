//! Error types for Ladle.
//!
//! Library crates use [`LadleError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::ReadSource;

/// One failed attempt to read a reference from a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    /// The source that was tried.
    pub read_source: ReadSource,
    /// Why it did not produce content.
    pub reason: String,
}

impl fmt::Display for FetchAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.read_source, self.reason)
    }
}

fn format_attempts(attempts: &[FetchAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level error type for all Ladle operations.
#[derive(Debug, thiserror::Error)]
pub enum LadleError {
    /// Malformed configuration or policy. Fatal when detected at run start.
    #[error("config error: {message}")]
    Config { message: String },

    /// Every configured read source failed for a reference.
    #[error("fetch failed for {location} [{page_type}]: {}", format_attempts(.attempts))]
    Fetch {
        location: String,
        page_type: String,
        attempts: Vec<FetchAttempt>,
    },

    /// A fetch exceeded the per-item time limit.
    #[error("fetch timed out for {location} after {limit:?}")]
    Timeout { location: String, limit: Duration },

    /// A parser rejected raw content.
    #[error("parse error for {location}: {message}")]
    Parse { location: String, message: String },

    /// No parser is registered for the page type.
    #[error("no parser registered for page_type '{page_type}'")]
    Unregistered { page_type: String },

    /// A transformer rejected structured content.
    #[error("transform error: {message}")]
    Transform { message: String },

    /// A caching write could not complete.
    #[error("store write failed at {path:?}: {source}")]
    StoreWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Content store misuse or corrupt entry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Network/HTTP error during live retrieval.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LadleError>;

impl LadleError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for the content at `location`.
    pub fn parse(location: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: msg.into(),
        }
    }

    /// Create a transform error from any displayable message.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
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

    /// Wrap a failed store write.
    pub fn store_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreWrite {
            path: path.into(),
            source,
        }
    }
}
