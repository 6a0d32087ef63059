//! Error types for sitegraph.
//!
//! Library crates use [`SiteGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Conditions that merely mean "nothing to do" (empty content, unsupported
//! language, no relationships in a sentence) are not errors and never show up here.

use std::path::PathBuf;

/// Top-level error type for all sitegraph operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteGraphError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during crawl.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid URL, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A content blob could not be decoded as text.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Tagging service failure (unreachable, timeout, malformed response).
    #[error("tagging error: {0}")]
    Tagging(String),

    /// A relationship referenced a node label that is not in the graph store.
    #[error("missing endpoint node for relationship {from} -> {to}")]
    MissingEndpoint { from: String, to: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteGraphError>;

impl SiteGraphError {
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

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
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

    /// Whether a retry of the same call could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Tagging(_))
    }
}
