//! Error types for SdgScan.
//!
//! Library crates use [`SdgScanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Errors fall into two scopes. Request-scoped errors (`Validation`,
//! `QuotaExceeded`, `CapabilityUnavailable`, `Config`) abort a batch when they
//! are raised before its first item is sent. Item-scoped errors (`Transport`,
//! `MalformedOutput`) belong to the single issue that produced them; see
//! [`SdgScanError::is_item_scoped`]. After a batch has started, every error is
//! recorded against its item, and a request-scoped one is logged as an error.

use std::path::PathBuf;

/// Top-level error type for all SdgScan operations.
#[derive(Debug, thiserror::Error)]
pub enum SdgScanError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The request itself is unusable (e.g. nothing to analyze).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Too many issue entries in one request.
    #[error("too many entries: {count} submitted, at most {max} allowed")]
    QuotaExceeded { count: usize, max: usize },

    /// The generation capability cannot be used at all (missing credential).
    #[error("generation capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A single call to the generation capability failed.
    #[error("transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// The model answered, but not with a usable analysis.
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SdgScanError>;

impl SdgScanError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a transport error; `retryable` marks transient failures.
    pub fn transport(msg: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            message: msg.into(),
            retryable,
        }
    }

    /// Create a malformed-output error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOutput(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }

    /// Whether this error belongs to one batch item rather than the request.
    pub fn is_item_scoped(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::MalformedOutput(_))
    }
}
