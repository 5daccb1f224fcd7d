//! Error types module.
//!
//! This module defines the error types used throughout the blockcheck crate.
//! It uses `thiserror` for structured error handling and provides
//! a custom `Result` type alias for convenience.
//!
//! Two families live here:
//! - [`Error`] covers failures outside of probing (loading files, building
//!   clients). These abort whatever operation produced them.
//! - [`ProbeError`] is the per-domain cause attached to a probe result. It never
//!   aborts a run; it travels alongside an `Error` status.

use serde::Serialize;
use thiserror::Error;

/// A specialized `Result` type for blockcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for blockcheck.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (reading domain lists, category files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (domain lists, category config, JSON output)
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// DNS resolver construction error
    #[error("DNS resolver error: {0}")]
    Resolver(#[from] trust_dns_resolver::error::ResolveError),

    /// HTTP client construction error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error (invalid config, unsupported file type)
    #[error("Config error: {0}")]
    Config(String),

    /// Parse error (invalid input format, malformed data)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create a new configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new parse error with a message.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Cause attached to a probe result whose status is `Error`
/// (or `Blocked`, when an HTTP probe was interrupted by cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    /// The domain was rejected before any I/O.
    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    /// The run was cancelled before the probe could finish.
    #[error("probe cancelled")]
    Cancelled,

    /// A single attempt exceeded its deadline.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The DNS or HTTP request failed to complete.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProbeError {
    /// Create a new transport error from anything printable.
    #[must_use]
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Whether this cause came from cancellation of the run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_error_display() {
        assert_eq!(
            ProbeError::InvalidDomain("a b".into()).to_string(),
            "invalid domain: a b"
        );
        assert_eq!(ProbeError::Timeout(5000).to_string(), "timed out after 5000 ms");
        assert!(ProbeError::Cancelled.is_cancelled());
        assert!(!ProbeError::transport("refused").is_cancelled());
    }

    #[test]
    fn test_probe_error_serialize() {
        let json = serde_json::to_string(&ProbeError::transport("refused")).unwrap();
        assert_eq!(json, r#"{"kind":"transport","detail":"refused"}"#);
    }
}
