//! Error types for the forwarded IP manager
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for fwdip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the forwarded IP manager
#[derive(Error, Debug)]
pub enum Error {
    /// Network backend errors (interface enumeration, address changes)
    #[error("Network backend error: {0}")]
    Backend(String),

    /// Ledger store errors
    #[error("Ledger store error: {0}")]
    Ledger(String),

    /// Metadata retrieval or decoding errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a network backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a ledger store error
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Create a metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether this error means "no such record" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_distinct() {
        assert!(Error::not_found("42:01:0a:80:00:02").is_not_found());
        assert!(!Error::ledger("disk full").is_not_found());
    }

    #[test]
    fn test_display_names_the_concern() {
        assert_eq!(
            Error::backend("ip exited 2").to_string(),
            "Network backend error: ip exited 2"
        );
        let err: Error = anyhow::anyhow!("wrapped").into();
        assert_eq!(err.to_string(), "wrapped");
    }
}
