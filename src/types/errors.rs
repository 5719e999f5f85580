//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Pipeline runs never surface these to the
//! caller; failures inside a run are recorded on the run itself.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for contentflow.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid definitions or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown agent, pipeline or run.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unreadable or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An executor declined to run an agent before producing any run record.
    #[error("agent rejected input: {0}")]
    Rejected(String),

    /// Cooperative cancellation was observed.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_message() {
        let err = Error::rejected("missing topic");
        assert_eq!(err.to_string(), "agent rejected input: missing topic");

        let err = Error::not_found("agent writer");
        assert_eq!(err.to_string(), "not found: agent writer");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
