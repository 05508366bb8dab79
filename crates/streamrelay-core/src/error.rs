//! Error types for `streamrelay` core library.

use thiserror::Error;

/// Result type alias using `streamrelay` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `streamrelay` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown audio encoding identifier
    #[error("Unknown audio encoding: {0}")]
    UnknownEncoding(String),

    /// Wire message could not be decoded
    #[error("Invalid wire message: {0}")]
    InvalidMessage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
