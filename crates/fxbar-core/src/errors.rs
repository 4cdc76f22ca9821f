//! Core error types shared by streams, aggregation and JSON codecs.

use thiserror::Error;

/// Failure surfaced while composing or consuming model streams.
///
/// Invalid-argument and state messages are preformatted by the caller so that
/// user-visible diagnostics carry the offending fields verbatim.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Caller supplied an invalid request; never retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// An internal invariant was violated; likely a bug upstream.
    #[error("{0}")]
    State(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StreamError {
    /// Invalid-argument error carrying a caller-built message.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StreamError::InvalidArgument(message.into())
    }

    /// State error carrying a caller-built message.
    pub fn state(message: impl Into<String>) -> Self {
        StreamError::State(message.into())
    }
}
