//! Provider error type.

use fxbar_core::StreamError;
use thiserror::Error;

/// Failure raised by the Dukascopy retrieval pipeline.
///
/// Invalid-argument and state messages are preformatted so diagnostics carry
/// the offending instants and fields verbatim. The HTTP variant embeds the
/// status code in its message, which is what the retry policy's
/// rate-limited-marker match keys on.
#[derive(Error, Debug)]
pub enum DukascopyError {
    /// Caller supplied an invalid request; never retried.
    #[error("{0}")]
    InvalidArgument(String),

    /// An internal invariant was violated.
    #[error("{0}")]
    State(String),

    /// The vendor answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Object store operation failed for a reason other than a missing key.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core stream or aggregation failure.
    #[error(transparent)]
    Stream(StreamError),
}

impl DukascopyError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        DukascopyError::InvalidArgument(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        DukascopyError::State(message.into())
    }
}

impl From<StreamError> for DukascopyError {
    fn from(error: StreamError) -> Self {
        // Keep exact invalid-argument / state messages visible at this level.
        match error {
            StreamError::InvalidArgument(message) => DukascopyError::InvalidArgument(message),
            StreamError::State(message) => DukascopyError::State(message),
            other => DukascopyError::Stream(other),
        }
    }
}
