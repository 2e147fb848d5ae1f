//! Chat pipeline errors

use std::time::Duration;

use thiserror::Error;

/// Failures while opening or reading a chat/speech response stream
#[derive(Debug, Error)]
pub enum ChatError {
    /// The HTTP client failed (connect, send, or body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// No response headers arrived within the configured limit
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The turn was interrupted by the caller
    #[error("request cancelled")]
    Cancelled,

    /// The byte stream itself reported a failure
    #[error("stream failed: {0}")]
    Stream(String),
}

impl ChatError {
    /// Whether this error came from a deliberate interruption
    ///
    /// Cancellations never roll back history and never show a failure notice.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
