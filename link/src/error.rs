//! Error types for columnar-link.
//!
//! Configuration and validation errors are raised before any network
//! activity. Transport, decode, cancellation and timeout errors are returned
//! through the call's future or the result stream.

use thiserror::Error;

/// Errors produced by the client, its connection and its result streams.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Invalid client configuration (bad URL, unsupported scheme, zero timeout...)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Insert values do not fit the requested format
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Transport failure (connection refused, TLS, broken body stream)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The server answered with a non-success status
    #[error("Server error ({status_code}): {message}")]
    ServerError {
        status_code: u16,
        /// Server-side error code (e.g. `60`), when the body carried one
        code: Option<String>,
        /// Server-side error type (e.g. `UNKNOWN_TABLE`)
        error_type: Option<String>,
        message: String,
    },

    /// A record in a streamed result could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    /// The call's cancellation token fired
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// No progress within the configured request timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// The connection has been closed with `close()`
    #[error("Connection closed")]
    ConnectionClosed,

    /// The response stream has already been read
    #[error("Stream has been already consumed")]
    StreamConsumed,
}

impl LinkError {
    /// True for errors caused by the caller aborting or the client giving up,
    /// as opposed to a rejection by the server.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::TimeoutError(_))
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        Self::CompressionError(err.to_string())
    }
}

/// Result type for columnar-link operations
pub type Result<T> = std::result::Result<T, LinkError>;
