//! Error handling for the request client and the event-stream pipeline.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::ApiError;

/// The main result type used throughout the crate.
pub type TransportResult<T> = Result<T, TransportError>;

/// Error codes carried in the `error.code` field of an [`Envelope`](crate::Envelope).
///
/// Codes the client produces itself have dedicated variants; anything the
/// server sends that is not one of them is kept verbatim in
/// [`ErrorCode::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    /// Transport failure before any response was received.
    NetworkError,
    /// HTTP 401 or a business-level equivalent.
    Unauthorized,
    /// A response body could not be parsed into the required shape.
    InvalidFormat,
    /// The operation was cancelled by the caller.
    Cancelled,
    /// A non-2xx status without a server-supplied code.
    Unknown,
    /// Any other server-supplied code.
    Other(String),
}

impl ErrorCode {
    /// The wire representation of this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::Other(code) => code,
        }
    }

    /// Returns true for codes that should trigger session invalidation.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "NETWORK_ERROR" => Self::NetworkError,
            "UNAUTHORIZED" => Self::Unauthorized,
            "INVALID_FORMAT" => Self::InvalidFormat,
            "CANCELLED" => Self::Cancelled,
            "UNKNOWN" => Self::Unknown,
            _ => Self::Other(code),
        }
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::from(code.to_string())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::Other(code) => code,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the transport layer.
///
/// Single-shot requests fold these into an [`Envelope`](crate::Envelope);
/// streaming attempts raise them to the reconnection supervisor, which is the
/// only place that decides whether to retry.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, reset, TLS...).
    #[error("Network error: {message}")]
    Network { message: String },

    /// Non-2xx status when opening a stream.
    #[error("Unexpected HTTP status {status}: {body}")]
    Status {
        status: http::StatusCode,
        body: String,
    },

    /// Fault while reading an already-open stream.
    #[error("Stream read error: {message}")]
    Stream { message: String },

    /// The stream contained invalid UTF-8.
    #[error("Invalid UTF-8 in event stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Timeout errors.
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The reconnection budget of a subscription ran out.
    #[error("Gave up after {attempts} attempts (last seq {last_seq:?}): {source}")]
    RetriesExhausted {
        attempts: u32,
        last_seq: Option<u64>,
        #[source]
        source: Box<TransportError>,
    },
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network {
            message: e.to_string(),
        }
    }
}

impl TransportError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an unexpected-status error.
    pub fn status(status: http::StatusCode, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }

    /// Create a stream read error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// The wire error code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network { .. } | Self::Stream { .. } | Self::Timeout { .. } => {
                ErrorCode::NetworkError
            }
            Self::Status { status, .. } if *status == http::StatusCode::UNAUTHORIZED => {
                ErrorCode::Unauthorized
            }
            Self::Status { .. } | Self::Config { .. } => ErrorCode::Unknown,
            Self::Utf8(_) | Self::Serialization(_) => ErrorCode::InvalidFormat,
            Self::RetriesExhausted { source, .. } => source.code(),
        }
    }

    /// Fold this error into the `{code, message}` shape used by envelopes.
    pub fn to_api_error(&self) -> ApiError {
        ApiError::new(self.code(), self.to_string())
    }

    /// The error that ended the last attempt, unwrapping retry exhaustion.
    pub fn root(&self) -> &TransportError {
        match self {
            Self::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}
