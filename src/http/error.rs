//! HTTP adapter error types

use thiserror::Error;

/// Failures of the underlying request function
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

/// Errors surfaced to callers of the HTTP client adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Non-2xx response other than a session-ending 401
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server rejected the session token; the session was torn down
    #[error("Request aborted: session ended")]
    SessionEnded,

    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    /// 2xx response whose body did not match the expected type
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Request body could not be serialized
    #[error("Invalid request body: {0}")]
    Encode(String),
}

impl HttpError {
    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::SessionEnded => Some(401),
            _ => None,
        }
    }
}

impl From<TransportError> for HttpError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => HttpError::Timeout,
            TransportError::Network(msg) => HttpError::Network(msg),
        }
    }
}
