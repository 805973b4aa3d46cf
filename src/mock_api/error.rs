//! Mock API Error Types
//!
//! Errors returned by handlers, rendered as `{"error": "<message>"}` with a
//! matching status code.

use crate::auth::AuthBackendError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MockApiError {
    /// Missing, unknown or rejected credentials
    #[error("{0}")]
    Unauthorized(String),

    /// Email already registered
    #[error("{0}")]
    Conflict(String),

    /// Request body failed validation
    #[error("{0}")]
    Validation(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<AuthBackendError> for MockApiError {
    fn from(err: AuthBackendError) -> Self {
        match err {
            AuthBackendError::InvalidCredentials => MockApiError::Unauthorized(err.to_string()),
            AuthBackendError::EmailInUse => MockApiError::Conflict(err.to_string()),
            AuthBackendError::InvalidInput(reason) => MockApiError::Validation(reason),
            AuthBackendError::Unavailable(reason) => MockApiError::ServiceUnavailable(reason),
        }
    }
}

impl From<JsonRejection> for MockApiError {
    fn from(rejection: JsonRejection) -> Self {
        MockApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for MockApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            MockApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            MockApiError::Conflict(_) => StatusCode::CONFLICT,
            MockApiError::Validation(_) => StatusCode::BAD_REQUEST,
            MockApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MockApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Mock API error");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for handlers
pub type MockApiResult<T> = Result<T, MockApiError>;
