//! Session error types

use crate::auth::AuthBackendError;
use thiserror::Error;

/// Errors surfaced by session mutators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Credentials rejected or the exchange could not complete
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Email already registered or invalid registration input
    #[error("Registration failed: {0}")]
    Registration(String),

    /// A newer login/register attempt (or a logout) started before this one
    /// finished; its result was discarded
    #[error("Superseded by a newer authentication attempt")]
    Superseded,
}

impl SessionError {
    pub(crate) fn from_login(err: AuthBackendError) -> Self {
        match err {
            AuthBackendError::InvalidCredentials => {
                SessionError::Authentication("Invalid email or password".to_string())
            }
            other => SessionError::Authentication(other.to_string()),
        }
    }

    pub(crate) fn from_register(err: AuthBackendError) -> Self {
        match err {
            AuthBackendError::EmailInUse => {
                SessionError::Registration("Email already in use".to_string())
            }
            AuthBackendError::InvalidInput(reason) => SessionError::Registration(reason),
            other => SessionError::Registration(other.to_string()),
        }
    }
}
