//! Authentication Backends
//!
//! The session store delegates the credential exchange to an
//! [`AuthBackend`]:
//!
//! - **MockAuthService**: in-process accounts with simulated latency
//! - **HttpAuthBackend**: `/auth/login`, `/auth/register` and `/auth/me`
//!   over the HTTP client adapter

mod http;
mod mock;

pub use http::HttpAuthBackend;
pub use mock::{MockAuthService, DEMO_EMAIL, DEMO_PASSWORD};

use crate::session::Principal;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Credentials for a login exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Data for a registration exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Successful exchange result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Principal,
    pub token: String,
}

/// Performs the credential exchange for the session store
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Short name for log lines
    fn name(&self) -> &str;

    /// Exchange credentials for a principal and token
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthBackendError>;

    /// Create a principal and return it with a token
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthBackendError>;

    /// Principal owning `token`. `InvalidCredentials` means the server no
    /// longer accepts it.
    async fn verify(&self, _token: &str) -> Result<Principal, AuthBackendError> {
        Err(AuthBackendError::Unavailable(format!(
            "{} backend cannot verify tokens",
            self.name()
        )))
    }
}

/// Errors that can occur during a credential exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthBackendError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already in use")]
    EmailInUse,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Auth service unavailable: {0}")]
    Unavailable(String),
}
