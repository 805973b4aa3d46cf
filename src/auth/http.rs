//! Auth backend over the HTTP client adapter
//!
//! Credential exchanges go out anonymously. Token verification goes out as
//! a normal authenticated request, so a rejected token takes the adapter's
//! 401 teardown path.

use super::{AuthBackend, AuthBackendError, AuthResponse, LoginRequest, RegisterRequest};
use crate::http::{ApiClient, HttpError, Method, RequestOptions};
use crate::session::Principal;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Exchanges credentials with `/auth/login` and `/auth/register`, and
/// checks the stored token against `/auth/me`
pub struct HttpAuthBackend {
    api: Arc<ApiClient>,
}

impl HttpAuthBackend {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    async fn exchange<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthResponse, AuthBackendError> {
        let body = serde_json::to_value(body)
            .map_err(|e| AuthBackendError::InvalidInput(e.to_string()))?;

        self.api
            .request(Method::Post, path, Some(body), RequestOptions::anonymous())
            .await
            .map_err(map_error)
    }
}

fn server_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

fn map_error(err: HttpError) -> AuthBackendError {
    match err {
        HttpError::Status { status, body } => match status {
            401 | 403 => AuthBackendError::InvalidCredentials,
            409 => AuthBackendError::EmailInUse,
            400 | 422 => AuthBackendError::InvalidInput(server_message(&body)),
            _ => AuthBackendError::Unavailable(format!("HTTP {}: {}", status, server_message(&body))),
        },
        HttpError::SessionEnded => AuthBackendError::InvalidCredentials,
        other => AuthBackendError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthBackendError> {
        self.exchange("/auth/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthBackendError> {
        self.exchange("/auth/register", request).await
    }

    /// The adapter sends the token held in storage, which is the token of
    /// the current session
    async fn verify(&self, _token: &str) -> Result<Principal, AuthBackendError> {
        self.api.get("/auth/me").await.map_err(map_error)
    }
}
