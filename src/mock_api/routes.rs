//! Mock API Routes
//!
//! - POST /auth/login - Exchange credentials for a token
//! - POST /auth/register - Create an account and log it in
//! - GET /auth/me - Principal owning the bearer token
//! - GET /health - Liveness and account count

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AuthBackend, AuthResponse, LoginRequest, RegisterRequest};
use crate::mock_api::error::{MockApiError, MockApiResult};
use crate::mock_api::state::AppState;
use crate::session::Principal;
use crate::validation;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub accounts: usize,
    pub uptime_seconds: u64,
    pub version: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> MockApiResult<Json<AuthResponse>> {
    let Json(req) = payload?;

    let response = state.auth.login(&req).await?;
    tracing::info!(principal_id = %response.user.id, "Login accepted");

    Ok(Json(response))
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> MockApiResult<(StatusCode, Json<AuthResponse>)> {
    let Json(req) = payload?;
    validate_register_request(&req)?;

    let response = state.auth.register(&req).await?;
    tracing::info!(principal_id = %response.user.id, "Account registered");

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> MockApiResult<Json<Principal>> {
    let token = bearer_token(&headers)
        .ok_or_else(|| MockApiError::Unauthorized("Missing bearer token".to_string()))?;

    state
        .auth
        .verify_token(token)
        .map(Json)
        .ok_or_else(|| MockApiError::Unauthorized("Invalid or expired token".to_string()))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        accounts: state.auth.account_count(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn validate_register_request(req: &RegisterRequest) -> MockApiResult<()> {
    if req.name.trim().is_empty() {
        return Err(MockApiError::Validation("Name is required".to_string()));
    }
    if !validation::is_valid_email(req.email.trim()) {
        return Err(MockApiError::Validation(
            "A valid email address is required".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(MockApiError::Validation("Password is required".to_string()));
    }
    Ok(())
}
