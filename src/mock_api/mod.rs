//! Mock Auth API
//!
//! HTTP front for [`MockAuthService`](crate::auth::MockAuthService), built
//! with Axum. It answers the same auth endpoints a real backend would, so
//! the HTTP auth backend and the client adapter can run against it.
//!
//! # Endpoints
//!
//! - `POST /auth/login` - `{email, password}` → `200 {user, token}` / `401 {error}`
//! - `POST /auth/register` - `{name, email, password}` → `201 {user, token}` / `409|400 {error}`
//! - `GET /auth/me` - bearer token → `200 Principal` / `401 {error}`
//! - `GET /health` - Liveness
//!
//! # Example
//!
//! ```rust,no_run
//! use dashkit::auth::MockAuthService;
//! use dashkit::mock_api::{serve, AppState, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(Arc::new(MockAuthService::default()));
//!     serve(state, &ServerConfig::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{MockApiError, MockApiResult};
pub use state::{AppState, ServerConfig};

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(routes::login))
        .route("/register", post(routes::register))
        .route("/me", get(routes::me));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Bind `config.addr()` and serve until Ctrl+C or SIGTERM
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), MockApiError> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Mock auth API listening on {}", addr);
    run(listener, state, shutdown_signal()).await?;
    tracing::info!("Mock auth API shut down gracefully");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), MockApiError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
