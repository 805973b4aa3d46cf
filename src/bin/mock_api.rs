//! dashkit Mock Auth API Server
//!
//! Run with: cargo run --bin dashkit-mock-api
//!
//! # Configuration
//!
//! Environment variables:
//! - `DASHKIT_MOCK_HOST`: Host to bind to (default: 127.0.0.1)
//! - `DASHKIT_MOCK_PORT`: Port to listen on (default: 8090)
//! - `DASHKIT_MOCK_LATENCY_MS`: Simulated auth latency (default: 1000)
//! - `RUST_LOG`: Log level (default: dashkit=info,tower_http=debug)

use dashkit::auth::{MockAuthService, DEMO_EMAIL, DEMO_PASSWORD};
use dashkit::mock_api::{serve, AppState, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dashkit=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting dashkit mock auth API v{}", env!("CARGO_PKG_VERSION"));

    let config = load_server_config();
    let latency = Duration::from_millis(env_parse("DASHKIT_MOCK_LATENCY_MS").unwrap_or(1000));

    let auth = Arc::new(MockAuthService::new(latency));
    tracing::info!(
        email = DEMO_EMAIL,
        password = DEMO_PASSWORD,
        latency_ms = latency.as_millis() as u64,
        "Seeded demo account"
    );

    serve(AppState::new(auth), &config).await?;

    tracing::info!("Mock auth API stopped");
    Ok(())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Load server configuration from environment
fn load_server_config() -> ServerConfig {
    let defaults = ServerConfig::default();
    let host = std::env::var("DASHKIT_MOCK_HOST").unwrap_or(defaults.host);
    let port = env_parse("DASHKIT_MOCK_PORT").unwrap_or(defaults.port);

    ServerConfig::new(host, port)
}
