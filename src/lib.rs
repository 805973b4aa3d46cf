//! # dashkit
//!
//! Client-side session layer for dashboard-style applications.
//!
//! ## Features
//!
//! - **Session store**: one authority for who is logged in, persisted so a
//!   restart resumes the session
//! - **Storage sync**: JSON key/value storage with change notification
//!   within the process and across processes sharing a data directory
//! - **HTTP adapter**: bearer-token injection, and a 401 from any endpoint
//!   tears the session down
//! - **Mock auth**: in-process auth service and an Axum server exposing it
//!
//! ## Modules
//!
//! - [`session`]: Session store, principal and lifecycle types
//! - [`storage`]: Storage backends and the synchronizer
//! - [`http`]: HTTP client adapter and transports
//! - [`auth`]: Auth backends (mock and HTTP)
//! - [`theme`]: Persisted light/dark preference
//! - [`validation`]: Form validation helpers
//! - [`mock_api`]: Mock auth API server
//! - [`config`]: Configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dashkit::{Config, Dashkit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Dashkit::from_config(Config::load_default())?;
//!
//!     // Resumes automatically if a session was persisted
//!     if !client.session().is_authenticated() {
//!         client
//!             .session()
//!             .login("john.doe@example.com", "password123")
//!             .await?;
//!     }
//!
//!     // Authorization header added; a 401 logs the session out
//!     let stats: serde_json::Value = client.api().get("/dashboard/stats").await?;
//!     println!("{}", stats);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod http;
pub mod mock_api;
pub mod session;
pub mod storage;
pub mod theme;
pub mod validation;

// Re-export top-level types for convenience
pub use client::{ClientError, Dashkit};

pub use config::{Config, ConfigError};

pub use session::{AuthStatus, Principal, SessionError, SessionEvent, SessionStore};

pub use storage::{
    FileStorage, MemoryStorage, StorageBackend, StorageError, StorageEvent, StorageSync,
    Subscription,
};

pub use http::{ApiClient, HttpError, Navigator, RequestOptions, SessionTeardown, Transport};

pub use auth::{AuthBackend, AuthBackendError, HttpAuthBackend, MockAuthService};

pub use theme::{Theme, ThemeStore};
