//! HTTP Client Adapter
//!
//! Wraps outbound requests with the session token and turns a 401 from any
//! endpoint into a full session teardown.
//!
//! ```text
//! caller ──► ApiClient ──► Transport (reqwest)
//!               │
//!               ├─ token read from StorageSync
//!               └─ 401 ─► storage cleared ─► SessionTeardown::expire ─► Navigator
//! ```

mod client;
mod error;
mod transport;

pub use client::{ApiClient, HttpClientConfig, RequestOptions};
pub use error::{HttpError, TransportError};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// Owner of the in-memory session, told when the server rejects its token
pub trait SessionTeardown: Send + Sync {
    fn expire(&self);
}

/// Moves the presentation to a destination after a forced logout
pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: &str);
}

/// Navigator for headless use: records the redirect in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, destination: &str) {
        tracing::info!(destination = %destination, "Redirecting to landing page");
    }
}
