//! Session Store
//!
//! Holds the authenticated principal and token for the process and keeps
//! them mirrored in storage so a restart resumes the session.
//!
//! # Lifecycle
//!
//! ```text
//! Anonymous ──login/register──► Authenticating ──ok──► Authenticated
//!     ▲                              │                      │
//!     └──────────── error ───────────┘     logout / 401 ────┘
//! ```
//!
//! The persisted record is two keys, `token` and `user`; both are present
//! exactly when a session is.

mod error;
mod store;
mod types;

pub use error::SessionError;
pub use store::SessionStore;
pub use types::{AuthStatus, Principal, Session, SessionEvent, DEFAULT_ROLE};
