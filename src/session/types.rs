//! Session data types

use serde::{Deserialize, Serialize};

/// Role given to newly registered principals
pub const DEFAULT_ROLE: &str = "User";

fn default_role() -> String {
    DEFAULT_ROLE.to_string()
}

/// The authenticated identity of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role: default_role(),
            avatar: None,
        }
    }

    /// Set the role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Set the avatar URI
    pub fn avatar(mut self, uri: impl Into<String>) -> Self {
        self.avatar = Some(uri.into());
        self
    }
}

/// An authenticated session. Holding both fields in one value keeps the
/// token present exactly when a principal is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal: Principal,
    pub token: String,
}

/// Where the session store currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Anonymous,
    /// A login or registration exchange is in flight
    Authenticating,
    Authenticated,
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(Principal),
    LoggedOut,
    /// Torn down after the server rejected the token
    Expired,
}
