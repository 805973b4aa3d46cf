//! Session Store
//!
//! Single authority for who is logged in. Owns the in-memory session and
//! mirrors it into storage (`token` + `user`) after every mutation.
//!
//! Login and registration attempts are numbered. Starting an attempt, logging
//! out, or expiring the session advances the generation, and an attempt only
//! commits if the generation is unchanged when its exchange resolves. A
//! dropped (cancelled) attempt commits nothing.

use crate::auth::{AuthBackend, AuthBackendError, AuthResponse, LoginRequest, RegisterRequest};
use crate::http::SessionTeardown;
use crate::session::error::SessionError;
use crate::session::types::{AuthStatus, Principal, Session, SessionEvent};
use crate::storage::{keys, StorageSync};
use crate::validation;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct Inner {
    session: Option<Session>,
    generation: u64,
    in_flight: Option<u64>,
}

/// Process-wide authentication state
pub struct SessionStore {
    storage: Arc<StorageSync>,
    backend: Arc<dyn AuthBackend>,
    inner: Mutex<Inner>,
    events_tx: broadcast::Sender<SessionEvent>,
}

/// Marks an attempt as in flight; clears the marker when the attempt ends,
/// including when its future is dropped
struct AttemptGuard<'a> {
    store: &'a SessionStore,
    generation: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.store.lock();
        if inner.in_flight == Some(self.generation) {
            inner.in_flight = None;
        }
    }
}

impl SessionStore {
    /// Create the store and restore any persisted session
    pub fn new(storage: Arc<StorageSync>, backend: Arc<dyn AuthBackend>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self {
            storage,
            backend,
            inner: Mutex::new(Inner::default()),
            events_tx,
        };
        store.initialize();
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Restore the session from storage without contacting the server.
    /// Malformed or partial records leave the store anonymous.
    fn initialize(&self) {
        let token = self.storage.read_raw(keys::TOKEN);
        let user = self.storage.read_raw(keys::USER);

        let restored = match (token, user) {
            (None, None) => None,
            (Some(token), Some(user)) => {
                let token = serde_json::from_str::<String>(&token);
                let principal = serde_json::from_str::<Principal>(&user);
                match (token, principal) {
                    (Ok(token), Ok(principal)) if !token.is_empty() => {
                        Some(Session { principal, token })
                    }
                    (token, principal) => {
                        tracing::warn!(
                            token_ok = token.is_ok(),
                            user_ok = principal.is_ok(),
                            "Malformed persisted session, starting anonymous"
                        );
                        self.clear_record();
                        None
                    }
                }
            }
            _ => {
                tracing::warn!("Partial persisted session, starting anonymous");
                self.clear_record();
                None
            }
        };

        if let Some(session) = &restored {
            tracing::info!(
                principal_id = %session.principal.id,
                email = %session.principal.email,
                "Restored persisted session"
            );
        }

        self.lock().session = restored;
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, SessionError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let attempt = self.begin_attempt();
        tracing::debug!(
            attempt = attempt.generation,
            backend = self.backend.name(),
            email = %request.email,
            "Login started"
        );

        match self.backend.login(&request).await {
            Ok(response) => self.commit(&attempt, response),
            Err(e) => {
                tracing::warn!(email = %request.email, error = %e, "Login failed");
                Err(self.resolve_failure(&attempt, SessionError::from_login(e)))
            }
        }
    }

    /// Register a new principal and log it in
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Principal, SessionError> {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        if request.name.is_empty() {
            return Err(SessionError::Registration("Name is required".to_string()));
        }
        if !validation::is_valid_email(&request.email) {
            return Err(SessionError::Registration(
                "A valid email address is required".to_string(),
            ));
        }
        if request.password.is_empty() {
            return Err(SessionError::Registration("Password is required".to_string()));
        }

        let attempt = self.begin_attempt();
        tracing::debug!(
            attempt = attempt.generation,
            backend = self.backend.name(),
            email = %request.email,
            "Registration started"
        );

        match self.backend.register(&request).await {
            Ok(response) => self.commit(&attempt, response),
            Err(e) => {
                tracing::warn!(email = %request.email, error = %e, "Registration failed");
                Err(self.resolve_failure(&attempt, SessionError::from_register(e)))
            }
        }
    }

    /// Clear the session and the persisted record. Always succeeds.
    pub fn logout(&self) {
        let previous = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.session.take()
        };

        self.sync_record();

        if let Some(session) = previous {
            tracing::info!(principal_id = %session.principal.id, "Logged out");
            let _ = self.events_tx.send(SessionEvent::LoggedOut);
        }
    }

    /// Ask the auth backend whether the current token is still accepted.
    ///
    /// Returns `Ok(None)` when there is no session or the token was
    /// rejected, in which case the session is expired. A refreshed principal
    /// replaces the stored one. Any other failure leaves the session alone.
    pub async fn verify(&self) -> Result<Option<Principal>, SessionError> {
        let (generation, token) = {
            let inner = self.lock();
            match &inner.session {
                Some(session) => (inner.generation, session.token.clone()),
                None => return Ok(None),
            }
        };

        let result = self.backend.verify(&token).await;
        let unchanged = {
            let inner = self.lock();
            inner.generation == generation
                && inner.session.as_ref().map(|s| s.token.as_str()) == Some(token.as_str())
        };

        match result {
            Ok(principal) => {
                if !unchanged {
                    return Err(SessionError::Superseded);
                }
                let refreshed = {
                    let mut inner = self.lock();
                    match inner.session.as_mut() {
                        Some(session) if session.principal != principal => {
                            session.principal = principal.clone();
                            true
                        }
                        _ => false,
                    }
                };
                if refreshed {
                    tracing::info!(principal_id = %principal.id, "Refreshed principal from server");
                    self.sync_record();
                }
                Ok(Some(principal))
            }
            Err(AuthBackendError::InvalidCredentials) => {
                // The HTTP adapter may already have torn the session down
                if unchanged {
                    self.expire();
                }
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token verification failed");
                Err(SessionError::Authentication(e.to_string()))
            }
        }
    }

    /// Current principal, if authenticated
    pub fn current_principal(&self) -> Option<Principal> {
        self.lock().session.as_ref().map(|s| s.principal.clone())
    }

    /// Current auth token, if authenticated
    pub fn token(&self) -> Option<String> {
        self.lock().session.as_ref().map(|s| s.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn status(&self) -> AuthStatus {
        let inner = self.lock();
        if inner.in_flight.is_some() {
            AuthStatus::Authenticating
        } else if inner.session.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        }
    }

    /// Receiver for login/logout/expiry notifications
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Storage this store mirrors into
    pub fn storage(&self) -> &Arc<StorageSync> {
        &self.storage
    }

    fn begin_attempt(&self) -> AttemptGuard<'_> {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.in_flight = Some(inner.generation);
        AttemptGuard {
            store: self,
            generation: inner.generation,
        }
    }

    fn is_current(&self, attempt: &AttemptGuard<'_>) -> bool {
        self.lock().generation == attempt.generation
    }

    fn resolve_failure(&self, attempt: &AttemptGuard<'_>, err: SessionError) -> SessionError {
        if self.is_current(attempt) {
            err
        } else {
            SessionError::Superseded
        }
    }

    fn commit(
        &self,
        attempt: &AttemptGuard<'_>,
        response: AuthResponse,
    ) -> Result<Principal, SessionError> {
        let principal = response.user.clone();
        {
            let mut inner = self.lock();
            if inner.generation != attempt.generation {
                tracing::debug!(
                    attempt = attempt.generation,
                    current = inner.generation,
                    "Discarding superseded authentication result"
                );
                return Err(SessionError::Superseded);
            }
            inner.session = Some(Session {
                principal: response.user,
                token: response.token,
            });
        }

        self.sync_record();

        tracing::info!(
            principal_id = %principal.id,
            email = %principal.email,
            role = %principal.role,
            "Authenticated"
        );
        let _ = self.events_tx.send(SessionEvent::LoggedIn(principal.clone()));

        Ok(principal)
    }

    /// Write the current in-memory session to storage. Reading the state at
    /// write time keeps storage converging on the latest mutation.
    fn sync_record(&self) {
        let session = self.lock().session.clone();
        match session {
            Some(session) => {
                self.storage.write(keys::TOKEN, &session.token);
                self.storage.write(keys::USER, &session.principal);
            }
            None => self.clear_record(),
        }
    }

    fn clear_record(&self) {
        if self.storage.read_raw(keys::TOKEN).is_some() {
            self.storage.remove(keys::TOKEN);
        }
        if self.storage.read_raw(keys::USER).is_some() {
            self.storage.remove(keys::USER);
        }
    }
}

impl SessionTeardown for SessionStore {
    fn expire(&self) {
        let previous = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.session.take()
        };

        self.sync_record();

        match previous {
            Some(session) => {
                tracing::warn!(principal_id = %session.principal.id, "Session expired");
                let _ = self.events_tx.send(SessionEvent::Expired);
            }
            None => tracing::debug!("Session expiry with no active session"),
        }
    }
}
