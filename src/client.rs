//! Client assembly
//!
//! Builds the storage synchronizer, HTTP adapter, auth backend and session
//! store from [`Config`], and registers the session store as the adapter's
//! 401 teardown target.

use crate::auth::{AuthBackend, HttpAuthBackend, MockAuthService};
use crate::config::{AuthMode, Config, StorageBackendKind};
use crate::http::{
    ApiClient, HttpClientConfig, LogNavigator, Navigator, ReqwestTransport, Transport,
    TransportError,
};
use crate::session::SessionStore;
use crate::storage::{
    FileStorage, MemoryStorage, StorageBackend, StorageError, StorageSync, WatcherHandle,
};
use crate::theme::{Theme, ThemeStore};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),
}

/// Fully wired client-side session layer
pub struct Dashkit {
    config: Config,
    storage: Arc<StorageSync>,
    api: Arc<ApiClient>,
    session: Arc<SessionStore>,
    theme: ThemeStore,
}

impl Dashkit {
    /// Assemble from configuration: file or memory storage, a reqwest
    /// transport for `api.base_url`, and the configured auth backend
    pub fn from_config(config: Config) -> Result<Self, ClientError> {
        let backend: Arc<dyn StorageBackend> = match config.storage.backend {
            StorageBackendKind::File => Arc::new(FileStorage::open(&config.storage.data_dir)?),
            StorageBackendKind::Memory => Arc::new(MemoryStorage::new()),
        };
        let transport = Arc::new(ReqwestTransport::new(config.api.base_url.clone())?);

        Ok(Self::with_parts(config, backend, transport, Arc::new(LogNavigator)))
    }

    /// Assemble over explicit collaborators
    pub fn with_parts(
        config: Config,
        backend: Arc<dyn StorageBackend>,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let storage = Arc::new(StorageSync::new(backend));

        let http_config = HttpClientConfig {
            timeout: config.api.timeout(),
            retry_idempotent: config.api.retry_idempotent,
            landing_path: config.api.landing_path.clone(),
        };
        let api = Arc::new(
            ApiClient::new(transport, Arc::clone(&storage), http_config).with_navigator(navigator),
        );

        let auth: Arc<dyn AuthBackend> = match config.auth.mode {
            AuthMode::Mock => Arc::new(MockAuthService::new(Duration::from_millis(
                config.auth.mock_latency_ms,
            ))),
            AuthMode::Http => Arc::new(HttpAuthBackend::new(Arc::clone(&api))),
        };

        let session = Arc::new(SessionStore::new(Arc::clone(&storage), auth));
        // Weak: the store already owns the adapter via the HTTP auth backend
        let teardown: Weak<SessionStore> = Arc::downgrade(&session);
        api.set_session_teardown(teardown);

        let theme = ThemeStore::new(Arc::clone(&storage), Theme::default());

        tracing::debug!(
            storage_backend = ?config.storage.backend,
            auth_mode = ?config.auth.mode,
            base_url = %config.api.base_url,
            degraded = storage.is_degraded(),
            "Client assembled"
        );

        Self {
            config,
            storage,
            api,
            session,
            theme,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Arc<StorageSync> {
        &self.storage
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn theme(&self) -> &ThemeStore {
        &self.theme
    }

    /// Start watching for changes made by other processes at the configured
    /// poll interval
    pub fn spawn_watcher(&self) -> WatcherHandle {
        self.storage.spawn_watcher(self.config.storage.poll_interval())
    }
}
