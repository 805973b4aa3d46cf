//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `DASHKIT_*` environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP client adapter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_retry_idempotent")]
    pub retry_idempotent: bool,

    /// Where the presentation goes after a forced logout
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

fn default_base_url() -> String {
    "https://api.example.com".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_idempotent() -> bool {
    true
}

fn default_landing_path() -> String {
    "/".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            retry_idempotent: default_retry_idempotent(),
            landing_path: default_landing_path(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which storage backend holds the persisted keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    File,
    Memory,
}

/// Client storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default)]
    pub backend: StorageBackendKind,

    /// How often the watcher looks for changes from other processes (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("dashkit").to_string_lossy().to_string())
        .unwrap_or_else(|| "./dashkit_data".to_string())
}

fn default_poll_interval() -> u64 {
    500
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: StorageBackendKind::default(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl StorageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Which auth backend performs the credential exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Mock,
    Http,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,

    /// Simulated latency of the mock auth service (ms)
    #[serde(default = "default_mock_latency")]
    pub mock_latency_ms: u64,
}

fn default_mock_latency() -> u64 {
    1000
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::default(),
            mock_latency_ms: default_mock_latency(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("dashkit").join("config.toml")),
            Some(PathBuf::from("./dashkit.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // API overrides
        if let Some(url) = var("DASHKIT_API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(timeout) = var("DASHKIT_API_TIMEOUT_MS") {
            match timeout.parse() {
                Ok(ms) => self.api.timeout_ms = ms,
                Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid DASHKIT_API_TIMEOUT_MS"),
            }
        }

        // Storage overrides
        if let Some(data_dir) = var("DASHKIT_DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        // Auth overrides
        if let Some(mode) = var("DASHKIT_AUTH_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "mock" => self.auth.mode = AuthMode::Mock,
                "http" => self.auth.mode = AuthMode::Http,
                _ => tracing::warn!(value = %mode, "Ignoring invalid DASHKIT_AUTH_MODE"),
            }
        }

        // Logging overrides
        if let Some(level) = var("DASHKIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("DASHKIT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# dashkit Configuration
#
# Environment variables override these settings:
# - DASHKIT_API_BASE_URL
# - DASHKIT_API_TIMEOUT_MS
# - DASHKIT_DATA_DIR
# - DASHKIT_AUTH_MODE
# - DASHKIT_LOG_LEVEL
# - DASHKIT_LOG_FORMAT

[api]
# Base URL that request paths are relative to
base_url = "https://api.example.com"

# Request timeout (ms)
timeout_ms = 30000

# Retry GET/PUT/DELETE once on timeouts, network errors and 502/503/504
retry_idempotent = true

# Where to go after the server rejects the session token
landing_path = "/"

[storage]
# Directory holding the persisted key/value file
data_dir = "~/.local/share/dashkit"

# Storage backend: file or memory
backend = "file"

# How often to look for changes made by other processes (ms)
poll_interval_ms = 500

[auth]
# Credential exchange: mock (in-process) or http (POST /auth/login)
mode = "mock"

# Simulated latency of the mock auth service (ms)
mock_latency_ms = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert!(config.api.retry_idempotent);
        assert_eq!(config.storage.backend, StorageBackendKind::File);
        assert_eq!(config.auth.mode, AuthMode::Mock);
        assert_eq!(config.auth.mock_latency_ms, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.storage.poll_interval_ms, 500);
        assert_eq!(config.auth.mode, AuthMode::Mock);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::parse(
            r#"
            [api]
            base_url = "http://localhost:9000"

            [auth]
            mode = "http"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://localhost:9000");
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.auth.mode, AuthMode::Http);
        assert_eq!(config.storage.backend, StorageBackendKind::File);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashkit.toml");

        let missing = Config::load(&path).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));

        std::fs::write(&path, "[api\nbase_url = 1").unwrap();
        let invalid = Config::load(&path).unwrap_err();
        assert!(matches!(invalid, ConfigError::Parse { path: p, .. } if p == path));

        std::fs::write(&path, "[storage]\nbackend = \"memory\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DASHKIT_API_BASE_URL", "http://127.0.0.1:8090"),
            ("DASHKIT_API_TIMEOUT_MS", "not-a-number"),
            ("DASHKIT_DATA_DIR", "/tmp/dashkit"),
            ("DASHKIT_AUTH_MODE", "HTTP"),
            ("DASHKIT_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "http://127.0.0.1:8090");
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.storage.data_dir, "/tmp/dashkit");
        assert_eq!(config.auth.mode, AuthMode::Http);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }
}
