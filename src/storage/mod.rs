//! Client Storage
//!
//! Durable key/value persistence with change propagation:
//!
//! - **backend**: `StorageBackend` trait and the in-memory backend
//! - **file**: JSON-file backend shared by every process on one data dir
//! - **sync**: `StorageSync`, the synchronizer consumers talk to
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   write(key, value) → JSON → backend.set → subscribers (in order) → event stream
//!
//! Cross-process Path:
//!   watcher tick → backend.snapshot → diff against last seen → subscribers
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use dashkit::storage::{keys, FileStorage, StorageSync};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sync = Arc::new(StorageSync::new(Arc::new(FileStorage::open("./dashkit_data")?)));
//!
//!     let _sub = sync.subscribe(keys::THEME, |theme: Option<String>| {
//!         println!("theme is now {:?}", theme);
//!     });
//!     let _watcher = sync.spawn_watcher(Duration::from_millis(500));
//!
//!     sync.write(keys::THEME, "dark");
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod file;
pub mod sync;

pub use backend::{MemoryStorage, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use sync::{Durability, Origin, StorageEvent, StorageSync, Subscription, WatcherHandle};

/// Well-known storage keys
pub mod keys {
    /// Opaque auth token (JSON string)
    pub const TOKEN: &str = "token";
    /// Serialized principal of the current session
    pub const USER: &str = "user";
    /// Theme preference, `"light"` or `"dark"`
    pub const THEME: &str = "theme";
}
