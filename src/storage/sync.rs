//! Storage Synchronizer
//!
//! JSON key/value persistence over a [`StorageBackend`] with change
//! notification. Local writes notify subscribers synchronously, in write
//! order. Changes made by other processes sharing the backend are picked up
//! by a polling watcher that diffs backend snapshots.
//!
//! Backend failures never reach callers: reads fall back to the caller's
//! default, and the first failed write switches the synchronizer to
//! memory-only mode for the rest of the process.

use crate::storage::backend::{MemoryStorage, StorageBackend};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Capacity of the storage event broadcast channel
const EVENT_CAPACITY: usize = 256;

type RawCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Written through this synchronizer
    Local,
    /// Observed in the backend, written by another process
    External,
}

/// A change to one key. `new_value` is the raw JSON, `None` when removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub origin: Origin,
}

/// Outcome of a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Stored in the backend
    Persisted,
    /// Kept in process memory only; the backend is unavailable
    MemoryOnly,
    /// Value could not be serialized; nothing changed
    Discarded,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    by_key: HashMap<String, Vec<(u64, RawCallback)>>,
}

/// Key/value synchronizer shared by every consumer in the process
pub struct StorageSync {
    backend: Arc<dyn StorageBackend>,
    degraded: AtomicBool,
    /// Values that only exist in memory (`None` = removed in memory)
    overlay: RwLock<HashMap<String, Option<String>>>,
    /// Backend contents as last seen by this process
    known: Mutex<HashMap<String, String>>,
    registry: Arc<Mutex<Registry>>,
    events_tx: broadcast::Sender<StorageEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl StorageSync {
    /// Create a synchronizer over `backend`
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let known = match backend.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "Initial storage snapshot failed");
                HashMap::new()
            }
        };
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            backend,
            degraded: AtomicBool::new(false),
            overlay: RwLock::new(HashMap::new()),
            known: Mutex::new(known),
            registry: Arc::new(Mutex::new(Registry::default())),
            events_tx,
        }
    }

    /// Synchronizer over a fresh private in-memory backend
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Whether writes are currently kept in memory only
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Read and deserialize `key`, or return `default` when it is absent or
    /// malformed
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.read_raw(key) else {
            return default;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Malformed stored value, using default");
                default
            }
        }
    }

    /// Raw JSON stored under `key`
    pub fn read_raw(&self, key: &str) -> Option<String> {
        if let Some(entry) = self
            .overlay
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return entry.clone();
        }

        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Storage read failed");
                None
            }
        }
    }

    /// Serialize and store `value` under `key`, then notify subscribers
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Durability {
        match serde_json::to_string(value) {
            Ok(raw) => self.store(key, Some(raw)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Value not serializable, write discarded");
                Durability::Discarded
            }
        }
    }

    /// Remove `key`, then notify subscribers with `None`
    pub fn remove(&self, key: &str) -> Durability {
        self.store(key, None)
    }

    fn store(&self, key: &str, value: Option<String>) -> Durability {
        let durability = {
            let mut known = lock(&self.known);

            let persisted = !self.is_degraded() && {
                let result = match &value {
                    Some(raw) => self.backend.set(key, raw),
                    None => self.backend.remove(key).map(|_| ()),
                };
                match result {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            key = %key,
                            backend = self.backend.name(),
                            error = %e,
                            "Storage unavailable, continuing in memory only"
                        );
                        self.degraded.store(true, Ordering::SeqCst);
                        false
                    }
                }
            };

            let mut overlay = self.overlay.write().unwrap_or_else(|e| e.into_inner());
            if persisted {
                overlay.remove(key);
                match &value {
                    Some(raw) => known.insert(key.to_string(), raw.clone()),
                    None => known.remove(key),
                };
                Durability::Persisted
            } else {
                overlay.insert(key.to_string(), value.clone());
                Durability::MemoryOnly
            }
        };

        self.notify(StorageEvent {
            key: key.to_string(),
            new_value: value,
            origin: Origin::Local,
        });

        durability
    }

    /// Register `callback` for changes to `key`. The callback receives the
    /// new value, or `None` when the key was removed. Values that fail to
    /// deserialize as `T` are logged and skipped.
    pub fn subscribe<T, F>(&self, key: &str, callback: F) -> Subscription
    where
        T: DeserializeOwned,
        F: Fn(Option<T>) + Send + Sync + 'static,
    {
        let owned_key = key.to_string();
        let raw: RawCallback = Arc::new(move |value: Option<&str>| match value {
            None => callback(None),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(parsed) => callback(Some(parsed)),
                Err(e) => {
                    tracing::warn!(key = %owned_key, error = %e, "Ignoring malformed change notification");
                }
            },
        });

        let id = {
            let mut registry = lock(&self.registry);
            registry.next_id += 1;
            let id = registry.next_id;
            registry
                .by_key
                .entry(key.to_string())
                .or_default()
                .push((id, raw));
            id
        };

        tracing::debug!(key = %key, subscription = id, "Storage subscription added");

        Subscription {
            id,
            key: key.to_string(),
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of live subscriptions for `key`
    pub fn subscriber_count(&self, key: &str) -> usize {
        lock(&self.registry)
            .by_key
            .get(key)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }

    /// Receiver for every storage event, local and external
    pub fn events(&self) -> broadcast::Receiver<StorageEvent> {
        self.events_tx.subscribe()
    }

    fn notify(&self, event: StorageEvent) {
        // Collect first so callbacks may subscribe or write without deadlocking
        let callbacks: Vec<RawCallback> = lock(&self.registry)
            .by_key
            .get(&event.key)
            .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(event.new_value.as_deref());
        }

        tracing::trace!(
            key = %event.key,
            origin = ?event.origin,
            subscribers = callbacks.len(),
            "Storage change delivered"
        );

        let _ = self.events_tx.send(event);
    }

    /// Compare the backend against the last seen contents and notify about
    /// every key another process changed. Returns the number of changes.
    pub fn poll_external_changes(&self) -> usize {
        let changes = {
            let mut known = lock(&self.known);

            let current = match self.backend.snapshot() {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::debug!(error = %e, "Storage poll skipped");
                    return 0;
                }
            };

            let mut changes: Vec<StorageEvent> = current
                .iter()
                .filter(|(key, value)| known.get(*key) != Some(*value))
                .map(|(key, value)| StorageEvent {
                    key: key.clone(),
                    new_value: Some(value.clone()),
                    origin: Origin::External,
                })
                .collect();

            changes.extend(
                known
                    .keys()
                    .filter(|key| !current.contains_key(*key))
                    .map(|key| StorageEvent {
                        key: key.clone(),
                        new_value: None,
                        origin: Origin::External,
                    }),
            );

            *known = current;
            changes.sort_by(|a, b| a.key.cmp(&b.key));
            changes
        };

        let overlay = self
            .overlay
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        let mut delivered = 0;
        for change in changes {
            // In-memory values shadow the backend for this process
            if overlay.contains(&change.key) {
                continue;
            }
            tracing::debug!(key = %change.key, "External storage change");
            self.notify(change);
            delivered += 1;
        }
        delivered
    }

    /// Start polling the backend for changes made by other processes.
    /// Polling stops when the returned handle is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, poll_interval: Duration) -> WatcherHandle {
        let weak = Arc::downgrade(self);

        tracing::info!(
            interval_ms = poll_interval.as_millis() as u64,
            "Starting storage watcher"
        );

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            // Skip the first immediate tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(sync) = weak.upgrade() else {
                    break;
                };
                sync.poll_external_changes();
            }
        });

        WatcherHandle { handle }
    }
}

/// Registration handle returned by [`StorageSync::subscribe`].
/// The callback is removed when the handle is dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    key: String,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Key this subscription listens to
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Explicitly release the subscription
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut guard = lock(&registry);
        if let Some(subs) = guard.by_key.get_mut(&self.key) {
            subs.retain(|(id, _)| *id != self.id);
            if subs.is_empty() {
                guard.by_key.remove(&self.key);
            }
        }
    }
}

/// Handle to the background watcher task; aborts it on drop
pub struct WatcherHandle {
    handle: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn stop(self) {}
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::{StorageError, StorageResult};
    use crate::storage::keys;
    use serde::Deserialize;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        sidebar_open: bool,
        page_size: u32,
        tags: Vec<String>,
    }

    /// Backend that refuses every write, like a browser in private mode
    struct ReadOnlyStorage;

    impl StorageBackend for ReadOnlyStorage {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }
        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> StorageResult<bool> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn snapshot(&self) -> StorageResult<HashMap<String, String>> {
            Ok(HashMap::new())
        }
    }

    #[test]
    fn test_write_then_read_returns_equal_value() {
        let sync = StorageSync::in_memory();
        let prefs = Prefs {
            sidebar_open: true,
            page_size: 25,
            tags: vec!["ops".to_string(), "billing".to_string()],
        };

        assert_eq!(sync.write("prefs", &prefs), Durability::Persisted);

        let fallback = Prefs {
            sidebar_open: false,
            page_size: 10,
            tags: Vec::new(),
        };
        assert_eq!(sync.read("prefs", fallback), prefs);

        let json = serde_json::json!({"nested": {"list": [1, 2, 3]}, "flag": null});
        sync.write("blob", &json);
        assert_eq!(sync.read("blob", serde_json::Value::Null), json);
    }

    #[test]
    fn test_read_falls_back_on_missing_and_malformed() {
        let backend = MemoryStorage::new();
        backend.set("count", "not json").unwrap();
        let sync = StorageSync::new(Arc::new(backend));

        assert_eq!(sync.read("count", 7u32), 7);
        assert_eq!(sync.read("absent", String::from("none")), "none");
    }

    #[test]
    fn test_subscribers_see_local_writes_in_order() {
        let sync = StorageSync::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = sync.subscribe("counter", move |value: Option<u32>| {
            sink.lock().unwrap().push(value);
        });

        sync.write("counter", &1u32);
        sync.write("counter", &2u32);
        sync.write("other", &99u32);
        sync.remove("counter");
        sync.write("counter", &3u32);

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), Some(2), None, Some(3)]);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let sync = StorageSync::in_memory();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let sub = sync.subscribe("theme", move |_: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(sync.subscriber_count("theme"), 1);
        assert_eq!(sub.key(), "theme");

        sync.write("theme", "dark");
        sub.unsubscribe();
        sync.write("theme", "light");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sync.subscriber_count("theme"), 0);
    }

    #[test]
    fn test_external_changes_reach_other_process() {
        let shared = MemoryStorage::new();
        let tab_a = StorageSync::new(Arc::new(shared.clone()));
        let tab_b = StorageSync::new(Arc::new(shared));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = tab_b.subscribe("theme", move |value: Option<String>| {
            sink.lock().unwrap().push(value);
        });

        tab_a.write("theme", "dark");
        assert_eq!(tab_b.poll_external_changes(), 1);
        assert_eq!(tab_b.poll_external_changes(), 0);

        tab_a.remove("theme");
        assert_eq!(tab_b.poll_external_changes(), 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("dark".to_string()), None]
        );
    }

    #[test]
    fn test_own_writes_are_not_reported_as_external() {
        let sync = StorageSync::in_memory();
        sync.write("token", "abc");
        sync.remove("token");
        sync.write("user", &serde_json::json!({"id": "1"}));
        assert_eq!(sync.poll_external_changes(), 0);
    }

    #[test]
    fn test_unavailable_backend_degrades_to_memory() {
        let sync = StorageSync::new(Arc::new(ReadOnlyStorage));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = sync.subscribe("theme", move |_: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!sync.is_degraded());
        assert_eq!(sync.write("theme", "dark"), Durability::MemoryOnly);
        assert!(sync.is_degraded());
        assert_eq!(sync.read("theme", String::new()), "dark");

        assert_eq!(sync.remove("theme"), Durability::MemoryOnly);
        assert_eq!(sync.read("theme", String::from("light")), "light");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_file_writers_stay_persistent() {
        let dir = tempfile::tempdir().unwrap();
        let open = || {
            Arc::new(StorageSync::new(Arc::new(
                crate::storage::FileStorage::open(dir.path()).unwrap(),
            )))
        };
        let (a, b) = (open(), open());

        let theme_writer = {
            let a = Arc::clone(&a);
            std::thread::spawn(move || {
                for i in 0..100 {
                    a.write(keys::THEME, if i % 2 == 0 { "dark" } else { "light" });
                }
            })
        };
        let token_writer = {
            let b = Arc::clone(&b);
            std::thread::spawn(move || {
                for i in 0..100 {
                    b.write(keys::TOKEN, &format!("mock-jwt-token-{}", i));
                }
            })
        };
        theme_writer.join().unwrap();
        token_writer.join().unwrap();

        assert!(!a.is_degraded());
        assert!(!b.is_degraded());

        let reader = open();
        assert_eq!(reader.read(keys::TOKEN, String::new()), "mock-jwt-token-99");
        assert_eq!(reader.read(keys::THEME, String::new()), "light");
    }

    #[tokio::test]
    async fn test_event_stream_receives_writes() {
        let sync = StorageSync::in_memory();
        let mut rx = sync.events();

        sync.write("theme", "dark");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key, "theme");
        assert_eq!(event.new_value.as_deref(), Some("\"dark\""));
        assert_eq!(event.origin, Origin::Local);
    }

    #[tokio::test]
    async fn test_watcher_delivers_external_events() {
        let shared = MemoryStorage::new();
        let writer = StorageSync::new(Arc::new(shared.clone()));
        let reader = Arc::new(StorageSync::new(Arc::new(shared)));
        let mut rx = reader.events();

        let _watcher = reader.spawn_watcher(Duration::from_millis(10));
        writer.write("token", "mock-jwt-token-xyz");

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("watcher should report the change")
            .unwrap();
        assert_eq!(event.key, "token");
        assert_eq!(event.origin, Origin::External);
    }
}
