//! Storage backends
//!
//! A backend is a flat string key/value medium. Several handles may point at
//! the same medium (several processes on one file, or cloned in-memory
//! handles), which is what makes cross-process change notification possible.

use crate::storage::error::StorageResult;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Durable key/value medium shared by every process of a client
pub trait StorageBackend: Send + Sync {
    /// Retrieve the raw value stored under `key`
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a raw value under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Full copy of the medium, used to detect changes made elsewhere
    fn snapshot(&self) -> StorageResult<HashMap<String, String>>;

    /// Short name for log lines
    fn name(&self) -> &str {
        "storage"
    }
}

/// In-memory backend. Clones share the same map, so two synchronizers built
/// on clones of one `MemoryStorage` behave like two tabs on one browser
/// profile.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.write()?.remove(key).is_some())
    }

    fn snapshot(&self) -> StorageResult<HashMap<String, String>> {
        Ok(self.entries.read()?.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_set_get_remove() {
        let storage = MemoryStorage::new();
        assert!(storage.is_empty());

        storage.set("theme", "\"dark\"").unwrap();
        assert_eq!(storage.get("theme").unwrap().as_deref(), Some("\"dark\""));
        assert_eq!(storage.len(), 1);

        assert!(storage.remove("theme").unwrap());
        assert!(!storage.remove("theme").unwrap());
        assert_eq!(storage.get("theme").unwrap(), None);
    }

    #[test]
    fn test_memory_clones_share_entries() {
        let tab_a = MemoryStorage::new();
        let tab_b = tab_a.clone();

        tab_a.set("token", "\"abc\"").unwrap();
        assert_eq!(tab_b.get("token").unwrap().as_deref(), Some("\"abc\""));

        let snapshot = tab_b.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
