//! In-memory storage backend
//!
//! The ephemeral counterpart of [`DiskBackend`](crate::disk::DiskBackend):
//! a prefix-namespaced map behind an `RwLock`, with watch support. Used by
//! tests and by managers that want persistence semantics without durability
//! across processes (e.g. sharing one backend between two manager
//! instances).

use crate::backend::{StorageBackend, WatchCallback};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// In-memory backend with change notification
///
/// `notify_external` exists for tests and for embedding environments that
/// mutate the underlying store out-of-band and want watchers informed.
#[derive(Default)]
pub struct MemoryBackend {
    prefix: String,
    entries: RwLock<FxHashMap<String, String>>,
    watchers: RwLock<FxHashMap<String, Vec<WatchCallback>>>,
}

impl MemoryBackend {
    /// Create an un-namespaced in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that namespaces every key with `prefix:`
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        MemoryBackend {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    fn storage_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{key}", self.prefix)
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Inject a payload as if an external writer changed the key, firing
    /// watchers registered for the logical key
    pub fn notify_external(&self, key: &str, payload: Option<String>) {
        let storage_key = self.storage_key(key);
        {
            let mut entries = self.entries.write();
            match &payload {
                Some(text) => {
                    entries.insert(storage_key, text.clone());
                }
                None => {
                    entries.remove(&storage_key);
                }
            }
        }
        let watchers = self.watchers.read();
        if let Some(callbacks) = watchers.get(key) {
            for callback in callbacks {
                callback(payload.clone());
            }
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.read().get(&self.storage_key(key)).cloned()
    }

    fn write(&self, key: &str, payload: &str) {
        self.entries
            .write()
            .insert(self.storage_key(key), payload.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(&self.storage_key(key));
    }

    fn watch(&self, key: &str, callback: WatchCallback) -> bool {
        self.watchers
            .write()
            .entry(key.to_string())
            .or_default()
            .push(callback);
        true
    }
}
