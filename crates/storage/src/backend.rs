//! Storage backend trait
//!
//! The cache engine treats durable storage as an external collaborator: it
//! needs "read a value for a key", "write a value for a key", "remove a
//! key", and "subscribe to external changes of a key" — nothing else.
//! Backends own storage-key namespacing; the engine only supplies logical
//! key names (the manager context and its cache-meta sibling).

/// Callback invoked when a watched key changes outside this process/manager
///
/// The argument is the new payload, or `None` when the key was removed.
pub type WatchCallback = Box<dyn Fn(Option<String>) + Send + Sync>;

/// Durable key-value storage boundary
///
/// Implementations must be safe to share across threads; the engine calls
/// `write`/`remove` from its write-behind flusher thread while `read` runs
/// on the constructing thread.
pub trait StorageBackend: Send + Sync {
    /// Best-effort load of the payload stored under `key`
    fn read(&self, key: &str) -> Option<String>;

    /// Durably store `payload` under `key`
    fn write(&self, key: &str, payload: &str);

    /// Remove `key` from durable storage; absent keys are a no-op
    fn remove(&self, key: &str);

    /// Subscribe to external changes of `key`
    ///
    /// Returns `false` when the backend has no change-notification channel
    /// (the callback will never fire). Callbacks must not re-enter the
    /// backend.
    fn watch(&self, key: &str, callback: WatchCallback) -> bool;
}
