//! On-disk storage backend
//!
//! One file per key under a root directory. Key names are sanitized into
//! file names, so logical keys like `notes[cache-meta]` map to stable,
//! filesystem-safe paths. Plain files carry no change-notification channel;
//! `watch` reports that by returning `false`.

use crate::backend::{StorageBackend, WatchCallback};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File-per-key durable backend
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Open (creating if needed) a backend rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> recache_core::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(DiskBackend { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keep alphanumerics and a few separators; everything else becomes
        // an underscore. Collisions are acceptable for the small, fixed key
        // set a manager uses.
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

impl StorageBackend for DiskBackend {
    fn read(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(text) => Some(text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, %err, "failed to read persisted key");
                None
            }
        }
    }

    fn write(&self, key: &str, payload: &str) {
        let path = self.path_for(key);
        if let Err(err) = fs::write(&path, payload) {
            warn!(key, %err, "failed to write persisted key");
        }
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(key, %err, "failed to remove persisted key"),
        }
    }

    fn watch(&self, _key: &str, _callback: WatchCallback) -> bool {
        // No notification channel for plain files.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::open(dir.path()).unwrap();
        assert_eq!(backend.read("notes"), None);
        backend.write("notes", "{\"a\":1}");
        assert_eq!(backend.read("notes"), Some("{\"a\":1}".to_string()));
        backend.remove("notes");
        assert_eq!(backend.read("notes"), None);
        backend.remove("notes");
    }

    #[test]
    fn test_key_sanitization() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::open(dir.path()).unwrap();
        backend.write("notes[cache-meta]", "{}");
        assert_eq!(backend.read("notes[cache-meta]"), Some("{}".to_string()));
        assert!(dir.path().join("notes_cache-meta_.json").exists());
    }

    #[test]
    fn test_watch_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DiskBackend::open(dir.path()).unwrap();
        assert!(!backend.watch("notes", Box::new(|_| {})));
    }
}
