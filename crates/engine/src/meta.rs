//! Cache metadata: per-record expiration
//!
//! When persistence is enabled every committed set stamps an expiry instant
//! for the record. Expiration is lazy: the only sweep runs synchronously,
//! exactly once, during manager construction. There is no background timer
//! and none may be added — lazy-sweep-only is the documented behavior.

use recache_core::{RecordId, Timestamp};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default TTL: one week, in milliseconds
pub const DEFAULT_TTL_MS: u64 = 604_800_000;

/// Default TTL as a duration
pub fn default_ttl() -> Duration {
    Duration::from_millis(DEFAULT_TTL_MS)
}

/// Expiry entry for one persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Instant after which the record is eligible for eviction
    pub expires: Timestamp,
}

/// Per-record expiration timestamps
///
/// Present only for entries that have been persisted; governs the
/// construction-time eviction sweep.
#[derive(Debug, Default)]
pub struct CacheMeta {
    entries: FxHashMap<RecordId, CacheEntry>,
}

impl CacheMeta {
    /// Empty metadata store
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a decoded persisted map
    pub fn from_map(map: BTreeMap<RecordId, CacheEntry>) -> Self {
        CacheMeta {
            entries: map.into_iter().collect(),
        }
    }

    /// Snapshot in deterministic order, for encoding
    pub fn to_map(&self) -> BTreeMap<RecordId, CacheEntry> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), *entry))
            .collect()
    }

    /// Stamp (or re-stamp) a record's expiry
    pub fn stamp(&mut self, id: RecordId, expires: Timestamp) {
        self.entries.insert(id, CacheEntry { expires });
    }

    /// Read a record's expiry
    pub fn expires(&self, id: &str) -> Option<Timestamp> {
        self.entries.get(id).map(|entry| entry.expires)
    }

    /// Drop a record's entry; absent is a no-op
    pub fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no record is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One-pass sweep: remove and return every id whose expiry is strictly
    /// earlier than `now`
    pub fn sweep_expired(&mut self, now: Timestamp) -> Vec<RecordId> {
        let mut expired: Vec<RecordId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires < now)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_is_strictly_earlier() {
        let mut meta = CacheMeta::new();
        let now = Timestamp::from_millis(1000);
        meta.stamp(RecordId::new("past"), Timestamp::from_millis(999));
        meta.stamp(RecordId::new("exact"), Timestamp::from_millis(1000));
        meta.stamp(RecordId::new("future"), Timestamp::from_millis(1001));

        let expired = meta.sweep_expired(now);
        assert_eq!(expired, vec![RecordId::new("past")]);
        assert_eq!(meta.len(), 2);
        assert!(meta.expires("past").is_none());
        assert!(meta.expires("exact").is_some());
    }

    #[test]
    fn test_stamp_overwrites() {
        let mut meta = CacheMeta::new();
        meta.stamp(RecordId::new("a"), Timestamp::from_millis(1));
        meta.stamp(RecordId::new("a"), Timestamp::from_millis(2));
        assert_eq!(meta.expires("a"), Some(Timestamp::from_millis(2)));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_round_trip_map() {
        let mut meta = CacheMeta::new();
        meta.stamp(RecordId::new("a"), Timestamp::from_millis(5));
        let rebuilt = CacheMeta::from_map(meta.to_map());
        assert_eq!(rebuilt.expires("a"), Some(Timestamp::from_millis(5)));
    }
}
