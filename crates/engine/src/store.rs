//! Dual record store
//!
//! Two parallel projections of the same logical record set: raw values and
//! values joined with computed fields. Both maps share tombstone semantics:
//! a missing key means "never observed", a `None` value is an explicit
//! "known absent" tombstone. After `remove` the key is fully absent.
//!
//! Invariant: for every live computed entry, its record portion is
//! deep-equal to the raw entry for the same id. All writes go through the
//! manager, which writes raw first and regenerates the computed projection.

use recache_core::{diff, ComputedRecord, Record, RecordId};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Raw and computed-joined projections of the record set
#[derive(Debug, Default)]
pub struct DualStore {
    raw: FxHashMap<RecordId, Option<Arc<Record>>>,
    computed: FxHashMap<RecordId, Option<Arc<ComputedRecord>>>,
}

impl DualStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Live raw record, ignoring tombstones
    pub fn raw_of(&self, id: &str) -> Option<&Arc<Record>> {
        self.raw.get(id).and_then(|entry| entry.as_ref())
    }

    /// Live computed-joined record, ignoring tombstones
    pub fn computed_of(&self, id: &str) -> Option<&Arc<ComputedRecord>> {
        self.computed.get(id).and_then(|entry| entry.as_ref())
    }

    /// Whether the raw store has observed this id (live or tombstone)
    pub fn raw_observed(&self, id: &str) -> bool {
        self.raw.contains_key(id)
    }

    /// Whether the computed store has observed this id (live or tombstone)
    pub fn computed_observed(&self, id: &str) -> bool {
        self.computed.contains_key(id)
    }

    /// Write a live record into both projections
    pub fn write(&mut self, record: Arc<Record>, joined: Arc<ComputedRecord>) {
        let id = record.id.clone();
        self.raw.insert(id.clone(), Some(record));
        self.computed.insert(id, Some(joined));
    }

    /// Overwrite only the raw projection (reconcile path)
    pub fn write_raw(&mut self, record: Arc<Record>) {
        self.raw.insert(record.id.clone(), Some(record));
    }

    /// Replace the computed entry for an id that is already live
    pub fn write_computed(&mut self, joined: Arc<ComputedRecord>) {
        self.computed.insert(joined.id().clone(), Some(joined));
    }

    /// Tombstone both projections: the id is now "known absent"
    pub fn tombstone(&mut self, id: &RecordId) {
        self.raw.insert(id.clone(), None);
        self.computed.insert(id.clone(), None);
    }

    /// Remove the id entirely from both projections
    pub fn remove(&mut self, id: &str) {
        self.raw.remove(id);
        self.computed.remove(id);
    }

    /// Drop every entry, tombstones included
    pub fn clear(&mut self) {
        self.raw.clear();
        self.computed.clear();
    }

    /// Computed entries including tombstones, for the persistence codec
    pub(crate) fn computed_entries(
        &self,
    ) -> impl Iterator<Item = (&RecordId, Option<&ComputedRecord>)> {
        self.computed.iter().map(|(id, entry)| (id, entry.as_deref()))
    }

    /// Every id either projection has observed, deterministic order
    pub fn known_ids(&self) -> Vec<RecordId> {
        let mut ids: Vec<RecordId> = self
            .raw
            .keys()
            .chain(self.computed.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Live computed entries in deterministic order
    pub fn live_computed(&self) -> BTreeMap<RecordId, Arc<ComputedRecord>> {
        self.computed
            .iter()
            .filter_map(|(id, entry)| entry.as_ref().map(|rec| (id.clone(), rec.clone())))
            .collect()
    }

    /// Live raw entries in deterministic order
    pub fn live_raw(&self) -> BTreeMap<RecordId, Arc<Record>> {
        self.raw
            .iter()
            .filter_map(|(id, entry)| entry.as_ref().map(|rec| (id.clone(), rec.clone())))
            .collect()
    }

    /// Count of live computed entries
    pub fn live_count(&self) -> usize {
        self.computed
            .values()
            .filter(|entry| entry.is_some())
            .count()
    }

    /// Number of observed raw keys, tombstones included
    pub fn raw_key_count(&self) -> usize {
        self.raw.len()
    }

    /// Internal raw map, for derivation lookups
    pub(crate) fn raw_map(&self) -> &FxHashMap<RecordId, Option<Arc<Record>>> {
        &self.raw
    }

    /// Adopt a persisted computed entry and reconcile the raw projection
    ///
    /// If the stripped raw projection of the persisted entry differs (deep)
    /// from the current raw entry, raw is overwritten with the stripped
    /// projection. Resolves drift from a prior session's persisted state.
    pub fn reconcile_persisted(&mut self, entry: ComputedRecord) {
        let id = entry.id().clone();
        let stripped = entry.record.clone();
        self.computed.insert(id.clone(), Some(Arc::new(entry)));
        let matches = self
            .raw_of(&id)
            .map(|current| diff::is_equal_value(&current.as_value(), &stripped.as_value()))
            .unwrap_or(false);
        if !matches {
            self.raw.insert(id, Some(Arc::new(stripped)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recache_core::Value;

    fn rec(id: &str, x: i64) -> Record {
        Record::new(id).with_field("x", x)
    }

    fn joined(record: Record, double: i64) -> ComputedRecord {
        ComputedRecord::new(
            record,
            BTreeMap::from([("double".to_string(), Value::Int(double))]),
        )
    }

    #[test]
    fn test_tombstone_is_observed_but_not_live() {
        let mut store = DualStore::new();
        let id = RecordId::new("a");
        store.tombstone(&id);
        assert!(store.raw_observed("a"));
        assert!(store.computed_observed("a"));
        assert!(store.raw_of("a").is_none());
        assert!(store.computed_of("a").is_none());
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.raw_key_count(), 1);
    }

    #[test]
    fn test_remove_leaves_key_fully_absent() {
        let mut store = DualStore::new();
        let record = Arc::new(rec("a", 1));
        store.write(record.clone(), Arc::new(joined(rec("a", 1), 2)));
        store.remove("a");
        assert!(!store.raw_observed("a"));
        assert!(!store.computed_observed("a"));
        assert!(store.known_ids().is_empty());
    }

    #[test]
    fn test_reconcile_overwrites_drifted_raw() {
        let mut store = DualStore::new();
        store.write_raw(Arc::new(rec("a", 1)));
        store.reconcile_persisted(joined(rec("a", 5), 10));
        assert_eq!(
            store.raw_of("a").unwrap().field("x"),
            Some(&Value::Int(5))
        );
        assert_eq!(store.computed_of("a").unwrap().child("x"), Some(Value::Int(5)));
    }

    #[test]
    fn test_reconcile_keeps_matching_raw_arc() {
        let mut store = DualStore::new();
        let current = Arc::new(rec("a", 5));
        store.write_raw(current.clone());
        store.reconcile_persisted(joined(rec("a", 5), 10));
        // same content; the existing raw entry is kept
        assert!(Arc::ptr_eq(store.raw_of("a").unwrap(), &current));
    }
}
