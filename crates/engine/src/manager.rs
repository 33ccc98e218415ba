//! Record manager facade
//!
//! The public surface over the dual store, the computed-value engine, and
//! the cache metadata. All state lives behind one `parking_lot::Mutex` per
//! manager; mutation is synchronous and the recompute pass runs inside the
//! same critical section, so per-id writes are observed in call order.
//! Persistence is write-behind: a returned mutating call guarantees
//! in-memory visibility only.

use crate::computed::{
    init_computeds, recompute_pass, watch_getter, ComputedState, DeriveRegistry, DeriveTarget,
    RawView,
};
use crate::meta::CacheMeta;
use crate::store::DualStore;
use parking_lot::Mutex;
use recache_core::{diff, ComputedRecord, Record, RecordId, Timestamp, Value};
use recache_storage::{codec, Flusher, StorageBackend};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Persistence wiring for one manager
pub(crate) struct PersistHandle {
    pub(crate) backend: Arc<dyn StorageBackend>,
    pub(crate) flusher: Flusher,
    pub(crate) records_key: String,
    pub(crate) meta_key: String,
    pub(crate) ttl: Duration,
}

/// Mutable manager state, guarded by the manager mutex
#[derive(Default)]
pub(crate) struct ManagerState {
    pub(crate) store: DualStore,
    pub(crate) meta: CacheMeta,
    pub(crate) watches: ComputedState,
}

/// Per-entity record cache with derived-value memoization
///
/// Construct through [`RecordManagerBuilder`](crate::builder::RecordManagerBuilder).
/// The manager exclusively owns both record projections, the cache
/// metadata, and the subscription table for its keyspace.
pub struct RecordManager {
    pub(crate) context: String,
    pub(crate) registry: DeriveRegistry,
    pub(crate) persist: Option<PersistHandle>,
    pub(crate) state: Mutex<ManagerState>,
}

impl RecordManager {
    // =========================================================================
    // Reads
    // =========================================================================

    /// Computed-joined record by id
    ///
    /// A miss lazily creates a null tombstone in both stores (so the id is
    /// "known absent" from now on) and returns `None`.
    pub fn get(&self, id: &str) -> Option<Arc<ComputedRecord>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.store.computed_observed(id) {
            let id = RecordId::new(id);
            self.set_record_item_locked(state, &id, None);
            self.commit_locked(state);
            return None;
        }
        state.store.computed_of(id).cloned()
    }

    /// Raw record by id, with the same lazy-tombstone pattern
    pub fn get_raw(&self, id: &str) -> Option<Arc<Record>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.store.raw_observed(id) {
            let id = RecordId::new(id);
            self.set_record_item_locked(state, &id, None);
            self.commit_locked(state);
            return None;
        }
        state.store.raw_of(id).cloned()
    }

    /// Deep copy of the raw record; safe for the caller to mutate
    pub fn get_raw_clone(&self, id: &str) -> Option<Record> {
        self.get_raw(id).map(|record| Record::clone(&record))
    }

    /// Direct field of the computed-joined record
    ///
    /// `"id"` and `"computed"` resolve to the id and the computed map.
    pub fn get_child_of(&self, id: &str, key: &str) -> Option<Value> {
        self.get(id).and_then(|record| record.child(key))
    }

    /// Non-tombstone computed-joined entries matching the predicate
    pub fn filter(
        &self,
        pred: impl Fn(&ComputedRecord) -> bool,
    ) -> BTreeMap<RecordId, Arc<ComputedRecord>> {
        self.state
            .lock()
            .store
            .live_computed()
            .into_iter()
            .filter(|(_, record)| pred(record))
            .collect()
    }

    /// Non-tombstone raw entries matching the predicate
    pub fn filter_raw(
        &self,
        pred: impl Fn(&Record) -> bool,
    ) -> BTreeMap<RecordId, Arc<Record>> {
        self.state
            .lock()
            .store
            .live_raw()
            .into_iter()
            .filter(|(_, record)| pred(record))
            .collect()
    }

    /// Visit every non-tombstone computed-joined entry
    pub fn for_each(&self, mut visit: impl FnMut(&ComputedRecord)) {
        for (_, record) in self.state.lock().store.live_computed() {
            visit(&record);
        }
    }

    /// Live count of non-tombstone computed entries
    pub fn len(&self) -> usize {
        self.state.lock().store.live_count()
    }

    /// True when no live record exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the id has ever been observed (live or tombstoned)
    pub fn known(&self, id: &str) -> bool {
        self.state.lock().store.computed_observed(id)
    }

    /// Number of live (id, field) recompute watches
    pub fn subscription_count(&self) -> usize {
        self.state.lock().watches.subscription_count()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a record, stripping any computed portion from the input
    ///
    /// Accepts `Record` or `ComputedRecord` (callers may pass back a
    /// previously-read joined record; the conversion strips it). Degenerate
    /// input is a silent no-op.
    pub fn set(&self, item: impl Into<Record>) {
        let record = item.into();
        if record.is_degenerate() {
            return;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;
        self.set_and_watch_getters(state, record);
        self.commit_locked(state);
    }

    /// Public write primitive: full replace-or-clear of one id
    ///
    /// `None` tombstones the id in both stores. This never merges; callers
    /// compose partial updates themselves.
    pub fn set_record_item(&self, id: &str, value: Option<Record>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let id = RecordId::new(id);
        self.set_record_item_locked(state, &id, value);
        self.commit_locked(state);
    }

    /// Assign a nested child of a record, round-tripping through `set`
    ///
    /// `key` is a `/`-separated path (`items/0/name`); a bare field name is
    /// a direct assignment. Absent ids are a silent no-op. Structural
    /// mismatches along the path surface as errors at the call site.
    pub fn set_child_of(
        &self,
        id: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> recache_core::Result<()> {
        let path: recache_core::ChildPath = key.parse()?;
        let current = {
            let guard = self.state.lock();
            guard.store.raw_of(id).cloned()
        };
        let Some(current) = current else {
            return Ok(());
        };
        let mut record = Record::clone(&current);
        if path.is_direct() {
            record.set_field(path.head(), value);
        } else {
            recache_core::set_at_path(&mut record.fields, &path, value.into())?;
        }
        self.set(record);
        Ok(())
    }

    /// Remove a record entirely: both stores, metadata, watches, cells
    ///
    /// Idempotent; the key ends fully absent, not tombstoned.
    pub fn unset(&self, id: &str) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.store.remove(id);
        state.meta.remove(id);
        state.watches.remove(id);
        self.commit_locked(state);
    }

    /// Unset every known id; purges the persisted blobs for this context
    pub fn reset(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.store.clear();
        state.meta.clear();
        state.watches.clear();
        if let Some(persist) = &self.persist {
            persist.flusher.enqueue_projection(&persist.records_key, None);
            persist.flusher.enqueue_projection(&persist.meta_key, None);
        }
    }

    /// Set every item in the input; degenerate items are silent no-ops
    pub fn update(&self, items: impl IntoIterator<Item = Record>) {
        for item in items {
            self.set(item);
        }
    }

    /// Total replacement, not a merge: `reset` then `update`
    pub fn overwrite(&self, items: impl IntoIterator<Item = Record>) {
        self.reset();
        self.update(items);
    }

    // =========================================================================
    // Computed surface
    // =========================================================================

    /// The field-indexed computed-getter surface
    pub fn getters(&self) -> ComputedGetters<'_> {
        ComputedGetters { manager: self }
    }

    /// Re-subscribe all declared fields for every live record
    ///
    /// For derivations whose external inputs shifted out-of-band of the raw
    /// store.
    pub fn reset_computed(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.watches.clear();
        for (id, entry) in state.store.live_computed() {
            let record = entry.record.clone();
            let computed =
                init_computeds(&self.registry, &state.store, &mut state.watches, &id, Some(&record));
            state
                .store
                .write_computed(Arc::new(ComputedRecord::new(record, computed)));
        }
        self.commit_locked(state);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Re-read the persisted record set and reconcile into the raw store
    ///
    /// The public consumer of the backend's external-change capability; the
    /// builder also wires it to `StorageBackend::watch` when the backend
    /// supports notification. No-op without persistence.
    pub fn reload_persisted(&self) {
        let Some(persist) = &self.persist else {
            return;
        };
        let payload = persist.backend.read(&persist.records_key);
        self.apply_external(payload.as_deref());
    }

    /// Block until every queued durable write has been applied
    ///
    /// Persistence is otherwise fire-and-forget; this exists for shutdown
    /// and tests.
    pub fn sync_persisted(&self) {
        if let Some(persist) = &self.persist {
            persist.flusher.sync();
        }
    }

    pub(crate) fn apply_external(&self, payload: Option<&str>) {
        // External removal carries no state to adopt; ignore it.
        let Some(payload) = payload else { return };
        let Some(records) = codec::decode_records(payload) else {
            return;
        };
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for (_, entry) in records {
            state.store.reconcile_persisted(entry);
        }
        // Propagate, but do not echo external state back to the backend.
        recompute_pass(&self.registry, &mut state.store, &mut state.watches);
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Logical context name (empty for unpersisted managers)
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Log a structured snapshot of the cache state
    pub fn log(&self) {
        let guard = self.state.lock();
        debug!(
            context = %self.context,
            live = guard.store.live_count(),
            observed = guard.store.raw_key_count(),
            subscriptions = guard.watches.subscription_count(),
            meta = guard.meta.len(),
            "record cache state"
        );
        for (id, record) in guard.store.live_computed() {
            debug!(%id, fields = record.record.fields.len(), computed = record.computed.len(), "record");
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn set_and_watch_getters(&self, state: &mut ManagerState, record: Record) {
        let id = record.id.clone();
        if self.registry.is_empty() || state.watches.has_subscriptions(&id) {
            // Once subscriptions exist the recompute pass keeps computed
            // values current; no comparison needed.
            self.set_record_item_locked(state, &id, Some(record));
            return;
        }
        // First derivation-bearing write for this id. Raw goes in first so
        // the immediately-fired derivations see the new state.
        let previous = state.store.computed_of(&id).map(|entry| entry.computed.clone());
        let record_arc = Arc::new(record.clone());
        state.store.write_raw(record_arc);
        let fresh =
            init_computeds(&self.registry, &state.store, &mut state.watches, &id, Some(&record));
        let computed = match previous {
            // Deep-equal fresh values: keep the previous computed set
            // (raw-only refresh, no value churn).
            Some(previous) if computed_maps_equal(&previous, &fresh) => previous,
            _ => fresh,
        };
        state
            .store
            .write_computed(Arc::new(ComputedRecord::new(record, computed)));
        self.stamp_meta(state, &id);
    }

    fn set_record_item_locked(
        &self,
        state: &mut ManagerState,
        id: &RecordId,
        value: Option<Record>,
    ) {
        match value {
            None => state.store.tombstone(id),
            Some(record) if record.is_degenerate() => state.store.tombstone(id),
            Some(record) => {
                let record_arc = Arc::new(record);
                state.store.write_raw(record_arc.clone());
                let computed = init_computeds(
                    &self.registry,
                    &state.store,
                    &mut state.watches,
                    id,
                    Some(&record_arc),
                );
                state.store.write_computed(Arc::new(ComputedRecord::new(
                    Record::clone(&record_arc),
                    computed,
                )));
                self.stamp_meta(state, id);
            }
        }
    }

    fn stamp_meta(&self, state: &mut ManagerState, id: &RecordId) {
        if let Some(persist) = &self.persist {
            state
                .meta
                .stamp(id.clone(), Timestamp::now().saturating_add(persist.ttl));
        }
    }

    /// End-of-mutation: publish to live watches, then enqueue persistence
    pub(crate) fn commit_locked(&self, state: &mut ManagerState) {
        recompute_pass(&self.registry, &mut state.store, &mut state.watches);
        self.flush_locked(state);
    }

    pub(crate) fn flush_locked(&self, state: &ManagerState) {
        if let Some(persist) = &self.persist {
            let records = codec::encode_records(state.store.computed_entries(), false);
            persist
                .flusher
                .enqueue_projection(&persist.records_key, records);
            let meta = codec::encode_meta(&state.meta.to_map());
            persist.flusher.enqueue_projection(&persist.meta_key, meta);
        }
    }
}

/// Field-indexed callable surface over the registered derivations
pub struct ComputedGetters<'m> {
    manager: &'m RecordManager,
}

impl ComputedGetters<'_> {
    /// Declared derivation field names
    pub fn fields(&self) -> Vec<String> {
        self.manager.registry.field_names().cloned().collect()
    }

    /// Invoke a derivation field
    ///
    /// - `DeriveTarget::None`: apply the derivation with no target (id-less
    ///   or hypothetical inputs).
    /// - id/record target with no extra args: ensure a subscription exists
    ///   (lazily subscribing) and return the memoized value.
    /// - any extra args: always recompute fresh, bypassing the memo.
    ///
    /// Returns `None` for an unregistered field.
    pub fn call(&self, field: &str, target: DeriveTarget<'_>, extra: &[Value]) -> Option<Value> {
        let derive = self.manager.registry.get(field)?.clone();
        let mut guard = self.manager.state.lock();
        let state = &mut *guard;
        match target {
            DeriveTarget::None => {
                Some(derive(&RawView::new(&state.store), DeriveTarget::None, extra))
            }
            DeriveTarget::Id(id) => {
                let id = RecordId::new(id);
                let cached = watch_getter(
                    &self.manager.registry,
                    &state.store,
                    &mut state.watches,
                    &id,
                    field,
                );
                if extra.is_empty() {
                    Some(cached)
                } else {
                    Some(derive(
                        &RawView::new(&state.store),
                        DeriveTarget::Id(id.as_str()),
                        extra,
                    ))
                }
            }
            DeriveTarget::Record(record) => {
                let id = record.id.clone();
                let cached = watch_getter(
                    &self.manager.registry,
                    &state.store,
                    &mut state.watches,
                    &id,
                    field,
                );
                if extra.is_empty() {
                    Some(cached)
                } else {
                    Some(derive(
                        &RawView::new(&state.store),
                        DeriveTarget::Record(record),
                        extra,
                    ))
                }
            }
        }
    }
}

fn computed_maps_equal(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .all(|(field, value)| diff::is_equal(Some(value), b.get(field)))
}
