//! Computed-value engine
//!
//! Each (record id, derivation field) pair moves through three states:
//! uninitialized (no subscription, no cached value) → subscribed (a live
//! recompute watch exists) → cached (the memo cell tracks the last derived
//! value). The source framework's automatic dependency tracking is replaced
//! by an explicit observer registry: after every committed raw-store write
//! the engine re-invokes every live derivation and compares the result with
//! the memo cell (`is_equal`); unchanged values are no-ops, changed values
//! update the cell and the computed store slot via copy-on-write merge.
//!
//! Subscription registration is idempotent per (id, field); a watch lives
//! until `unset`/`reset` tears it down.

use crate::store::DualStore;
use recache_core::{diff, ComputedRecord, Record, RecordId, Value};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-only lookup over the raw store, handed to derivations
///
/// Tombstones surface as `None`. Derivations may read any record, which is
/// what makes cross-record derived fields work.
pub struct RawView<'a> {
    raw: &'a FxHashMap<RecordId, Option<Arc<Record>>>,
}

impl<'a> RawView<'a> {
    pub(crate) fn new(store: &'a DualStore) -> Self {
        RawView {
            raw: store.raw_map(),
        }
    }

    /// Raw record by id; absent and tombstoned ids are both `None`
    pub fn lookup(&self, id: &str) -> Option<&Record> {
        self.raw
            .get(id)
            .and_then(|entry| entry.as_ref())
            .map(Arc::as_ref)
    }

    /// Iterate live records
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.raw
            .values()
            .filter_map(|entry| entry.as_ref())
            .map(Arc::as_ref)
    }
}

/// What a derivation is applied to
#[derive(Clone, Copy)]
pub enum DeriveTarget<'a> {
    /// No target: an id-less/hypothetical invocation
    None,
    /// A record resolved through the raw store
    Id(&'a str),
    /// A record supplied directly, bypassing the store
    Record(&'a Record),
}

impl<'a> DeriveTarget<'a> {
    /// Resolve the target against the raw store
    pub fn resolve(&self, raw: &'a RawView<'a>) -> Option<&'a Record> {
        match self {
            DeriveTarget::None => None,
            DeriveTarget::Id(id) => raw.lookup(id),
            DeriveTarget::Record(record) => Some(record),
        }
    }
}

/// A registered derivation
///
/// Pure function over the raw lookup, its target, and optional extra
/// arguments that parameterize a one-off computation. Must not call back
/// into the manager that owns it (the manager lock is held during
/// invocation).
pub type DeriveFn = Arc<dyn Fn(&RawView<'_>, DeriveTarget<'_>, &[Value]) -> Value + Send + Sync>;

/// Fixed field-name → derivation mapping
///
/// Built once at manager construction; immutable thereafter.
#[derive(Clone, Default)]
pub struct DeriveRegistry {
    fields: BTreeMap<String, DeriveFn>,
}

impl DeriveRegistry {
    /// Empty registry (no computed fields)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derivation under a field name (construction-time only)
    pub fn register<F>(&mut self, field: impl Into<String>, derive: F)
    where
        F: Fn(&RawView<'_>, DeriveTarget<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.fields.insert(field.into(), Arc::new(derive));
    }

    /// Look up a derivation by field name
    pub fn get(&self, field: &str) -> Option<&DeriveFn> {
        self.fields.get(field)
    }

    /// Declared field names, in order
    pub fn field_names(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    /// True when no derivation is declared
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl std::fmt::Debug for DeriveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeriveRegistry")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Subscription table and memo cells
#[derive(Debug, Default)]
pub struct ComputedState {
    /// Live (id, field) watches; a record with no entry has never had its
    /// computed values activated
    subs: BTreeMap<RecordId, BTreeSet<String>>,
    /// Last derived value per subscribed field
    cells: FxHashMap<RecordId, BTreeMap<String, Value>>,
    /// Pairs subscribed during the current mutation; the commit pass skips
    /// them because their cells were just computed against current state
    fresh: BTreeSet<(RecordId, String)>,
}

impl ComputedState {
    /// Whether a live watch exists for (id, field)
    pub fn is_subscribed(&self, id: &str, field: &str) -> bool {
        self.subs.get(id).is_some_and(|fields| fields.contains(field))
    }

    /// Whether any watch exists for this id
    pub fn has_subscriptions(&self, id: &str) -> bool {
        self.subs.contains_key(id)
    }

    /// Total number of live (id, field) watches
    pub fn subscription_count(&self) -> usize {
        self.subs.values().map(|fields| fields.len()).sum()
    }

    /// Cached value for a subscribed field
    pub fn cell(&self, id: &str, field: &str) -> Option<&Value> {
        self.cells.get(id).and_then(|cells| cells.get(field))
    }

    /// Tear down every watch and cell for an id (unset path)
    pub fn remove(&mut self, id: &str) {
        self.subs.remove(id);
        self.cells.remove(id);
        self.fresh.retain(|(fresh_id, _)| fresh_id.as_str() != id);
    }

    /// Tear down everything (reset / reset_computed path)
    pub fn clear(&mut self) {
        self.subs.clear();
        self.cells.clear();
        self.fresh.clear();
    }
}

/// Establish the (id, field) watch and produce its initial value
///
/// Idempotent: a second registration for an already-subscribed pair is a
/// checked no-op returning the memo cell. Never touches the fresh set:
/// only a caller that commits in the same critical section may mark the
/// pair fresh, otherwise the next mutation's publish pass would skip it
/// and serve a stale cell.
pub fn watch_getter(
    registry: &DeriveRegistry,
    store: &DualStore,
    state: &mut ComputedState,
    id: &RecordId,
    field: &str,
) -> Value {
    if state.is_subscribed(id, field) {
        return state.cell(id, field).cloned().unwrap_or(Value::Null);
    }
    let Some(derive) = registry.get(field) else {
        return Value::Null;
    };
    // Immediate fire: produce the initial value against current raw state.
    let value = derive(&RawView::new(store), DeriveTarget::Id(id), &[]);
    state
        .subs
        .entry(id.clone())
        .or_default()
        .insert(field.to_string());
    state
        .cells
        .entry(id.clone())
        .or_default()
        .insert(field.to_string(), value.clone());
    value
}

/// Initial computed map for a record
///
/// Nullish item → every declared field is null. Unsubscribed fields are
/// subscribed (immediate value); subscribed fields return their memo cell
/// without recomputing, avoiding duplicate derivation work when re-deriving
/// a record that is already watched.
pub fn init_computeds(
    registry: &DeriveRegistry,
    store: &DualStore,
    state: &mut ComputedState,
    id: &RecordId,
    item: Option<&Record>,
) -> BTreeMap<String, Value> {
    let fields: Vec<String> = registry.field_names().cloned().collect();
    let mut out = BTreeMap::new();
    for field in fields {
        let value = if item.is_none() {
            Value::Null
        } else if state.is_subscribed(id, &field) {
            state.cell(id, &field).cloned().unwrap_or(Value::Null)
        } else {
            let value = watch_getter(registry, store, state, id, &field);
            // This derivation ran against the raw state the enclosing
            // mutation just wrote; the commit pass need not repeat it.
            state.fresh.insert((id.clone(), field.clone()));
            value
        };
        out.insert(field, value);
    }
    out
}

/// Publish pass: recompute every live watch after a committed raw write
///
/// Runs synchronously inside the manager's critical section, in
/// deterministic subscription-table order. A derivation whose fresh output
/// equals the memo cell is a no-op; a changed output updates the cell and
/// the computed store slot via copy-on-write merge, leaving all other
/// fields of the record untouched. Pairs subscribed during this mutation
/// are skipped — their cells were just initialized against current state.
pub fn recompute_pass(registry: &DeriveRegistry, store: &mut DualStore, state: &mut ComputedState) {
    if registry.is_empty() || state.subs.is_empty() {
        state.fresh.clear();
        return;
    }

    // Phase 1: derive against an immutable view, collecting changes.
    let mut changes: Vec<(RecordId, String, Value)> = Vec::new();
    {
        let view = RawView::new(store);
        for (id, fields) in &state.subs {
            for field in fields {
                if state.fresh.contains(&(id.clone(), field.clone())) {
                    continue;
                }
                let Some(derive) = registry.get(field) else {
                    continue;
                };
                let next = derive(&view, DeriveTarget::Id(id), &[]);
                let unchanged = state
                    .cell(id, field)
                    .map(|prev| diff::is_equal_value(prev, &next))
                    .unwrap_or(false);
                if !unchanged {
                    changes.push((id.clone(), field.clone(), next));
                }
            }
        }
    }
    state.fresh.clear();

    // Phase 2: apply cell updates and merge into the computed store.
    for (id, field, value) in changes {
        state
            .cells
            .entry(id.clone())
            .or_default()
            .insert(field.clone(), value.clone());
        if let Some(current) = store.computed_of(&id) {
            let mut merged = ComputedRecord::clone(current);
            merged.computed.insert(field, value);
            store.write_computed(Arc::new(merged));
        }
    }
}
