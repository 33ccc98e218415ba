//! Record manager builder for fluent configuration
//!
//! The builder is the only way to construct a [`RecordManager`]: the
//! derivation registry must be fixed before the manager exists, and the
//! persisted-state load, raw reconcile, and eviction sweep all have to run
//! before any external mutation is accepted.

use crate::computed::{DeriveRegistry, DeriveTarget, RawView};
use crate::manager::{ManagerState, PersistHandle, RecordManager};
use crate::meta::{self, CacheEntry, CacheMeta};
use parking_lot::Mutex;
use recache_core::{Error, Record, RecordId, Result, Timestamp, Value};
use recache_storage::{codec, Flusher, StorageBackend};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder for [`RecordManager`] configuration
///
/// # Example
///
/// ```ignore
/// let manager = RecordManagerBuilder::new()
///     .context("notes")
///     .persist(Arc::new(DiskBackend::open("/data/cache")?))
///     .derive("excerpt", |raw, target, _extra| {
///         // pure function over the raw lookup
///         # let _ = (raw, target); recache_core::Value::Null
///     })
///     .build()?;
/// ```
pub struct RecordManagerBuilder {
    context: String,
    ttl: Duration,
    backend: Option<Arc<dyn StorageBackend>>,
    initial: BTreeMap<RecordId, Option<Record>>,
    registry: DeriveRegistry,
}

impl Default for RecordManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordManagerBuilder {
    /// Create a builder with defaults: no persistence, no derivations,
    /// one-week TTL
    pub fn new() -> Self {
        RecordManagerBuilder {
            context: String::new(),
            ttl: meta::default_ttl(),
            backend: None,
            initial: BTreeMap::new(),
            registry: DeriveRegistry::new(),
        }
    }

    /// Logical context name; required when persistence is enabled
    ///
    /// Doubles as the durable record-set key; cache metadata lives under
    /// the sibling key `<context>[cache-meta]`.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Enable persistence through the given backend
    pub fn persist(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the default one-week TTL for persisted entries
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Seed records applied through the normal set path after construction
    ///
    /// `None` entries are nullish and silently skipped, matching `set`.
    pub fn initial(mut self, initial: BTreeMap<RecordId, Option<Record>>) -> Self {
        self.initial = initial;
        self
    }

    /// Register a derivation field (immutable once built)
    pub fn derive<F>(mut self, field: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&RawView<'_>, DeriveTarget<'_>, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.registry.register(field, derive);
        self
    }

    /// Construct the manager
    ///
    /// Build order: load and decode the persisted computed store and
    /// metadata, reconcile the raw projection, run the one-shot eviction
    /// sweep, seed `initial`, then register the external-change watch.
    pub fn build(self) -> Result<Arc<RecordManager>> {
        let RecordManagerBuilder {
            context,
            ttl,
            backend,
            initial,
            registry,
        } = self;

        if backend.is_some() && context.is_empty() {
            return Err(Error::InvalidConfig(
                "persistence requires a non-empty context".to_string(),
            ));
        }

        let mut state = ManagerState::default();
        let mut evicted = false;

        let persist = match backend {
            Some(backend) => {
                let records_key = context.clone();
                let meta_key = format!("{context}[cache-meta]");

                // Adopt a prior session's computed store; raw is recovered
                // by stripping, with drift resolved in favor of the
                // persisted entry.
                if let Some(payload) = backend.read(&records_key) {
                    if let Some(records) = codec::decode_records(&payload) {
                        for (_, entry) in records {
                            state.store.reconcile_persisted(entry);
                        }
                    }
                }
                if let Some(payload) = backend.read(&meta_key) {
                    if let Some(map) = codec::decode_meta::<CacheEntry>(&payload) {
                        state.meta = CacheMeta::from_map(map);
                    }
                }

                // The one and only eviction sweep: synchronous, one-pass,
                // before any external mutation.
                let expired = state.meta.sweep_expired(Timestamp::now());
                for id in &expired {
                    state.store.remove(id);
                    state.watches.remove(id);
                }
                if !expired.is_empty() {
                    evicted = true;
                    debug!(context = %context, count = expired.len(), "evicted expired records");
                }

                let flusher = Flusher::spawn(backend.clone());
                Some(PersistHandle {
                    backend,
                    flusher,
                    records_key,
                    meta_key,
                    ttl,
                })
            }
            None => None,
        };

        let manager = Arc::new(RecordManager {
            context,
            registry,
            persist,
            state: Mutex::new(state),
        });

        // Evictions must reach the durable layer even if nothing else
        // mutates this session.
        if evicted {
            let guard = manager.state.lock();
            manager.flush_locked(&guard);
        }

        for (id, item) in initial {
            if let Some(mut record) = item {
                record.id = id;
                manager.set(record);
            }
        }

        if let Some(persist) = &manager.persist {
            let weak = Arc::downgrade(&manager);
            persist.backend.watch(
                &persist.records_key,
                Box::new(move |payload| {
                    if let Some(manager) = weak.upgrade() {
                        manager.apply_external(payload.as_deref());
                    }
                }),
            );
        }

        Ok(manager)
    }
}
