//! recache - per-entity record cache with derived-value memoization
//!
//! recache stores normalized records keyed by string id, automatically
//! recomputes declared computed fields when their inputs change, and
//! optionally persists the record set (with TTL-based expiration) through a
//! pluggable key-value backend.
//!
//! # Quick Start
//!
//! ```ignore
//! use recache::{Record, RecordManagerBuilder, Value};
//!
//! let manager = RecordManagerBuilder::new()
//!     .derive("double", |raw, target, _extra| {
//!         match target.resolve(raw).and_then(|r| r.field("x")).and_then(Value::as_int) {
//!             Some(x) => Value::Int(x * 2),
//!             None => Value::Null,
//!         }
//!     })
//!     .build()?;
//!
//! manager.set(Record::new("a").with_field("x", 2));
//! assert_eq!(manager.get("a").unwrap().computed["double"], Value::Int(4));
//! ```
//!
//! # Architecture
//!
//! The facade is [`RecordManager`] in `recache-engine`, which composes the
//! dual record store, the computed-value engine, and the cache metadata.
//! Durable storage is an external collaborator behind
//! [`StorageBackend`] in `recache-storage`; the value model and diffing
//! live in `recache-core`.

// Re-export the public API from the member crates
pub use recache_core::{
    diff_deep, diff_shallow, is_equal, is_equal_value, ChildPath, ComputedRecord, DiffEntry,
    Error, PathError, Record, RecordId, Result, Timestamp, Value,
};
pub use recache_engine::{
    default_ttl, ComputedGetters, DeriveRegistry, DeriveTarget, RawView, RecordManager,
    RecordManagerBuilder, DEFAULT_TTL_MS,
};
pub use recache_storage::{codec, DiskBackend, MemoryBackend, StorageBackend, WatchCallback};
