//! recache-engine: dual-store synchronization and computed-value caching
//!
//! The engine keeps two parallel projections of one logical record set —
//! raw values and values joined with computed fields — consistent under
//! mutation, lazily establishes and memoizes per-record per-field derived
//! computations, and expires persisted entries at startup.
//!
//! Entry point: [`RecordManagerBuilder`] → [`RecordManager`].
//!
//! ```ignore
//! use recache_engine::{DeriveTarget, RecordManagerBuilder};
//! use recache_core::{Record, Value};
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
//! let doubled = manager.get("a").unwrap().computed["double"].clone();
//! assert_eq!(doubled, Value::Int(4));
//! # Ok::<(), recache_core::Error>(())
//! ```

pub mod builder;
pub mod computed;
pub mod manager;
pub mod meta;
pub mod store;

pub use builder::RecordManagerBuilder;
pub use computed::{DeriveFn, DeriveRegistry, DeriveTarget, RawView};
pub use manager::{ComputedGetters, RecordManager};
pub use meta::{default_ttl, CacheEntry, CacheMeta, DEFAULT_TTL_MS};
pub use store::DualStore;
