//! recache-core: value model and foundational types
//!
//! This crate defines the types shared by the storage and engine layers:
//!
//! - [`Value`]: canonical value enum for record fields and computed values,
//!   including the tagged Map/Set container forms the persisted format
//!   round-trips
//! - [`Record`] / [`ComputedRecord`]: raw and computed-joined record types
//! - [`ChildPath`]: nested child addressing (`items/0/name`)
//! - [`diff`]: deep structural equality and diff
//! - [`Timestamp`]: millisecond epoch timestamps for cache metadata
//! - [`Error`] / [`Result`]: error types for the whole workspace

pub mod diff;
pub mod error;
pub mod path;
pub mod record;
pub mod time;
pub mod value;

pub use diff::{diff_deep, diff_shallow, is_equal, is_equal_value, DiffEntry};
pub use error::{Error, PathError, Result};
pub use path::{set_at_path, ChildPath, PathSegment};
pub use record::{ComputedRecord, Record, RecordId};
pub use time::Timestamp;
pub use value::Value;
