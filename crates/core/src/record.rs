//! Record types
//!
//! A record is the atomic unit of storage: a unique string id plus an
//! otherwise-opaque field map. `ComputedRecord` is the explicit
//! "record joined with its derived fields" representation; raw records can
//! never carry computed values, so stripping is a type conversion rather
//! than structural sniffing.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

/// Unique record identifier
///
/// Identity is by id; record content is opaque to the cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// View the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty id (degenerate, never stored)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Allows map lookups keyed by RecordId to take &str
impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Deref for RecordId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId(id)
    }
}

/// Raw record: id plus field map, no derived values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier
    pub id: RecordId,
    /// Record content, keyed by field name
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record with the given id
    pub fn new(id: impl Into<RecordId>) -> Self {
        Record {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Read a field by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Insert or replace a field
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// A record is degenerate when it has no identity or no content.
    /// Degenerate records are written as tombstones, never stored.
    pub fn is_degenerate(&self) -> bool {
        self.id.is_empty() || self.fields.is_empty()
    }

    /// The record content as a single Object value (used by diffing)
    pub fn as_value(&self) -> Value {
        let mut entries = self.fields.clone();
        entries.insert("id".to_string(), Value::String(self.id.to_string()));
        Value::Object(entries)
    }
}

/// Record joined with its derived field values
///
/// Invariant: `record` is always deep-equal to the raw-store entry for the
/// same id. `computed` holds the last value produced by each registered
/// derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedRecord {
    /// The raw record portion
    #[serde(flatten)]
    pub record: Record,
    /// Derived values, keyed by derivation field name
    pub computed: BTreeMap<String, Value>,
}

impl ComputedRecord {
    /// Join a raw record with a set of computed values
    pub fn new(record: Record, computed: BTreeMap<String, Value>) -> Self {
        ComputedRecord { record, computed }
    }

    /// The record id
    pub fn id(&self) -> &RecordId {
        &self.record.id
    }

    /// Strip the computed values, leaving the raw record
    pub fn into_record(self) -> Record {
        self.record
    }

    /// Read a direct field of the joined record
    ///
    /// `"id"` resolves to the id and `"computed"` to the whole computed map,
    /// matching field addressing on the joined representation.
    pub fn child(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.record.id.to_string())),
            "computed" => Some(Value::Object(self.computed.clone())),
            _ => self.record.fields.get(key).cloned(),
        }
    }
}

impl From<ComputedRecord> for Record {
    fn from(joined: ComputedRecord) -> Record {
        joined.into_record()
    }
}
