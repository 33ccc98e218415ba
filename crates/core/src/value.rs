//! Value types for recache
//!
//! This module defines:
//! - Value: Unified enum for all record field data
//!
//! ## Canonical Value Model
//!
//! The Value enum has exactly 9 variants:
//! - Null, Bool, Int, Float, String, Array, Object, Map, Set
//!
//! `Map` and `Set` exist because derived computations may produce keyed or
//! deduplicated containers that must survive persistence. They serialize as
//! a tagged JSON form (`{"dataType": "Map"|"Set", "value": [...]}`) so the
//! persisted payload round-trips without losing the container kind.
//!
//! ### Type Rules
//!
//! - No implicit type coercions
//! - `Int(1) != Float(1.0)` - different variants are NEVER equal
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical recache value type for record fields and computed values
///
/// Different variants are NEVER equal, even if they contain the same
/// "value": `Int(1) != Float(1.0)`.
///
/// Float equality follows IEEE-754 semantics:
/// - `NaN != NaN`
/// - `-0.0 == 0.0`
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object with string keys (JSON object)
    Object(BTreeMap<String, Value>),
    /// Ordered map with arbitrary value keys (persisted as tagged form)
    Map(Vec<(Value, Value)>),
    /// Ordered set of values (persisted as tagged form)
    Set(Vec<Value>),
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // IEEE-754: NaN != NaN, -0.0 == 0.0
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            // Different variants are NEVER equal
            _ => false,
        }
    }
}

impl Value {
    /// Get the variant name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is a container (anything that diffing recurses into)
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Map(_) | Value::Set(_)
        )
    }

    /// Get the string value, if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value, if this is an Int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the float value, if this is a Float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the bool value, if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the array elements, if this is an Array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get the object entries, if this is an Object
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Insert into a Set variant, skipping structurally-equal duplicates
    ///
    /// Returns true if the value was inserted. Panics never; non-Set
    /// receivers return false.
    pub fn set_insert(&mut self, value: Value) -> bool {
        match self {
            Value::Set(items) => {
                if items.contains(&value) {
                    false
                } else {
                    items.push(value);
                    true
                }
            }
            _ => false,
        }
    }

    /// Convert to the JSON representation used by the persisted payload
    ///
    /// `Map` and `Set` become the tagged form
    /// `{"dataType": "Map"|"Set", "value": [...]}`. Everything else maps to
    /// its natural JSON counterpart.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => {
                // JSON has no NaN/Infinity; those degrade to null
                serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => {
                let map = entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                serde_json::Value::Object(map)
            }
            Value::Map(entries) => {
                let pairs = entries
                    .iter()
                    .map(|(k, v)| serde_json::Value::Array(vec![k.to_json(), v.to_json()]))
                    .collect();
                tagged("Map", serde_json::Value::Array(pairs))
            }
            Value::Set(items) => {
                let elems = items.iter().map(Value::to_json).collect();
                tagged("Set", serde_json::Value::Array(elems))
            }
        }
    }

    /// Build a Value from its JSON representation
    ///
    /// Recognizes the tagged `{"dataType": "Map"|"Set", "value": [...]}`
    /// form anywhere in the tree. Numbers become `Int` when they fit i64,
    /// `Float` otherwise.
    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                if let Some(v) = untag(&map) {
                    return v;
                }
                Value::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, Value::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

/// Wrap a container payload in the tagged persistence form
fn tagged(data_type: &str, value: serde_json::Value) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(
        "dataType".to_string(),
        serde_json::Value::String(data_type.to_string()),
    );
    map.insert("value".to_string(), value);
    serde_json::Value::Object(map)
}

/// Decode the tagged `{dataType, value}` form, if this object is one
fn untag(map: &serde_json::Map<String, serde_json::Value>) -> Option<Value> {
    if map.len() != 2 {
        return None;
    }
    let data_type = map.get("dataType")?.as_str()?;
    let payload = map.get("value")?.as_array()?;
    match data_type {
        "Map" => {
            let mut entries = Vec::with_capacity(payload.len());
            for pair in payload {
                let pair = pair.as_array()?;
                if pair.len() != 2 {
                    return None;
                }
                entries.push((
                    Value::from_json(pair[0].clone()),
                    Value::from_json(pair[1].clone()),
                ));
            }
            Some(Value::Map(entries))
        }
        "Set" => Some(Value::Set(
            payload.iter().map(|v| Value::from_json(v.clone())).collect(),
        )),
        _ => None,
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(json))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
