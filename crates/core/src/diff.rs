//! Deep structural equality and diff
//!
//! Used by the cache engine to detect no-op computations: a derivation whose
//! fresh output deep-equals the memoized value must not touch the computed
//! store. `Value` is an owned tree, so the walk always terminates; cyclic
//! graphs cannot be constructed.

use crate::value::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One differing leaf: the value on each side
///
/// A side that is missing at the path is recorded as `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    /// Value on the previous side
    pub prev: Value,
    /// Value on the next side
    pub next: Value,
}

/// Deep diff over nested container structures
///
/// Produces one entry per leaf path whose primitive value differs. Paths are
/// `/`-joined segments, e.g. `items/0/name`. Two container values with an
/// empty diff are equal.
pub fn diff_deep(prev: &Value, next: &Value) -> BTreeMap<String, DiffEntry> {
    let mut out = BTreeMap::new();
    walk(prev, next, String::new(), &mut out);
    out
}

/// Distinct top-level keys touched by the deep diff
///
/// Used after a batch write to know which records changed.
pub fn diff_shallow(prev: &Value, next: &Value) -> BTreeSet<String> {
    diff_deep(prev, next)
        .keys()
        .map(|path| match path.split_once('/') {
            Some((head, _)) => head.to_string(),
            None => path.clone(),
        })
        .collect()
}

/// Structural equality with nullish handling
///
/// Absent and `Value::Null` are nullish and equal only to each other.
/// Containers are equal iff their deep diff is empty; primitives use strict
/// equality; variant mismatches are unequal.
pub fn is_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a.is_container() && b.is_container() {
                diff_deep(a, b).is_empty()
            } else {
                a == b
            }
        }
        _ => false,
    }
}

/// Equality over owned values, nullish-aware
pub fn is_equal_value(a: &Value, b: &Value) -> bool {
    is_equal(Some(a), Some(b))
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}/{segment}")
    }
}

fn walk(prev: &Value, next: &Value, path: String, out: &mut BTreeMap<String, DiffEntry>) {
    match (prev, next) {
        (Value::Array(a), Value::Array(b)) => {
            let len = a.len().max(b.len());
            for i in 0..len {
                let p = a.get(i).unwrap_or(&Value::Null);
                let n = b.get(i).unwrap_or(&Value::Null);
                walk(p, n, join(&path, &i.to_string()), out);
            }
        }
        (Value::Object(a), Value::Object(b)) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                let p = a.get(key).unwrap_or(&Value::Null);
                let n = b.get(key).unwrap_or(&Value::Null);
                walk(p, n, join(&path, key), out);
            }
        }
        (Value::Map(a), Value::Map(b)) => {
            // Entry lists diff positionally, like arrays of [key, value]
            let len = a.len().max(b.len());
            for i in 0..len {
                let null_pair = (Value::Null, Value::Null);
                let (pk, pv) = a.get(i).unwrap_or(&null_pair);
                let (nk, nv) = b.get(i).unwrap_or(&null_pair);
                let base = join(&path, &i.to_string());
                walk(pk, nk, join(&base, "key"), out);
                walk(pv, nv, join(&base, "value"), out);
            }
        }
        (Value::Set(a), Value::Set(b)) => {
            let len = a.len().max(b.len());
            for i in 0..len {
                let p = a.get(i).unwrap_or(&Value::Null);
                let n = b.get(i).unwrap_or(&Value::Null);
                walk(p, n, join(&path, &i.to_string()), out);
            }
        }
        (p, n) => {
            if p != n {
                out.insert(
                    path,
                    DiffEntry {
                        prev: p.clone(),
                        next: n.clone(),
                    },
                );
            }
        }
    }
}
