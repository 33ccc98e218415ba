//! Child paths into record fields
//!
//! This module defines types for nested child addressing:
//! - ChildPath: `/`-separated path into a record's fields (e.g. `items/0/name`)
//! - PathSegment: Individual path component (Key or Index)
//!
//! Paths are used by `set_child_of`: the first segment names a record field,
//! the rest descend into that field's value, with all-digit segments
//! addressing array indices.

use crate::error::{Error, PathError, Result};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Individual path component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key access (`name`)
    Key(String),
    /// Array index access (`0`)
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(idx) => write!(f, "{idx}"),
        }
    }
}

/// Path into a record's field tree
///
/// Segments are separated by `/`; all-digit segments address array indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildPath {
    segments: Vec<PathSegment>,
}

impl ChildPath {
    /// The path segments in order
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// True when the path is a single bare field name
    pub fn is_direct(&self) -> bool {
        self.segments.len() == 1
    }

    /// The leading field-name segment
    ///
    /// The first segment always addresses a record field, so an index here
    /// is a parse-level error caught in `FromStr`.
    pub fn head(&self) -> &str {
        match &self.segments[0] {
            PathSegment::Key(key) => key,
            PathSegment::Index(_) => unreachable!("leading segment is validated as a key"),
        }
    }
}

impl FromStr for ChildPath {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::Path(PathError::Empty));
        }
        let mut segments = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                return Err(Error::Path(PathError::Empty));
            }
            if part.bytes().all(|b| b.is_ascii_digit()) {
                let idx = part
                    .parse::<usize>()
                    .map_err(|_| Error::Path(PathError::BadIndex(part.to_string())))?;
                segments.push(PathSegment::Index(idx));
            } else {
                segments.push(PathSegment::Key(part.to_string()));
            }
        }
        if matches!(segments[0], PathSegment::Index(_)) {
            return Err(Error::Path(PathError::LeadingIndex));
        }
        Ok(ChildPath { segments })
    }
}

impl fmt::Display for ChildPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Set a value at a path within a record's field map
///
/// Creates intermediate containers as needed when the path does not exist;
/// the container kind (object vs array) is chosen by the next segment.
/// Array writes allow `index == len` as a push. Descending into a value of
/// the wrong shape is a type-mismatch error.
pub fn set_at_path(
    fields: &mut BTreeMap<String, Value>,
    path: &ChildPath,
    value: Value,
) -> Result<()> {
    let segments = path.segments();
    let head = path.head().to_string();

    if segments.len() == 1 {
        fields.insert(head, value);
        return Ok(());
    }

    let rest = &segments[1..];
    let slot = fields
        .entry(head)
        .or_insert_with(|| empty_container_for(&rest[0]));
    set_in_value(slot, rest, value)
}

fn empty_container_for(segment: &PathSegment) -> Value {
    match segment {
        PathSegment::Key(_) => Value::Object(BTreeMap::new()),
        PathSegment::Index(_) => Value::Array(Vec::new()),
    }
}

fn set_in_value(root: &mut Value, segments: &[PathSegment], value: Value) -> Result<()> {
    let (last, parents) = segments.split_last().unwrap();

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next = &segments[i + 1];
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(entries)) => entries
                .entry(key.clone())
                .or_insert_with(|| empty_container_for(next)),
            (PathSegment::Index(idx), Value::Array(items)) => {
                if *idx >= items.len() {
                    return Err(Error::Path(PathError::IndexOutOfBounds {
                        index: *idx,
                        len: items.len(),
                    }));
                }
                &mut items[*idx]
            }
            (PathSegment::Key(_), found) => {
                return Err(Error::Path(PathError::TypeMismatch {
                    expected: "object",
                    found: found.type_name(),
                }))
            }
            (PathSegment::Index(_), found) => {
                return Err(Error::Path(PathError::TypeMismatch {
                    expected: "array",
                    found: found.type_name(),
                }))
            }
        };
    }

    match (last, current) {
        (PathSegment::Key(key), Value::Object(entries)) => {
            entries.insert(key.clone(), value);
            Ok(())
        }
        (PathSegment::Index(idx), Value::Array(items)) => {
            if *idx < items.len() {
                items[*idx] = value;
                Ok(())
            } else if *idx == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(Error::Path(PathError::IndexOutOfBounds {
                    index: *idx,
                    len: items.len(),
                }))
            }
        }
        (PathSegment::Key(_), found) => Err(Error::Path(PathError::TypeMismatch {
            expected: "object",
            found: found.type_name(),
        })),
        (PathSegment::Index(_), found) => Err(Error::Path(PathError::TypeMismatch {
            expected: "array",
            found: found.type_name(),
        })),
    }
}
