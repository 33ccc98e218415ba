//! Persisted payload codec
//!
//! The durable layout is one JSON document per logical key: the record set
//! (computed projection) under the manager context, and the cache metadata
//! under `<context>[cache-meta]`. Container values round-trip through the
//! tagged `{dataType, value}` form handled by `Value`.
//!
//! Decoding is soft-fail throughout: a payload that does not parse, or
//! parses to a non-conforming shape, is treated as absent (with a warning),
//! never as a crash. Individual malformed entries are skipped.

use recache_core::{ComputedRecord, Record, RecordId, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Serialize the computed-record projection of the store
///
/// With `include_nullish = false` tombstones are dropped; when the
/// resulting projection is empty, returns `None`, meaning the durable key
/// should be removed entirely rather than storing an empty structure.
pub fn encode_records<'a, I>(records: I, include_nullish: bool) -> Option<String>
where
    I: IntoIterator<Item = (&'a RecordId, Option<&'a ComputedRecord>)>,
{
    let mut out = serde_json::Map::new();
    for (id, entry) in records {
        match entry {
            Some(record) => {
                out.insert(id.to_string(), record_to_json(record));
            }
            None if include_nullish => {
                out.insert(id.to_string(), serde_json::Value::Null);
            }
            None => {}
        }
    }
    if out.is_empty() {
        return None;
    }
    Some(serde_json::Value::Object(out).to_string())
}

/// Decode a persisted record set
///
/// Returns `None` when the payload is absent-equivalent (unparseable or not
/// an object). Tombstone (`null`) and malformed entries are skipped.
pub fn decode_records(payload: &str) -> Option<BTreeMap<RecordId, ComputedRecord>> {
    let json = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, "persisted record set does not parse; treating as absent");
            return None;
        }
    };
    let serde_json::Value::Object(entries) = json else {
        warn!("persisted record set is not an object; treating as absent");
        return None;
    };
    let mut out = BTreeMap::new();
    for (key, entry) in entries {
        if entry.is_null() {
            continue;
        }
        match record_from_json(&key, entry) {
            Some(record) => {
                out.insert(RecordId::new(key), record);
            }
            None => {
                warn!(id = %key, "skipping malformed persisted record");
            }
        }
    }
    Some(out)
}

/// Serialize a metadata map, dropping nothing (entries are never nullish)
///
/// Returns `None` for an empty map, meaning the durable key should be
/// removed.
pub fn encode_meta<T: Serialize>(meta: &BTreeMap<RecordId, T>) -> Option<String> {
    if meta.is_empty() {
        return None;
    }
    match serde_json::to_string(meta) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(%err, "failed to serialize cache metadata");
            None
        }
    }
}

/// Decode a metadata map; soft-fails to `None`
pub fn decode_meta<T: DeserializeOwned>(payload: &str) -> Option<BTreeMap<RecordId, T>> {
    match serde_json::from_str(payload) {
        Ok(map) => Some(map),
        Err(err) => {
            warn!(%err, "persisted cache metadata does not parse; treating as absent");
            None
        }
    }
}

fn record_to_json(record: &ComputedRecord) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (name, value) in &record.record.fields {
        map.insert(name.clone(), value.to_json());
    }
    map.insert(
        "id".to_string(),
        serde_json::Value::String(record.id().to_string()),
    );
    let computed = record
        .computed
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    map.insert("computed".to_string(), serde_json::Value::Object(computed));
    serde_json::Value::Object(map)
}

fn record_from_json(key: &str, json: serde_json::Value) -> Option<ComputedRecord> {
    let serde_json::Value::Object(mut map) = json else {
        return None;
    };
    // The map key is authoritative; an embedded id that disagrees with it
    // marks the entry malformed.
    match map.remove("id") {
        Some(serde_json::Value::String(id)) if id == key => {}
        Some(_) => return None,
        None => {}
    }
    if key.is_empty() {
        return None;
    }
    let computed = match map.remove("computed") {
        Some(serde_json::Value::Object(entries)) => entries
            .into_iter()
            .map(|(name, value)| (name, Value::from_json(value)))
            .collect(),
        Some(_) => return None,
        None => BTreeMap::new(),
    };
    let mut record = Record::new(key);
    for (name, value) in map {
        record.fields.insert(name, Value::from_json(value));
    }
    Some(ComputedRecord::new(record, computed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(id: &str, x: i64, double: i64) -> ComputedRecord {
        ComputedRecord::new(
            Record::new(id).with_field("x", x),
            BTreeMap::from([("double".to_string(), Value::Int(double))]),
        )
    }

    #[test]
    fn test_record_set_round_trip() {
        let a = joined("a", 1, 2);
        let b = joined("b", 3, 6);
        let payload = encode_records(
            [
                (&RecordId::new("a"), Some(&a)),
                (&RecordId::new("b"), Some(&b)),
            ],
            false,
        )
        .unwrap();
        let decoded = decode_records(&payload).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[&RecordId::new("a")], a);
        assert_eq!(decoded[&RecordId::new("b")], b);
    }

    #[test]
    fn test_tombstones_dropped_and_empty_projection_removes_key() {
        let id = RecordId::new("gone");
        assert_eq!(encode_records([(&id, None)], false), None);
        // include_nullish keeps the null entry
        let payload = encode_records([(&id, None)], true).unwrap();
        assert!(payload.contains("null"));
        // decode skips the tombstone
        assert!(decode_records(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_embedded_id_mismatch_is_malformed() {
        // the map key names the record; a disagreeing embedded id must not
        // resurrect the entry under a different identity
        let payload = r#"{"a": {"x": 1, "id": "b", "computed": {}}}"#;
        assert!(decode_records(payload).unwrap().is_empty());

        // a matching embedded id is fine
        let payload = r#"{"a": {"x": 1, "id": "a", "computed": {}}}"#;
        let decoded = decode_records(payload).unwrap();
        assert_eq!(decoded[&RecordId::new("a")].id(), &RecordId::new("a"));
    }

    #[test]
    fn test_decode_soft_fails() {
        assert_eq!(decode_records("not json"), None);
        assert_eq!(decode_records("[1,2,3]"), None);
        // malformed entry skipped, good entry kept
        let payload = r#"{"a": 5, "b": {"x": 1, "computed": {}}}"#;
        let decoded = decode_records(payload).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded.contains_key(&RecordId::new("b")));
    }

    #[test]
    fn test_container_values_survive_persistence() {
        let mut record = Record::new("a");
        record.set_field(
            "tags",
            Value::Set(vec![Value::from("x"), Value::from("y")]),
        );
        let joined = ComputedRecord::new(
            record,
            BTreeMap::from([(
                "index".to_string(),
                Value::Map(vec![(Value::from("x"), Value::Int(0))]),
            )]),
        );
        let payload = encode_records([(&RecordId::new("a"), Some(&joined))], false).unwrap();
        let decoded = decode_records(&payload).unwrap();
        assert_eq!(decoded[&RecordId::new("a")], joined);
    }

    #[test]
    fn test_meta_round_trip() {
        use recache_core::Timestamp;
        let meta = BTreeMap::from([(RecordId::new("a"), Timestamp::from_millis(123))]);
        let payload = encode_meta(&meta).unwrap();
        let decoded: BTreeMap<RecordId, Timestamp> = decode_meta(&payload).unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(encode_meta::<Timestamp>(&BTreeMap::new()), None);
        assert_eq!(decode_meta::<Timestamp>("nope"), None);
    }
}
