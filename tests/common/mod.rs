//! Shared helpers for the integration suites

#![allow(dead_code)]

pub use recache::{
    ComputedRecord, DeriveTarget, MemoryBackend, Record, RecordId, RecordManager,
    RecordManagerBuilder, StorageBackend, Value,
};
pub use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
pub use std::sync::Arc;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route engine logs through the test harness, once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A record with a single integer field `x`
pub fn rec(id: &str, x: i64) -> Record {
    Record::new(id).with_field("x", x)
}

/// Manager with one derivation, `double`, that doubles the target's `x`
/// and counts how often it is invoked
pub fn doubling_manager() -> (Arc<RecordManager>, Arc<AtomicUsize>) {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let manager = RecordManagerBuilder::new()
        .derive("double", move |raw, target, _extra| {
            counter.fetch_add(1, Ordering::SeqCst);
            match target
                .resolve(raw)
                .and_then(|r| r.field("x"))
                .and_then(Value::as_int)
            {
                Some(x) => Value::Int(x * 2),
                None => Value::Null,
            }
        })
        .build()
        .unwrap();
    (manager, calls)
}

/// Builder preconfigured with the `double` derivation (no call counter)
pub fn doubling_builder() -> RecordManagerBuilder {
    init_tracing();
    RecordManagerBuilder::new().derive("double", |raw, target, _extra| {
        match target
            .resolve(raw)
            .and_then(|r| r.field("x"))
            .and_then(Value::as_int)
        {
            Some(x) => Value::Int(x * 2),
            None => Value::Null,
        }
    })
}

/// The `double` value on a live computed record
pub fn double_of(manager: &RecordManager, id: &str) -> Value {
    manager.get(id).unwrap().computed["double"].clone()
}
