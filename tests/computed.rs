//! Computed-value engine tests
//!
//! Memoization, change propagation, subscription idempotence, and the
//! callable getter surface, through the public manager facade.

mod common;

use common::*;

// ============================================================================
// Memoization
// ============================================================================

#[test]
fn derivation_fires_once_per_write() {
    let (manager, calls) = doubling_manager();

    // first write subscribes and fires exactly once
    manager.set(rec("a", 1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(double_of(&manager, "a"), Value::Int(2));

    // same-value rewrite re-derives once and is otherwise a no-op
    manager.set(rec("a", 1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(double_of(&manager, "a"), Value::Int(2));

    // changed value re-derives once and updates the joined record
    manager.set(rec("a", 5));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(double_of(&manager, "a"), Value::Int(10));
}

#[test]
fn reads_never_invoke_the_derivation() {
    let (manager, calls) = doubling_manager();
    manager.set(rec("a", 2));
    let after_write = calls.load(Ordering::SeqCst);

    for _ in 0..10 {
        assert_eq!(double_of(&manager, "a"), Value::Int(4));
        manager.get_raw("a");
    }
    assert_eq!(calls.load(Ordering::SeqCst), after_write);
}

#[test]
fn subscription_is_created_once_per_field() {
    let (manager, _) = doubling_manager();
    manager.set(rec("a", 1));
    assert_eq!(manager.subscription_count(), 1);

    manager.set(rec("a", 2));
    manager.getters().call("double", DeriveTarget::Id("a"), &[]);
    assert_eq!(manager.subscription_count(), 1);

    manager.set(rec("b", 1));
    assert_eq!(manager.subscription_count(), 2);
}

// ============================================================================
// Change propagation
// ============================================================================

#[test]
fn write_propagates_to_the_joined_record() {
    let (manager, _) = doubling_manager();
    manager.set(rec("a", 5));
    assert_eq!(double_of(&manager, "a"), Value::Int(10));

    manager.set(rec("a", 6));
    assert_eq!(double_of(&manager, "a"), Value::Int(12));
}

#[test]
fn cross_record_derivation_tracks_its_source() {
    let manager = RecordManagerBuilder::new()
        .derive("mirror", |raw, _target, _extra| {
            match raw.lookup("source").and_then(|r| r.field("x")) {
                Some(v) => v.clone(),
                None => Value::Null,
            }
        })
        .build()
        .unwrap();

    manager.set(rec("source", 1));
    manager.set(rec("watcher", 0));
    assert_eq!(
        manager.get("watcher").unwrap().computed["mirror"],
        Value::Int(1)
    );

    // a write to a different record reaches the watcher's derived value
    manager.set(rec("source", 9));
    assert_eq!(
        manager.get("watcher").unwrap().computed["mirror"],
        Value::Int(9)
    );
}

#[test]
fn unrelated_fields_survive_a_recompute_merge() {
    let (manager, _) = doubling_manager();
    manager.set(rec("a", 1).with_field("name", "kept"));
    manager.set(rec("b", 1));
    manager.set(rec("b", 2));

    let joined = manager.get("a").unwrap();
    assert_eq!(joined.record.field("name"), Some(&Value::String("kept".into())));
    assert_eq!(joined.computed["double"], Value::Int(2));
}

// ============================================================================
// Getter surface
// ============================================================================

#[test]
fn getters_list_declared_fields() {
    let (manager, _) = doubling_manager();
    assert_eq!(manager.getters().fields(), vec!["double".to_string()]);
    assert_eq!(
        manager.getters().call("unregistered", DeriveTarget::None, &[]),
        None
    );
}

#[test]
fn id_target_call_is_memoized() {
    let (manager, calls) = doubling_manager();
    manager.set(rec("a", 3));
    let after_write = calls.load(Ordering::SeqCst);

    let first = manager.getters().call("double", DeriveTarget::Id("a"), &[]);
    let second = manager.getters().call("double", DeriveTarget::Id("a"), &[]);
    assert_eq!(first, Some(Value::Int(6)));
    assert_eq!(second, Some(Value::Int(6)));
    // both calls served from the memo cell
    assert_eq!(calls.load(Ordering::SeqCst), after_write);
}

#[test]
fn extra_args_bypass_the_memo() {
    let (manager, calls) = doubling_manager();
    manager.set(rec("a", 3));
    let before = calls.load(Ordering::SeqCst);

    manager
        .getters()
        .call("double", DeriveTarget::Id("a"), &[Value::Int(1)]);
    manager
        .getters()
        .call("double", DeriveTarget::Id("a"), &[Value::Int(1)]);
    assert_eq!(calls.load(Ordering::SeqCst), before + 2);

    // the memoized value is untouched
    assert_eq!(double_of(&manager, "a"), Value::Int(6));
}

#[test]
fn none_target_call_sees_the_whole_store() {
    let manager = RecordManagerBuilder::new()
        .derive("total", |raw, _target, _extra| {
            let sum: i64 = raw
                .records()
                .filter_map(|r| r.field("x").and_then(Value::as_int))
                .sum();
            Value::Int(sum)
        })
        .build()
        .unwrap();
    manager.set(rec("a", 1));
    manager.set(rec("b", 2));

    assert_eq!(
        manager.getters().call("total", DeriveTarget::None, &[]),
        Some(Value::Int(3))
    );
}

#[test]
fn getter_subscription_before_first_write_stays_current() {
    let (manager, _) = doubling_manager();

    // subscribing through the getter surface before the record exists
    let early = manager.getters().call("double", DeriveTarget::Id("late"), &[]);
    assert_eq!(early, Some(Value::Null));

    // the first write after that subscription must be observed
    manager.set(rec("late", 5));
    assert_eq!(manager.get("late").unwrap().computed["double"], Value::Int(10));
    assert_eq!(
        manager.getters().call("double", DeriveTarget::Id("late"), &[]),
        Some(Value::Int(10))
    );
}

#[test]
fn record_target_call_bypasses_the_store() {
    let (manager, _) = doubling_manager();
    let hypothetical = rec("a", 50);

    // nothing stored under "a"; the record itself is the target
    let value = manager.getters().call(
        "double",
        DeriveTarget::Record(&hypothetical),
        &[Value::Null],
    );
    assert_eq!(value, Some(Value::Int(100)));
}

// ============================================================================
// reset_computed
// ============================================================================

#[test]
fn reset_computed_rederives_against_external_inputs() {
    let external = Arc::new(AtomicI64::new(1));
    let input = external.clone();
    let manager = RecordManagerBuilder::new()
        .derive("ext", move |_raw, _target, _extra| {
            Value::Int(input.load(Ordering::SeqCst))
        })
        .build()
        .unwrap();

    manager.set(rec("a", 0));
    assert_eq!(manager.get("a").unwrap().computed["ext"], Value::Int(1));

    // the input shifted out-of-band; reads stay memoized until reset
    external.store(7, Ordering::SeqCst);
    assert_eq!(manager.get("a").unwrap().computed["ext"], Value::Int(1));

    manager.reset_computed();
    assert_eq!(manager.get("a").unwrap().computed["ext"], Value::Int(7));
    assert_eq!(manager.subscription_count(), 1);
}
