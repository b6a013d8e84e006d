//! Integration tests for the store engine
//!
//! Covers listener snapshot semantics, the reentrancy guard, action
//! validation, and reducer replacement.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use unistore_core::action::{Action, ActionError, InternalAction, ValueShape};
use unistore_core::composition::{SliceReducer, combine_reducers};
use unistore_core::reducer::{self, Reducer};
use unistore_runtime::{Operation, Store, StoreError, Unsubscribe};
use unistore_testing::CallLog;
use unistore_testing::helpers::{counter_reducer, init_tracing};
use unistore_testing::reducer_test::assertions::{assert_reentrancy, assert_rejected};

// ============================================================================
// Test Fixtures
// ============================================================================

fn increment() -> Value {
    json!({ "type": "counter/increment" })
}

fn counter_store() -> Store<i64, Value> {
    init_tracing();
    Store::new(counter_reducer()).unwrap()
}

// ============================================================================
// Dispatch and listeners
// ============================================================================

#[test]
fn test_counter_reaches_three_and_notifies_each_time() {
    let store = counter_store();
    let log = CallLog::new();
    let _listener = store.subscribe(log.listener("listener")).unwrap();

    for _ in 0..3 {
        store.dispatch(increment()).unwrap();
    }

    assert_eq!(*store.get_state().unwrap(), 3);
    assert_eq!(log.count("listener"), 3);
}

#[test]
fn test_listeners_run_in_subscription_order() {
    let store = counter_store();
    let log = CallLog::new();
    let _a = store.subscribe(log.listener("a")).unwrap();
    let _b = store.subscribe(log.listener("b")).unwrap();
    let _c = store.subscribe(log.listener("c")).unwrap();

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["a", "b", "c"]);
}

#[test]
fn test_same_callback_subscribed_twice_runs_twice() {
    let store = counter_store();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let listener: unistore_runtime::Listener = Arc::new(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let first = store.subscribe_listener(Arc::clone(&listener)).unwrap();
    let _second = store.subscribe_listener(listener).unwrap();

    store.dispatch(increment()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    first.unsubscribe().unwrap();
    store.dispatch(increment()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_listener_reads_state_after_transition() {
    let store = counter_store();
    let observed = Arc::new(Mutex::new(Vec::new()));

    let reader = store.clone();
    let sink = Arc::clone(&observed);
    let _listener = store
        .subscribe(move || sink.lock().unwrap().push(*reader.get_state().unwrap()))
        .unwrap();

    store.dispatch(increment()).unwrap();
    store.dispatch(json!({ "type": "counter/add", "amount": 10 })).unwrap();

    assert_eq!(*observed.lock().unwrap(), vec![1, 11]);
}

#[test]
fn test_unsubscribe_during_notification_keeps_snapshot() {
    // Listener A unsubscribes B while the first dispatch is notifying; B
    // still runs for that dispatch but not for the next one.
    let store = counter_store();
    let log = CallLog::new();
    let b_handle: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());

    let a_log = log.clone();
    let target = Arc::clone(&b_handle);
    let _a = store
        .subscribe(move || {
            a_log.record("a");
            if let Some(handle) = target.get() {
                handle.unsubscribe().unwrap();
            }
        })
        .unwrap();
    b_handle.set(store.subscribe(log.listener("b")).unwrap()).unwrap();

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["a", "b"]);

    log.clear();
    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["a"]);
}

#[test]
fn test_subscribe_during_notification_waits_for_next_dispatch() {
    let store = counter_store();
    let log = CallLog::new();
    let added: Arc<Mutex<Vec<Unsubscribe>>> = Arc::new(Mutex::new(Vec::new()));

    let handle = store.clone();
    let inner_log = log.clone();
    let sink = Arc::clone(&added);
    let _outer = store
        .subscribe(move || {
            inner_log.record("outer");
            let mut added = sink.lock().unwrap();
            if added.is_empty() {
                added.push(handle.subscribe(inner_log.listener("late")).unwrap());
            }
        })
        .unwrap();

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["outer"]);

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["outer", "outer", "late"]);
}

#[test]
fn test_self_unsubscribing_listener_runs_once() {
    let store = counter_store();
    let log = CallLog::new();
    let own: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());

    let handle = Arc::clone(&own);
    let once_log = log.clone();
    own.set(
        store
            .subscribe(move || {
                once_log.record("once");
                handle.get().unwrap().unsubscribe().unwrap();
            })
            .unwrap(),
    )
    .unwrap();

    store.dispatch(increment()).unwrap();
    store.dispatch(increment()).unwrap();
    assert_eq!(log.count("once"), 1);
    assert_eq!(store.listener_count(), 0);
}

#[test]
fn test_listener_swapping_itself_out_mid_notification() {
    // L2 unsubscribes itself and subscribes L4 from inside its callback.
    // L3 still runs for that dispatch; L4 first runs on the next one.
    let store = counter_store();
    let log = CallLog::new();
    let own: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());
    let added: Arc<Mutex<Vec<Unsubscribe>>> = Arc::new(Mutex::new(Vec::new()));

    let _l1 = store.subscribe(log.listener("L1")).unwrap();

    let handle = store.clone();
    let l2_log = log.clone();
    let l2_own = Arc::clone(&own);
    let sink = Arc::clone(&added);
    own.set(
        store
            .subscribe(move || {
                l2_log.record("L2");
                l2_own.get().unwrap().unsubscribe().unwrap();
                sink.lock()
                    .unwrap()
                    .push(handle.subscribe(l2_log.listener("L4")).unwrap());
            })
            .unwrap(),
    )
    .unwrap();

    let _l3 = store.subscribe(log.listener("L3")).unwrap();

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["L1", "L2", "L3"]);

    log.clear();
    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["L1", "L3", "L4"]);
    assert_eq!(store.listener_count(), 3);
}

#[test]
fn test_nested_dispatch_from_listener_completes_first() {
    let store = counter_store();
    let log = CallLog::new();

    let nested = store.clone();
    let first_log = log.clone();
    let _first = store
        .subscribe(move || {
            let count = *nested.get_state().unwrap();
            first_log.record(format!("first:{count}"));
            if count == 1 {
                nested.dispatch(increment()).unwrap();
            }
        })
        .unwrap();

    let reader = store.clone();
    let second_log = log.clone();
    let _second = store
        .subscribe(move || second_log.record(format!("second:{}", reader.get_state().unwrap())))
        .unwrap();

    store.dispatch(increment()).unwrap();

    // The nested dispatch notifies everyone before the outer loop resumes
    assert_eq!(log.entries(), ["first:1", "first:2", "second:2", "second:2"]);
}

#[test]
fn test_double_unsubscribe_is_noop() {
    let store = counter_store();
    let log = CallLog::new();
    let _keep = store.subscribe(log.listener("keep")).unwrap();
    let handle = store.subscribe(log.listener("drop")).unwrap();

    handle.unsubscribe().unwrap();
    handle.unsubscribe().unwrap();
    assert!(!handle.is_subscribed());

    store.dispatch(increment()).unwrap();
    assert_eq!(log.entries(), ["keep"]);
}

// ============================================================================
// Reentrancy guard
// ============================================================================

#[test]
fn test_reducer_cannot_touch_the_store() {
    let slot: Arc<OnceLock<Store<i64, Value>>> = Arc::new(OnceLock::new());
    let listener_handle: Arc<OnceLock<Unsubscribe>> = Arc::new(OnceLock::new());
    let outcomes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    let store_slot = Arc::clone(&slot);
    let handle_slot = Arc::clone(&listener_handle);
    let sink = Arc::clone(&outcomes);
    let store = Store::new(reducer::from_fn(move |state: Option<&i64>, action: &Value| {
        if action.action_type() == Ok("probe") {
            let store = store_slot.get().unwrap();
            let mut sink = sink.lock().unwrap();

            let result = store.get_state();
            assert_reentrancy(&result, Operation::GetState);
            sink.push("get_state".to_owned());

            let result = store.subscribe(|| {});
            assert_reentrancy(&result, Operation::Subscribe);
            sink.push("subscribe".to_owned());

            let result = handle_slot.get().unwrap().unsubscribe();
            assert_reentrancy(&result, Operation::Unsubscribe);
            sink.push("unsubscribe".to_owned());

            let result = store.dispatch(json!({ "type": "counter/increment" }));
            assert_reentrancy(&result, Operation::Dispatch);
            sink.push("dispatch".to_owned());
        }
        Ok(state.copied().unwrap_or(0))
    }))
    .unwrap();
    slot.set(store.clone()).unwrap();
    listener_handle.set(store.subscribe(|| {}).unwrap()).unwrap();

    store.dispatch(json!({ "type": "probe" })).unwrap();

    assert_eq!(
        *outcomes.lock().unwrap(),
        ["get_state", "subscribe", "unsubscribe", "dispatch"]
    );
    // The refused unsubscribe left the listener in place
    assert!(listener_handle.get().unwrap().is_subscribed());
    assert_eq!(store.listener_count(), 1);
    assert!(!store.is_dispatching());
}

#[test]
fn test_panicking_reducer_resets_guard() {
    let store = Store::new(reducer::from_fn(|state: Option<&i64>, action: &Value| {
        if action.action_type() == Ok("explode") {
            panic!("reducer exploded");
        }
        Ok(state.copied().unwrap_or(0) + 1)
    }))
    .unwrap();

    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = store.dispatch(json!({ "type": "explode" }));
    }));
    assert!(crashed.is_err());

    assert!(!store.is_dispatching());
    store.dispatch(json!({ "type": "again" })).unwrap();
    assert_eq!(*store.get_state().unwrap(), 2);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_malformed_actions_are_rejected_without_side_effects() {
    let store = counter_store();
    let log = CallLog::new();
    let _listener = store.subscribe(log.listener("listener")).unwrap();
    let before = store.get_state().unwrap();

    assert_rejected(
        &store.dispatch(json!("counter/increment")),
        ActionError::NotPlainRecord(ValueShape::String),
    );
    assert_rejected(
        &store.dispatch(json!([increment()])),
        ActionError::NotPlainRecord(ValueShape::Array),
    );
    assert_rejected(&store.dispatch(json!({ "payload": 1 })), ActionError::MissingType);
    assert_rejected(
        &store.dispatch(json!({ "type": true })),
        ActionError::TypeNotString(ValueShape::Bool),
    );

    assert!(Arc::ptr_eq(&before, &store.get_state().unwrap()));
    assert!(log.entries().is_empty());
}

#[test]
fn test_reducer_error_is_surfaced_unchanged() {
    let store = Store::new(reducer::from_fn(|state: Option<&i64>, action: &Value| {
        if action.action_type() == Ok("fail") {
            anyhow::bail!("quota exceeded");
        }
        Ok(state.copied().unwrap_or(0))
    }))
    .unwrap();

    let error = store.dispatch(json!({ "type": "fail" })).unwrap_err();
    match error {
        StoreError::Reducer(source) => assert_eq!(source.to_string(), "quota exceeded"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Reducer replacement
// ============================================================================

fn slice(name: &'static str) -> SliceReducer<Value> {
    Box::new(reducer::from_fn(move |state: Option<&Value>, action: &Value| {
        let count = state.and_then(Value::as_i64).unwrap_or(0);
        Ok(json!(if action.action_type() == Ok(name) { count + 1 } else { count }))
    }))
}

#[test]
fn test_replace_with_same_reducer_keeps_state() {
    let store = Store::new(combine_reducers(vec![("a", slice("a")), ("b", slice("b"))]).unwrap())
        .unwrap();
    store.dispatch(json!({ "type": "a" })).unwrap();
    let before = store.get_state().unwrap();

    store
        .replace_reducer(combine_reducers(vec![("a", slice("a")), ("b", slice("b"))]).unwrap())
        .unwrap();

    assert_eq!(*store.get_state().unwrap(), *before);
    assert_eq!(*store.get_state().unwrap(), json!({ "a": 1, "b": 0 }));
}

#[test]
fn test_replace_with_new_slice_initializes_it() {
    let store = Store::new(combine_reducers(vec![("a", slice("a"))]).unwrap()).unwrap();
    store.dispatch(json!({ "type": "a" })).unwrap();

    let log = CallLog::new();
    let _listener = store.subscribe(log.listener("replaced")).unwrap();

    store
        .replace_reducer(combine_reducers(vec![("a", slice("a")), ("c", slice("c"))]).unwrap())
        .unwrap();

    assert_eq!(*store.get_state().unwrap(), json!({ "a": 1, "c": 0 }));
    assert_eq!(log.count("replaced"), 1);
}

#[test]
fn test_replace_action_is_reserved() {
    let seen: Arc<Mutex<Vec<Option<InternalAction>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let recording = move || {
        let sink = Arc::clone(&sink);
        reducer::from_fn(move |state: Option<&i64>, action: &Value| {
            sink.lock().unwrap().push(action.internal_kind());
            Ok(state.copied().unwrap_or(0))
        })
    };

    let store = Store::new(recording()).unwrap();
    store.replace_reducer(recording()).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(InternalAction::Init), Some(InternalAction::Replace)]
    );
}

#[test]
fn test_boxed_reducer_can_be_shared() {
    let shared: unistore_core::BoxedReducer<i64, Value> = Arc::new(counter_reducer());
    let store = Store::new(counter_reducer()).unwrap();
    store.dispatch(increment()).unwrap();

    store.replace_boxed_reducer(Arc::clone(&shared)).unwrap();
    store.dispatch(increment()).unwrap();

    assert_eq!(*store.get_state().unwrap(), 2);
    assert_eq!(shared.reduce(None, &increment()).unwrap(), 1);
}
