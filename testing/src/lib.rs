//! # Unistore Testing
//!
//! Testing utilities and helpers for Unistore.
//!
//! This crate provides:
//! - A Given-When-Then harness for reducers
//! - Call recorders for listeners and middleware
//! - Property-based testing utilities
//! - Assertion helpers for store results
//!
//! ## Example
//!
//! ```
//! use unistore_runtime::{Store, apply_middleware};
//! use unistore_testing::{CallLog, helpers::counter_reducer};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), unistore_runtime::StoreError> {
//! let log = CallLog::new();
//! let store = Store::builder(counter_reducer())
//!     .enhancer(apply_middleware(vec![log.middleware("audit")]))
//!     .build()?;
//!
//! let _listener = store.subscribe(log.listener("render"))?;
//! store.dispatch(json!({ "type": "counter/increment" }))?;
//!
//! assert_eq!(log.entries(), ["audit:before", "render", "audit:after"]);
//! # Ok(())
//! # }
//! ```

/// Given-When-Then reducer tests and store assertions
pub mod reducer_test;

/// Recorders for listener and middleware calls
///
/// Records calls into a shared, ordered log.
pub mod mocks {
    use std::sync::{Arc, Mutex, PoisonError};
    use unistore_core::action::Action;
    use unistore_runtime::{Dispatch, Middleware, MiddlewareApi, middleware};

    /// Shared, ordered log of labelled calls
    ///
    /// Clones share the same log.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog {
        entries: Arc<Mutex<Vec<String>>>,
    }

    impl CallLog {
        /// Create an empty log
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry
        pub fn record(&self, entry: impl Into<String>) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.into());
        }

        /// A copy of every entry so far
        #[must_use]
        pub fn entries(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of entries equal to `entry`
        #[must_use]
        pub fn count(&self, entry: &str) -> usize {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .filter(|recorded| recorded.as_str() == entry)
                .count()
        }

        /// Remove every entry
        pub fn clear(&self) {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }

        /// A store listener that records `label` on every call
        #[must_use]
        pub fn listener(&self, label: &str) -> impl Fn() + Send + Sync + 'static {
            let log = self.clone();
            let label = label.to_owned();
            move || log.record(label.clone())
        }

        /// A pass-through middleware recording `label:before` and `label:after`
        /// around each action it forwards
        #[must_use]
        pub fn middleware<S, A>(&self, label: &str) -> Box<dyn Middleware<S, A>>
        where
            S: Send + Sync + 'static,
            A: Action + 'static,
        {
            let log = self.clone();
            let label = label.to_owned();
            Box::new(middleware::from_fn(
                move |_api: &MiddlewareApi<S, A>, action: A, next: &Dispatch<A>| {
                    log.record(format!("{label}:before"));
                    let result = next(action);
                    log.record(format!("{label}:after"));
                    result
                },
            ))
        }
    }
}

/// Test helpers and utilities
///
/// Fixtures shared by the workspace's tests and benchmarks.
pub mod helpers {
    use serde_json::Value;
    use unistore_core::action::Action;
    use unistore_core::reducer::{self, Reducer};

    /// A counter over JSON actions
    ///
    /// Starts at 0 and understands `counter/increment`, `counter/decrement`
    /// and `counter/add` (with an integer `amount`). Anything else leaves the
    /// count unchanged.
    #[must_use]
    pub fn counter_reducer() -> impl Reducer<i64, Value> + 'static {
        reducer::from_fn(|state: Option<&i64>, action: &Value| {
            let count = state.copied().unwrap_or(0);
            Ok(match action.action_type() {
                Ok("counter/increment") => count + 1,
                Ok("counter/decrement") => count - 1,
                Ok("counter/add") => count + action["amount"].as_i64().unwrap_or(0),
                _ => count,
            })
        })
    }

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Honours `RUST_LOG`. Safe to call from every test; only the first call
    /// installs anything.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Value, json};
    use unistore_core::action::json_action;

    /// Application discriminants, never in the reserved namespace
    pub fn action_type() -> impl Strategy<Value = String> {
        "[a-z]{1,8}(/[a-z]{1,8})?"
    }

    /// Valid JSON actions, some carrying a payload
    pub fn json_action_value() -> impl Strategy<Value = Value> {
        (action_type(), proptest::option::of(any::<i64>())).prop_map(|(action_type, payload)| {
            let mut action = json_action(&action_type);
            if let (Some(payload), Value::Object(record)) = (payload, &mut action) {
                record.insert("payload".to_owned(), json!(payload));
            }
            action
        })
    }

    /// Values the store must reject before running the reducer
    pub fn invalid_action() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
            Just(json!([])),
            Just(json!({})),
            Just(json!({ "type": null })),
            any::<i64>().prop_map(|n| json!({ "type": n })),
            Just(json!({ "type": ["counter/increment"] })),
        ]
    }

    /// Sequences of counter actions understood by
    /// [`counter_reducer`](crate::helpers::counter_reducer)
    pub fn counter_actions(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
        let action = prop_oneof![
            Just(json_action("counter/increment")),
            Just(json_action("counter/decrement")),
            (-100_i64..100).prop_map(|amount| json!({ "type": "counter/add", "amount": amount })),
            Just(json_action("counter/unknown")),
        ];
        proptest::collection::vec(action, 0..max_len)
    }
}

// Re-export commonly used items
pub use mocks::CallLog;
pub use reducer_test::ReducerTest;
