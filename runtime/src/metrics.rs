//! Metrics for store observability.
//!
//! Stores report through the [`metrics`] facade. Nothing is exported unless the
//! application installs a recorder (Prometheus, statsd, a test recorder); the
//! calls below are no-ops otherwise.
//!
//! Every metric carries a `store` label holding [`StoreConfig::name`].
//!
//! # Example
//!
//! ```
//! use unistore_runtime::metrics;
//!
//! // Register descriptions once, after installing a recorder
//! metrics::describe_metrics();
//! ```
//!
//! [`StoreConfig::name`]: crate::StoreConfig::name

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Actions that reached the reducer
pub const DISPATCH_TOTAL: &str = "store_dispatch_total";
/// Actions refused before or during reduction, labelled by `reason`
pub const DISPATCH_REJECTED_TOTAL: &str = "store_dispatch_rejected_total";
/// Time spent inside the reducer
pub const REDUCER_DURATION_SECONDS: &str = "store_reducer_duration_seconds";
/// Listener invocations after successful dispatches
pub const LISTENERS_NOTIFIED_TOTAL: &str = "store_listeners_notified_total";
/// Listeners currently registered
pub const ACTIVE_SUBSCRIPTIONS: &str = "store_active_subscriptions";

/// Register all metric descriptions.
pub fn describe_metrics() {
    describe_counter!(
        DISPATCH_TOTAL,
        "Total number of actions that reached the reducer"
    );
    describe_counter!(
        DISPATCH_REJECTED_TOTAL,
        "Total number of dispatches refused by validation, the reentrancy guard, or the reducer"
    );
    describe_histogram!(
        REDUCER_DURATION_SECONDS,
        "Time taken to execute the reducer"
    );
    describe_counter!(
        LISTENERS_NOTIFIED_TOTAL,
        "Total number of listener invocations"
    );
    describe_gauge!(
        ACTIVE_SUBSCRIPTIONS,
        "Current number of registered listeners"
    );
}

/// Why a dispatch was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The action failed validation
    Validation,
    /// The reducer was already executing
    Reentrancy,
    /// The reducer returned an error
    Reducer,
}

impl Rejection {
    /// Label value for this rejection
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Reentrancy => "reentrancy",
            Self::Reducer => "reducer",
        }
    }
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an action processed by the reducer.
    pub fn record_dispatch(store: &str, duration: Duration) {
        counter!(DISPATCH_TOTAL, "store" => store.to_owned()).increment(1);
        histogram!(REDUCER_DURATION_SECONDS, "store" => store.to_owned())
            .record(duration.as_secs_f64());
    }

    /// Record a refused dispatch.
    pub fn record_rejection(store: &str, reason: Rejection) {
        counter!(
            DISPATCH_REJECTED_TOTAL,
            "store" => store.to_owned(),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    /// Record listener invocations for one dispatch.
    pub fn record_notified(store: &str, count: usize) {
        counter!(LISTENERS_NOTIFIED_TOTAL, "store" => store.to_owned()).increment(count as u64);
    }

    /// Record the current number of listeners.
    #[allow(clippy::cast_precision_loss)] // listener counts stay far below 2^52
    pub fn record_subscriptions(store: &str, count: usize) {
        gauge!(ACTIVE_SUBSCRIPTIONS, "store" => store.to_owned()).set(count as f64);
    }
}
