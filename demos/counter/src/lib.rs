//! # Counter Example
//!
//! A simple counter demonstrating Unistore.
//!
//! This example showcases:
//! - A typed action enum implementing [`Action`]
//! - A struct reducer
//! - Store usage with middleware
//! - State queries and observation
//!
//! ## Architecture
//!
//! The counter is a **pure state machine**:
//! - Every transition is synchronous and deterministic
//! - The reducer never mutates the previous state
//! - Unknown actions, including the store's reserved ones, leave the count as is
//!
//! ## Example
//!
//! ```
//! use counter::{CounterAction, CounterReducer};
//! use unistore_runtime::Store;
//!
//! # fn main() -> Result<(), unistore_runtime::StoreError> {
//! let store = Store::new(CounterReducer)?;
//!
//! store.dispatch(CounterAction::Increment)?;
//! assert_eq!(store.state(|s| s.count)?, 1);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use unistore_core::action::{Action, ActionError, InternalAction};
use unistore_core::reducer::Reducer;

/// Counter state
///
/// Serializable so it can be preloaded from a saved snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// Current count value
    pub count: i64,
}

/// Counter actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterAction {
    /// Increment the counter by 1
    Increment,
    /// Decrement the counter by 1
    Decrement,
    /// Add an arbitrary amount
    Add(i64),
    /// Reset the counter to 0
    Reset,
    /// One of the store's reserved actions
    Internal(InternalAction),
}

impl Action for CounterAction {
    fn action_type(&self) -> Result<&str, ActionError> {
        Ok(match self {
            Self::Increment => "counter/increment",
            Self::Decrement => "counter/decrement",
            Self::Add(_) => "counter/add",
            Self::Reset => "counter/reset",
            Self::Internal(kind) => kind.action_type(),
        })
    }

    fn internal(kind: InternalAction) -> Self {
        Self::Internal(kind)
    }
}

/// Counter reducer
///
/// Starts from [`CounterState::default`] when the store has no state yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer<CounterState, CounterAction> for CounterReducer {
    fn reduce(
        &self,
        state: Option<&CounterState>,
        action: &CounterAction,
    ) -> anyhow::Result<CounterState> {
        let count = state.map_or(0, |s| s.count);

        let count = match action {
            CounterAction::Increment => checked_add(count, 1)?,
            CounterAction::Decrement => checked_add(count, -1)?,
            CounterAction::Add(amount) => checked_add(count, *amount)?,
            CounterAction::Reset => 0,
            CounterAction::Internal(_) => count,
        };

        Ok(CounterState { count })
    }
}

fn checked_add(count: i64, amount: i64) -> anyhow::Result<i64> {
    count
        .checked_add(amount)
        .ok_or_else(|| anyhow::anyhow!("counter overflow adding {amount} to {count}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use unistore_testing::ReducerTest;

    #[test]
    fn test_init_from_nothing() {
        ReducerTest::new(CounterReducer)
            .when_initialized()
            .then_state(|state| assert_eq!(state.count, 0))
            .run();
    }

    #[test]
    fn test_init_keeps_preloaded_state() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: 7 })
            .when_initialized()
            .then_state(|state| assert_eq!(state.count, 7))
            .run();
    }

    #[test]
    fn test_multiple_operations() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState::default())
            .when_action(CounterAction::Increment)
            .when_action(CounterAction::Increment)
            .when_action(CounterAction::Decrement)
            .when_action(CounterAction::Add(10))
            .then_state(|state| assert_eq!(state.count, 11))
            .run();
    }

    #[test]
    fn test_reset() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: 42 })
            .when_action(CounterAction::Reset)
            .then_state(|state| assert_eq!(state.count, 0))
            .run();
    }

    #[test]
    fn test_overflow_is_an_error() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: i64::MAX })
            .when_action(CounterAction::Add(1))
            .then_error(|error| assert!(error.to_string().contains("overflow")))
            .run();
    }

    #[test]
    fn test_increment_and_decrement_overflow_are_errors() {
        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: i64::MAX })
            .when_action(CounterAction::Increment)
            .then_error(|error| assert!(error.to_string().contains("overflow")))
            .run();

        ReducerTest::new(CounterReducer)
            .given_state(CounterState { count: i64::MIN })
            .when_action(CounterAction::Decrement)
            .then_error(|error| assert!(error.to_string().contains("overflow")))
            .run();
    }

    #[test]
    fn test_action_types_are_distinct() {
        let types = [
            CounterAction::Increment,
            CounterAction::Decrement,
            CounterAction::Add(1),
            CounterAction::Reset,
        ]
        .map(|action| action.action_type().map(str::to_owned));

        for (i, a) in types.iter().enumerate() {
            for b in &types[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
