//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use unistore_core::action::{Action, InternalAction};
use unistore_core::reducer::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&anyhow::Error)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Actions are applied in order, each to the state produced by the previous
/// one. Without `given_state` the first action receives `None`, as on store
/// initialization.
///
/// # Example
///
/// ```
/// use unistore_core::action::Action;
/// use unistore_core::reducer;
/// use unistore_testing::ReducerTest;
/// use serde_json::{json, Value};
///
/// let counter = reducer::from_fn(|state: Option<&i64>, action: &Value| {
///     let count = state.copied().unwrap_or(0);
///     Ok(if action.action_type() == Ok("inc") { count + 1 } else { count })
/// });
///
/// ReducerTest::new(counter)
///     .given_state(1)
///     .when_action(json!({ "type": "inc" }))
///     .when_action(json!({ "type": "inc" }))
///     .then_state(|count| assert_eq!(*count, 3))
///     .run();
/// ```
pub struct ReducerTest<R, S, A> {
    reducer: R,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    error_assertions: Vec<ErrorAssertion>,
}

impl<R, S, A> ReducerTest<R, S, A>
where
    R: Reducer<S, A>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Expect one of the actions to fail, and assert on the error (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&anyhow::Error) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if no action is set, if the reducer fails without a
    /// `then_error` assertion, if it succeeds despite one, or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    pub fn run(self) {
        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let mut state = self.initial_state;
        for action in &self.actions {
            match self.reducer.reduce(state.as_ref(), action) {
                Ok(next) => state = Some(next),
                Err(error) => {
                    assert!(
                        !self.error_assertions.is_empty(),
                        "Reducer failed unexpectedly: {error:#}"
                    );
                    for assertion in self.error_assertions {
                        assertion(&error);
                    }
                    return;
                },
            }
        }

        assert!(
            self.error_assertions.is_empty(),
            "Expected the reducer to fail, but every action succeeded"
        );

        if let Some(state) = state {
            for assertion in self.state_assertions {
                assertion(&state);
            }
        }
    }
}

impl<R, S, A> ReducerTest<R, S, A>
where
    R: Reducer<S, A>,
    A: Action,
{
    /// Apply the store's init action (When)
    #[must_use]
    pub fn when_initialized(self) -> Self {
        self.when_action(A::internal(InternalAction::Init))
    }
}

/// Helper assertions for store results
pub mod assertions {
    use std::fmt::Debug;
    use unistore_core::action::ActionError;
    use unistore_runtime::{Operation, StoreError};

    /// Assert that a store operation was refused by the reentrancy guard
    ///
    /// # Panics
    ///
    /// Panics if the result is not a reentrancy error for `operation`.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_reentrancy<T: Debug>(result: &Result<T, StoreError>, operation: Operation) {
        assert!(
            matches!(result, Err(StoreError::Reentrancy(op)) if *op == operation),
            "Expected a reentrancy error for {operation:?}, but got {result:?}"
        );
    }

    /// Assert that an action was rejected by validation
    ///
    /// # Panics
    ///
    /// Panics if the result is not the expected validation error.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_rejected<T: Debug>(result: &Result<T, StoreError>, expected: ActionError) {
        assert!(
            matches!(result, Err(StoreError::Validation(error)) if *error == expected),
            "Expected validation error {expected:?}, but got {result:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use unistore_core::reducer;

    fn counter() -> impl Reducer<i64, Value> {
        reducer::from_fn(|state: Option<&i64>, action: &Value| {
            let count = state.copied().unwrap_or(0);
            match action.action_type() {
                Ok("inc") => Ok(count + 1),
                Ok("fail") => anyhow::bail!("counter failure"),
                _ => Ok(count),
            }
        })
    }

    #[test]
    fn test_initialization_starts_from_none() {
        ReducerTest::new(counter())
            .when_initialized()
            .then_state(|count| assert_eq!(*count, 0))
            .run();
    }

    #[test]
    fn test_actions_fold_in_order() {
        ReducerTest::new(counter())
            .given_state(5)
            .when_action(json!({ "type": "inc" }))
            .when_action(json!({ "type": "other" }))
            .when_action(json!({ "type": "inc" }))
            .then_state(|count| assert_eq!(*count, 7))
            .run();
    }

    #[test]
    fn test_then_error_sees_reducer_error() {
        ReducerTest::new(counter())
            .given_state(0)
            .when_action(json!({ "type": "fail" }))
            .then_error(|error| assert_eq!(error.to_string(), "counter failure"))
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected the reducer to fail")]
    fn test_missing_error_panics() {
        ReducerTest::new(counter())
            .given_state(0)
            .when_action(json!({ "type": "inc" }))
            .then_error(|_| {})
            .run();
    }
}
