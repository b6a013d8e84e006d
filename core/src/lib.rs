//! # Unistore Core
//!
//! Core traits and types for Unistore, a single-writer observable state store.
//!
//! This crate provides the pure building blocks that the runtime drives:
//!
//! - **State**: An opaque, application-defined value, replaced wholesale on every transition
//! - **Action**: A tagged value with a mandatory string discriminant
//! - **Reducer**: Pure function `(Option<&State>, &Action) → State`
//! - **Composition**: Function composition, keyed reducer combination, and scoping
//!
//! ## Architecture Principles
//!
//! - Single writer: state only changes through a dispatched action
//! - Pure transitions: reducers never mutate the previous state
//! - Unidirectional data flow
//!
//! ## Example
//!
//! ```
//! use unistore_core::reducer::{self, Reducer};
//! use unistore_core::action::{Action, InternalAction};
//! use serde_json::{json, Value};
//!
//! let counter = reducer::from_fn(|state: Option<&i64>, action: &Value| {
//!     let count = state.copied().unwrap_or(0);
//!     Ok(match action.action_type() {
//!         Ok("inc") => count + 1,
//!         _ => count,
//!     })
//! });
//!
//! let initial = counter.reduce(None, &Value::internal(InternalAction::Init)).unwrap();
//! assert_eq!(initial, 0);
//! assert_eq!(counter.reduce(Some(&initial), &json!({ "type": "inc" })).unwrap(), 1);
//! ```

/// Actions, their validation, and the reserved internal discriminants
pub mod action;

/// Function composition and reducer combinators
pub mod composition;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(Option<&State>, &Action) → State`.
///
/// A `None` state means the store has no value yet; the reducer must return
/// its initial state. Any action the reducer does not recognise must still
/// produce a well-defined value, normally the unchanged state.
pub mod reducer {
    use std::sync::Arc;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `S`: The state this reducer produces
    /// - `A`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```
    /// use unistore_core::reducer::Reducer;
    ///
    /// enum TodoAction {
    ///     Add(String),
    ///     Clear,
    /// }
    ///
    /// struct TodoReducer;
    ///
    /// impl Reducer<Vec<String>, TodoAction> for TodoReducer {
    ///     fn reduce(
    ///         &self,
    ///         state: Option<&Vec<String>>,
    ///         action: &TodoAction,
    ///     ) -> anyhow::Result<Vec<String>> {
    ///         let mut todos = state.cloned().unwrap_or_default();
    ///         match action {
    ///             TodoAction::Add(text) => todos.push(text.clone()),
    ///             TodoAction::Clear => todos.clear(),
    ///         }
    ///         Ok(todos)
    ///     }
    /// }
    /// ```
    pub trait Reducer<S, A>: Send + Sync {
        /// Compute the next state from the previous state and an action
        ///
        /// # Arguments
        ///
        /// - `state`: The previous state, or `None` when no state exists yet
        /// - `action`: The action being dispatched
        ///
        /// # Errors
        ///
        /// Any error is propagated unchanged to the caller of `dispatch`;
        /// the store keeps its previous state.
        fn reduce(&self, state: Option<&S>, action: &A) -> anyhow::Result<S>;
    }

    /// A reducer shared by the store and anything that replaces it
    pub type BoxedReducer<S, A> = Arc<dyn Reducer<S, A>>;

    /// A reducer built from a closure
    ///
    /// Created by [`from_fn`].
    #[derive(Clone, Copy)]
    pub struct FnReducer<F> {
        f: F,
    }

    /// Turn a closure into a [`Reducer`]
    ///
    /// Going through this function lets the compiler infer the higher-ranked
    /// signature of the closure's reference arguments.
    pub const fn from_fn<S, A, F>(f: F) -> FnReducer<F>
    where
        F: Fn(Option<&S>, &A) -> anyhow::Result<S> + Send + Sync,
    {
        FnReducer { f }
    }

    impl<S, A, F> Reducer<S, A> for FnReducer<F>
    where
        F: Fn(Option<&S>, &A) -> anyhow::Result<S> + Send + Sync,
    {
        fn reduce(&self, state: Option<&S>, action: &A) -> anyhow::Result<S> {
            (self.f)(state, action)
        }
    }

    impl<F> std::fmt::Debug for FnReducer<F> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("FnReducer(<closure>)")
        }
    }
}

// Re-export commonly used types
pub use action::{Action, ActionError, InternalAction, ValueShape};
pub use composition::{combine_reducers, compose, compose_once, scope_reducer};
pub use reducer::{BoxedReducer, Reducer};
