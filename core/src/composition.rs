//! Function composition and reducer combinators
//!
//! This module provides:
//! - **`compose`** / **`compose_once`**: Right-to-left composition of unary functions
//! - **`combine_reducers`**: Build one reducer over a keyed JSON state tree from slice reducers
//! - **`scope_reducer`**: Focus a reducer on a subset of a typed state
//!
//! # Examples
//!
//! ## Composing functions
//!
//! ```
//! use unistore_core::composition::compose;
//!
//! let double = |x: i32| x * 2;
//! let add_one = |x: i32| x + 1;
//! let pipeline: Vec<Box<dyn Fn(i32) -> i32>> = vec![Box::new(double), Box::new(add_one)];
//!
//! // double(add_one(5))
//! assert_eq!(compose(pipeline)(5), 12);
//! ```
//!
//! ## Combining keyed reducers
//!
//! ```
//! use unistore_core::composition::combine_reducers;
//! use unistore_core::reducer::{self, Reducer};
//! use unistore_core::action::{Action, InternalAction};
//! use serde_json::{json, Value};
//!
//! let counter = reducer::from_fn(|state: Option<&Value>, action: &Value| {
//!     let count = state.and_then(Value::as_i64).unwrap_or(0);
//!     Ok(json!(if action.action_type() == Ok("inc") { count + 1 } else { count }))
//! });
//! let title = reducer::from_fn(|state: Option<&Value>, _action: &Value| {
//!     Ok(state.cloned().unwrap_or_else(|| json!("untitled")))
//! });
//!
//! let root = combine_reducers(vec![
//!     ("counter", Box::new(counter) as Box<dyn Reducer<Value, Value>>),
//!     ("title", Box::new(title) as Box<dyn Reducer<Value, Value>>),
//! ])
//! .unwrap();
//!
//! let state = root.reduce(None, &Value::internal(InternalAction::Init)).unwrap();
//! assert_eq!(state, json!({ "counter": 0, "title": "untitled" }));
//! ```

use crate::action::{Action, InternalAction, ValueShape};
use crate::reducer::Reducer;
use anyhow::Context;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Mutex;
use thiserror::Error;

/// Composes unary functions from right to left.
///
/// `compose(vec![f1, f2, f3])(x)` is `f1(f2(f3(x)))`: the last function
/// supplied sees the argument first. With no functions the result is the
/// identity; with one it behaves exactly like that function.
///
/// The composed function can be called any number of times.
pub fn compose<T, F>(fns: Vec<F>) -> impl Fn(T) -> T
where
    F: Fn(T) -> T,
{
    move |initial| fns.iter().rev().fold(initial, |acc, f| f(acc))
}

/// Composes single-use functions from right to left.
///
/// Same ordering as [`compose`], for functions that are consumed when called
/// (store enhancers, for instance).
pub fn compose_once<T, F>(fns: Vec<F>) -> impl FnOnce(T) -> T
where
    F: FnOnce(T) -> T,
{
    move |initial| fns.into_iter().rev().fold(initial, |acc, f| f(acc))
}

/// Errors raised while assembling a keyed reducer
#[derive(Error, Debug)]
pub enum CompositionError {
    /// Two slice reducers were registered under the same key
    #[error("duplicate reducer key \"{0}\"")]
    DuplicateKey(String),

    /// A slice reducer failed to produce its initial state
    #[error("reducer \"{key}\" failed during initialization; it must return its initial state when the state is undefined")]
    InitFailed {
        /// Slice key
        key: String,
        /// Error raised by the slice reducer
        source: anyhow::Error,
    },

    /// A slice reducer failed on an action it does not know
    #[error("reducer \"{key}\" failed when probed with a random action type; unknown actions must return the current state")]
    ProbeFailed {
        /// Slice key
        key: String,
        /// Error raised by the slice reducer
        source: anyhow::Error,
    },
}

/// Options for [`combine_reducers_with`]
#[derive(Debug, Clone, Copy)]
pub struct CombineOptions {
    /// Log a warning the first time state carries a key no reducer owns
    pub warn_on_unexpected_keys: bool,
}

impl CombineOptions {
    /// Enable or disable the unexpected key warning
    #[must_use]
    pub const fn with_unexpected_key_warnings(mut self, enabled: bool) -> Self {
        self.warn_on_unexpected_keys = enabled;
        self
    }
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            warn_on_unexpected_keys: true,
        }
    }
}

/// A reducer owning one key of a combined JSON state
pub type SliceReducer<A> = Box<dyn Reducer<Value, A>>;

/// Combines slice reducers into one reducer over a JSON object.
///
/// Each slice reducer owns one key of the state object. On every action each
/// slice reducer receives its own previous slice (`None` if the key is absent)
/// and the resulting object contains exactly the registered keys.
///
/// Every slice reducer is exercised once with the INIT action and once with a
/// random unknown action before this function returns, so a reducer that
/// cannot produce an initial state is reported here rather than on the first
/// dispatch.
///
/// # Errors
///
/// - [`CompositionError::DuplicateKey`] if a key is registered twice
/// - [`CompositionError::InitFailed`] / [`CompositionError::ProbeFailed`] if a
///   slice reducer errors when given no state
pub fn combine_reducers<A, K>(
    reducers: Vec<(K, SliceReducer<A>)>,
) -> Result<CombinedReducer<A>, CompositionError>
where
    A: Action,
    K: Into<String>,
{
    combine_reducers_with(reducers, CombineOptions::default())
}

/// [`combine_reducers`] with explicit options.
///
/// # Errors
///
/// See [`combine_reducers`].
pub fn combine_reducers_with<A, K>(
    reducers: Vec<(K, SliceReducer<A>)>,
    options: CombineOptions,
) -> Result<CombinedReducer<A>, CompositionError>
where
    A: Action,
    K: Into<String>,
{
    let mut seen = HashSet::with_capacity(reducers.len());
    let mut slices = Vec::with_capacity(reducers.len());

    for (key, reducer) in reducers {
        let key = key.into();
        if !seen.insert(key.clone()) {
            return Err(CompositionError::DuplicateKey(key));
        }
        slices.push((key, reducer));
    }

    if slices.is_empty() {
        tracing::warn!("Store does not have a valid reducer; combine_reducers received no slices");
    }

    assert_reducer_shape(&slices)?;

    Ok(CombinedReducer {
        reducers: slices,
        options,
        unexpected_key_cache: Mutex::new(HashSet::new()),
    })
}

fn assert_reducer_shape<A: Action>(slices: &[(String, SliceReducer<A>)]) -> Result<(), CompositionError> {
    let init = A::internal(InternalAction::Init);
    let probe = A::internal(InternalAction::ProbeUnknown);

    for (key, reducer) in slices {
        reducer
            .reduce(None, &init)
            .map_err(|source| CompositionError::InitFailed {
                key: key.clone(),
                source,
            })?;

        reducer
            .reduce(None, &probe)
            .map_err(|source| CompositionError::ProbeFailed {
                key: key.clone(),
                source,
            })?;
    }

    Ok(())
}

/// A reducer over a JSON object built from keyed slice reducers.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<A> {
    reducers: Vec<(String, SliceReducer<A>)>,
    options: CombineOptions,
    unexpected_key_cache: Mutex<HashSet<String>>,
}

impl<A> CombinedReducer<A> {
    /// Keys owned by this reducer, in registration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.reducers.iter().map(|(key, _)| key.as_str())
    }

    fn owns(&self, key: &str) -> bool {
        self.reducers.iter().any(|(owned, _)| owned == key)
    }
}

impl<A: Action> CombinedReducer<A> {
    fn warn_unexpected_keys(&self, state: &Map<String, Value>, action: &A) {
        let kind = action.internal_kind();
        if kind == Some(InternalAction::Replace) {
            return;
        }

        let mut cache = self
            .unexpected_key_cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let unexpected: Vec<&str> = state
            .keys()
            .filter(|key| !self.owns(key) && !cache.contains(key.as_str()))
            .map(String::as_str)
            .collect();

        if unexpected.is_empty() {
            return;
        }

        let origin = if kind == Some(InternalAction::Init) {
            "preloaded state"
        } else {
            "previous state received by the reducer"
        };
        tracing::warn!(
            unexpected = ?unexpected,
            expected = ?self.keys().collect::<Vec<_>>(),
            "Unexpected keys found in {origin}; they will be ignored"
        );

        cache.extend(unexpected.into_iter().map(str::to_owned));
    }
}

impl<A: Action> Reducer<Value, A> for CombinedReducer<A> {
    fn reduce(&self, state: Option<&Value>, action: &A) -> anyhow::Result<Value> {
        let previous = match state {
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                tracing::warn!(
                    shape = %ValueShape::of(other),
                    "Combined reducer expected a record as state; treating it as empty"
                );
                None
            },
            None => None,
        };

        if self.options.warn_on_unexpected_keys {
            if let Some(map) = previous {
                self.warn_unexpected_keys(map, action);
            }
        }

        let mut next = Map::with_capacity(self.reducers.len());
        for (key, reducer) in &self.reducers {
            let slice = previous.and_then(|map| map.get(key));
            let value = reducer
                .reduce(slice, action)
                .with_context(|| format!("slice reducer for key \"{key}\" failed"))?;
            next.insert(key.clone(), value);
        }

        Ok(Value::Object(next))
    }
}

impl<A> std::fmt::Debug for CombinedReducer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedReducer")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Scopes a reducer to operate on a subset of a larger state.
///
/// This allows you to reuse reducers designed for smaller state types
/// within a larger typed application state. The parent state is cloned,
/// the child reducer produces the new sub-state, and the setter writes it
/// into the copy; the previous parent is never mutated.
///
/// # Examples
///
/// ```
/// use unistore_core::composition::scope_reducer;
/// use unistore_core::reducer::{self, Reducer};
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: i64,
///     other_data: String,
/// }
///
/// let counter = reducer::from_fn(|state: Option<&i64>, delta: &i64| {
///     Ok(state.copied().unwrap_or(0) + delta)
/// });
///
/// let scoped = scope_reducer(
///     counter,
///     |app: &AppState| &app.counter,
///     |app: &mut AppState, counter: i64| app.counter = counter,
/// );
///
/// let state = AppState { counter: 1, other_data: "kept".into() };
/// let next = scoped.reduce(Some(&state), &2).unwrap();
/// assert_eq!(next.counter, 3);
/// assert_eq!(next.other_data, "kept");
/// ```
pub const fn scope_reducer<S, Sub, A, R>(
    reducer: R,
    get_state: fn(&S) -> &Sub,
    set_state: fn(&mut S, Sub),
) -> ScopedReducer<S, Sub, A, R>
where
    R: Reducer<Sub, A>,
{
    ScopedReducer {
        reducer,
        get_state,
        set_state,
        _phantom: std::marker::PhantomData,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, Sub, A, R> {
    reducer: R,
    get_state: fn(&S) -> &Sub,
    set_state: fn(&mut S, Sub),
    _phantom: std::marker::PhantomData<fn(&A)>,
}

impl<S, Sub, A, R> Reducer<S, A> for ScopedReducer<S, Sub, A, R>
where
    S: Clone + Default,
    R: Reducer<Sub, A>,
{
    fn reduce(&self, state: Option<&S>, action: &A) -> anyhow::Result<S> {
        let sub_state = self.reducer.reduce(state.map(self.get_state), action)?;

        let mut parent = state.cloned().unwrap_or_default();
        (self.set_state)(&mut parent, sub_state);

        Ok(parent)
    }
}
