//! Action creators bound to a dispatch function.
//!
//! An action creator builds an action from a payload. Binding it to a
//! dispatch function yields a callable that builds and dispatches in one step,
//! so callers never need to see the store.

use crate::error::StoreError;
use crate::store::Dispatch;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An action creator wired to a dispatch function
///
/// # Example
///
/// ```
/// use unistore_core::action::Action;
/// use unistore_core::reducer;
/// use unistore_runtime::{Store, bind_action_creator};
/// use serde_json::{json, Value};
///
/// # fn main() -> Result<(), unistore_runtime::StoreError> {
/// let store = Store::new(reducer::from_fn(|state: Option<&i64>, action: &Value| {
///     let count = state.copied().unwrap_or(0);
///     Ok(match action.action_type() {
///         Ok("add") => count + action["by"].as_i64().unwrap_or(0),
///         _ => count,
///     })
/// }))?;
///
/// let add = bind_action_creator(|by: i64| json!({ "type": "add", "by": by }), store.dispatcher());
/// add.call(5)?;
/// add.call(2)?;
/// assert_eq!(*store.get_state()?, 7);
/// # Ok(())
/// # }
/// ```
pub struct BoundActionCreator<P, A> {
    creator: Arc<dyn Fn(P) -> A + Send + Sync>,
    dispatch: Dispatch<A>,
}

impl<P, A> BoundActionCreator<P, A> {
    /// Build the action for `payload` and dispatch it
    ///
    /// # Errors
    ///
    /// Any error from the dispatch function.
    pub fn call(&self, payload: P) -> Result<A, StoreError> {
        (self.dispatch)((self.creator)(payload))
    }
}

impl<P, A> Clone for BoundActionCreator<P, A> {
    fn clone(&self) -> Self {
        Self {
            creator: Arc::clone(&self.creator),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<P, A> std::fmt::Debug for BoundActionCreator<P, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoundActionCreator(<creator>)")
    }
}

/// Bind a single action creator to `dispatch`
pub fn bind_action_creator<P, A, F>(creator: F, dispatch: Dispatch<A>) -> BoundActionCreator<P, A>
where
    F: Fn(P) -> A + Send + Sync + 'static,
{
    BoundActionCreator {
        creator: Arc::new(creator),
        dispatch,
    }
}

/// Bind every named action creator to `dispatch`
///
/// Entries are keyed by name; a later entry with the same name replaces an
/// earlier one. Creators of different closure types can be passed as
/// `Box<dyn Fn(P) -> A + Send + Sync>`.
pub fn bind_action_creators<P, A, K, F, I>(
    creators: I,
    dispatch: &Dispatch<A>,
) -> BTreeMap<String, BoundActionCreator<P, A>>
where
    I: IntoIterator<Item = (K, F)>,
    K: Into<String>,
    F: Fn(P) -> A + Send + Sync + 'static,
{
    creators
        .into_iter()
        .map(|(name, creator)| {
            (
                name.into(),
                bind_action_creator(creator, Arc::clone(dispatch)),
            )
        })
        .collect()
}
