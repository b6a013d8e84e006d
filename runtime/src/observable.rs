//! Push-based observation of store state.
//!
//! An [`Observable`] turns the store's zero-argument listeners into
//! callbacks that receive the state. Subscribing delivers the current state
//! immediately, then the new state after every successful dispatch.
//!
//! [`Observable::into_stream`] exposes the same feed as a `futures::Stream`
//! for async consumers.

use crate::error::StoreError;
use crate::listeners::{Listener, Unsubscribe};
use crate::store::Store;
use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use unistore_core::action::Action;

/// Receives state updates from an [`Observable`]
///
/// Closures taking `&Arc<S>` implement this trait. Implementors that only
/// care about some updates may leave `next` as the default no-op.
pub trait Observer<S>: Send + Sync {
    /// Called with the current state
    fn next(&self, _state: &Arc<S>) {}
}

impl<S, F> Observer<S> for F
where
    F: Fn(&Arc<S>) + Send + Sync,
{
    fn next(&self, state: &Arc<S>) {
        self(state);
    }
}

/// A push-based view of a store's state
///
/// Created by [`Store::observable`].
///
/// # Example
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use unistore_core::action::Action;
/// use unistore_core::reducer;
/// use unistore_runtime::Store;
/// use serde_json::{json, Value};
///
/// # fn main() -> Result<(), unistore_runtime::StoreError> {
/// let store = Store::new(reducer::from_fn(|state: Option<&i64>, action: &Value| {
///     let count = state.copied().unwrap_or(0);
///     Ok(if action.action_type() == Ok("inc") { count + 1 } else { count })
/// }))?;
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let subscription = store.observable().subscribe(move |state: &Arc<i64>| {
///     sink.lock().unwrap().push(**state);
/// })?;
///
/// store.dispatch(json!({ "type": "inc" }))?;
/// subscription.unsubscribe()?;
/// store.dispatch(json!({ "type": "inc" }))?;
///
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
/// # Ok(())
/// # }
/// ```
pub struct Observable<S, A> {
    store: Store<S, A>,
}

impl<S, A> Observable<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    pub(crate) const fn new(store: Store<S, A>) -> Self {
        Self { store }
    }

    /// Register an observer
    ///
    /// The observer receives the current state before this returns. The
    /// underlying listener holds only a weak reference to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription, StoreError>
    where
        O: Observer<S> + 'static,
    {
        let observer = Arc::new(observer);
        let store = self.store.downgrade();

        let listener: Listener = Arc::new(move || {
            let Some(inner) = store.upgrade() else {
                return;
            };
            if let Ok(state) = inner.get_state() {
                observer.next(&state);
            }
        });

        let unsubscribe = self.store.subscribe_listener(Arc::clone(&listener))?;
        listener();

        Ok(Subscription { unsubscribe })
    }

    /// Feed state updates into a `Stream`
    ///
    /// The first item is the state at the time of the call. Dropping the
    /// stream unsubscribes. Updates are buffered without bound, so a stalled
    /// consumer keeps every intermediate state alive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn into_stream(self) -> Result<StateStream<S>, StoreError> {
        let (sender, receiver) = mpsc::unbounded();
        let subscription = self.subscribe(move |state: &Arc<S>| {
            // Receiver gone: the stream is being dropped and will unsubscribe
            let _ = sender.unbounded_send(Arc::clone(state));
        })?;

        Ok(StateStream {
            receiver,
            subscription,
        })
    }
}

impl<S, A> std::fmt::Debug for Observable<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("store", &self.store)
            .finish()
    }
}

/// Handle for an observer registration
#[must_use = "dropping the subscription leaves the observer registered; keep it to unsubscribe later"]
#[derive(Debug)]
pub struct Subscription {
    unsubscribe: Unsubscribe,
}

impl Subscription {
    /// Stop delivering state to the observer
    ///
    /// Calling this more than once does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn unsubscribe(&self) -> Result<(), StoreError> {
        self.unsubscribe.unsubscribe()
    }

    /// Whether the observer no longer receives updates
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.unsubscribe.is_subscribed()
    }
}

/// Stream of states produced by [`Observable::into_stream`]
#[derive(Debug)]
pub struct StateStream<S> {
    receiver: mpsc::UnboundedReceiver<Arc<S>>,
    subscription: Subscription,
}

impl<S> Stream for StateStream<S> {
    type Item = Arc<S>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_next_unpin(cx)
    }
}

impl<S> Drop for StateStream<S> {
    fn drop(&mut self) {
        if let Err(error) = self.subscription.unsubscribe() {
            tracing::debug!(%error, "State stream dropped while still subscribed");
        }
    }
}
