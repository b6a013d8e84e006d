//! Middleware and the enhancer that applies them.
//!
//! A middleware is a three-stage function:
//!
//! 1. [`Middleware::apply`] receives a [`MiddlewareApi`] and returns a layer
//! 2. the layer receives `next`, the dispatch of the following middleware
//! 3. the resulting dispatch receives an action
//!
//! [`apply_middleware`] composes the layers right to left, so the first
//! middleware in the list sees every action first. Calling `next` forwards an
//! action down the chain; calling [`MiddlewareApi::dispatch`] restarts it
//! from the top.

use crate::error::StoreError;
use crate::store::{Dispatch, Enhancer, Store, StoreCreator};
use std::fmt::Debug;
use std::sync::{Arc, OnceLock, Weak};
use unistore_core::action::Action;
use unistore_core::composition::{compose, compose_once};
use unistore_core::reducer::BoxedReducer;

/// Turns the next dispatch in the chain into this middleware's dispatch
pub type DispatchLayer<A> = Box<dyn Fn(Dispatch<A>) -> Dispatch<A> + Send + Sync>;

type DispatchFn<A> = dyn Fn(A) -> Result<A, StoreError> + Send + Sync;

/// What a middleware can see of the store
///
/// `dispatch` always routes through the fully composed chain. It is only
/// usable once every middleware has been applied; calling it from
/// [`Middleware::apply`] fails with [`StoreError::DispatchWhileConstructing`].
pub struct MiddlewareApi<S, A> {
    store: Store<S, A>,
    dispatch: Arc<OnceLock<Weak<DispatchFn<A>>>>,
}

impl<S, A> Clone for MiddlewareApi<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<S, A> MiddlewareApi<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    /// The current state of the store
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn get_state(&self) -> Result<Arc<S>, StoreError> {
        self.store.get_state()
    }

    /// Dispatch through the whole middleware chain
    ///
    /// # Errors
    ///
    /// - [`StoreError::DispatchWhileConstructing`]: the chain is still being built
    /// - [`StoreError::StoreDropped`]: every handle to the enhanced store is gone
    /// - any error from the chain itself
    pub fn dispatch(&self, action: A) -> Result<A, StoreError> {
        let dispatch = self
            .dispatch
            .get()
            .ok_or(StoreError::DispatchWhileConstructing)?
            .upgrade()
            .ok_or(StoreError::StoreDropped)?;
        dispatch(action)
    }
}

impl<S, A> std::fmt::Debug for MiddlewareApi<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareApi")
            .field("store", &self.store)
            .field("ready", &self.dispatch.get().is_some())
            .finish()
    }
}

/// A dispatch interceptor
///
/// Any `Fn(MiddlewareApi<S, A>) -> DispatchLayer<A>` is a middleware. For the
/// common case of a single handler taking `(api, action, next)`, see
/// [`from_fn`].
pub trait Middleware<S, A>: Send + Sync {
    /// Bind this middleware to a store, producing its dispatch layer
    fn apply(&self, api: MiddlewareApi<S, A>) -> DispatchLayer<A>;
}

impl<S, A, F> Middleware<S, A> for F
where
    F: Fn(MiddlewareApi<S, A>) -> DispatchLayer<A> + Send + Sync,
{
    fn apply(&self, api: MiddlewareApi<S, A>) -> DispatchLayer<A> {
        self(api)
    }
}

/// Middleware built from a handler taking `(api, action, next)`
///
/// Created by [`from_fn`].
pub struct FromFn<F> {
    handler: Arc<F>,
}

/// Build a middleware from a single handler
///
/// # Example
///
/// ```
/// use unistore_core::action::Action;
/// use unistore_runtime::{Dispatch, MiddlewareApi, middleware};
/// use serde_json::Value;
///
/// // Swallow every "noop" action before it reaches the reducer
/// let filter = middleware::from_fn(
///     |_api: &MiddlewareApi<i64, Value>, action: Value, next: &Dispatch<Value>| {
///         if action.action_type() == Ok("noop") {
///             return Ok(action);
///         }
///         next(action)
///     },
/// );
/// # let _: &dyn middleware::Middleware<i64, Value> = &filter;
/// ```
pub fn from_fn<S, A, F>(handler: F) -> FromFn<F>
where
    F: Fn(&MiddlewareApi<S, A>, A, &Dispatch<A>) -> Result<A, StoreError> + Send + Sync,
{
    FromFn {
        handler: Arc::new(handler),
    }
}

impl<S, A, F> Middleware<S, A> for FromFn<F>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
    F: Fn(&MiddlewareApi<S, A>, A, &Dispatch<A>) -> Result<A, StoreError> + Send + Sync + 'static,
{
    fn apply(&self, api: MiddlewareApi<S, A>) -> DispatchLayer<A> {
        let handler = Arc::clone(&self.handler);
        Box::new(move |next: Dispatch<A>| -> Dispatch<A> {
            let handler = Arc::clone(&handler);
            let api = api.clone();
            Arc::new(move |action: A| handler(&api, action, &next))
        })
    }
}

impl<F> std::fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FromFn(<handler>)")
    }
}

/// Logs every action with the state before and after it
///
/// Successful dispatches are logged at `debug`, failures at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl<S, A> Middleware<S, A> for LoggingMiddleware
where
    S: Debug + Send + Sync + 'static,
    A: Action + 'static,
{
    fn apply(&self, api: MiddlewareApi<S, A>) -> DispatchLayer<A> {
        Box::new(move |next: Dispatch<A>| -> Dispatch<A> {
            let api = api.clone();
            Arc::new(move |action: A| {
                let action_type = action.action_type().unwrap_or("<invalid>").to_owned();
                let prev_state = api.get_state().ok();

                let result = next(action);
                match &result {
                    Ok(_) => tracing::debug!(
                        action_type = %action_type,
                        ?prev_state,
                        next_state = ?api.get_state().ok(),
                        "Action dispatched"
                    ),
                    Err(error) => {
                        tracing::warn!(action_type = %action_type, %error, "Dispatch failed");
                    },
                }
                result
            })
        })
    }
}

/// Build an enhancer that runs every dispatch through `middlewares`
///
/// The first middleware in the list is the outermost: it sees each action
/// first and its `next` leads to the second one. The last middleware's
/// `next` is the dispatch of the store being enhanced.
///
/// State reads, subscriptions and reducer replacement are untouched.
///
/// # Example
///
/// ```ignore
/// let store = Store::builder(root_reducer)
///     .enhancer(apply_middleware(vec![
///         Box::new(LoggingMiddleware),
///         Box::new(middleware::from_fn(thunk)),
///     ]))
///     .build()?;
/// ```
#[must_use]
pub fn apply_middleware<S, A>(middlewares: Vec<Box<dyn Middleware<S, A>>>) -> Enhancer<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    Box::new(move |create: StoreCreator<S, A>| -> StoreCreator<S, A> {
        Box::new(
            move |reducer: BoxedReducer<S, A>, preloaded_state: Option<S>| {
                let store = create(reducer, preloaded_state)?;

                let cell: Arc<OnceLock<Weak<DispatchFn<A>>>> = Arc::new(OnceLock::new());
                let api = MiddlewareApi {
                    store: store.clone(),
                    dispatch: Arc::clone(&cell),
                };

                let layers: Vec<DispatchLayer<A>> = middlewares
                    .iter()
                    .map(|middleware| middleware.apply(api.clone()))
                    .collect();
                let dispatch: Dispatch<A> = compose(layers)(store.dispatcher());

                // The store handle owns the chain; the api only observes it
                if cell.set(Arc::downgrade(&dispatch)).is_err() {
                    tracing::warn!(store = store.name(), "Middleware dispatch was already bound");
                }
                tracing::debug!(
                    store = store.name(),
                    middleware = middlewares.len(),
                    "Middleware chain assembled"
                );

                Ok(store.with_dispatch(dispatch))
            },
        )
    })
}

/// Combine several enhancers into one
///
/// The first enhancer is the outermost wrapper.
#[must_use]
pub fn compose_enhancers<S, A>(enhancers: Vec<Enhancer<S, A>>) -> Enhancer<S, A>
where
    S: 'static,
    A: 'static,
{
    Box::new(compose_once(enhancers))
}
