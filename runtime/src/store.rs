//! The store engine.
//!
//! A [`Store`] owns the current state and the active reducer. Every change goes
//! through [`Store::dispatch`], which runs the reducer exactly once, swaps in
//! the returned state, and then notifies listeners.
//!
//! # Concurrency
//!
//! The store is a single writer. A flag marks the window in which the reducer
//! executes; reading the state, subscribing, unsubscribing, and dispatching are
//! all refused with [`StoreError::Reentrancy`] inside that window. The flag is
//! reset by a guard, so a reducer that returns an error or panics leaves the
//! store usable.
//!
//! Listeners run after the flag is reset, so they may read the state and
//! dispatch again. Nested dispatches from listeners complete before the outer
//! notification loop continues.
//!
//! Handles are `Send + Sync`. A dispatch from another thread while the reducer
//! is executing is refused the same way as a nested one; callers that share a
//! store across threads serialize their own dispatches.

use crate::StoreConfig;
use crate::error::{ConfigError, Operation, StoreError};
use crate::listeners::{Listener, ListenerHost, ListenerId, ListenerRegistry, Unsubscribe};
use crate::metrics::{Rejection, StoreMetrics};
use crate::observable::Observable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;
use unistore_core::action::{Action, InternalAction};
use unistore_core::reducer::{BoxedReducer, Reducer};

/// The dispatch function of a store, possibly wrapped by middleware
///
/// Returns the action that reached the end of the chain, or whatever a
/// middleware chose to return instead.
pub type Dispatch<A> = Arc<dyn Fn(A) -> Result<A, StoreError> + Send + Sync>;

/// Builds a store from a reducer and an optional preloaded state
pub type StoreCreator<S, A> =
    Box<dyn FnOnce(BoxedReducer<S, A>, Option<S>) -> Result<Store<S, A>, StoreError>>;

/// Wraps a store creator to return a store with augmented behaviour
///
/// Enhancers compose with [`compose_enhancers`](crate::compose_enhancers);
/// [`apply_middleware`](crate::apply_middleware) is the built-in one.
pub type Enhancer<S, A> = Box<dyn FnOnce(StoreCreator<S, A>) -> StoreCreator<S, A>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// RAII guard that marks the reducer as executing
///
/// Clears the flag on drop, even if the reducer panics.
struct DispatchGuard<'a>(&'a AtomicBool);

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub(crate) struct StoreInner<S, A> {
    config: StoreConfig,
    state: Mutex<Arc<S>>,
    reducer: Mutex<BoxedReducer<S, A>>,
    listeners: Mutex<ListenerRegistry>,
    dispatching: AtomicBool,
}

impl<S, A> StoreInner<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    fn is_dispatching(&self) -> bool {
        self.dispatching.load(Ordering::Acquire)
    }

    pub(crate) fn get_state(&self) -> Result<Arc<S>, StoreError> {
        if self.is_dispatching() {
            return Err(StoreError::Reentrancy(Operation::GetState));
        }
        Ok(Arc::clone(&*lock(&self.state)))
    }

    #[tracing::instrument(skip_all, name = "store_dispatch", fields(store = %self.config.name))]
    fn dispatch(&self, action: A) -> Result<A, StoreError> {
        let action_type = match action.validate() {
            Ok(action_type) => action_type,
            Err(error) => {
                tracing::warn!(%error, "Rejected action");
                StoreMetrics::record_rejection(&self.config.name, Rejection::Validation);
                return Err(error.into());
            },
        };

        let Some(guard) = DispatchGuard::enter(&self.dispatching) else {
            tracing::warn!(action_type, "Rejected action: reducer is already executing");
            StoreMetrics::record_rejection(&self.config.name, Rejection::Reentrancy);
            return Err(StoreError::Reentrancy(Operation::Dispatch));
        };

        tracing::debug!(action_type, "Processing action");

        let reducer = Arc::clone(&*lock(&self.reducer));
        let current = Arc::clone(&*lock(&self.state));

        {
            let span = tracing::debug_span!("reducer_execution");
            let _enter = span.enter();

            let start = Instant::now();
            let result = reducer.reduce(Some(&*current), &action);
            StoreMetrics::record_dispatch(&self.config.name, start.elapsed());

            match result {
                Ok(next) => *lock(&self.state) = Arc::new(next),
                Err(error) => {
                    drop(guard);
                    tracing::debug!(%error, "Reducer failed, state unchanged");
                    StoreMetrics::record_rejection(&self.config.name, Rejection::Reducer);
                    return Err(StoreError::Reducer(error));
                },
            }
        }

        drop(guard);
        self.notify_listeners();
        Ok(action)
    }

    fn notify_listeners(&self) {
        let snapshot = lock(&self.listeners).snapshot();
        tracing::trace!("Notifying {} listeners", snapshot.len());

        for (_, listener) in snapshot.iter() {
            listener();
        }
        StoreMetrics::record_notified(&self.config.name, snapshot.len());
    }

    pub(crate) fn subscribe(self: &Arc<Self>, listener: Listener) -> Result<Unsubscribe, StoreError> {
        if self.is_dispatching() {
            return Err(StoreError::Reentrancy(Operation::Subscribe));
        }

        let (id, count) = {
            let mut listeners = lock(&self.listeners);
            let id = listeners.insert(listener);
            (id, listeners.len())
        };
        tracing::trace!(?id, "Listener subscribed");
        StoreMetrics::record_subscriptions(&self.config.name, count);

        let weak = Arc::downgrade(self);
        let host: Weak<dyn ListenerHost> = weak;
        Ok(Unsubscribe::new(id, host))
    }
}

impl<S, A> ListenerHost for StoreInner<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    fn remove_listener(&self, id: ListenerId) -> Result<(), StoreError> {
        if self.is_dispatching() {
            return Err(StoreError::Reentrancy(Operation::Unsubscribe));
        }

        let count = {
            let mut listeners = lock(&self.listeners);
            listeners.remove(id);
            listeners.len()
        };
        tracing::trace!(?id, "Listener unsubscribed");
        StoreMetrics::record_subscriptions(&self.config.name, count);
        Ok(())
    }
}

/// The Store - single owner of application state
///
/// Cloning a `Store` yields another handle to the same state, reducer and
/// listeners. Handles created by an enhancer may carry a wrapped dispatch.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
///
/// # Example
///
/// ```
/// use unistore_core::action::Action;
/// use unistore_core::reducer;
/// use unistore_runtime::Store;
/// use serde_json::{json, Value};
///
/// # fn main() -> Result<(), unistore_runtime::StoreError> {
/// let store = Store::builder(reducer::from_fn(|state: Option<&Vec<String>>, action: &Value| {
///     let mut todos = state.cloned().unwrap_or_default();
///     if action.action_type() == Ok("todos/add") {
///         todos.push(action["text"].as_str().unwrap_or_default().to_owned());
///     }
///     Ok(todos)
/// }))
/// .preloaded_state(vec!["write docs".to_owned()])
/// .build()?;
///
/// store.dispatch(json!({ "type": "todos/add", "text": "ship it" }))?;
/// assert_eq!(store.state(Vec::len)?, 2);
/// # Ok(())
/// # }
/// ```
pub struct Store<S, A> {
    inner: Arc<StoreInner<S, A>>,
    dispatch: Dispatch<A>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<S, A> Store<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    /// Create a store with no preloaded state and no enhancer
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reducer`] if the reducer fails to produce an
    /// initial state.
    pub fn new<R>(reducer: R) -> Result<Self, StoreError>
    where
        R: Reducer<S, A> + 'static,
    {
        create_store(reducer, None, None)
    }

    /// Start building a store around `reducer`
    pub fn builder<R>(reducer: R) -> StoreBuilder<S, A>
    where
        R: Reducer<S, A> + 'static,
    {
        StoreBuilder::new(reducer)
    }

    /// The undecorated store every enhancer chain bottoms out in
    ///
    /// Computes the initial state by running the reducer on the preloaded
    /// state (or `None`) with the reserved init action. No listener or
    /// middleware can observe this step.
    fn create_base(
        reducer: BoxedReducer<S, A>,
        preloaded_state: Option<S>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let span = tracing::debug_span!("store_init", store = %config.name);
        let _enter = span.enter();

        let init = A::internal(InternalAction::Init);
        let initial = reducer
            .reduce(preloaded_state.as_ref(), &init)
            .map_err(StoreError::Reducer)?;
        tracing::debug!(preloaded = preloaded_state.is_some(), "Store initialized");

        let inner = Arc::new(StoreInner {
            config,
            state: Mutex::new(Arc::new(initial)),
            reducer: Mutex::new(reducer),
            listeners: Mutex::new(ListenerRegistry::new()),
            dispatching: AtomicBool::new(false),
        });

        let base = Arc::clone(&inner);
        let dispatch: Dispatch<A> = Arc::new(move |action: A| base.dispatch(action));

        Ok(Self { inner, dispatch })
    }

    /// Dispatch an action through this handle's dispatch chain
    ///
    /// Runs the reducer exactly once (unless a middleware short-circuits),
    /// stores its result, then invokes every listener registered when
    /// notification begins, in subscription order.
    ///
    /// # Returns
    ///
    /// The dispatched action, or whatever the middleware chain returned
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`]: the action is malformed
    /// - [`StoreError::Reentrancy`]: the reducer is already executing
    /// - [`StoreError::Reducer`]: the reducer failed; the state is unchanged
    /// - any error raised by a middleware
    pub fn dispatch(&self, action: A) -> Result<A, StoreError> {
        (self.dispatch)(action)
    }

    /// A clone of this handle's dispatch function
    #[must_use]
    pub fn dispatcher(&self) -> Dispatch<A> {
        Arc::clone(&self.dispatch)
    }

    /// Return a handle whose dispatch is replaced by `dispatch`
    ///
    /// Used by enhancers. The returned handle shares state, reducer and
    /// listeners with `self`.
    #[must_use]
    pub fn with_dispatch(self, dispatch: Dispatch<A>) -> Self {
        Self {
            inner: self.inner,
            dispatch,
        }
    }

    /// The current state
    ///
    /// The returned `Arc` is the exact value produced by the most recent
    /// successful reduction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn get_state(&self) -> Result<Arc<S>, StoreError> {
        self.inner.get_state()
    }

    /// Read the current state via a closure
    ///
    /// ```ignore
    /// let todo_count = store.state(|todos| todos.len())?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn state<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.get_state()?;
        Ok(f(&state))
    }

    /// Register a listener invoked after every successful dispatch
    ///
    /// Listeners take no arguments; read the state from the store inside the
    /// callback. A listener added during notification first runs on the next
    /// dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn subscribe<F>(&self, listener: F) -> Result<Unsubscribe, StoreError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.subscribe(Arc::new(listener))
    }

    /// Register an already shared listener
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing.
    pub fn subscribe_listener(&self, listener: Listener) -> Result<Unsubscribe, StoreError> {
        self.inner.subscribe(listener)
    }

    /// Swap the active reducer, then dispatch the reserved replace action
    ///
    /// The replace action goes straight to the store, not through
    /// middleware; listeners are notified.
    ///
    /// # Errors
    ///
    /// Any error from dispatching the replace action. The new reducer stays
    /// installed either way.
    pub fn replace_reducer<R>(&self, reducer: R) -> Result<(), StoreError>
    where
        R: Reducer<S, A> + 'static,
    {
        self.replace_boxed_reducer(Arc::new(reducer))
    }

    /// [`Store::replace_reducer`] for an already shared reducer
    ///
    /// # Errors
    ///
    /// Any error from dispatching the replace action.
    pub fn replace_boxed_reducer(&self, reducer: BoxedReducer<S, A>) -> Result<(), StoreError> {
        *lock(&self.inner.reducer) = reducer;
        tracing::debug!(store = %self.inner.config.name, "Reducer replaced");

        self.inner
            .dispatch(A::internal(InternalAction::Replace))
            .map(|_| ())
    }

    /// Push-based view of the state
    #[must_use]
    pub fn observable(&self) -> Observable<S, A> {
        Observable::new(self.clone())
    }

    /// Whether the reducer is executing right now
    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.is_dispatching()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    /// Name from the store's configuration
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner<S, A>> {
        Arc::downgrade(&self.inner)
    }
}

impl<S, A> std::fmt::Debug for Store<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.config.name)
            .field("dispatching", &self.inner.dispatching.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

/// Create a store
///
/// # Arguments
///
/// - `reducer`: Computes every state, starting with the initial one
/// - `preloaded_state`: Passed to the reducer together with the init action
/// - `enhancer`: Wraps store creation, e.g. [`apply_middleware`](crate::apply_middleware)
///
/// # Errors
///
/// Returns [`StoreError::Reducer`] if the reducer fails on the init action,
/// or any error raised by the enhancer.
pub fn create_store<S, A, R>(
    reducer: R,
    preloaded_state: Option<S>,
    enhancer: Option<Enhancer<S, A>>,
) -> Result<Store<S, A>, StoreError>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
    R: Reducer<S, A> + 'static,
{
    create_store_with_config(
        Arc::new(reducer),
        preloaded_state,
        enhancer,
        StoreConfig::default(),
    )
}

/// [`create_store`] with an explicit configuration
///
/// # Errors
///
/// Returns [`StoreError::Reducer`] if the reducer fails on the init action,
/// or any error raised by the enhancer.
pub fn create_store_with_config<S, A>(
    reducer: BoxedReducer<S, A>,
    preloaded_state: Option<S>,
    enhancer: Option<Enhancer<S, A>>,
    config: StoreConfig,
) -> Result<Store<S, A>, StoreError>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    let base: StoreCreator<S, A> = Box::new(
        move |reducer: BoxedReducer<S, A>, preloaded_state: Option<S>| {
            Store::create_base(reducer, preloaded_state, config)
        },
    );

    let create = match enhancer {
        Some(enhance) => enhance(base),
        None => base,
    };
    create(reducer, preloaded_state)
}

/// Builder for [`Store`]
///
/// # Example
///
/// ```ignore
/// let store = Store::builder(root_reducer)
///     .preloaded_state(saved)
///     .enhancer(apply_middleware(vec![Box::new(LoggingMiddleware)]))
///     .config(StoreConfig::new("session"))
///     .build()?;
/// ```
pub struct StoreBuilder<S, A> {
    reducer: BoxedReducer<S, A>,
    preloaded_state: Option<S>,
    enhancers: Vec<Enhancer<S, A>>,
    config: StoreConfig,
}

impl<S, A> StoreBuilder<S, A>
where
    S: Send + Sync + 'static,
    A: Action + 'static,
{
    /// Start a builder around `reducer`
    pub fn new<R>(reducer: R) -> Self
    where
        R: Reducer<S, A> + 'static,
    {
        Self {
            reducer: Arc::new(reducer),
            preloaded_state: None,
            enhancers: Vec::new(),
            config: StoreConfig::default(),
        }
    }

    /// Seed the reducer's first call with this state
    #[must_use]
    pub fn preloaded_state(mut self, state: S) -> Self {
        self.preloaded_state = Some(state);
        self
    }

    /// Wrap store creation with `enhancer`
    ///
    /// Only one enhancer is allowed; combine several with
    /// [`compose_enhancers`](crate::compose_enhancers).
    #[must_use]
    pub fn enhancer(mut self, enhancer: Enhancer<S, A>) -> Self {
        self.enhancers.push(enhancer);
        self
    }

    /// Set the store configuration
    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the store
    ///
    /// # Errors
    ///
    /// - [`StoreError::Config`]: more than one enhancer was registered
    /// - [`StoreError::Reducer`]: the reducer failed on the init action
    /// - any error raised by the enhancer
    pub fn build(mut self) -> Result<Store<S, A>, StoreError> {
        if self.enhancers.len() > 1 {
            return Err(ConfigError::MultipleEnhancers(self.enhancers.len()).into());
        }

        create_store_with_config(
            self.reducer,
            self.preloaded_state,
            self.enhancers.pop(),
            self.config,
        )
    }
}

impl<S, A> std::fmt::Debug for StoreBuilder<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("preloaded", &self.preloaded_state.is_some())
            .field("enhancers", &self.enhancers.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
