//! # Unistore Runtime
//!
//! Runtime implementation for Unistore, a single-writer observable state store.
//!
//! This crate provides the Store that owns application state and serializes
//! every change through a dispatched action.
//!
//! ## Core Components
//!
//! - **Store**: Owns the current state, the active reducer, and the listener registry
//! - **Middleware pipeline**: Wraps dispatch in a chain of independently authored layers
//! - **Observable**: Push-based state observation, also available as a `Stream`
//!
//! ## Example
//!
//! ```
//! use unistore_core::action::Action;
//! use unistore_core::reducer;
//! use unistore_runtime::Store;
//! use serde_json::{json, Value};
//!
//! # fn main() -> Result<(), unistore_runtime::StoreError> {
//! let store = Store::new(reducer::from_fn(|state: Option<&i64>, action: &Value| {
//!     let count = state.copied().unwrap_or(0);
//!     Ok(if action.action_type() == Ok("inc") { count + 1 } else { count })
//! }))?;
//!
//! store.dispatch(json!({ "type": "inc" }))?;
//! assert_eq!(*store.get_state()?, 1);
//! # Ok(())
//! # }
//! ```

/// Action creators bound to a dispatch function
pub mod bind;

/// Metric names and recorders for observability
pub mod metrics;

/// Middleware and the enhancer that applies them
pub mod middleware;

/// Push-based observation of store state
pub mod observable;

/// The store engine
pub mod store;

mod listeners;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;
    use unistore_core::action::ActionError;

    /// Errors that can occur during Store operations
    ///
    /// Every error is raised synchronously at the call site of the offending
    /// operation. The store never retries or swallows them, and it remains
    /// usable afterwards.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// The store was configured incorrectly
        #[error("invalid store configuration: {0}")]
        Config(#[from] ConfigError),

        /// The dispatched action is malformed
        ///
        /// The reducer did not run and the state is unchanged.
        #[error("invalid action: {0}")]
        Validation(#[from] ActionError),

        /// An operation was attempted while the reducer was executing
        #[error("{}", .0.reentrancy_message())]
        Reentrancy(Operation),

        /// The reducer returned an error
        ///
        /// The state is unchanged and listeners were not notified.
        #[error("reducer failed: {0}")]
        Reducer(#[source] anyhow::Error),

        /// A middleware rejected or failed to handle an action
        #[error("middleware failed: {0}")]
        Middleware(#[source] anyhow::Error),

        /// A middleware dispatched while the middleware chain was being built
        ///
        /// Other middleware would not be applied to such a dispatch.
        #[error("dispatching while constructing your middleware is not allowed; other middleware would not be applied to this dispatch")]
        DispatchWhileConstructing,

        /// A middleware API was used after its store was dropped
        #[error("the store behind this middleware API has been dropped")]
        StoreDropped,
    }

    impl StoreError {
        /// Wrap an arbitrary error raised by a middleware
        pub fn middleware(error: impl Into<anyhow::Error>) -> Self {
            Self::Middleware(error.into())
        }

        /// Check if this error came from the reentrancy guard
        #[must_use]
        pub const fn is_reentrancy(&self) -> bool {
            matches!(self, Self::Reentrancy(_))
        }

        /// Check if this error came from action validation
        #[must_use]
        pub const fn is_validation(&self) -> bool {
            matches!(self, Self::Validation(_))
        }
    }

    /// Store configuration errors
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConfigError {
        /// More than one enhancer was supplied
        #[error("{0} store enhancers were supplied; compose them into a single enhancer with `compose_enhancers`")]
        MultipleEnhancers(usize),
    }

    /// Store operations guarded against reentrancy
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Operation {
        /// Reading the state
        GetState,
        /// Registering a listener
        Subscribe,
        /// Removing a listener
        Unsubscribe,
        /// Dispatching an action
        Dispatch,
    }

    impl Operation {
        /// Human-readable explanation of why the operation was refused
        #[must_use]
        pub const fn reentrancy_message(self) -> &'static str {
            match self {
                Self::GetState => {
                    "you may not read the store state while the reducer is executing; the reducer has already received the state as an argument"
                },
                Self::Subscribe => {
                    "you may not subscribe while the reducer is executing; subscribe from a component or listener and read the state there"
                },
                Self::Unsubscribe => {
                    "you may not unsubscribe a store listener while the reducer is executing"
                },
                Self::Dispatch => "reducers may not dispatch actions",
            }
        }
    }
}

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use unistore_runtime::StoreConfig;
///
/// let config = StoreConfig::default().with_name("session");
/// assert_eq!(config.name, "session");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name recorded on tracing spans and metric labels
    pub name: String,
}

impl StoreConfig {
    /// Create a new configuration with the given store name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Set the store name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("store")
    }
}

// Re-export for convenience
pub use bind::{BoundActionCreator, bind_action_creator, bind_action_creators};
pub use error::{ConfigError, Operation, StoreError};
pub use listeners::{Listener, ListenerId, Unsubscribe};
pub use middleware::{
    LoggingMiddleware, Middleware, MiddlewareApi, apply_middleware, compose_enhancers,
};
pub use observable::{Observable, Observer, StateStream, Subscription};
pub use store::{
    Dispatch, Enhancer, Store, StoreBuilder, StoreCreator, create_store, create_store_with_config,
};
