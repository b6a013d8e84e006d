//! Listener registry with copy-on-write snapshots.
//!
//! The registry keeps two lists. `current` is the list the most recent
//! dispatch iterates; `next` is the list that subscribe and unsubscribe
//! mutate. They share one allocation until the first mutation after a
//! snapshot, so a listener that subscribes or unsubscribes during
//! notification never changes the set being notified.

use crate::error::StoreError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// A zero-argument callback invoked after every successful dispatch
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration in a store's listener list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Entries = Arc<Vec<(ListenerId, Listener)>>;

pub(crate) struct ListenerRegistry {
    current: Entries,
    next: Entries,
    next_id: u64,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        let entries: Entries = Arc::new(Vec::new());
        Self {
            current: Arc::clone(&entries),
            next: entries,
            next_id: 0,
        }
    }

    fn ensure_can_mutate_next(&mut self) {
        if Arc::ptr_eq(&self.current, &self.next) {
            self.next = Arc::new(self.current.as_ref().clone());
        }
    }

    pub(crate) fn insert(&mut self, listener: Listener) -> ListenerId {
        self.ensure_can_mutate_next();
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        Arc::make_mut(&mut self.next).push((id, listener));
        id
    }

    /// Returns whether the listener was still registered.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.ensure_can_mutate_next();
        let entries = Arc::make_mut(&mut self.next);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Promote `next` to `current` and hand out the list to notify.
    pub(crate) fn snapshot(&mut self) -> Entries {
        self.current = Arc::clone(&self.next);
        Arc::clone(&self.current)
    }

    pub(crate) fn len(&self) -> usize {
        self.next.len()
    }

    #[cfg(test)]
    fn is_shared(&self) -> bool {
        Arc::ptr_eq(&self.current, &self.next)
    }
}

/// The store side of an [`Unsubscribe`] handle
pub(crate) trait ListenerHost: Send + Sync {
    fn remove_listener(&self, id: ListenerId) -> Result<(), StoreError>;
}

/// Handle returned by `subscribe`
///
/// Calling [`Unsubscribe::unsubscribe`] removes the listener from the next
/// notification round on. Dropping the handle does NOT unsubscribe.
#[must_use = "dropping the handle leaves the listener registered; keep it to unsubscribe later"]
pub struct Unsubscribe {
    id: ListenerId,
    host: Weak<dyn ListenerHost>,
    subscribed: AtomicBool,
}

impl Unsubscribe {
    pub(crate) fn new(id: ListenerId, host: Weak<dyn ListenerHost>) -> Self {
        Self {
            id,
            host,
            subscribed: AtomicBool::new(true),
        }
    }

    /// Remove the listener
    ///
    /// A second call, or a call after the store was dropped, does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reentrancy`] while the reducer is executing; the
    /// listener stays registered and the handle stays usable.
    pub fn unsubscribe(&self) -> Result<(), StoreError> {
        if !self.subscribed.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Some(host) = self.host.upgrade() {
            host.remove_listener(self.id)?;
        }

        self.subscribed.store(false, Ordering::Release);
        Ok(())
    }

    /// Whether `unsubscribe` has not yet succeeded
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Identifier of the registration
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
