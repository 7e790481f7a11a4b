//! Callback registries
//!
//! A small listener list used by the replica (collection and update
//! observers) and by the sync status broadcast. Registering a callback
//! returns a [`Subscription`]; dropping it detaches the callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Entries<E: ?Sized> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, Callback<E>)>>,
}

/// A list of callbacks invoked with a borrowed event
pub struct Observers<E: ?Sized> {
    entries: Arc<Entries<E>>,
}

impl<E: ?Sized + 'static> Observers<E> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Entries {
                next_id: AtomicU64::new(1),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a callback
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.entries.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.callbacks.lock().push((id, Arc::new(callback)));

        let entries: Weak<Entries<E>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.callbacks.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    /// Invoke every registered callback
    ///
    /// The list is cloned first, so callbacks may subscribe or unsubscribe
    /// without deadlocking.
    pub fn notify(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .entries
            .callbacks
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ?Sized + 'static> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> Clone for Observers<E> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

/// Handle for a registered callback
///
/// The callback stays registered until this handle is dropped or
/// [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription detaches the callback immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(detach: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach the callback now
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}
