//! Sync status broadcast

use std::cell::Cell;
use std::fmt;

use parking_lot::ReentrantMutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::observers::{Observers, Subscription};

/// State of the sync bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// No session running
    Offline,
    /// A session is starting or a push is pending
    Syncing,
    /// The last push or pull succeeded
    Synced,
    /// The last push or pull failed
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStatus::Offline => "offline",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Publishes status transitions to callbacks and watch receivers
///
/// Observers only hear about actual transitions; setting the current
/// status again is silent.
///
/// [`update`](Self::update) changes the watched value and
/// [`publish`](Self::publish) runs the callbacks, so a caller holding its own
/// lock can update under it and publish after releasing it. Callbacks may
/// set the status again; the nested transition is delivered before the
/// outer `publish` returns.
pub struct StatusBroadcast {
    tx: watch::Sender<SyncStatus>,
    observers: Observers<SyncStatus>,
    /// Last status handed to observers
    published: ReentrantMutex<Cell<SyncStatus>>,
}

impl StatusBroadcast {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncStatus::Offline);
        Self {
            tx,
            observers: Observers::new(),
            published: ReentrantMutex::new(Cell::new(SyncStatus::Offline)),
        }
    }

    pub fn get(&self) -> SyncStatus {
        *self.tx.borrow()
    }

    /// Move to `status` and notify observers
    ///
    /// Returns whether it was a transition.
    pub fn set(&self, status: SyncStatus) -> bool {
        let changed = self.update(status);
        self.publish();
        changed
    }

    /// Move watch receivers to `status` without running callbacks
    pub fn update(&self, status: SyncStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        })
    }

    /// Run callbacks if the status moved since they last ran
    pub fn publish(&self) {
        let published = self.published.lock();
        let current = self.get();
        if published.get() != current {
            published.set(current);
            self.observers.notify(&current);
        }
    }

    /// Call `callback` on every transition
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.observers.add(callback)
    }

    /// A receiver that always holds the latest status
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusBroadcast {
    fn default() -> Self {
        Self::new()
    }
}
