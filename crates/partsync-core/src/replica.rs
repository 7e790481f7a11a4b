//! Shared replicated document store
//!
//! `Replica` is the process-wide handle around a [`PartsDocument`]. It
//! serializes access to the document and fans change notifications out to
//! collection observers and update listeners.
//!
//! ## Notifications
//!
//! Notifications are delivered synchronously, after the document lock is
//! released and before `mutate`/`apply_update` return. Observers may read
//! the replica from inside a callback, but a mutation issued from inside a
//! callback on the same thread fails with
//! [`DocumentError::ReentrantMutation`] instead of recursing.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::document::{
    DocumentError, Mutation, MutationOutcome, ParsedUpdate, PartsDocument, Record,
};
use crate::observers::{Observers, Subscription};

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Made through the entity access layer on this device
    Local,
    /// Merged from an update received from the remote store
    RemoteApply,
}

/// Emitted once per applied mutation or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEvent {
    pub origin: Origin,
    /// Collections whose records changed
    pub collections: Vec<String>,
}

struct Inner {
    doc: Mutex<PartsDocument>,
    collection_observers: Mutex<HashMap<String, Observers<[Record]>>>,
    update_observers: Observers<DocumentEvent>,
    dispatching: Mutex<Option<ThreadId>>,
}

/// Cheaply cloneable handle to the replicated document
#[derive(Clone)]
pub struct Replica {
    inner: Arc<Inner>,
}

impl Replica {
    /// Create an empty replica
    pub fn new() -> Self {
        Self::from_document(PartsDocument::new())
    }

    /// Create a replica from a full-state snapshot
    pub fn from_full_state(bytes: &[u8]) -> Result<Self, DocumentError> {
        Ok(Self::from_document(PartsDocument::load(bytes)?))
    }

    fn from_document(doc: PartsDocument) -> Self {
        Self {
            inner: Arc::new(Inner {
                doc: Mutex::new(doc),
                collection_observers: Mutex::new(HashMap::new()),
                update_observers: Observers::new(),
                dispatching: Mutex::new(None),
            }),
        }
    }

    // ==================== Mutation ====================

    /// Apply a local mutation
    ///
    /// Only the entity access layer calls this, so that every logical change
    /// is exactly one store mutation.
    pub(crate) fn mutate(
        &self,
        collection: &str,
        id: &str,
        mutation: Mutation,
    ) -> Result<MutationOutcome, DocumentError> {
        self.ensure_not_dispatching()?;

        let outcome = self.inner.doc.lock().mutate(collection, id, &mutation)?;
        if outcome == MutationOutcome::Applied {
            let mut collections = BTreeSet::new();
            collections.insert(collection.to_string());
            self.dispatch(Origin::Local, collections);
        }
        Ok(outcome)
    }

    /// Remove every record as one change
    pub(crate) fn clear_all(&self) -> Result<(), DocumentError> {
        self.ensure_not_dispatching()?;

        let cleared = self.inner.doc.lock().clear_all()?;
        if !cleared.is_empty() {
            self.dispatch(Origin::Local, cleared);
        }
        Ok(())
    }

    /// Merge an encoded delta or snapshot
    ///
    /// Decode failures are returned and leave the document untouched.
    /// Returns whether anything changed; unchanged merges emit no event.
    pub fn apply_update(&self, bytes: &[u8], origin: Origin) -> Result<bool, DocumentError> {
        let update = PartsDocument::parse_encoded(bytes)?;
        self.apply_parsed(update, origin)
    }

    /// Merge an update decoded with [`PartsDocument::parse_encoded`]
    pub fn apply_parsed(&self, update: ParsedUpdate, origin: Origin) -> Result<bool, DocumentError> {
        self.ensure_not_dispatching()?;

        let changed_collections = {
            let mut doc = self.inner.doc.lock();
            let watched: BTreeSet<String> = doc.collections();
            let before = snapshot(&doc, &watched);

            if !doc.apply_parsed(update)? {
                return Ok(false);
            }

            let mut candidates = watched;
            candidates.extend(doc.collections());
            let after = snapshot(&doc, &candidates);

            candidates
                .into_iter()
                .filter(|c| before.get(c) != after.get(c))
                .collect::<BTreeSet<_>>()
        };

        debug!(
            ?origin,
            collections = ?changed_collections,
            "Applied update"
        );
        self.dispatch(origin, changed_collections);
        Ok(true)
    }

    // ==================== Reads ====================

    /// Read every record of a collection
    pub fn read_all(&self, collection: &str) -> Result<Vec<Record>, DocumentError> {
        self.inner.doc.lock().read_all(collection)
    }

    /// Read one record
    pub fn read_one(&self, collection: &str, id: &str) -> Result<Option<Record>, DocumentError> {
        self.inner.doc.lock().read_one(collection, id)
    }

    // ==================== Encoding ====================

    /// Encode the changes made since the previous call
    pub fn encode_update(&self) -> Vec<u8> {
        self.inner.doc.lock().encode_update()
    }

    /// Encode the whole document
    pub fn encode_full_state(&self) -> Vec<u8> {
        self.inner.doc.lock().encode_full_state()
    }

    /// Whether merged deltas are waiting on changes not seen yet
    pub fn has_missing_dependencies(&self) -> bool {
        self.inner.doc.lock().has_missing_dependencies()
    }

    // ==================== Observers ====================

    /// Observe a collection
    ///
    /// The callback receives the full current record list whenever any
    /// record in the collection changes. It must not mutate the replica.
    pub fn subscribe<F>(&self, collection: &str, callback: F) -> Subscription
    where
        F: Fn(&[Record]) + Send + Sync + 'static,
    {
        self.inner
            .collection_observers
            .lock()
            .entry(collection.to_string())
            .or_default()
            .add(callback)
    }

    /// Observe every change event, with its origin
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DocumentEvent) + Send + Sync + 'static,
    {
        self.inner.update_observers.add(callback)
    }

    // ==================== Private helpers ====================

    fn ensure_not_dispatching(&self) -> Result<(), DocumentError> {
        if *self.inner.dispatching.lock() == Some(thread::current().id()) {
            warn!("Rejected mutation issued from inside a change notification");
            return Err(DocumentError::ReentrantMutation);
        }
        Ok(())
    }

    fn dispatch(&self, origin: Origin, collections: BTreeSet<String>) {
        if collections.is_empty() {
            return;
        }

        let _guard = DispatchGuard::enter(&self.inner.dispatching);

        for collection in &collections {
            let observers = self.inner.collection_observers.lock().get(collection).cloned();
            let Some(observers) = observers.filter(|o| !o.is_empty()) else {
                continue;
            };

            match self.read_all(collection) {
                Ok(records) => observers.notify(&records[..]),
                Err(e) => warn!(collection = %collection, error = %e, "Failed to read collection for observers"),
            }
        }

        self.inner.update_observers.notify(&DocumentEvent {
            origin,
            collections: collections.into_iter().collect(),
        });
    }
}

impl Default for Replica {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the current thread as dispatching until dropped
struct DispatchGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
    previous: Option<ThreadId>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        let previous = slot.lock().replace(thread::current().id());
        Self { slot, previous }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = self.previous;
    }
}

fn snapshot(
    doc: &PartsDocument,
    collections: &BTreeSet<String>,
) -> HashMap<String, Vec<Record>> {
    collections
        .iter()
        .filter_map(|c| doc.read_all(c).ok().map(|records| (c.clone(), records)))
        .collect()
}
