//! Remote document store abstraction
//!
//! The bridge only needs three primitives from a backend: a merge-style
//! write, a read, and a subscription that pushes full record snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use super::record::{RecordKey, RemoteRecord};

/// Stream of full record snapshots, or the error hit reading one
///
/// Dropping it ends the subscription.
pub type RecordStream = mpsc::UnboundedReceiver<Result<RemoteRecord, TransportError>>;

type RecordSender = mpsc::UnboundedSender<Result<RemoteRecord, TransportError>>;

/// Errors talking to the remote store
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A per-user remote record store
pub trait RemoteStore: Send + Sync {
    /// Overwrite the fields present in `record`, keeping all others
    fn merge_record<'a>(
        &'a self,
        key: &'a RecordKey,
        record: RemoteRecord,
    ) -> BoxFuture<'a, Result<(), TransportError>>;

    fn get_record<'a>(
        &'a self,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, Result<Option<RemoteRecord>, TransportError>>;

    /// Receive the record after every write, including our own
    ///
    /// The current record, if any, is delivered first. A record that cannot
    /// be read arrives as an `Err` item and the stream stays open.
    fn subscribe<'a>(&'a self, key: &'a RecordKey)
        -> BoxFuture<'a, Result<RecordStream, TransportError>>;
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<RecordKey, RemoteRecord>,
    watchers: HashMap<RecordKey, Vec<RecordSender>>,
    writes: Vec<(RecordKey, RemoteRecord)>,
    failed_writes: usize,
    fail_writes: bool,
    fail_subscribe: bool,
    write_delay: Option<Duration>,
}

impl MemoryState {
    fn store(&mut self, key: &RecordKey, patch: RemoteRecord) {
        let record = self.records.entry(key.clone()).or_default();
        record.merge(patch);
        let snapshot = record.clone();

        if let Some(watchers) = self.watchers.get_mut(key) {
            watchers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }
}

/// In-process remote store
///
/// Keeps a log of every successful write and can be told to fail, which
/// makes it the backend of choice for tests and for embedding.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful merge write, in order
    pub fn writes(&self) -> Vec<(RecordKey, RemoteRecord)> {
        self.state.lock().writes.clone()
    }

    /// Successful merge writes to one key
    pub fn writes_to(&self, key: &RecordKey) -> Vec<RemoteRecord> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Merge writes rejected by failure injection
    pub fn failed_writes(&self) -> usize {
        self.state.lock().failed_writes
    }

    /// Current stored record
    pub fn record(&self, key: &RecordKey) -> Option<RemoteRecord> {
        self.state.lock().records.get(key).cloned()
    }

    /// Write as another device would: stored and broadcast, not logged
    pub fn inject(&self, key: &RecordKey, record: RemoteRecord) {
        self.state.lock().store(key, record);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.state.lock().fail_subscribe = fail;
    }

    /// Delay every merge write, to simulate a slow network
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.state.lock().write_delay = delay;
    }
}

impl RemoteStore for MemoryRemote {
    fn merge_record<'a>(
        &'a self,
        key: &'a RecordKey,
        record: RemoteRecord,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            let delay = self.state.lock().write_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state.lock();
            if state.fail_writes {
                state.failed_writes += 1;
                return Err(TransportError::Unavailable("write rejected".to_string()));
            }
            state.writes.push((key.clone(), record.clone()));
            state.store(key, record);
            Ok(())
        }
        .boxed()
    }

    fn get_record<'a>(
        &'a self,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, Result<Option<RemoteRecord>, TransportError>> {
        let record = self.record(key);
        async move { Ok(record) }.boxed()
    }

    fn subscribe<'a>(
        &'a self,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, Result<RecordStream, TransportError>> {
        let result = {
            let mut state = self.state.lock();
            if state.fail_subscribe {
                Err(TransportError::Unavailable(
                    "subscription rejected".to_string(),
                ))
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                if let Some(record) = state.records.get(key) {
                    let _ = tx.send(Ok(record.clone()));
                }
                state.watchers.entry(key.clone()).or_default().push(tx);
                Ok(rx)
            }
        };
        async move { result }.boxed()
    }
}
