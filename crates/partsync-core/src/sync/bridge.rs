//! Remote sync bridge
//!
//! Keeps the local replica eventually consistent with one remote record per
//! user.
//!
//! ## Push
//!
//! Every local change event (origin [`Origin::Local`]) restarts a debounce
//! timer. When the timer fires, the delta since the previous push and a full
//! snapshot are merged into the remote record. Events from applied remote
//! updates never restart the timer, so a pull cannot cause a push.
//!
//! ## Pull
//!
//! Every record emitted by the remote subscription has its `update` field
//! applied with origin [`Origin::RemoteApply`]. If the delta depends on
//! changes this replica has not seen, the record's `fullState` is merged as
//! well. Both payloads are decoded before either is applied. A record the
//! subscription could not read sets [`SyncStatus::Error`] and the session
//! keeps listening.
//!
//! ## Sessions
//!
//! `start_sync` builds a fresh [`SyncSession`] with its own generation
//! number; `stop_sync` drops it, cancelling the debounce timer. A write that
//! is already in flight finishes, but its outcome is ignored once its
//! session is no longer the active one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::record::{RecordError, RecordKey, RemoteRecord};
use super::remote::{RecordStream, RemoteStore, TransportError};
use super::status::{StatusBroadcast, SyncStatus};
use crate::document::{DocumentError, PartsDocument};
use crate::observers::Subscription;
use crate::replica::{Origin, Replica};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No remote store is configured")]
    NotConfigured,

    #[error("No sync session is active")]
    NotActive,

    #[error("Sync session was replaced while starting")]
    Superseded,

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Bridge settings
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Quiet period after the last local change before pushing
    pub debounce: Duration,
    /// Remote document name under the user
    pub document: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            document: "main".to_string(),
        }
    }
}

/// Syncs a replica with a remote store
///
/// Must be used from within a Tokio runtime. Status callbacks run after the
/// bridge releases its session lock, so they may call back into it.
pub struct SyncBridge {
    replica: Replica,
    remote: Option<Arc<dyn RemoteStore>>,
    config: BridgeConfig,
    status: Arc<StatusBroadcast>,
    /// Generation of the active session, if any
    active: Arc<Mutex<Option<u64>>>,
    next_generation: AtomicU64,
    session: Mutex<Option<SyncSession>>,
}

impl SyncBridge {
    pub fn new(
        replica: Replica,
        remote: Option<Arc<dyn RemoteStore>>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            replica,
            remote,
            config,
            status: Arc::new(StatusBroadcast::new()),
            active: Arc::new(Mutex::new(None)),
            next_generation: AtomicU64::new(1),
            session: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.get()
    }

    /// Call `callback` on every status transition
    pub fn on_status_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(callback)
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.watch()
    }

    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// User of the running session
    pub fn active_user(&self) -> Option<String> {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.ctx.key.user_id().to_string())
    }

    /// Start syncing `user_id`'s record, replacing any running session
    pub async fn start_sync(&self, user_id: &str) -> Result<(), SyncError> {
        self.stop_sync();

        let Some(remote) = self.remote.clone() else {
            info!("Sync requested without a remote store");
            self.status.set(SyncStatus::Offline);
            return Err(SyncError::NotConfigured);
        };
        let key = RecordKey::new(user_id, &self.config.document)?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut active = self.active.lock();
            *active = Some(generation);
            self.status.update(SyncStatus::Syncing);
        }
        self.status.publish();

        let ctx = Arc::new(SessionContext {
            generation,
            active: Arc::clone(&self.active),
            key,
            replica: self.replica.clone(),
            remote,
            status: Arc::clone(&self.status),
        });

        let records = match ctx.remote.subscribe(&ctx.key).await {
            Ok(records) => records,
            Err(e) => {
                warn!(key = %ctx.key, error = %e, "Failed to subscribe to remote record");
                ctx.fail();
                return Err(e.into());
            }
        };

        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let local = self.replica.on_update(move |event| {
            if event.origin == Origin::Local {
                let _ = trigger_tx.send(());
            }
        });

        let session = SyncSession {
            pull_task: tokio::spawn(pull_loop(Arc::clone(&ctx), records)),
            push_task: tokio::spawn(push_loop(
                Arc::clone(&ctx),
                trigger_rx,
                self.config.debounce,
            )),
            ctx: Arc::clone(&ctx),
            _local: local,
        };

        {
            let mut slot = self.session.lock();
            if !ctx.is_current() {
                debug!(generation, "Session replaced before it was installed");
                return Err(SyncError::Superseded);
            }
            *slot = Some(session);
        }
        info!(key = %ctx.key, generation, "Sync session started");

        match ctx.remote.get_record(&ctx.key).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(key = %ctx.key, "No remote record yet, uploading current state");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    let _ = push(ctx).await;
                });
            }
            Err(e) => {
                warn!(key = %ctx.key, error = %e, "Failed to read remote record");
                ctx.set_status(SyncStatus::Error);
            }
        }

        Ok(())
    }

    /// Stop syncing; safe to call when already offline
    pub fn stop_sync(&self) {
        let session = self.session.lock().take();
        {
            let mut active = self.active.lock();
            *active = None;
            self.status.update(SyncStatus::Offline);
        }
        self.status.publish();

        if let Some(session) = session {
            info!(key = %session.ctx.key, generation = session.ctx.generation, "Sync session stopped");
        }
    }

    /// Push pending local changes now, skipping the debounce timer
    pub async fn flush(&self) -> Result<(), SyncError> {
        let ctx = self.active_context()?;
        push(ctx).await?;
        Ok(())
    }

    /// Write the full local snapshot as both delta and snapshot
    ///
    /// Used to recover from missed updates. The write is flagged with
    /// `forceSynced` and reported like any other push.
    pub async fn force_sync_full_state(&self) -> Result<(), SyncError> {
        let ctx = self.active_context()?;

        let record = RemoteRecord::forced(&ctx.replica.encode_full_state(), Utc::now());
        match ctx.remote.merge_record(&ctx.key, record).await {
            Ok(()) => {
                info!(key = %ctx.key, "Forced full-state sync");
                ctx.set_status(SyncStatus::Synced);
                Ok(())
            }
            Err(e) => {
                warn!(key = %ctx.key, error = %e, "Forced full-state sync failed");
                ctx.set_status(SyncStatus::Error);
                Err(e.into())
            }
        }
    }
}

impl SyncBridge {
    fn active_context(&self) -> Result<Arc<SessionContext>, SyncError> {
        self.session
            .lock()
            .as_ref()
            .map(|s| Arc::clone(&s.ctx))
            .ok_or(SyncError::NotActive)
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.session.lock().take();
    }
}

/// One running sync session
///
/// Owns the local listener and the push and pull tasks; dropping it detaches
/// the listener and aborts both tasks.
pub struct SyncSession {
    ctx: Arc<SessionContext>,
    _local: Subscription,
    pull_task: JoinHandle<()>,
    push_task: JoinHandle<()>,
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.pull_task.abort();
        self.push_task.abort();
    }
}

/// State shared by a session's tasks
struct SessionContext {
    generation: u64,
    active: Arc<Mutex<Option<u64>>>,
    key: RecordKey,
    replica: Replica,
    remote: Arc<dyn RemoteStore>,
    status: Arc<StatusBroadcast>,
}

impl SessionContext {
    fn is_current(&self) -> bool {
        *self.active.lock() == Some(self.generation)
    }

    /// Publish a status if this session is still the active one
    fn set_status(&self, status: SyncStatus) {
        {
            let active = self.active.lock();
            if *active != Some(self.generation) {
                debug!(generation = self.generation, %status, "Ignoring status from stale session");
                return;
            }
            self.status.update(status);
        }
        self.status.publish();
    }

    /// Mark the session failed and inactive
    fn fail(&self) {
        {
            let mut active = self.active.lock();
            if *active != Some(self.generation) {
                return;
            }
            *active = None;
            self.status.update(SyncStatus::Error);
        }
        self.status.publish();
    }

    /// Apply one remote record
    ///
    /// `catch_up` also merges the snapshot, for the first record of a
    /// session when earlier deltas may have been missed.
    fn apply_remote(&self, record: &RemoteRecord, catch_up: bool) {
        match self.try_apply_remote(record, catch_up) {
            Ok(()) => self.set_status(SyncStatus::Synced),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to apply remote record");
                self.set_status(SyncStatus::Error);
            }
        }
    }

    fn try_apply_remote(&self, record: &RemoteRecord, catch_up: bool) -> Result<(), SyncError> {
        // Nothing is applied unless both payloads decode
        let update = record
            .decode_update()?
            .map(|bytes| PartsDocument::parse_encoded(&bytes))
            .transpose()?;
        let full_state = record
            .decode_full_state()?
            .map(|bytes| PartsDocument::parse_encoded(&bytes))
            .transpose()?;

        match (update, full_state) {
            (None, None) => {}
            (Some(update), None) => {
                self.replica.apply_parsed(update, Origin::RemoteApply)?;
            }
            (None, Some(full_state)) => {
                self.replica.apply_parsed(full_state, Origin::RemoteApply)?;
            }
            (Some(update), Some(full_state)) => {
                let changed = self.replica.apply_parsed(update, Origin::RemoteApply)?;
                debug!(key = %self.key, changed, "Applied remote update");

                if self.replica.has_missing_dependencies() {
                    debug!(key = %self.key, "Remote delta has missing dependencies, merging full state");
                    self.replica.apply_parsed(full_state, Origin::RemoteApply)?;
                } else if catch_up {
                    debug!(key = %self.key, "Merging full state to catch up");
                    self.replica.apply_parsed(full_state, Origin::RemoteApply)?;
                }
            }
        }

        Ok(())
    }
}

async fn pull_loop(ctx: Arc<SessionContext>, mut records: RecordStream) {
    let mut catch_up = true;
    while let Some(item) = records.recv().await {
        if !ctx.is_current() {
            break;
        }
        match item {
            Ok(record) => {
                ctx.apply_remote(&record, catch_up);
                catch_up = false;
            }
            Err(e) => {
                warn!(key = %ctx.key, error = %e, "Remote record could not be read");
                ctx.set_status(SyncStatus::Error);
            }
        }
    }
    debug!(generation = ctx.generation, "Remote subscription ended");
}

async fn push_loop(
    ctx: Arc<SessionContext>,
    mut triggers: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    while triggers.recv().await.is_some() {
        ctx.set_status(SyncStatus::Syncing);

        // Restart the timer on every trigger until a quiet period passes
        loop {
            match tokio::time::timeout(debounce, triggers.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        // Run the write as its own task so cancelling the session does not
        // cancel a write already on the wire
        let _ = tokio::spawn(push(Arc::clone(&ctx))).await;
    }
}

/// Push the pending delta and a full snapshot
async fn push(ctx: Arc<SessionContext>) -> Result<(), TransportError> {
    if !ctx.is_current() {
        return Ok(());
    }

    let update = ctx.replica.encode_update();
    let full_state = ctx.replica.encode_full_state();
    let record = RemoteRecord::push(&update, &full_state, Utc::now());

    match ctx.remote.merge_record(&ctx.key, record).await {
        Ok(()) => {
            debug!(key = %ctx.key, delta = update.len(), "Pushed local changes");
            ctx.set_status(SyncStatus::Synced);
            Ok(())
        }
        Err(e) => {
            warn!(key = %ctx.key, error = %e, "Push failed");
            ctx.set_status(SyncStatus::Error);
            Err(e)
        }
    }
}
