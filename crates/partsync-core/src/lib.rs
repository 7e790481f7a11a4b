//! partsync core library
//!
//! Keeps an app's entities (parts, commitments, transactions, journal
//! entries, ...) in one replicated document and syncs it across a user's
//! devices through a remote per-user record.
//!
//! # Architecture
//!
//! - **Replica**: an Automerge document holding every collection; produces
//!   and consumes binary deltas
//! - **Store**: typed CRUD and change subscriptions per collection, the only
//!   writer of the replica
//! - **SyncBridge**: debounced pushes, remote pulls, loop prevention, and a
//!   status state machine
//!
//! # Quick Start
//!
//! ```text
//! let store = Store::open()?;
//! store.parts().add(&Part::new("Anxious", 100, 650))?;
//!
//! let bridge = SyncBridge::new(store.replica().clone(), config.remote(), config.bridge_config());
//! bridge.start_sync("user-123").await?;
//! ```
//!
//! # Modules
//!
//! - `store`: entity access layer (main entry point)
//! - `models`: entity types
//! - `replica`: shared document handle with change notifications
//! - `document`: Automerge mapping and delta encoding
//! - `wire`: binary envelope for deltas and snapshots
//! - `export`: whole-store export documents
//! - `storage`: local snapshot persistence
//! - `sync`: remote sync bridge and remote stores
//! - `config`: application configuration

pub mod config;
pub mod document;
pub mod export;
pub mod models;
pub mod observers;
pub mod replica;
pub mod storage;
pub mod store;
pub mod sync;
pub mod wire;

pub use config::Config;
pub use document::{
    DocumentError, Mutation, MutationOutcome, ParsedUpdate, PartsDocument, Record,
};
pub use export::{ExportDocument, ImportSummary, EXPORT_VERSION};
pub use models::{
    CentralBank, Commitment, CommitmentStatus, CommitmentTask, Conversation,
    ConversationMessage, Entity, HeroCommentary, Part, PartPersonality, Relationship,
    Transaction, WritingEntry,
};
pub use observers::Subscription;
pub use replica::{DocumentEvent, Origin, Replica};
pub use storage::{SnapshotPersistence, StorageError};
pub use store::{Collection, EntityError, Store};
pub use sync::{
    BridgeConfig, FileRemote, MemoryRemote, RecordKey, RemoteRecord, RemoteStore, SyncBridge,
    SyncError, SyncStatus,
};
