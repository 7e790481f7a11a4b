//! Local storage
//!
//! The replica lives in memory; this module keeps a full snapshot of it on
//! disk so the app starts with its data even before sync connects.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{atomic_write, SnapshotPersistence};
