//! Remote synchronization
//!
//! The [`SyncBridge`] pushes local changes to a per-user remote record and
//! applies records pushed back down, reporting progress as a
//! [`SyncStatus`].
//!
//! ## Usage
//!
//! ```ignore
//! let bridge = SyncBridge::new(store.replica().clone(), config.remote(), config.bridge_config());
//! let _sub = bridge.on_status_change(|status| println!("sync: {}", status));
//! bridge.start_sync("user-123").await?;
//! ```

mod bridge;
mod file_remote;
mod record;
mod remote;
mod status;

pub use bridge::{BridgeConfig, SyncBridge, SyncError, SyncSession};
pub use file_remote::FileRemote;
pub use record::{RecordError, RecordKey, RemoteRecord};
pub use remote::{MemoryRemote, RecordStream, RemoteStore, TransportError};
pub use status::{StatusBroadcast, SyncStatus};
