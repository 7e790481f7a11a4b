//! Snapshot persistence
//!
//! Saves the full replica state to `<data_dir>/document.partsync` and loads
//! it back on startup. Writes are atomic (temp file, fsync, rename) so the
//! snapshot is never left half-written.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Config;
use crate::replica::Replica;
use crate::storage::error::{StorageError, StorageResult};

/// Reads and writes the on-disk snapshot
#[derive(Debug, Clone)]
pub struct SnapshotPersistence {
    path: PathBuf,
}

impl SnapshotPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persistence for the snapshot location named by `config`
    pub fn for_config(config: &Config) -> Self {
        Self::new(config.snapshot_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the replica's full state
    pub fn save(&self, replica: &Replica) -> StorageResult<()> {
        let bytes = replica.encode_full_state();
        atomic_write(&self.path, &bytes)?;
        debug!(path = ?self.path, bytes = bytes.len(), "Saved snapshot");
        Ok(())
    }

    /// Load the snapshot
    ///
    /// Returns `None` if no snapshot exists. A snapshot that cannot be
    /// decoded is renamed to `*.corrupt` and reported as
    /// [`StorageError::CorruptSnapshot`].
    pub fn load(&self) -> StorageResult<Option<Replica>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path).map_err(|e| StorageError::read(e, self.path.clone()))?;

        match Replica::from_full_state(&bytes) {
            Ok(replica) => Ok(Some(replica)),
            Err(e) => {
                let backup_path = self.path.with_extension("partsync.corrupt");
                fs::rename(&self.path, &backup_path).map_err(|source| {
                    StorageError::AtomicWriteFailed {
                        from: self.path.clone(),
                        to: backup_path.clone(),
                        source,
                    }
                })?;
                Err(StorageError::CorruptSnapshot {
                    path: self.path.clone(),
                    backup_path,
                    details: e.to_string(),
                })
            }
        }
    }

    /// Load the snapshot, or start from an empty replica
    ///
    /// A corrupt snapshot is moved aside and logged; the replica starts
    /// empty so sync can restore it.
    pub fn load_or_empty(&self) -> StorageResult<Replica> {
        match self.load() {
            Ok(Some(replica)) => Ok(replica),
            Ok(None) => Ok(Replica::new()),
            Err(e @ StorageError::CorruptSnapshot { .. }) => {
                warn!(error = %e, hint = e.recovery_suggestion(), "Starting with an empty replica");
                Ok(Replica::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// Write data to a file atomically
pub fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::write(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::write(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::write(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StorageError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
