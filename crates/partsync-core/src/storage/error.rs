//! Storage errors
//!
//! I/O failures are classified by kind so callers can show a useful hint.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the local snapshot
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied: cannot access '{path}'")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Disk full or quota exceeded while writing '{path}'")]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The snapshot exists but cannot be loaded; the file was moved aside
    #[error("Snapshot '{path}' is corrupted ({details}); moved to '{backup_path}'")]
    CorruptSnapshot {
        path: PathBuf,
        backup_path: PathBuf,
        details: String,
    },

    #[error("Could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Classify a read failure
    pub fn read(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ => StorageError::Read {
                path,
                source: error,
            },
        }
    }

    /// Classify a write failure
    pub fn write(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => StorageError::DiskFull {
                path,
                source: error,
            },
            _ => StorageError::Write {
                path,
                source: error,
            },
        }
    }

    /// Hint for the user, when there is one
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::DiskFull { .. } => Some("Free up disk space and try again."),
            StorageError::PermissionDenied { .. } => {
                Some("Check file and directory permissions for the data directory.")
            }
            StorageError::CorruptSnapshot { .. } => Some(
                "Local data was reset. Start sync to pull your data back, or inspect the backup file.",
            ),
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and is writable.")
            }
            _ => None,
        }
    }
}

fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = StorageError::write(io_err, PathBuf::from("/test/path"));

        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::write(io_err, PathBuf::from("/full/disk"));
        assert!(matches!(err, StorageError::DiskFull { .. }));

        // Reads never report a full disk
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = StorageError::read(io_err, PathBuf::from("/full/disk"));
        assert!(matches!(err, StorageError::Read { .. }));
    }

    #[test]
    fn test_corrupt_snapshot_display() {
        let err = StorageError::CorruptSnapshot {
            path: PathBuf::from("/data/document.partsync"),
            backup_path: PathBuf::from("/data/document.partsync.corrupt"),
            details: "bad envelope".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("corrupted"));
        assert!(msg.contains("document.partsync.corrupt"));
    }
}
