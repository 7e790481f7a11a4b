//! Directory-backed remote store
//!
//! Each record is a JSON file at `<root>/<user>/<document>.json`. Pointing
//! several devices at a shared or synced directory gives them a common
//! remote. Subscriptions poll the file and emit whenever its content
//! changes; content that does not parse is emitted as an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::record::{RecordKey, RemoteRecord};
use super::remote::{RecordStream, RemoteStore, TransportError};

pub struct FileRemote {
    root: PathBuf,
    poll_interval: Duration,
}

impl FileRemote {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval,
        }
    }

    /// File holding the record for `key`
    pub fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.root
            .join(key.user_id())
            .join(format!("{}.json", key.document()))
    }
}

impl RemoteStore for FileRemote {
    fn merge_record<'a>(
        &'a self,
        key: &'a RecordKey,
        record: RemoteRecord,
    ) -> BoxFuture<'a, Result<(), TransportError>> {
        async move {
            let path = self.record_path(key);
            let mut stored = read_record(&path).await?.unwrap_or_default();
            stored.merge(record);

            let json = serde_json::to_vec_pretty(&stored)?;
            write_atomic(&path, &json).await?;
            debug!(key = %key, bytes = json.len(), "Wrote remote record");
            Ok(())
        }
        .boxed()
    }

    fn get_record<'a>(
        &'a self,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, Result<Option<RemoteRecord>, TransportError>> {
        async move { read_record(&self.record_path(key)).await }.boxed()
    }

    fn subscribe<'a>(
        &'a self,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, Result<RecordStream, TransportError>> {
        async move {
            let path = self.record_path(key);
            // Fail early if the record exists but cannot be read
            let initial = read_raw(&path).await?;

            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(poll_record(path, initial, self.poll_interval, tx));
            Ok(rx)
        }
        .boxed()
    }
}

/// Emit the record whenever the file content changes
///
/// Each distinct unparseable content is reported once. A failed read is
/// reported every poll, and the next good read is emitted even if the
/// content matches what was seen before the failure.
async fn poll_record(
    path: PathBuf,
    initial: Option<Vec<u8>>,
    interval: Duration,
    tx: mpsc::UnboundedSender<Result<RemoteRecord, TransportError>>,
) {
    let mut last: Option<Vec<u8>> = None;
    let mut next = initial.map(Ok);

    loop {
        if let Some(read) = next.take() {
            let item = match read {
                Ok(bytes) if last.as_ref() != Some(&bytes) => {
                    let parsed = serde_json::from_slice::<RemoteRecord>(&bytes);
                    if let Err(ref e) = parsed {
                        warn!(path = ?path, error = %e, "Remote record is not valid JSON");
                    }
                    last = Some(bytes);
                    Some(parsed.map_err(TransportError::from))
                }
                Ok(_) => None,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to poll remote record");
                    last = None;
                    Some(Err(e))
                }
            };
            if let Some(item) = item {
                if tx.send(item).is_err() {
                    break;
                }
            }
        }

        tokio::select! {
            _ = tx.closed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        next = read_raw(&path).await.transpose();
    }

    debug!(path = ?path, "Stopped polling remote record");
}

async fn read_raw(path: &Path) -> Result<Option<Vec<u8>>, TransportError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TransportError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn read_record(path: &Path) -> Result<Option<RemoteRecord>, TransportError> {
    match read_raw(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), TransportError> {
    let io_err = |source| TransportError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, data).await.map_err(io_err)?;
    tokio::fs::rename(&temp_path, path).await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn remote(temp_dir: &TempDir) -> FileRemote {
        FileRemote::new(temp_dir.path(), Duration::from_millis(20))
    }

    fn key() -> RecordKey {
        RecordKey::new("u1", "main").unwrap()
    }

    async fn next_item(rx: &mut RecordStream) -> Result<RemoteRecord, TransportError> {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for record")
            .expect("subscription closed")
    }

    async fn next(rx: &mut RecordStream) -> RemoteRecord {
        next_item(rx).await.expect("record should parse")
    }

    #[tokio::test]
    async fn test_record_path_layout() {
        let temp_dir = TempDir::new().unwrap();
        let path = remote(&temp_dir).record_path(&key());
        assert_eq!(path, temp_dir.path().join("u1").join("main.json"));
    }

    #[tokio::test]
    async fn test_merge_preserves_unknown_fields() {
        let temp_dir = TempDir::new().unwrap();
        let remote = remote(&temp_dir);
        let path = remote.record_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, json!({ "displayName": "Sam" }).to_string()).unwrap();

        remote
            .merge_record(&key(), RemoteRecord::push(&[1], &[2], Utc::now()))
            .await
            .unwrap();

        let stored = remote.get_record(&key()).await.unwrap().unwrap();
        assert_eq!(stored.decode_full_state().unwrap(), Some(vec![2]));
        assert_eq!(stored.extra["displayName"], "Sam");
    }

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let temp_dir = TempDir::new().unwrap();
        assert!(remote(&temp_dir).get_record(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_transport_error() {
        let temp_dir = TempDir::new().unwrap();
        let remote = remote(&temp_dir);
        let path = remote.record_path(&key());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ nope").unwrap();

        let err = remote.get_record(&key()).await.unwrap_err();
        assert!(matches!(err, TransportError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_subscription_emits_initial_and_changes() {
        let temp_dir = TempDir::new().unwrap();
        let remote = remote(&temp_dir);
        remote
            .merge_record(&key(), RemoteRecord::push(&[1], &[1], Utc::now()))
            .await
            .unwrap();

        let mut rx = remote.subscribe(&key()).await.unwrap();
        assert_eq!(next(&mut rx).await.decode_update().unwrap(), Some(vec![1]));

        remote
            .merge_record(&key(), RemoteRecord::push(&[2], &[2], Utc::now()))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.decode_update().unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_subscription_reports_corrupt_content_and_recovers() {
        let temp_dir = TempDir::new().unwrap();
        let remote = remote(&temp_dir);
        remote
            .merge_record(&key(), RemoteRecord::push(&[1], &[1], Utc::now()))
            .await
            .unwrap();

        let mut rx = remote.subscribe(&key()).await.unwrap();
        assert_eq!(next(&mut rx).await.decode_update().unwrap(), Some(vec![1]));

        let path = remote.record_path(&key());
        std::fs::write(path.with_extension("partial"), "{ nope").unwrap();
        std::fs::rename(path.with_extension("partial"), &path).unwrap();
        let err = next_item(&mut rx).await.unwrap_err();
        assert!(matches!(err, TransportError::Serialization(_)));

        // The stream stays open for the next good write
        std::fs::remove_file(&path).unwrap();
        remote
            .merge_record(&key(), RemoteRecord::push(&[3], &[3], Utc::now()))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.decode_update().unwrap(), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_subscription_before_record_exists() {
        let temp_dir = TempDir::new().unwrap();
        let remote = remote(&temp_dir);
        let mut rx = remote.subscribe(&key()).await.unwrap();

        remote
            .merge_record(&key(), RemoteRecord::push(&[5], &[5], Utc::now()))
            .await
            .unwrap();
        assert_eq!(next(&mut rx).await.decode_update().unwrap(), Some(vec![5]));
    }
}
