//! Sync command handler

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::debug;

use partsync_core::{Config, Store, SyncBridge, SyncError, SyncStatus};

use crate::output::Output;

/// How long to wait for the first pull before giving up
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run one sync session against the configured remote
///
/// Starts a session, waits for the initial exchange, pushes local edits
/// (or the full state with `force`), then stops.
pub async fn sync(store: &Store, config: &Config, force: bool, output: &Output) -> Result<()> {
    let Some(ref user_id) = config.user_id else {
        bail!(
            "No user configured. Set one with:\n  \
             partsync config set user_id <id>"
        );
    };

    let bridge = SyncBridge::new(
        store.replica().clone(),
        config.remote(),
        config.bridge_config(),
    );

    output.message(&format!("Syncing {} for user {}...", config.document, user_id));

    match bridge.start_sync(user_id).await {
        Ok(()) => {}
        Err(SyncError::NotConfigured) => bail!(
            "Sync is not configured. Enable it with:\n  \
             partsync config set sync_enabled true\n  \
             partsync config set remote_dir /path/to/shared/dir"
        ),
        Err(e) => return Err(e).context("Failed to start sync"),
    }

    let before = store.parts().count()?;
    let result = run_session(&bridge, force).await;
    bridge.stop_sync();
    result?;

    let after = store.parts().count()?;
    if after != before {
        output.success(&format!("Sync complete - parts: {} -> {}", before, after));
    } else {
        output.success("Sync complete");
    }

    Ok(())
}

async fn run_session(bridge: &SyncBridge, force: bool) -> Result<()> {
    let mut status = bridge.watch_status();
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, async {
        status
            .wait_for(|s| *s != SyncStatus::Syncing)
            .await
            .map(|s| *s)
    })
    .await;
    match settled {
        Ok(Ok(s)) => debug!(status = %s, "Initial exchange settled"),
        Ok(Err(_)) => bail!("Sync session closed unexpectedly"),
        Err(_) => debug!("Timed out waiting for the initial exchange"),
    }

    if force {
        bridge
            .force_sync_full_state()
            .await
            .context("Forced full-state sync failed")?;
    } else {
        bridge.flush().await.context("Failed to push local changes")?;
    }

    if bridge.status() == SyncStatus::Error {
        bail!("Sync finished with errors; run with RUST_LOG=partsync_core=debug for details");
    }

    Ok(())
}
