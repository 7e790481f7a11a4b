//! Status command handler

use std::collections::BTreeMap;

use anyhow::Result;

use partsync_core::models::collections;
use partsync_core::{Config, Store};

use crate::output::{Output, OutputFormat};

/// Show store contents and sync configuration
pub fn show(store: &Store, config: &Config, output: &Output) -> Result<()> {
    let counts = collection_counts(store)?;
    let snapshot = config.snapshot_path();
    let snapshot_size = std::fs::metadata(&snapshot).map(|m| m.len()).ok();

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "document": config.document,
            "snapshot": {
                "path": snapshot,
                "exists": snapshot_size.is_some(),
                "size": snapshot_size,
            },
            "sync": {
                "enabled": config.sync_enabled,
                "user_id": config.user_id,
                "remote_dir": config.remote_dir,
                "debounce_ms": config.debounce_ms,
            },
            "counts": counts,
        }))?,
        OutputFormat::Quiet => {
            println!("{}", counts.values().sum::<usize>());
        }
        OutputFormat::Human => {
            println!("partsync Status");
            println!("===============");
            println!();
            println!("Storage:");
            println!("  Document: {}", config.document);
            println!("  Snapshot: {}", snapshot.display());
            match snapshot_size {
                Some(size) => println!("  Size:     {}", format_size(size)),
                None => println!("  Size:     (not saved yet)"),
            }
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  User:   {}",
                config.user_id.as_deref().unwrap_or("(not set)")
            );
            if let Some(ref dir) = config.remote_dir {
                println!("  Remote: {}", dir.display());
            }
            println!();
            println!("Contents:");
            for (collection, count) in &counts {
                println!("  {:<22} {}", collection, count);
            }
        }
    }

    Ok(())
}

/// Entity count per collection
fn collection_counts(store: &Store) -> Result<BTreeMap<&'static str, usize>> {
    let mut counts = BTreeMap::new();
    counts.insert(collections::PARTS, store.parts().count()?);
    counts.insert(collections::COMMITMENTS, store.commitments().count()?);
    counts.insert(collections::TRANSACTIONS, store.transactions().count()?);
    counts.insert(collections::CENTRAL_BANK, store.central_bank().count()?);
    counts.insert(collections::PERSONALITIES, store.personalities().count()?);
    counts.insert(collections::RELATIONSHIPS, store.relationships().count()?);
    counts.insert(collections::CONVERSATIONS, store.conversations().count()?);
    counts.insert(
        collections::CONVERSATION_MESSAGES,
        store.conversation_messages().count()?,
    );
    counts.insert(collections::WRITING_ENTRIES, store.writing_entries().count()?);
    Ok(counts)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsync_core::Part;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_collection_counts() {
        let store = Store::in_memory();
        store
            .parts()
            .add(&Part::with_id("p1", "Anxious", 100, 650))
            .unwrap();

        let counts = collection_counts(&store).unwrap();
        assert_eq!(counts["parts"], 1);
        assert_eq!(counts["transactions"], 0);
        assert_eq!(counts.len(), collections::ALL.len());
    }
}
