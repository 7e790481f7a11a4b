//! Export, import and reset handlers

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

use partsync_core::{ExportDocument, Store};

use crate::output::{Output, OutputFormat};

/// Write every collection to a JSON export file
pub fn export(store: &Store, path: &Path, output: &Output) -> Result<()> {
    let doc = store
        .export(BTreeMap::new())
        .context("Failed to export store")?;
    doc.write_to(path)?;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "status": "success",
            "file": path,
            "entities": doc.entity_count(),
        }))?,
        _ => output.success(&format!(
            "Exported {} entities to {}",
            doc.entity_count(),
            path.display()
        )),
    }

    Ok(())
}

/// Replace the store contents with an export file
pub fn import(store: &Store, path: &Path, output: &Output) -> Result<()> {
    let doc = ExportDocument::read_from(path)?;
    let summary = store
        .import(&doc)
        .with_context(|| format!("Failed to import {}", path.display()))?;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({
            "status": "success",
            "imported": summary.counts,
            "total": summary.total(),
        }))?,
        OutputFormat::Quiet => {}
        OutputFormat::Human => {
            output.success(&format!("Imported {} entities", summary.total()));
            for (collection, count) in &summary.counts {
                println!("  {:<22} {}", collection, count);
            }
        }
    }

    Ok(())
}

/// Delete every entity
pub fn reset(store: &Store, confirmed: bool, output: &Output) -> Result<()> {
    if !confirmed {
        bail!("Reset deletes every entity. Re-run with --yes to confirm.");
    }

    store.clear_all().context("Failed to reset store")?;
    output.success("Store reset");

    Ok(())
}
