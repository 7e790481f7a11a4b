//! Part command handlers

use anyhow::{bail, Context, Result};

use partsync_core::{Part, Store};

use crate::output::Output;

/// Create a new part, defaulting its numbers from the central bank
pub fn add(
    store: &Store,
    name: String,
    balance: Option<i64>,
    credit_score: Option<i64>,
    output: &Output,
) -> Result<()> {
    let bank = store.central_bank_or_default()?;
    let part = Part::new(
        name,
        balance.unwrap_or(bank.starting_balance),
        credit_score.unwrap_or(bank.starting_credit_score),
    );

    store.parts().add(&part).context("Failed to create part")?;

    if output.is_quiet() {
        println!("{}", part.id);
    } else {
        output.success(&format!("Created part {}", part.id));
        output.print_part(&part)?;
    }

    Ok(())
}

/// List all parts, sorted by name
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let mut parts = store.parts().get_all()?;
    parts.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    output.print_parts(&parts)
}

/// Show one part
pub fn show(store: &Store, id: &str, output: &Output) -> Result<()> {
    let part = resolve_part(store, id)?;
    output.print_part(&part)
}

/// Delete a part
pub fn delete(store: &Store, id: &str, output: &Output) -> Result<()> {
    let part = resolve_part(store, id)?;
    store.parts().delete(&part.id)?;

    if output.is_quiet() {
        println!("{}", part.id);
    } else {
        output.success(&format!("Deleted part: {}", part.name));
    }

    Ok(())
}

/// Resolve a full id or unique prefix to a part
fn resolve_part(store: &Store, id: &str) -> Result<Part> {
    if let Some(part) = store.parts().get(id)? {
        return Ok(part);
    }

    let matches: Vec<Part> = store
        .parts()
        .get_all()?
        .into_iter()
        .filter(|p| p.id.starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("Part not found: {}", id),
        1 => Ok(matches.into_iter().next().context("Part not found")?),
        n => bail!("Ambiguous part ID '{}' matches {} parts", id, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_by_prefix() {
        let store = Store::in_memory();
        store
            .parts()
            .add(&Part::with_id("abc123", "Anxious", 100, 650))
            .unwrap();
        store
            .parts()
            .add(&Part::with_id("abd456", "Critic", 100, 650))
            .unwrap();

        assert_eq!(resolve_part(&store, "abc123").unwrap().name, "Anxious");
        assert_eq!(resolve_part(&store, "abd").unwrap().name, "Critic");
        assert!(resolve_part(&store, "ab").is_err());
        assert!(resolve_part(&store, "zzz").is_err());
    }

    #[test]
    fn test_add_uses_bank_defaults() {
        let store = Store::in_memory();
        let output = Output::new(crate::output::OutputFormat::Quiet);

        add(&store, "Anxious".to_string(), None, Some(700), &output).unwrap();

        let parts = store.parts().get_all().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].balance, 100);
        assert_eq!(parts[0].credit_score, 700);
    }

    #[test]
    fn test_add_rejects_invalid_credit_score() {
        let store = Store::in_memory();
        let output = Output::new(crate::output::OutputFormat::Quiet);

        assert!(add(&store, "Anxious".to_string(), None, Some(9000), &output).is_err());
        assert_eq!(store.parts().count().unwrap(), 0);
    }
}
