//! Config command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use partsync_core::Config;

use crate::output::{Output, OutputFormat};

fn or_unset(value: Option<String>) -> String {
    value.unwrap_or_else(|| "(not set)".to_string())
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.json(&config)?,
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:         {}", config.data_dir.display());
            println!(
                "  remote_dir:       {}",
                or_unset(config.remote_dir.as_ref().map(|p| p.display().to_string()))
            );
            println!("  sync_enabled:     {}", config.sync_enabled);
            println!("  user_id:          {}", or_unset(config.user_id.clone()));
            println!("  debounce_ms:      {}", config.debounce_ms);
            println!("  poll_interval_ms: {}", config.poll_interval_ms);
            println!("  document:         {}", config.document);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    config.set(key, value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_writes_to_override_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set("user_id", "u1", Some(&path), &output).unwrap();
        set("debounce_ms", "250", Some(&path), &output).unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("u1"));
        assert_eq!(config.debounce_ms, 250);
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        assert!(set("favorite_color", "blue", Some(&path), &output).is_err());
        assert!(!path.exists());
    }
}
