//! partsync CLI
//!
//! Command-line interface for inspecting and syncing a partsync store.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use partsync_core::{Config, StorageError, Store};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "partsync")]
#[command(about = "partsync - replicated entity store with remote sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a specific config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store and sync status
    Status,
    /// Manage parts
    Part {
        #[command(subcommand)]
        command: PartCommands,
    },
    /// Export every collection to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },
    /// Replace the store contents with an export file
    Import {
        /// Export file to read
        file: PathBuf,
    },
    /// Delete every entity in the store
    Reset {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
    /// Sync once with the configured remote
    Sync {
        /// Overwrite the remote record with the full local state
        #[arg(long)]
        force: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum PartCommands {
    /// Create a new part
    #[command(alias = "create")]
    Add {
        /// Display name
        name: String,
        /// Starting balance (defaults to the central bank's)
        #[arg(long)]
        balance: Option<i64>,
        /// Starting credit score (defaults to the central bank's)
        #[arg(long)]
        credit_score: Option<i64>,
    },
    /// List all parts
    #[command(alias = "ls")]
    List,
    /// Show part details
    Show {
        /// Part ID (full or prefix)
        id: String,
    },
    /// Delete a part
    #[command(alias = "rm")]
    Delete {
        /// Part ID (full or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value ("none" clears optional keys)
        value: String,
    },
}

/// Log to stderr, filtered by RUST_LOG
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("partsync_core=warn,partsync_cli=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Recovery hint for the first storage error in the chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = recovery_hint(&e) {
            eprintln!("Hint: {}", hint);
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands don't need the store
    if let Commands::Config { command } = cli.command {
        return match command {
            None | Some(ConfigCommands::Show) => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(&key, &value, config_path, &output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let store = Store::open_with_config(&config).context("Failed to open store")?;

    match cli.command {
        Commands::Status => commands::status::show(&store, &config, &output)?,
        Commands::Part { command } => match command {
            PartCommands::Add {
                name,
                balance,
                credit_score,
            } => commands::part::add(&store, name, balance, credit_score, &output)?,
            PartCommands::List => commands::part::list(&store, &output)?,
            PartCommands::Show { id } => commands::part::show(&store, &id, &output)?,
            PartCommands::Delete { id } => commands::part::delete(&store, &id, &output)?,
        },
        Commands::Export { file } => commands::data::export(&store, &file, &output)?,
        Commands::Import { file } => commands::data::import(&store, &file, &output)?,
        Commands::Reset { yes } => commands::data::reset(&store, yes, &output)?,
        Commands::Sync { force } => commands::sync::sync(&store, &config, force, &output).await?,
        Commands::Config { .. } => unreachable!(), // Handled above
    }

    // Autosave covers every mutation; this flushes anything merged by sync
    store.save().context("Failed to save store")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_recovery_hint_found_through_context() {
        let storage = StorageError::write(
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            PathBuf::from("/data/document.partsync"),
        );
        let err = anyhow::Error::new(storage).context("Failed to save store");
        assert_eq!(
            recovery_hint(&err),
            Some("Check file and directory permissions for the data directory.")
        );

        let plain = anyhow::anyhow!("Part not found: p1");
        assert_eq!(recovery_hint(&plain), None);
    }
}
