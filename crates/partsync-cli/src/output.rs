//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use anyhow::{Context, Result};
use serde::Serialize;

use partsync_core::Part;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print any serializable value as pretty JSON
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("Failed to format JSON output")?;
        println!("{}", text);
        Ok(())
    }

    /// Print a single part
    pub fn print_part(&self, part: &Part) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                println!("ID:           {}", part.id);
                println!("Name:         {}", part.name);
                println!("Balance:      {}", part.balance);
                println!("Credit score: {}", part.credit_score);
                if !part.avatar.is_empty() {
                    println!("Avatar:       {}", part.avatar);
                }
                if let Some(ref prompt) = part.avatar_prompt {
                    println!("Avatar prompt: {}", truncate(prompt, 60));
                }
            }
            OutputFormat::Json => self.json(part)?,
            OutputFormat::Quiet => println!("{}", part.id),
        }
        Ok(())
    }

    /// Print a list of parts
    pub fn print_parts(&self, parts: &[Part]) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if parts.is_empty() {
                    println!("No parts found.");
                    return Ok(());
                }
                for part in parts {
                    println!(
                        "{} | {:<30} | {:>7} | {}",
                        short_id(&part.id),
                        truncate(&part.name, 30),
                        part.balance,
                        part.credit_score
                    );
                }
                println!("\n{} part(s)", parts.len());
            }
            OutputFormat::Json => self.json(parts)?,
            OutputFormat::Quiet => {
                for part in parts {
                    println!("{}", part.id);
                }
            }
        }
        Ok(())
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// First eight characters of an id
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
