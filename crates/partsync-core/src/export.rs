//! Whole-store export documents
//!
//! An export holds every collection plus a caller-chosen subset of app
//! settings. It is plain JSON so users can keep backups outside the app.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    CentralBank, Commitment, Conversation, ConversationMessage, Part, PartPersonality,
    Relationship, Transaction, WritingEntry,
};

/// Export format version written by this build
pub const EXPORT_VERSION: u32 = 1;

/// A complete snapshot of the entity collections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub commitments: Vec<Commitment>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub central_bank: Option<CentralBank>,
    #[serde(default)]
    pub personalities: Vec<PartPersonality>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub conversation_messages: Vec<ConversationMessage>,
    #[serde(default)]
    pub writing_entries: Vec<WritingEntry>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl ExportDocument {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize export")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse export document")
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write export to {:?}", path))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export from {:?}", path))?;
        Self::from_json(&json)
    }

    /// Number of entities in the document
    pub fn entity_count(&self) -> usize {
        self.parts.len()
            + self.commitments.len()
            + self.transactions.len()
            + usize::from(self.central_bank.is_some())
            + self.personalities.len()
            + self.relationships.len()
            + self.conversations.len()
            + self.conversation_messages.len()
            + self.writing_entries.len()
    }
}

/// Entities written per collection by an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub counts: BTreeMap<String, usize>,
}

impl ImportSummary {
    pub(crate) fn record(&mut self, collection: &str, count: usize) {
        if count > 0 {
            self.counts.insert(collection.to_string(), count);
        }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}
