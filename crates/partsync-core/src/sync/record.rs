//! Remote record shape
//!
//! One record per user per document holds the latest delta and a full
//! snapshot. Binary fields travel as standard base64 text; this module is
//! the only place that encoding is applied or removed.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Invalid record key component {0:?}")]
    InvalidKey(String),

    #[error("Field {field} is not valid base64: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

/// Address of a remote record: `users/{user}/documents/{document}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    user_id: String,
    document: String,
}

impl RecordKey {
    pub fn new(user_id: &str, document: &str) -> Result<Self, RecordError> {
        for part in [user_id, document] {
            if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
                return Err(RecordError::InvalidKey(part.to_string()));
            }
        }
        Ok(Self {
            user_id: user_id.to_string(),
            document: document.to_string(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn document(&self) -> &str {
        &self.document
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/documents/{}", self.user_id, self.document)
    }
}

/// A remote record, or a partial record used as a merge write
///
/// Fields left `None` are not touched by a merge. Fields this build does
/// not know about are kept in `extra` and survive merges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_synced: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteRecord {
    /// A regular push: latest delta plus full snapshot
    pub fn push(update: &[u8], full_state: &[u8], at: DateTime<Utc>) -> Self {
        Self {
            update: Some(STANDARD.encode(update)),
            full_state: Some(STANDARD.encode(full_state)),
            updated_at: Some(at),
            ..Self::default()
        }
    }

    /// A recovery push: the snapshot in both binary fields
    pub fn forced(full_state: &[u8], at: DateTime<Utc>) -> Self {
        let encoded = STANDARD.encode(full_state);
        Self {
            update: Some(encoded.clone()),
            full_state: Some(encoded),
            updated_at: Some(at),
            force_synced: Some(true),
            ..Self::default()
        }
    }

    pub fn decode_update(&self) -> Result<Option<Vec<u8>>, RecordError> {
        decode_field("update", self.update.as_deref())
    }

    pub fn decode_full_state(&self) -> Result<Option<Vec<u8>>, RecordError> {
        decode_field("fullState", self.full_state.as_deref())
    }

    /// Apply a merge write: present fields overwrite, the rest stay
    pub fn merge(&mut self, patch: RemoteRecord) {
        if patch.update.is_some() {
            self.update = patch.update;
        }
        if patch.full_state.is_some() {
            self.full_state = patch.full_state;
        }
        if patch.updated_at.is_some() {
            self.updated_at = patch.updated_at;
        }
        if patch.force_synced.is_some() {
            self.force_synced = patch.force_synced;
        }
        self.extra.extend(patch.extra);
    }
}

fn decode_field(field: &'static str, value: Option<&str>) -> Result<Option<Vec<u8>>, RecordError> {
    value
        .map(|text| {
            STANDARD
                .decode(text)
                .map_err(|source| RecordError::Base64 { field, source })
        })
        .transpose()
}
