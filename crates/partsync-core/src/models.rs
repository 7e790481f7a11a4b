//! Data models for partsync
//!
//! Every entity lives in its own collection of the replicated document and
//! is addressed by a string id. New entities get a v4 UUID; ids supplied by
//! an import are kept as they are.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest allowed part credit score
pub const MIN_CREDIT_SCORE: i64 = 300;
/// Highest allowed part credit score
pub const MAX_CREDIT_SCORE: i64 = 850;
/// Most traits a personality may carry
pub const MAX_TRAITS: usize = 6;
/// Most hero commentaries kept on a writing entry
pub const MAX_HERO_COMMENTARIES: usize = 5;

/// Collection names in the replicated document
pub mod collections {
    pub const PARTS: &str = "parts";
    pub const COMMITMENTS: &str = "commitments";
    pub const TRANSACTIONS: &str = "transactions";
    pub const CENTRAL_BANK: &str = "centralBank";
    pub const PERSONALITIES: &str = "personalities";
    pub const RELATIONSHIPS: &str = "relationships";
    pub const CONVERSATIONS: &str = "conversations";
    pub const CONVERSATION_MESSAGES: &str = "conversationMessages";
    pub const WRITING_ENTRIES: &str = "writingEntries";

    pub const ALL: &[&str] = &[
        PARTS,
        COMMITMENTS,
        TRANSACTIONS,
        CENTRAL_BANK,
        PERSONALITIES,
        RELATIONSHIPS,
        CONVERSATIONS,
        CONVERSATION_MESSAGES,
        WRITING_ENTRIES,
    ];
}

/// A record type stored in one collection
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Collection holding this entity
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Check access-layer invariants before a write
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ==================== Part ====================

/// An inner part with its own balance and credit score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub credit_score: i64,
    /// Avatar reference (asset key or URL)
    #[serde(default)]
    pub avatar: String,
    /// Prompt used to generate the avatar, if any
    #[serde(default)]
    pub avatar_prompt: Option<String>,
}

impl Part {
    pub fn new(name: impl Into<String>, balance: i64, credit_score: i64) -> Self {
        Self::with_id(new_id(), name, balance, credit_score)
    }

    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        balance: i64,
        credit_score: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            balance,
            credit_score,
            avatar: String::new(),
            avatar_prompt: None,
        }
    }
}

impl Entity for Part {
    const COLLECTION: &'static str = collections::PARTS;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&self.credit_score) {
            return Err(format!(
                "credit score {} outside {}..={}",
                self.credit_score, MIN_CREDIT_SCORE, MAX_CREDIT_SCORE
            ));
        }
        Ok(())
    }
}

// ==================== Commitment ====================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

/// A sub-task of a commitment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CommitmentTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            completed: false,
            completed_at: None,
        }
    }
}

/// A promise a part made, broken into tasks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Commitment {
    pub id: String,
    pub part_id: String,
    #[serde(default)]
    pub title: String,
    pub status: CommitmentStatus,
    #[serde(default)]
    pub tasks: Vec<CommitmentTask>,
}

impl Commitment {
    pub fn new(part_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            part_id: part_id.into(),
            title: title.into(),
            status: CommitmentStatus::Active,
            tasks: Vec::new(),
        }
    }

    /// Mark a task done; returns false if no task has that id
    pub fn complete_task(&mut self, task_id: &str, at: DateTime<Utc>) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.completed = true;
                task.completed_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn all_tasks_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.completed)
    }
}

impl Entity for Commitment {
    const COLLECTION: &'static str = collections::COMMITMENTS;

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Transaction ====================

/// Movement of currency between parts and/or the central bank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        from_id: impl Into<String>,
        to_id: impl Into<String>,
        amount: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            from_id: from_id.into(),
            to_id: to_id.into(),
            amount,
            description: description.into(),
            created_at: Utc::now(),
        }
    }
}

impl Entity for Transaction {
    const COLLECTION: &'static str = collections::TRANSACTIONS;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.amount < 0 {
            return Err(format!("negative transaction amount {}", self.amount));
        }
        Ok(())
    }
}

// ==================== Central bank ====================

/// The singleton bank record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CentralBank {
    pub id: String,
    pub balance: i64,
    /// Balance granted to newly created parts
    pub starting_balance: i64,
    /// Credit score assigned to newly created parts
    pub starting_credit_score: i64,
    /// Amount charged when a commitment fails
    pub failure_penalty: i64,
}

impl CentralBank {
    /// Fixed id of the singleton record
    pub const ID: &'static str = "central";
}

impl Default for CentralBank {
    fn default() -> Self {
        Self {
            id: Self::ID.to_string(),
            balance: 10_000,
            starting_balance: 100,
            starting_credit_score: 650,
            failure_penalty: 10,
        }
    }
}

impl Entity for CentralBank {
    const COLLECTION: &'static str = collections::CENTRAL_BANK;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.id != Self::ID {
            return Err(format!("central bank id must be {:?}", Self::ID));
        }
        Ok(())
    }
}

// ==================== Personality ====================

/// Voice and character of a part, keyed by the part id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartPersonality {
    pub part_id: String,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub speech_style: String,
    #[serde(default)]
    pub core_need: String,
    #[serde(default)]
    pub custom_notes: String,
    #[serde(default = "default_voice_pitch")]
    pub voice_pitch: f64,
}

fn default_voice_pitch() -> f64 {
    1.0
}

impl PartPersonality {
    pub fn new(part_id: impl Into<String>) -> Self {
        Self {
            part_id: part_id.into(),
            traits: Vec::new(),
            speech_style: String::new(),
            core_need: String::new(),
            custom_notes: String::new(),
            voice_pitch: default_voice_pitch(),
        }
    }

    /// Add a trait; returns false if present or the set is full
    pub fn add_trait(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.traits.len() >= MAX_TRAITS || self.traits.contains(&name) {
            return false;
        }
        self.traits.push(name);
        true
    }
}

impl Entity for PartPersonality {
    const COLLECTION: &'static str = collections::PERSONALITIES;

    fn id(&self) -> &str {
        &self.part_id
    }

    fn validate(&self) -> Result<(), String> {
        if self.traits.len() > MAX_TRAITS {
            return Err(format!(
                "{} traits given, at most {} allowed",
                self.traits.len(),
                MAX_TRAITS
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.traits.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(format!("duplicate trait {:?}", dup));
        }
        Ok(())
    }
}

// ==================== Relationship ====================

/// How two parts relate to each other
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub part_a_id: String,
    pub part_b_id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub notes: String,
}

impl Relationship {
    pub fn new(
        part_a_id: impl Into<String>,
        part_b_id: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            part_a_id: part_a_id.into(),
            part_b_id: part_b_id.into(),
            kind: kind.into(),
            notes: String::new(),
        }
    }
}

impl Entity for Relationship {
    const COLLECTION: &'static str = collections::RELATIONSHIPS;

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Conversations ====================

/// A dialogue session with one or more parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub part_ids: Vec<String>,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(part_ids: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            part_ids,
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

impl Entity for Conversation {
    const COLLECTION: &'static str = collections::CONVERSATIONS;

    fn id(&self) -> &str {
        &self.id
    }
}

/// One line of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    /// Part id, or "user" for the person writing
    pub speaker_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(
        conversation_id: impl Into<String>,
        speaker_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            conversation_id: conversation_id.into(),
            speaker_id: speaker_id.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

impl Entity for ConversationMessage {
    const COLLECTION: &'static str = collections::CONVERSATION_MESSAGES;

    fn id(&self) -> &str {
        &self.id
    }
}

// ==================== Journal ====================

/// A part's reaction to a journal entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeroCommentary {
    pub id: String,
    pub part_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl HeroCommentary {
    pub fn new(part_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            part_id: part_id.into(),
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// A journal entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WritingEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub commentaries: Vec<HeroCommentary>,
    pub created_at: DateTime<Utc>,
}

impl WritingEntry {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            body: body.into(),
            commentaries: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Append a commentary, dropping the oldest beyond the cap
    pub fn push_commentary(&mut self, commentary: HeroCommentary) {
        self.commentaries.push(commentary);
        if self.commentaries.len() > MAX_HERO_COMMENTARIES {
            let excess = self.commentaries.len() - MAX_HERO_COMMENTARIES;
            self.commentaries.drain(..excess);
        }
    }
}

impl Entity for WritingEntry {
    const COLLECTION: &'static str = collections::WRITING_ENTRIES;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.commentaries.len() > MAX_HERO_COMMENTARIES {
            return Err(format!(
                "{} commentaries given, at most {} allowed",
                self.commentaries.len(),
                MAX_HERO_COMMENTARIES
            ));
        }
        Ok(())
    }
}
