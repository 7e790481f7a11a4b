//! Entity access layer
//!
//! The `Store` is the only way application code touches the replica. Each
//! collection is exposed as a typed [`Collection`] that translates entities
//! to records and back, validates them, and turns every logical change into
//! exactly one replica mutation.
//!
//! ## Usage
//!
//! ```ignore
//! let store = Store::open()?;  // Loads the local snapshot, if any
//!
//! store.parts().add(&Part::new("Anxious", 100, 650))?;
//! store.parts().update(&id, |part| part.balance += 10)?;
//!
//! let parts = store.parts().get_all()?;
//! ```

use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::document::{DocumentError, Mutation, MutationOutcome, Record};
use crate::export::{ExportDocument, ImportSummary, EXPORT_VERSION};
use crate::models::{
    CentralBank, Commitment, Conversation, ConversationMessage, Entity, Part, PartPersonality,
    Relationship, Transaction, WritingEntry,
};
use crate::observers::Subscription;
use crate::replica::Replica;
use crate::storage::{SnapshotPersistence, StorageResult};

/// Errors reported by the access layer
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("{collection} already contains an entity with id {id:?}")]
    Duplicate {
        collection: &'static str,
        id: String,
    },

    #[error("Invalid entity: {0}")]
    Validation(String),

    #[error("Unsupported export version {found} (this build reads up to {supported})")]
    UnsupportedExportVersion { found: u32, supported: u32 },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Typed access to the replicated collections
pub struct Store {
    replica: Replica,
    persistence: Option<SnapshotPersistence>,
    _autosave: Option<Subscription>,
}

impl Store {
    /// A store over a fresh, unpersisted replica
    pub fn in_memory() -> Self {
        Self::from_replica(Replica::new())
    }

    /// A store over an existing replica handle, without persistence
    pub fn from_replica(replica: Replica) -> Self {
        Self {
            replica,
            persistence: None,
            _autosave: None,
        }
    }

    /// Open the store using the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(&config)
    }

    /// Open the store with a specific configuration
    ///
    /// Loads the local snapshot (or starts empty) and saves it again after
    /// every change. Autosave failures are logged, never returned from the
    /// mutation that triggered them.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let persistence = SnapshotPersistence::for_config(config);
        let replica = persistence
            .load_or_empty()
            .context("Failed to load local snapshot")?;

        let autosave = {
            let persistence = persistence.clone();
            let target = replica.clone();
            replica.on_update(move |_| {
                if let Err(e) = persistence.save(&target) {
                    warn!(error = %e, hint = e.recovery_suggestion(), "Autosave failed");
                }
            })
        };

        info!(path = ?persistence.path(), "Opened store");
        Ok(Self {
            replica,
            persistence: Some(persistence),
            _autosave: Some(autosave),
        })
    }

    /// The underlying replica, for the sync bridge
    pub fn replica(&self) -> &Replica {
        &self.replica
    }

    /// Write the snapshot now (no-op for in-memory stores)
    pub fn save(&self) -> StorageResult<()> {
        match &self.persistence {
            Some(persistence) => persistence.save(&self.replica),
            None => Ok(()),
        }
    }

    // ==================== Collections ====================

    /// Typed access to any entity collection
    pub fn collection<T: Entity>(&self) -> Collection<T> {
        Collection {
            replica: self.replica.clone(),
            _entity: PhantomData,
        }
    }

    pub fn parts(&self) -> Collection<Part> {
        self.collection()
    }

    pub fn commitments(&self) -> Collection<Commitment> {
        self.collection()
    }

    pub fn transactions(&self) -> Collection<Transaction> {
        self.collection()
    }

    pub fn central_bank(&self) -> Collection<CentralBank> {
        self.collection()
    }

    pub fn personalities(&self) -> Collection<PartPersonality> {
        self.collection()
    }

    pub fn relationships(&self) -> Collection<Relationship> {
        self.collection()
    }

    pub fn conversations(&self) -> Collection<Conversation> {
        self.collection()
    }

    pub fn conversation_messages(&self) -> Collection<ConversationMessage> {
        self.collection()
    }

    pub fn writing_entries(&self) -> Collection<WritingEntry> {
        self.collection()
    }

    /// The stored central bank, or defaults if none was written yet
    pub fn central_bank_or_default(&self) -> Result<CentralBank, EntityError> {
        Ok(self
            .central_bank()
            .get(CentralBank::ID)?
            .unwrap_or_default())
    }

    /// Empty every collection as one change
    pub fn clear_all(&self) -> Result<(), EntityError> {
        self.replica.clear_all()?;
        Ok(())
    }

    // ==================== Export / import ====================

    /// Snapshot every collection into an export document
    pub fn export(&self, settings: BTreeMap<String, String>) -> Result<ExportDocument, EntityError> {
        Ok(ExportDocument {
            version: EXPORT_VERSION,
            exported_at: Utc::now(),
            parts: self.parts().get_all()?,
            commitments: self.commitments().get_all()?,
            transactions: self.transactions().get_all()?,
            central_bank: self.central_bank().get(CentralBank::ID)?,
            personalities: self.personalities().get_all()?,
            relationships: self.relationships().get_all()?,
            conversations: self.conversations().get_all()?,
            conversation_messages: self.conversation_messages().get_all()?,
            writing_entries: self.writing_entries().get_all()?,
            settings,
        })
    }

    /// Replace all data with the contents of an export
    ///
    /// The whole document is checked before anything is cleared, so a
    /// rejected import leaves the store as it was. Supplied ids are kept.
    pub fn import(&self, doc: &ExportDocument) -> Result<ImportSummary, EntityError> {
        if doc.version > EXPORT_VERSION {
            return Err(EntityError::UnsupportedExportVersion {
                found: doc.version,
                supported: EXPORT_VERSION,
            });
        }

        let bank: Vec<CentralBank> = doc.central_bank.iter().cloned().collect();

        check_batch(&doc.parts)?;
        check_batch(&doc.commitments)?;
        check_batch(&doc.transactions)?;
        check_batch(&bank)?;
        check_batch(&doc.personalities)?;
        check_batch(&doc.relationships)?;
        check_batch(&doc.conversations)?;
        check_batch(&doc.conversation_messages)?;
        check_batch(&doc.writing_entries)?;

        self.clear_all()?;

        let mut summary = ImportSummary::default();
        summary.record(Part::COLLECTION, self.parts().add_all(&doc.parts)?);
        summary.record(
            Commitment::COLLECTION,
            self.commitments().add_all(&doc.commitments)?,
        );
        summary.record(
            Transaction::COLLECTION,
            self.transactions().add_all(&doc.transactions)?,
        );
        summary.record(CentralBank::COLLECTION, self.central_bank().add_all(&bank)?);
        summary.record(
            PartPersonality::COLLECTION,
            self.personalities().add_all(&doc.personalities)?,
        );
        summary.record(
            Relationship::COLLECTION,
            self.relationships().add_all(&doc.relationships)?,
        );
        summary.record(
            Conversation::COLLECTION,
            self.conversations().add_all(&doc.conversations)?,
        );
        summary.record(
            ConversationMessage::COLLECTION,
            self.conversation_messages()
                .add_all(&doc.conversation_messages)?,
        );
        summary.record(
            WritingEntry::COLLECTION,
            self.writing_entries().add_all(&doc.writing_entries)?,
        );

        info!(entities = summary.total(), "Imported export document");
        Ok(summary)
    }
}

/// Typed CRUD over one collection
pub struct Collection<T> {
    replica: Replica,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Collection<T> {
    /// Every entity in the collection
    ///
    /// Records that no longer deserialize (e.g. written by a newer app
    /// version) are skipped with a warning.
    pub fn get_all(&self) -> Result<Vec<T>, EntityError> {
        let records = self.replica.read_all(T::COLLECTION)?;
        Ok(decode_all(&records))
    }

    pub fn get(&self, id: &str) -> Result<Option<T>, EntityError> {
        match self.replica.read_one(T::COLLECTION, id)? {
            Some(record) => Ok(Some(from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize, EntityError> {
        Ok(self.replica.read_all(T::COLLECTION)?.len())
    }

    /// Create an entity under its own id
    pub fn add(&self, entity: &T) -> Result<(), EntityError> {
        entity.validate().map_err(EntityError::Validation)?;
        let record = to_record(entity)?;

        match self
            .replica
            .mutate(T::COLLECTION, entity.id(), Mutation::Insert(record))?
        {
            MutationOutcome::AlreadyExists => Err(EntityError::Duplicate {
                collection: T::COLLECTION,
                id: entity.id().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Edit an entity in place
    ///
    /// `edit` works on a copy; only the fields it changed are written.
    /// Returns the updated entity, or `None` if no entity has this id.
    pub fn update<F>(&self, id: &str, edit: F) -> Result<Option<T>, EntityError>
    where
        F: FnOnce(&mut T),
    {
        let Some(current) = self.replica.read_one(T::COLLECTION, id)? else {
            return Ok(None);
        };

        let mut entity: T = from_record(&current)?;
        edit(&mut entity);

        if entity.id() != id {
            return Err(EntityError::Validation(format!(
                "cannot change id {:?} to {:?}",
                id,
                entity.id()
            )));
        }
        entity.validate().map_err(EntityError::Validation)?;

        let patch: Record = to_record(&entity)?
            .into_iter()
            .filter(|(key, value)| current.get(key) != Some(value))
            .collect();
        if patch.is_empty() {
            return Ok(Some(entity));
        }

        match self
            .replica
            .mutate(T::COLLECTION, id, Mutation::Patch(patch))?
        {
            MutationOutcome::NotFound => Ok(None),
            _ => Ok(Some(entity)),
        }
    }

    /// Remove an entity; returns false if it did not exist
    pub fn delete(&self, id: &str) -> Result<bool, EntityError> {
        let outcome = self.replica.mutate(T::COLLECTION, id, Mutation::Delete)?;
        Ok(outcome == MutationOutcome::Applied)
    }

    /// Observe the collection
    ///
    /// The callback receives every entity whenever any of them changes. It
    /// must not write to the store.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[T]) + Send + Sync + 'static,
    {
        self.replica.subscribe(T::COLLECTION, move |records| {
            callback(&decode_all::<T>(records));
        })
    }

    fn add_all(&self, entities: &[T]) -> Result<usize, EntityError> {
        for entity in entities {
            self.add(entity)?;
        }
        Ok(entities.len())
    }
}

/// Validate a batch and reject repeated ids
fn check_batch<T: Entity>(entities: &[T]) -> Result<(), EntityError> {
    let mut seen = HashSet::new();
    for entity in entities {
        entity.validate().map_err(EntityError::Validation)?;
        if !seen.insert(entity.id()) {
            return Err(EntityError::Duplicate {
                collection: T::COLLECTION,
                id: entity.id().to_string(),
            });
        }
    }
    Ok(())
}

fn to_record<T: Entity>(entity: &T) -> Result<Record, EntityError> {
    match serde_json::to_value(entity)? {
        Value::Object(record) => Ok(record),
        other => Err(EntityError::Validation(format!(
            "{} entity serialized to {} instead of an object",
            T::COLLECTION,
            other
        ))),
    }
}

fn from_record<T: Entity>(record: &Record) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(record.clone()))
}

fn decode_all<T: Entity>(records: &[Record]) -> Vec<T> {
    records
        .iter()
        .filter_map(|record| match from_record(record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(
                    collection = T::COLLECTION,
                    id = ?record.get("id"),
                    error = %e,
                    "Skipping undecodable record"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentStatus, CommitmentTask, HeroCommentary};
    use crate::replica::Origin;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_part() -> Part {
        Part::with_id("p1", "Anxious", 100, 650)
    }

    fn sample_commitment() -> Commitment {
        Commitment {
            id: "c1".to_string(),
            part_id: "p1".to_string(),
            title: String::new(),
            status: CommitmentStatus::Active,
            tasks: Vec::new(),
        }
    }

    fn sorted<T: Entity>(mut items: Vec<T>) -> Vec<T> {
        items.sort_by(|a, b| a.id().cmp(b.id()));
        items
    }

    #[test]
    fn test_add_and_get() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        assert_eq!(store.parts().get("p1").unwrap(), Some(sample_part()));
        assert_eq!(store.parts().get_all().unwrap(), vec![sample_part()]);
        assert_eq!(store.parts().count().unwrap(), 1);
        assert!(store.parts().get("missing").unwrap().is_none());
    }

    #[test]
    fn test_add_duplicate_id_fails() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        let mut other = sample_part();
        other.name = "Other".to_string();
        let err = store.parts().add(&other).unwrap_err();

        assert!(matches!(err, EntityError::Duplicate { collection: "parts", .. }));
        assert_eq!(store.parts().get("p1").unwrap().unwrap().name, "Anxious");
    }

    #[test]
    fn test_validation_rejected_on_add_and_update() {
        let store = Store::in_memory();
        let err = store
            .parts()
            .add(&Part::with_id("p2", "Bold", 0, 900))
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation(_)));
        assert_eq!(store.parts().count().unwrap(), 0);

        store.parts().add(&sample_part()).unwrap();
        let err = store
            .parts()
            .update("p1", |p| p.credit_score = 100)
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation(_)));
        assert_eq!(store.parts().get("p1").unwrap(), Some(sample_part()));
    }

    #[test]
    fn test_update_changes_fields() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        let updated = store
            .parts()
            .update("p1", |p| p.balance = 150)
            .unwrap()
            .unwrap();
        assert_eq!(updated.balance, 150);
        assert_eq!(store.parts().get("p1").unwrap().unwrap().balance, 150);
    }

    #[test]
    fn test_update_missing_is_none() {
        let store = Store::in_memory();
        let result = store.parts().update("ghost", |p| p.balance = 1).unwrap();
        assert!(result.is_none());
        assert_eq!(store.parts().count().unwrap(), 0);
    }

    #[test]
    fn test_update_cannot_change_id() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        let err = store
            .parts()
            .update("p1", |p| p.id = "p9".to_string())
            .unwrap_err();
        assert!(matches!(err, EntityError::Validation(_)));
        assert!(store.parts().get("p9").unwrap().is_none());
    }

    #[test]
    fn test_noop_update_emits_nothing() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        let events = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&events);
        let _sub = store.replica().on_update(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        store.parts().update("p1", |p| p.balance = 100).unwrap();
        assert_eq!(events.load(Ordering::SeqCst), 0);

        store.parts().update("p1", |p| p.balance = 101).unwrap();
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delete() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        assert!(store.parts().delete("p1").unwrap());
        assert!(!store.parts().delete("p1").unwrap());
        assert!(store.parts().get("p1").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_updates_to_different_fields_survive() {
        let a = Store::in_memory();
        a.parts().add(&sample_part()).unwrap();
        let b = Store::from_replica(
            Replica::from_full_state(&a.replica().encode_full_state()).unwrap(),
        );

        a.parts().update("p1", |p| p.balance = 200).unwrap();
        b.parts().update("p1", |p| p.name = "Calm".to_string()).unwrap();

        let from_a = a.replica().encode_update();
        let from_b = b.replica().encode_update();
        a.replica().apply_update(&from_b, Origin::RemoteApply).unwrap();
        b.replica().apply_update(&from_a, Origin::RemoteApply).unwrap();

        for store in [&a, &b] {
            let part = store.parts().get("p1").unwrap().unwrap();
            assert_eq!(part.balance, 200);
            assert_eq!(part.name, "Calm");
        }
    }

    #[test]
    fn test_nested_list_update() {
        let store = Store::in_memory();
        let mut commitment = sample_commitment();
        commitment.tasks.push(CommitmentTask::new("Breathe"));
        store.commitments().add(&commitment).unwrap();

        let task_id = commitment.tasks[0].id.clone();
        let updated = store
            .commitments()
            .update("c1", |c| {
                c.complete_task(&task_id, Utc::now());
                c.status = CommitmentStatus::Completed;
            })
            .unwrap()
            .unwrap();

        assert_eq!(store.commitments().get("c1").unwrap(), Some(updated));
    }

    #[test]
    fn test_on_change_receives_typed_list() {
        let store = Store::in_memory();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = store.parts().on_change(move |parts| {
            sink.lock().push(parts.iter().map(|p| p.name.clone()).collect::<Vec<_>>());
        });

        store.parts().add(&sample_part()).unwrap();
        store.parts().update("p1", |p| p.name = "Calm".to_string()).unwrap();
        store.commitments().add(&sample_commitment()).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![vec!["Anxious".to_string()], vec!["Calm".to_string()]]
        );
    }

    #[test]
    fn test_writes_from_observer_are_rejected() {
        let store = Store::in_memory();
        let parts = store.parts();
        let rejected = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&rejected);
        let _sub = store.parts().on_change(move |_| {
            if let Err(EntityError::Document(DocumentError::ReentrantMutation)) =
                parts.add(&Part::with_id("echo", "Echo", 0, 650))
            {
                r.fetch_add(1, Ordering::SeqCst);
            }
        });

        store.parts().add(&sample_part()).unwrap();
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert_eq!(store.parts().count().unwrap(), 1);
    }

    #[test]
    fn test_central_bank_or_default() {
        let store = Store::in_memory();
        assert_eq!(store.central_bank_or_default().unwrap(), CentralBank::default());

        let mut bank = CentralBank::default();
        bank.balance = 42;
        store.central_bank().add(&bank).unwrap();
        assert_eq!(store.central_bank_or_default().unwrap().balance, 42);
    }

    #[test]
    fn test_clear_all_single_event() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();
        store.commitments().add(&sample_commitment()).unwrap();

        let events = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&events);
        let _sub = store.replica().on_update(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        store.clear_all().unwrap();
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert_eq!(store.parts().count().unwrap(), 0);
        assert_eq!(store.commitments().count().unwrap(), 0);
    }

    #[test]
    fn test_update_reaches_empty_replica() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();
        store.commitments().add(&sample_commitment()).unwrap();
        let u1 = store.replica().encode_update();

        let other = Store::in_memory();
        other.replica().apply_update(&u1, Origin::RemoteApply).unwrap();

        assert_eq!(other.parts().get_all().unwrap(), vec![sample_part()]);
        assert_eq!(other.commitments().get_all().unwrap(), vec![sample_commitment()]);
    }

    fn populate(store: &Store) {
        store.parts().add(&sample_part()).unwrap();
        store.parts().add(&Part::with_id("p2", "Critic", 40, 420)).unwrap();
        store.parts().add(&Part::with_id("p3", "Gone", 0, 500)).unwrap();

        let mut commitment = sample_commitment();
        commitment.tasks.push(CommitmentTask::new("Rest"));
        store.commitments().add(&commitment).unwrap();
        store
            .transactions()
            .add(&Transaction::new("central", "p1", 25, "Allowance"))
            .unwrap();
        store.central_bank().add(&CentralBank::default()).unwrap();

        let mut personality = PartPersonality::new("p1");
        personality.add_trait("cautious");
        personality.voice_pitch = 0.8;
        store.personalities().add(&personality).unwrap();

        store
            .relationships()
            .add(&Relationship::new("p1", "p2", "protector"))
            .unwrap();

        let conversation = Conversation::new(vec!["p1".into(), "p2".into()], "Check-in");
        store
            .conversation_messages()
            .add(&ConversationMessage::new(&conversation.id, "p1", "Hello"))
            .unwrap();
        store.conversations().add(&conversation).unwrap();

        let mut entry = WritingEntry::new("Monday", "Long day");
        entry.push_commentary(HeroCommentary::new("p2", "Could be worse"));
        store.writing_entries().add(&entry).unwrap();

        assert!(store.parts().delete("p3").unwrap());
    }

    #[test]
    fn test_export_clear_import_round_trip() {
        let store = Store::in_memory();
        populate(&store);

        let settings = BTreeMap::from([("theme".to_string(), "dark".to_string())]);
        let before = store.export(settings.clone()).unwrap();
        assert_eq!(before.parts.len(), 2);

        let json = before.to_json().unwrap();
        store.clear_all().unwrap();
        let summary = store.import(&ExportDocument::from_json(&json).unwrap()).unwrap();
        assert_eq!(summary.total(), before.entity_count());

        let after = store.export(settings).unwrap();
        assert_eq!(sorted(after.parts), sorted(before.parts));
        assert_eq!(sorted(after.commitments), sorted(before.commitments));
        assert_eq!(sorted(after.transactions), sorted(before.transactions));
        assert_eq!(after.central_bank, before.central_bank);
        assert_eq!(sorted(after.personalities), sorted(before.personalities));
        assert_eq!(sorted(after.relationships), sorted(before.relationships));
        assert_eq!(sorted(after.conversations), sorted(before.conversations));
        assert_eq!(
            sorted(after.conversation_messages),
            sorted(before.conversation_messages)
        );
        assert_eq!(sorted(after.writing_entries), sorted(before.writing_entries));
        assert_eq!(after.settings, before.settings);
    }

    #[test]
    fn test_import_replaces_existing_data() {
        let source = Store::in_memory();
        source.parts().add(&sample_part()).unwrap();
        let export = source.export(BTreeMap::new()).unwrap();

        let target = Store::in_memory();
        target.parts().add(&Part::with_id("old", "Old", 0, 500)).unwrap();
        target.import(&export).unwrap();

        assert_eq!(target.parts().get_all().unwrap(), vec![sample_part()]);
    }

    #[test]
    fn test_rejected_import_leaves_store_intact() {
        let store = Store::in_memory();
        store.parts().add(&sample_part()).unwrap();

        let mut newer = store.export(BTreeMap::new()).unwrap();
        newer.version = EXPORT_VERSION + 1;
        assert!(matches!(
            store.import(&newer).unwrap_err(),
            EntityError::UnsupportedExportVersion { .. }
        ));

        let mut duplicated = store.export(BTreeMap::new()).unwrap();
        duplicated.parts.push(sample_part());
        assert!(matches!(
            store.import(&duplicated).unwrap_err(),
            EntityError::Duplicate { .. }
        ));

        let mut invalid = store.export(BTreeMap::new()).unwrap();
        invalid.parts[0].credit_score = 10;
        assert!(matches!(
            store.import(&invalid).unwrap_err(),
            EntityError::Validation(_)
        ));

        assert_eq!(store.parts().get_all().unwrap(), vec![sample_part()]);
    }

    #[test]
    fn test_open_with_config_autosaves() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        {
            let store = Store::open_with_config(&config).unwrap();
            store.parts().add(&sample_part()).unwrap();
            assert!(config.snapshot_path().exists());
        }

        let reopened = Store::open_with_config(&config).unwrap();
        assert_eq!(reopened.parts().get_all().unwrap(), vec![sample_part()]);
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let store = Store::in_memory();
        store.save().unwrap();
    }
}
