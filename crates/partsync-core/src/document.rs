//! Automerge document handling
//!
//! This module maps collections of JSON-shaped records onto a single
//! Automerge document and produces/consumes the binary deltas exchanged
//! between replicas. It has no knowledge of the entities stored in it.
//!
//! ## Layout
//!
//! Every record is a map at the document root under `"{collection}/{id}"`.
//! Keeping the root flat means two replicas never race to create competing
//! per-collection containers.
//!
//! ## Merging
//!
//! Concurrent writes to different fields of a record both survive. For
//! concurrent writes to the same field Automerge keeps one value
//! deterministically (last writer by operation id, ties broken by actor).

use std::collections::BTreeSet;
use std::fmt;

use automerge::{
    transaction::Transactable, AutoCommit, Change, ChangeHash, ObjId, ObjType, Prop, ReadDoc,
    ScalarValue, ROOT,
};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::wire::{self, Payload, WireError};

/// A record as seen by callers: a JSON object
pub type Record = Map<String, Value>;

/// A delta or snapshot decoded and ready to merge
///
/// Parsing is separate from applying so that callers holding several
/// payloads can reject the batch before any of it lands.
pub struct ParsedUpdate(Parsed);

enum Parsed {
    Delta(Vec<Change>),
    Snapshot(AutoCommit),
}

impl fmt::Debug for ParsedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Parsed::Delta(changes) => f.debug_tuple("Delta").field(&changes.len()).finish(),
            Parsed::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

/// Separator between collection name and record id in root keys
const KEY_SEPARATOR: char = '/';

/// Errors that can occur during document operations
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    #[error("Failed to decode update: {0}")]
    Decode(String),

    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("Record {0} is not a map")]
    InvalidRecord(String),

    #[error("Store mutated from inside its own change notification")]
    ReentrantMutation,
}

impl From<WireError> for DocumentError {
    fn from(err: WireError) -> Self {
        DocumentError::Decode(err.to_string())
    }
}

/// A change to a single record
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create the record; fails if it already exists
    Insert(Record),
    /// Overwrite the given fields of an existing record
    Patch(Record),
    /// Remove the record
    Delete,
}

/// What a mutation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The document changed
    Applied,
    /// The record exists but every field already held the requested value
    Unchanged,
    /// Patch or delete on a record that does not exist
    NotFound,
    /// Insert on a record that already exists
    AlreadyExists,
}

/// The replicated document
pub struct PartsDocument {
    doc: AutoCommit,
    /// Heads at the last `encode_update` call
    update_cursor: Vec<ChangeHash>,
}

impl PartsDocument {
    /// Create a new empty document
    pub fn new() -> Self {
        Self {
            doc: AutoCommit::new(),
            update_cursor: Vec::new(),
        }
    }

    /// Load a document from a snapshot envelope
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut doc = Self::new();
        doc.apply_encoded(bytes)?;
        Ok(doc)
    }

    /// Fork the document (new actor, same history)
    pub fn fork(&mut self) -> Self {
        let mut doc = self.doc.fork();
        let update_cursor = doc.get_heads();
        Self { doc, update_cursor }
    }

    // ==================== Records ====================

    /// Apply a mutation to `collection/id` as one commit
    pub fn mutate(
        &mut self,
        collection: &str,
        id: &str,
        mutation: &Mutation,
    ) -> Result<MutationOutcome, DocumentError> {
        let key = record_key(collection, id)?;
        let existing = self.record_obj(&key)?;

        let outcome = match (mutation, existing) {
            (Mutation::Insert(_), Some(_)) => MutationOutcome::AlreadyExists,
            (Mutation::Insert(fields), None) => {
                let obj = self.doc.put_object(ROOT, key.as_str(), ObjType::Map)?;
                self.write_map(&obj, fields)?;
                MutationOutcome::Applied
            }
            (Mutation::Patch(_), None) | (Mutation::Delete, None) => MutationOutcome::NotFound,
            (Mutation::Patch(fields), Some(obj)) => {
                if self.patch_map(&obj, fields)? {
                    MutationOutcome::Applied
                } else {
                    MutationOutcome::Unchanged
                }
            }
            (Mutation::Delete, Some(_)) => {
                self.doc.delete(ROOT, key.as_str())?;
                MutationOutcome::Applied
            }
        };

        self.doc.commit();
        Ok(outcome)
    }

    /// Delete every record in one commit
    ///
    /// Returns the collections that lost at least one record.
    pub fn clear_all(&mut self) -> Result<BTreeSet<String>, DocumentError> {
        let keys: Vec<String> = self
            .doc
            .keys(ROOT)
            .filter(|k| k.contains(KEY_SEPARATOR))
            .collect();

        let mut cleared = BTreeSet::new();
        for key in keys {
            if let Some((collection, _)) = key.split_once(KEY_SEPARATOR) {
                cleared.insert(collection.to_string());
            }
            self.doc.delete(ROOT, key.as_str())?;
        }

        self.doc.commit();
        Ok(cleared)
    }

    /// Read one record
    pub fn read_one(&self, collection: &str, id: &str) -> Result<Option<Record>, DocumentError> {
        let key = record_key(collection, id)?;
        match self.record_obj(&key)? {
            Some(obj) => Ok(Some(self.read_map(&obj)?)),
            None => Ok(None),
        }
    }

    /// Read every record of a collection, ordered by id
    pub fn read_all(&self, collection: &str) -> Result<Vec<Record>, DocumentError> {
        validate_collection(collection)?;
        let prefix = format!("{}{}", collection, KEY_SEPARATOR);

        let keys: Vec<String> = self
            .doc
            .keys(ROOT)
            .filter(|k| k.starts_with(&prefix))
            .collect();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(obj) = self.record_obj(&key)? {
                records.push(self.read_map(&obj)?);
            }
        }
        Ok(records)
    }

    /// Names of every collection holding at least one record
    pub fn collections(&self) -> BTreeSet<String> {
        self.doc
            .keys(ROOT)
            .filter_map(|k| k.split_once(KEY_SEPARATOR).map(|(c, _)| c.to_string()))
            .collect()
    }

    // ==================== Encoding ====================

    /// Encode every change made since the previous call
    pub fn encode_update(&mut self) -> Vec<u8> {
        let changes: Vec<Vec<u8>> = self
            .doc
            .get_changes(&self.update_cursor)
            .iter()
            .map(|change| change.raw_bytes().to_vec())
            .collect();
        self.update_cursor = self.doc.get_heads();
        wire::encode_delta(changes)
    }

    /// Encode the whole document
    pub fn encode_full_state(&mut self) -> Vec<u8> {
        wire::encode_snapshot(self.doc.save())
    }

    /// Merge an encoded delta or snapshot
    ///
    /// The payload is fully parsed before the document is touched, so a
    /// decode failure leaves the document unchanged. Returns whether the
    /// document heads moved.
    pub fn apply_encoded(&mut self, bytes: &[u8]) -> Result<bool, DocumentError> {
        let update = Self::parse_encoded(bytes)?;
        self.apply_parsed(update)
    }

    /// Decode a delta or snapshot without applying it
    pub fn parse_encoded(bytes: &[u8]) -> Result<ParsedUpdate, DocumentError> {
        let parsed = match wire::decode(bytes)? {
            Payload::Delta(chunks) => Parsed::Delta(
                chunks
                    .into_iter()
                    .map(|chunk| {
                        Change::from_bytes(chunk).map_err(|e| DocumentError::Decode(e.to_string()))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Payload::Snapshot(saved) => Parsed::Snapshot(
                AutoCommit::load(&saved).map_err(|e| DocumentError::Decode(e.to_string()))?,
            ),
        };
        Ok(ParsedUpdate(parsed))
    }

    /// Merge a parsed update; returns whether the document heads moved
    pub fn apply_parsed(&mut self, update: ParsedUpdate) -> Result<bool, DocumentError> {
        let before = self.doc.get_heads();

        match update.0 {
            Parsed::Delta(changes) => self.doc.apply_changes(changes)?,
            Parsed::Snapshot(mut other) => {
                self.doc.merge(&mut other)?;
            }
        }

        Ok(self.doc.get_heads() != before)
    }

    /// Whether applied changes are waiting on changes this replica lacks
    pub fn has_missing_dependencies(&mut self) -> bool {
        !self.doc.get_missing_deps(&[]).is_empty()
    }

    // ==================== Private helpers ====================

    fn record_obj(&self, key: &str) -> Result<Option<ObjId>, DocumentError> {
        match self.doc.get(ROOT, key)? {
            Some((automerge::Value::Object(ObjType::Map), obj)) => Ok(Some(obj)),
            Some(_) => Err(DocumentError::InvalidRecord(key.to_string())),
            None => Ok(None),
        }
    }

    fn write_map(&mut self, obj: &ObjId, fields: &Record) -> Result<(), DocumentError> {
        for (key, value) in fields {
            self.write_field(obj, key, value)?;
        }
        Ok(())
    }

    /// Write only the fields that differ; returns whether anything was written
    fn patch_map(&mut self, obj: &ObjId, fields: &Record) -> Result<bool, DocumentError> {
        let mut changed = false;
        for (key, value) in fields {
            let current = match self.doc.get(obj, key.as_str())? {
                Some((automerge::Value::Object(ObjType::Map), child)) => Current::Map(child),
                Some((stored, child)) => Current::Value(self.to_json(stored, &child)?),
                None => Current::Missing,
            };

            match (current, value) {
                (Current::Map(child), Value::Object(nested)) => {
                    changed |= self.patch_map(&child, nested)?;
                }
                (Current::Value(stored), _) if &stored == value => {}
                _ => {
                    self.write_field(obj, key, value)?;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }

    fn write_field(&mut self, obj: &ObjId, key: &str, value: &Value) -> Result<(), DocumentError> {
        match value {
            Value::Object(fields) => {
                let child = self.doc.put_object(obj, key, ObjType::Map)?;
                self.write_map(&child, fields)?;
            }
            Value::Array(items) => {
                let child = self.doc.put_object(obj, key, ObjType::List)?;
                self.write_list(&child, items)?;
            }
            scalar => {
                self.doc.put(obj, key, to_scalar(scalar))?;
            }
        }
        Ok(())
    }

    fn write_list(&mut self, list: &ObjId, items: &[Value]) -> Result<(), DocumentError> {
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::Object(fields) => {
                    let child = self.doc.insert_object(list, index, ObjType::Map)?;
                    self.write_map(&child, fields)?;
                }
                Value::Array(nested) => {
                    let child = self.doc.insert_object(list, index, ObjType::List)?;
                    self.write_list(&child, nested)?;
                }
                scalar => {
                    self.doc.insert(list, index, to_scalar(scalar))?;
                }
            }
        }
        Ok(())
    }

    fn read_map(&self, obj: &ObjId) -> Result<Record, DocumentError> {
        let mut record = Map::new();
        for key in self.doc.keys(obj) {
            if let Some(value) = self.read_prop(obj, key.as_str())? {
                record.insert(key, value);
            }
        }
        Ok(record)
    }

    fn read_list(&self, list: &ObjId) -> Result<Vec<Value>, DocumentError> {
        let len = self.doc.length(list);
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            if let Some(value) = self.read_prop(list, index)? {
                items.push(value);
            }
        }
        Ok(items)
    }

    fn read_prop<P: Into<Prop>>(&self, obj: &ObjId, prop: P) -> Result<Option<Value>, DocumentError> {
        match self.doc.get(obj, prop)? {
            Some((value, child)) => Ok(Some(self.to_json(value, &child)?)),
            None => Ok(None),
        }
    }

    fn to_json(&self, value: automerge::Value<'_>, obj: &ObjId) -> Result<Value, DocumentError> {
        match value {
            automerge::Value::Object(ObjType::Map) | automerge::Value::Object(ObjType::Table) => {
                Ok(Value::Object(self.read_map(obj)?))
            }
            automerge::Value::Object(ObjType::List) => Ok(Value::Array(self.read_list(obj)?)),
            automerge::Value::Object(ObjType::Text) => Ok(Value::String(self.doc.text(obj)?)),
            automerge::Value::Scalar(scalar) => Ok(from_scalar(scalar.as_ref())),
        }
    }
}

impl Default for PartsDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// A field's stored state, detached from the document borrow
enum Current {
    Map(ObjId),
    Value(Value),
    Missing,
}

fn validate_collection(collection: &str) -> Result<(), DocumentError> {
    if collection.is_empty() || collection.contains(KEY_SEPARATOR) {
        return Err(DocumentError::InvalidCollection(collection.to_string()));
    }
    Ok(())
}

fn record_key(collection: &str, id: &str) -> Result<String, DocumentError> {
    validate_collection(collection)?;
    Ok(format!("{}{}{}", collection, KEY_SEPARATOR, id))
}

fn to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Bool(b) => ScalarValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::Uint(u)
            } else {
                ScalarValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => ScalarValue::from(s.as_str()),
        _ => ScalarValue::Null,
    }
}

fn from_scalar(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Str(s) => Value::String(s.to_string()),
        ScalarValue::Int(i) => Value::from(*i),
        ScalarValue::Uint(u) => Value::from(*u),
        ScalarValue::F64(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        ScalarValue::Boolean(b) => Value::Bool(*b),
        other => other.to_i64().map(Value::from).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_new_document() {
        let doc = PartsDocument::new();
        assert!(doc.read_all("parts").unwrap().is_empty());
        assert!(doc.collections().is_empty());
    }

    #[test]
    fn test_insert_and_read() {
        let mut doc = PartsDocument::new();
        let fields = record(json!({
            "id": "p1",
            "name": "Anxious",
            "balance": 100,
            "ratio": 0.5,
            "active": true,
            "prompt": null,
            "traits": ["shy", "loyal"],
            "meta": { "color": "blue" }
        }));

        let outcome = doc.mutate("parts", "p1", &Mutation::Insert(fields.clone())).unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);

        let read = doc.read_one("parts", "p1").unwrap().unwrap();
        assert_eq!(read, fields);
    }

    #[test]
    fn test_insert_existing_is_rejected() {
        let mut doc = PartsDocument::new();
        let fields = record(json!({ "id": "p1" }));
        doc.mutate("parts", "p1", &Mutation::Insert(fields.clone())).unwrap();

        let outcome = doc.mutate("parts", "p1", &Mutation::Insert(fields)).unwrap();
        assert_eq!(outcome, MutationOutcome::AlreadyExists);
    }

    #[test]
    fn test_patch_and_delete_missing() {
        let mut doc = PartsDocument::new();
        let patch = Mutation::Patch(record(json!({ "name": "x" })));

        assert_eq!(doc.mutate("parts", "nope", &patch).unwrap(), MutationOutcome::NotFound);
        assert_eq!(
            doc.mutate("parts", "nope", &Mutation::Delete).unwrap(),
            MutationOutcome::NotFound
        );
    }

    #[test]
    fn test_patch_writes_only_changed_fields() {
        let mut doc = PartsDocument::new();
        doc.mutate(
            "parts",
            "p1",
            &Mutation::Insert(record(json!({ "id": "p1", "name": "a", "balance": 1 }))),
        )
        .unwrap();

        let same = Mutation::Patch(record(json!({ "name": "a", "balance": 1 })));
        assert_eq!(doc.mutate("parts", "p1", &same).unwrap(), MutationOutcome::Unchanged);

        let changed = Mutation::Patch(record(json!({ "balance": 2 })));
        assert_eq!(doc.mutate("parts", "p1", &changed).unwrap(), MutationOutcome::Applied);

        let read = doc.read_one("parts", "p1").unwrap().unwrap();
        assert_eq!(read["name"], json!("a"));
        assert_eq!(read["balance"], json!(2));
    }

    #[test]
    fn test_collections_are_isolated() {
        let mut doc = PartsDocument::new();
        doc.mutate("parts", "x", &Mutation::Insert(record(json!({ "id": "x" }))))
            .unwrap();
        doc.mutate("commitments", "x", &Mutation::Insert(record(json!({ "id": "x" }))))
            .unwrap();

        assert_eq!(doc.read_all("parts").unwrap().len(), 1);
        assert_eq!(doc.read_all("commitments").unwrap().len(), 1);
        assert!(doc.read_all("part").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_collection_name() {
        let mut doc = PartsDocument::new();
        let err = doc
            .mutate("a/b", "1", &Mutation::Insert(Record::new()))
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidCollection(_)));
        assert!(doc.read_all("").is_err());
    }

    #[test]
    fn test_clear_all_reports_collections() {
        let mut doc = PartsDocument::new();
        doc.mutate("parts", "1", &Mutation::Insert(record(json!({ "id": "1" }))))
            .unwrap();
        doc.mutate("journal", "2", &Mutation::Insert(record(json!({ "id": "2" }))))
            .unwrap();

        let cleared = doc.clear_all().unwrap();
        assert_eq!(
            cleared.into_iter().collect::<Vec<_>>(),
            vec!["journal".to_string(), "parts".to_string()]
        );
        assert!(doc.collections().is_empty());
    }

    #[test]
    fn test_update_round_trip() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1", "n": 1 }))))
            .unwrap();

        let update = a.encode_update();
        let mut b = PartsDocument::new();
        assert!(b.apply_encoded(&update).unwrap());
        assert_eq!(b.read_all("parts").unwrap(), a.read_all("parts").unwrap());
    }

    #[test]
    fn test_encode_update_is_incremental() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1" }))))
            .unwrap();
        let first = a.encode_update();

        // Nothing new since the first call
        let empty = a.encode_update();
        assert_eq!(wire::decode(&empty).unwrap(), Payload::Delta(Vec::new()));

        a.mutate("parts", "p2", &Mutation::Insert(record(json!({ "id": "p2" }))))
            .unwrap();
        let second = a.encode_update();

        let mut b = PartsDocument::new();
        b.apply_encoded(&first).unwrap();
        b.apply_encoded(&second).unwrap();
        assert_eq!(b.read_all("parts").unwrap().len(), 2);
    }

    #[test]
    fn test_full_state_is_independent_of_update_cursor() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1" }))))
            .unwrap();

        let _snapshot = a.encode_full_state();
        let update = a.encode_update();
        match wire::decode(&update).unwrap() {
            Payload::Delta(changes) => assert_eq!(changes.len(), 1),
            Payload::Snapshot(_) => panic!("expected delta"),
        }
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1" }))))
            .unwrap();
        let update = a.encode_update();

        let mut b = PartsDocument::new();
        assert!(b.apply_encoded(&update).unwrap());
        let once = b.read_all("parts").unwrap();
        assert!(!b.apply_encoded(&update).unwrap());
        assert_eq!(b.read_all("parts").unwrap(), once);
    }

    #[test]
    fn test_malformed_update_leaves_document_untouched() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1" }))))
            .unwrap();

        let before = a.read_all("parts").unwrap();
        let err = a.apply_encoded(b"garbage").unwrap_err();
        assert!(matches!(err, DocumentError::Decode(_)));

        let bad_change = wire::encode_delta(vec![vec![0x85, 0x6f, 0x4a, 0x83, 1, 2, 3]]);
        assert!(matches!(
            a.apply_encoded(&bad_change).unwrap_err(),
            DocumentError::Decode(_)
        ));

        let bad_snapshot = wire::encode_snapshot(vec![9, 9, 9]);
        assert!(matches!(
            a.apply_encoded(&bad_snapshot).unwrap_err(),
            DocumentError::Decode(_)
        ));

        assert_eq!(a.read_all("parts").unwrap(), before);
    }

    #[test]
    fn test_parse_then_apply() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1" }))))
            .unwrap();
        let delta = PartsDocument::parse_encoded(&a.encode_update()).unwrap();
        let snapshot = PartsDocument::parse_encoded(&a.encode_full_state()).unwrap();
        assert!(format!("{:?}", delta).starts_with("Delta("));
        assert_eq!(format!("{:?}", snapshot), "Snapshot");

        // Parsing alone changes nothing
        let mut b = PartsDocument::new();
        assert!(b.read_all("parts").unwrap().is_empty());

        assert!(b.apply_parsed(delta).unwrap());
        assert!(!b.apply_parsed(snapshot).unwrap());
        assert_eq!(b.read_all("parts").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_load() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "p1", &Mutation::Insert(record(json!({ "id": "p1", "n": 3 }))))
            .unwrap();

        let snapshot = a.encode_full_state();
        let b = PartsDocument::load(&snapshot).unwrap();
        assert_eq!(b.read_all("parts").unwrap(), a.read_all("parts").unwrap());
    }

    #[test]
    fn test_concurrent_field_edits_converge() {
        let mut a = PartsDocument::new();
        a.mutate(
            "parts",
            "e",
            &Mutation::Insert(record(json!({ "id": "e", "x": 0, "y": 0 }))),
        )
        .unwrap();
        let base = a.encode_update();

        let mut b = PartsDocument::new();
        b.apply_encoded(&base).unwrap();
        b.encode_update();

        a.mutate("parts", "e", &Mutation::Patch(record(json!({ "x": 1 }))))
            .unwrap();
        b.mutate("parts", "e", &Mutation::Patch(record(json!({ "y": 2 }))))
            .unwrap();

        let from_a = a.encode_update();
        let from_b = b.encode_update();
        a.apply_encoded(&from_b).unwrap();
        b.apply_encoded(&from_a).unwrap();

        let ra = a.read_one("parts", "e").unwrap().unwrap();
        let rb = b.read_one("parts", "e").unwrap().unwrap();
        assert_eq!(ra, rb);
        assert_eq!(ra["x"], json!(1));
        assert_eq!(ra["y"], json!(2));
    }

    #[test]
    fn test_concurrent_same_field_picks_one_winner() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "e", &Mutation::Insert(record(json!({ "id": "e", "x": 0 }))))
            .unwrap();
        let mut b = a.fork();

        a.mutate("parts", "e", &Mutation::Patch(record(json!({ "x": 1 }))))
            .unwrap();
        b.mutate("parts", "e", &Mutation::Patch(record(json!({ "x": 2 }))))
            .unwrap();

        let from_a = a.encode_update();
        let from_b = b.encode_update();
        a.apply_encoded(&from_b).unwrap();
        b.apply_encoded(&from_a).unwrap();

        let xa = a.read_one("parts", "e").unwrap().unwrap()["x"].clone();
        let xb = b.read_one("parts", "e").unwrap().unwrap()["x"].clone();
        assert_eq!(xa, xb);
        assert!(xa == json!(1) || xa == json!(2));
    }

    #[test]
    fn test_missing_dependencies_detected() {
        let mut a = PartsDocument::new();
        a.mutate("parts", "1", &Mutation::Insert(record(json!({ "id": "1" }))))
            .unwrap();
        let _skipped = a.encode_update();
        a.mutate("parts", "1", &Mutation::Patch(record(json!({ "n": 2 }))))
            .unwrap();
        let later = a.encode_update();

        let mut b = PartsDocument::new();
        b.apply_encoded(&later).unwrap();
        assert!(b.has_missing_dependencies());

        b.apply_encoded(&a.encode_full_state()).unwrap();
        assert!(!b.has_missing_dependencies());
        assert_eq!(b.read_all("parts").unwrap(), a.read_all("parts").unwrap());
    }
}
