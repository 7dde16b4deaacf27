//! Document and allocation stores backed by a tolerant persistence adapter.
//!
//! The in-memory maps are the source of truth; every mutation is snapshotted
//! through [`Persistence`]. The adapter never surfaces storage failures:
//! `load` falls back to an empty collection and `save` logs and swallows
//! errors, mirroring a best-effort local key-value store. Two processes (or
//! two instances) writing the same snapshot race last-write-wins; that is an
//! accepted limitation, not a guarantee.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::errors::{Result, WorkflowError};
use crate::types::{AllocationRecord, Document};

// ─────────────────────────────────────────────────────────
// Persistence adapter
// ─────────────────────────────────────────────────────────

/// Load/save of a keyed record collection to durable local storage.
pub trait Persistence<T>: Send + Sync {
    /// Returns the stored collection, or an empty one when nothing is stored
    /// or the storage is unreadable. Never fails.
    fn load(&self) -> HashMap<String, T>;

    /// Persists the collection. Serialization or storage failures are logged
    /// and swallowed. Never fails.
    fn save(&self, records: &HashMap<String, T>);
}

/// JSON snapshot persisted at a fixed path.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFilePersistence { path: path.into() }
    }
}

impl<T> Persistence<T> for JsonFilePersistence
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn load(&self) -> HashMap<String, T> {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        "store snapshot at {} is unreadable, starting empty: {e}",
                        self.path.display()
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(
                    "cannot read store snapshot at {}, starting empty: {e}",
                    self.path.display()
                );
                HashMap::new()
            }
        }
    }

    fn save(&self, records: &HashMap<String, T>) {
        match serde_json::to_vec_pretty(records) {
            Ok(bytes) => {
                if let Err(e) = fs::write(&self.path, bytes) {
                    warn!(
                        "failed to write store snapshot at {}: {e}",
                        self.path.display()
                    );
                }
            }
            Err(e) => warn!("failed to serialize store snapshot: {e}"),
        }
    }
}

/// No-op persistence. Loads empty, saves nothing. Used when durable storage
/// is unavailable and in tests.
pub struct NullPersistence;

impl<T: Send + Sync> Persistence<T> for NullPersistence {
    fn load(&self) -> HashMap<String, T> {
        HashMap::new()
    }

    fn save(&self, _records: &HashMap<String, T>) {}
}

// ─────────────────────────────────────────────────────────
// Document store
// ─────────────────────────────────────────────────────────

/// In-memory map of document id to document record, source of truth for the
/// exposed surface.
pub struct DocumentStore {
    documents: HashMap<String, Document>,
    persistence: Box<dyn Persistence<Document>>,
}

impl DocumentStore {
    /// Open the store, loading whatever the adapter has.
    pub fn open(persistence: Box<dyn Persistence<Document>>) -> Self {
        let documents = persistence.load();
        DocumentStore {
            documents,
            persistence,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.id.clone(), document);
        self.persistence.save(&self.documents);
    }

    /// Apply `mutate` to the document, bump `updated_at`, persist, and return
    /// the updated record.
    pub fn update<F>(&mut self, id: &str, mutate: F) -> Result<Document>
    where
        F: FnOnce(&mut Document),
    {
        let document = self
            .documents
            .get_mut(id)
            .ok_or_else(|| WorkflowError::NotFound { id: id.to_string() })?;
        mutate(document);
        document.updated_at = chrono::Utc::now();
        let updated = document.clone();
        self.persistence.save(&self.documents);
        Ok(updated)
    }

    /// All documents, most recently created first.
    pub fn all(&self) -> Vec<Document> {
        let mut documents: Vec<Document> = self.documents.values().cloned().collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

// ─────────────────────────────────────────────────────────
// Allocation store
// ─────────────────────────────────────────────────────────

/// Keyed store of allocation records, snapshotted separately from documents.
pub struct AllocationStore {
    records: HashMap<String, AllocationRecord>,
    persistence: Box<dyn Persistence<AllocationRecord>>,
}

impl AllocationStore {
    pub fn open(persistence: Box<dyn Persistence<AllocationRecord>>) -> Self {
        let records = persistence.load();
        AllocationStore {
            records,
            persistence,
        }
    }

    pub fn get(&self, id: &str) -> Option<&AllocationRecord> {
        self.records.get(id)
    }

    pub fn insert(&mut self, record: AllocationRecord) {
        self.records.insert(record.id.clone(), record);
        self.persistence.save(&self.records);
    }

    pub fn update<F>(&mut self, id: &str, mutate: F) -> Result<AllocationRecord>
    where
        F: FnOnce(&mut AllocationRecord),
    {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| WorkflowError::AllocationNotFound { id: id.to_string() })?;
        mutate(record);
        let updated = record.clone();
        self.persistence.save(&self.records);
        Ok(updated)
    }

    /// Records for a recipient, most recent first.
    pub fn for_recipient(&self, recipient: &str) -> Vec<AllocationRecord> {
        let mut records: Vec<AllocationRecord> = self
            .records
            .values()
            .filter(|r| r.recipient == recipient)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    pub fn for_document(&self, document_id: &str) -> Vec<AllocationRecord> {
        self.records
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect()
    }

    /// All records stuck in `Failed`, the set the retry affordance surfaces.
    pub fn failed(&self) -> Vec<AllocationRecord> {
        self.records
            .values()
            .filter(|r| r.status == crate::types::AllocationStatus::Failed)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
