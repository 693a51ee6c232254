//! Replica kept in a single JSON document on disk
//!
//! Tombstones stay in the document for good, so it grows with every deletion.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{RecordMap, Store, StoreError, TombstoneMap};
use crate::error::Result;
use crate::models::{Record, RecordId, Tombstone};

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    tombstones: Vec<Tombstone>,
}

const fn default_version() -> u32 {
    DOCUMENT_VERSION
}

/// JSON file replica.
///
/// Every write rewrites the document through a temp file and a rename, so a
/// reader never observes a half-written file.
pub struct JsonFileStore {
    name: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the document at `path`
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self {
            name: name.into(),
            path,
            lock: Mutex::new(()),
        };
        // Fail early on an unreadable document rather than on the first pass
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, document: &mut Document) -> Result<()> {
        document.version = DOCUMENT_VERSION;
        document.records.sort_by(|a, b| a.id.cmp(&b.id));
        document.tombstones.sort_by(|a, b| a.id.cmp(&b.id));

        let serialized = serde_json::to_string_pretty(document)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn modify(&self, id: &RecordId, apply: impl FnOnce(&mut Document)) -> std::result::Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut document = self.load().map_err(|error| StoreError::write(id, error))?;
        apply(&mut document);
        self.save(&mut document)
            .map_err(|error| StoreError::write(id, error))
    }
}

impl Store for JsonFileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_all(&self) -> std::result::Result<RecordMap, StoreError> {
        let _guard = self.lock.lock();
        let document = self.load().map_err(StoreError::query)?;
        Ok(document
            .records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect())
    }

    fn upsert(&self, record: &Record) -> std::result::Result<(), StoreError> {
        self.modify(&record.id, |document| {
            document.tombstones.retain(|tombstone| tombstone.id != record.id);
            match document.records.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => document.records.push(record.clone()),
            }
        })
    }

    fn delete(&self, id: &RecordId) -> std::result::Result<(), StoreError> {
        self.modify(id, |document| {
            document.records.retain(|record| &record.id != id);
        })
    }

    fn supports_tombstones(&self) -> bool {
        true
    }

    fn tombstones(&self) -> std::result::Result<TombstoneMap, StoreError> {
        let _guard = self.lock.lock();
        let document = self.load().map_err(StoreError::query)?;
        Ok(document
            .tombstones
            .into_iter()
            .map(|tombstone| (tombstone.id.clone(), tombstone))
            .collect())
    }

    fn bury(&self, tombstone: &Tombstone) -> std::result::Result<(), StoreError> {
        self.modify(&tombstone.id, |document| {
            document.records.retain(|record| record.id != tombstone.id);
            document.tombstones.retain(|existing| existing.id != tombstone.id);
            document.tombstones.push(tombstone.clone());
        })
    }
}
