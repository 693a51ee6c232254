//! In-process replica

use parking_lot::RwLock;

use super::{RecordMap, Store, StoreError, TombstoneMap};
use crate::models::{Record, RecordId, Tombstone};

#[derive(Default)]
struct Inner {
    records: RecordMap,
    tombstones: TombstoneMap,
}

/// Replica held in memory; nothing survives the process.
pub struct MemoryStore {
    name: String,
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Seed a store with existing records
    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new(name);
        {
            let mut inner = store.inner.write();
            for record in records {
                inner.records.insert(record.id.clone(), record);
            }
        }
        store
    }

    /// Single record lookup
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.inner.read().records.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_all(&self) -> Result<RecordMap, StoreError> {
        Ok(self.inner.read().records.clone())
    }

    fn upsert(&self, record: &Record) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.tombstones.remove(&record.id);
        inner.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &RecordId) -> Result<(), StoreError> {
        self.inner.write().records.remove(id);
        Ok(())
    }

    fn supports_tombstones(&self) -> bool {
        true
    }

    fn tombstones(&self) -> Result<TombstoneMap, StoreError> {
        Ok(self.inner.read().tombstones.clone())
    }

    fn bury(&self, tombstone: &Tombstone) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.records.remove(&tombstone.id);
        inner
            .tombstones
            .insert(tombstone.id.clone(), tombstone.clone());
        Ok(())
    }
}
