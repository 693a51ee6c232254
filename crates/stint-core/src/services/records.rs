//! Record service: the editing surface's only way into a replica.

use std::sync::Arc;

use tracing::Span;

use crate::error::{Error, Result};
use crate::models::{Record, RecordDraft, RecordId, Tombstone};
use crate::store::Store;
use crate::util::unix_millis_now;

/// Source of "now" for modification stamps.
pub trait Clock: Send + Sync {
    /// Current instant as Unix milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        unix_millis_now()
    }
}

/// Display ordering for the working set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently modified first
    #[default]
    LastModified,
    /// Most recently started first; unstarted records last
    Started,
    /// Case-insensitive title
    Title,
}

/// Working copy of one replica plus the stamping rule for user writes.
///
/// This is the only component that assigns `last_modified` (and tombstone
/// `deleted_at`). Everything it persists goes through the store it was built
/// with.
pub struct RecordService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    records: Vec<Record>,
    span: Span,
}

impl RecordService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            records: Vec::new(),
            span: tracing::info_span!("records"),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Scope this service's log events under `span`
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the working copy with a fresh snapshot from the store.
    pub fn load_all(&mut self) -> Result<usize> {
        let _entered = self.span.enter();
        let snapshot = self
            .store
            .get_all()
            .map_err(|source| Error::StoreUnavailable {
                store: self.store.name().to_string(),
                source,
            })?;

        self.records = snapshot.into_values().collect();
        tracing::debug!(count = self.records.len(), store = self.store.name(), "Loaded records");
        Ok(self.records.len())
    }

    /// Working copy in its current order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Re-sort the working copy and return it
    pub fn sorted(&mut self, order: SortOrder) -> &[Record] {
        match order {
            SortOrder::LastModified => self
                .records
                .sort_by(|a, b| b.last_modified.cmp(&a.last_modified).then_with(|| a.id.cmp(&b.id))),
            SortOrder::Started => self
                .records
                .sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id))),
            SortOrder::Title => self.records.sort_by(|a, b| {
                a.title
                    .to_lowercase()
                    .cmp(&b.title.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
        &self.records
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// Look a record up by exact id or unique id prefix.
    pub fn resolve(&self, query: &str) -> Result<&Record> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        if let Some(record) = self.records.iter().find(|record| record.id.as_str() == query) {
            return Ok(record);
        }

        let matches = self
            .records
            .iter()
            .filter(|record| record.id.as_str().starts_with(query))
            .collect::<Vec<_>>();

        match matches.as_slice() {
            [] => Err(Error::NotFound(query.to_string())),
            [record] => Ok(record),
            several => Err(Error::Ambiguous {
                prefix: query.to_string(),
                matches: several
                    .iter()
                    .take(3)
                    .map(|record| record.id.short(13))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Create and persist a new record started now.
    pub fn create(&mut self, draft: RecordDraft) -> Result<Record> {
        if draft.title.trim().is_empty() {
            return Err(Error::InvalidInput("record title cannot be empty".into()));
        }
        let now = self.clock.now_millis();
        let record = Record::from_draft(RecordId::generate(), draft, now);
        self.persist(record)
    }

    /// Stamp `last_modified` and persist a user edit.
    ///
    /// The stamp is the current instant, or one millisecond past the working
    /// copy's `last_modified` when that is not earlier than now, so the edit
    /// always wins against the version it replaced.
    ///
    /// The working copy is updated before the store is written, so it keeps
    /// the edit even when the store rejects it.
    pub fn save(&mut self, mut record: Record) -> Result<Record> {
        record.last_modified = self.next_stamp(&record.id);
        self.persist(record)
    }

    /// Drop a record from the working copy and from the store.
    ///
    /// Only ids in the working copy can be deleted; the tombstone left behind
    /// is stamped like an edit.
    pub fn delete(&mut self, id: &RecordId) -> Result<()> {
        let _entered = self.span.enter();
        if self.get(id).is_none() {
            return Err(Error::NotFound(id.to_string()));
        }
        let deleted_at = self.next_stamp(id);
        self.records.retain(|record| &record.id != id);

        self.store.bury(&Tombstone::new(id.clone(), deleted_at))?;
        tracing::info!(id = %id, "Deleted record");
        Ok(())
    }

    // A user edit has to beat the version it was made from, even when that
    // version came from a replica whose clock runs ahead of ours.
    fn next_stamp(&self, id: &RecordId) -> i64 {
        let now = self.clock.now_millis();
        self.get(id)
            .map_or(now, |existing| now.max(existing.last_modified.saturating_add(1)))
    }

    fn persist(&mut self, record: Record) -> Result<Record> {
        let _entered = self.span.enter();
        match self.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => self.records.push(record.clone()),
        }

        if let Err(error) = self.store.upsert(&record) {
            tracing::warn!(id = %record.id, error = %error, "Record kept in memory but not persisted");
            return Err(error.into());
        }
        tracing::debug!(id = %record.id, last_modified = record.last_modified, "Saved record");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RecordMap, StoreError};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedClock(AtomicI64);

    impl FixedClock {
        fn at(millis: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(millis)))
        }

        fn set(&self, millis: i64) {
            self.0.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for FixedClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct BrokenStore;

    impl Store for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        fn get_all(&self) -> std::result::Result<RecordMap, StoreError> {
            Err(StoreError::QueryFailed("connection refused".into()))
        }

        fn upsert(&self, record: &Record) -> std::result::Result<(), StoreError> {
            Err(StoreError::write(&record.id, "disk full"))
        }

        fn delete(&self, id: &RecordId) -> std::result::Result<(), StoreError> {
            Err(StoreError::write(id, "disk full"))
        }
    }

    fn record(id: &str, title: &str, last_modified: i64) -> Record {
        Record {
            id: id.into(),
            title: title.to_string(),
            tags: Vec::new(),
            started_at: Some(last_modified),
            ended_at: None,
            last_modified,
            estimated_duration: std::time::Duration::ZERO,
            body: String::new(),
        }
    }

    fn seeded() -> (Arc<MemoryStore>, RecordService, Arc<FixedClock>) {
        let store = Arc::new(MemoryStore::with_records(
            "local",
            [record("1", "K8s", 100), record("2", "System Design", 200)],
        ));
        let clock = FixedClock::at(1_000);
        let mut service = RecordService::new(store.clone()).with_clock(clock.clone());
        service.load_all().unwrap();
        (store, service, clock)
    }

    #[test]
    fn load_all_copies_snapshot() {
        let (_, service, _) = seeded();
        assert_eq!(service.records().len(), 2);
    }

    #[test]
    fn load_all_reports_store_unavailable() {
        let mut service = RecordService::new(Arc::new(BrokenStore));
        let error = service.load_all().unwrap_err();
        assert!(matches!(error, Error::StoreUnavailable { ref store, .. } if store == "broken"));
    }

    #[test]
    fn create_stamps_start_and_modified_with_same_instant() {
        let (store, mut service, _) = seeded();
        let created = service.create(RecordDraft::new("Rust")).unwrap();

        assert_eq!(created.started_at, Some(1_000));
        assert_eq!(created.last_modified, 1_000);
        assert_eq!(store.get(&created.id), Some(created));
    }

    #[test]
    fn create_rejects_blank_title() {
        let (_, mut service, _) = seeded();
        assert!(matches!(
            service.create(RecordDraft::new("  ")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn save_restamps_last_modified() {
        let (store, mut service, clock) = seeded();
        clock.set(5_000);

        let mut edited = service.get(&"1".into()).cloned().unwrap();
        edited.title = "Kubernetes".to_string();
        edited.last_modified = 42;
        let saved = service.save(edited).unwrap();

        assert_eq!(saved.last_modified, 5_000);
        assert_eq!(store.get(&"1".into()).unwrap().title, "Kubernetes");
        assert_eq!(store.get(&"1".into()).unwrap().last_modified, 5_000);
    }

    #[test]
    fn save_beats_a_future_timestamp() {
        let (_, mut service, clock) = seeded();
        clock.set(150);

        let edited = service.get(&"2".into()).cloned().unwrap();
        let saved = service.save(edited).unwrap();
        assert_eq!(saved.last_modified, 201);
    }

    #[test]
    fn save_failure_keeps_memory_copy() {
        let mut service = RecordService::new(Arc::new(BrokenStore)).with_clock(FixedClock::at(7));
        let error = service.save(record("9", "Draft", 1)).unwrap_err();

        assert!(matches!(error, Error::Store(StoreError::WriteFailed { .. })));
        assert_eq!(service.get(&"9".into()).unwrap().last_modified, 7);
    }

    #[test]
    fn delete_removes_from_memory_and_store() {
        let (store, mut service, _) = seeded();
        service.delete(&"1".into()).unwrap();

        assert!(service.get(&"1".into()).is_none());
        assert!(store.get(&"1".into()).is_none());
        let tombstones = store.tombstones().unwrap();
        assert_eq!(tombstones[&RecordId::from("1")].deleted_at, 1_000);
    }

    #[test]
    fn delete_missing_id_leaves_no_tombstone() {
        let (store, mut service, _) = seeded();
        assert!(matches!(
            service.delete(&"non-existing-id".into()),
            Err(Error::NotFound(_))
        ));
        assert_eq!(service.records().len(), 2);
        assert!(store.tombstones().unwrap().is_empty());
    }

    #[test]
    fn delete_stamps_past_a_future_record() {
        let (store, mut service, clock) = seeded();
        clock.set(150);

        service.delete(&"2".into()).unwrap();
        assert_eq!(store.tombstones().unwrap()[&RecordId::from("2")].deleted_at, 201);
    }

    #[test]
    fn sorted_orders_on_demand() {
        let (_, mut service, _) = seeded();
        let titles = |records: &[Record]| records.iter().map(|r| r.title.clone()).collect::<Vec<_>>();

        assert_eq!(
            titles(service.sorted(SortOrder::LastModified)),
            vec!["System Design", "K8s"]
        );
        assert_eq!(titles(service.sorted(SortOrder::Title)), vec!["K8s", "System Design"]);
    }

    #[test]
    fn resolve_supports_exact_and_prefix() {
        let store = Arc::new(MemoryStore::with_records(
            "local",
            [
                record("aaaa-1111", "Left", 1),
                record("aaaa-2222", "Right", 2),
            ],
        ));
        let mut service = RecordService::new(store);
        service.load_all().unwrap();

        assert_eq!(service.resolve("aaaa-1111").unwrap().title, "Left");
        assert_eq!(service.resolve("aaaa-2").unwrap().title, "Right");
        assert!(matches!(service.resolve("aaaa"), Err(Error::Ambiguous { .. })));
        assert!(matches!(service.resolve("zzz"), Err(Error::NotFound(_))));
    }
}
