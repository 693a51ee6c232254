use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use stint_core::store::{JsonFileStore, MemoryStore, SqliteStore, StoreDescriptor};
use stint_core::{Record, RecordId, Store, Tombstone};
use tempfile::TempDir;

/// Every backend, each in a fresh location
fn backends() -> (TempDir, Vec<Arc<dyn Store>>) {
    let dir = tempfile::tempdir().unwrap();
    let stores: Vec<Arc<dyn Store>> = vec![
        Arc::new(MemoryStore::new("memory")),
        Arc::new(SqliteStore::open("sqlite", dir.path().join("replica.db")).unwrap()),
        Arc::new(SqliteStore::open_in_memory("sqlite-mem").unwrap()),
        Arc::new(JsonFileStore::open("json", dir.path().join("replica.json")).unwrap()),
    ];
    (dir, stores)
}

fn sample(id: &str, last_modified: i64) -> Record {
    Record {
        id: id.into(),
        title: "Kubernetes deep dive".to_string(),
        tags: vec!["learning".to_string(), "k8s".to_string()],
        started_at: Some(1_734_685_200_123),
        ended_at: Some(1_734_694_200_456),
        last_modified,
        estimated_duration: Duration::from_millis(5_400_001),
        body: "Line one\nLine \"two\"".to_string(),
    }
}

#[test]
fn test_upsert_round_trips_every_field_exactly() {
    let (_dir, stores) = backends();
    for store in stores {
        let record = sample("1", 1_734_694_200_789);
        store.upsert(&record).unwrap();

        let snapshot = store.get_all().unwrap();
        assert_eq!(snapshot.len(), 1, "{}", store.name());
        assert_eq!(snapshot.get(&record.id), Some(&record), "{}", store.name());
    }
}

#[test]
fn test_upsert_fully_replaces_and_never_advances_timestamp() {
    let (_dir, stores) = backends();
    for store in stores {
        store.upsert(&sample("1", 500)).unwrap();

        // An older stamp is stored as given
        let mut replacement = sample("1", 100);
        replacement.title = "Renamed".to_string();
        replacement.tags.clear();
        replacement.ended_at = None;
        store.upsert(&replacement).unwrap();

        let stored = store.get_all().unwrap().remove(&RecordId::from("1")).unwrap();
        assert_eq!(stored, replacement, "{}", store.name());
    }
}

#[test]
fn test_delete_absent_id_succeeds() {
    let (_dir, stores) = backends();
    for store in stores {
        store.delete(&"missing".into()).unwrap();

        store.upsert(&sample("1", 10)).unwrap();
        store.delete(&"1".into()).unwrap();
        store.delete(&"1".into()).unwrap();
        assert!(store.get_all().unwrap().is_empty(), "{}", store.name());
    }
}

#[test]
fn test_bury_and_upsert_are_mutually_exclusive() {
    let (_dir, stores) = backends();
    for store in stores {
        assert!(store.supports_tombstones(), "{}", store.name());
        store.upsert(&sample("1", 10)).unwrap();
        store.bury(&Tombstone::new("1".into(), 20)).unwrap();

        assert!(store.get_all().unwrap().is_empty(), "{}", store.name());
        assert_eq!(
            store.tombstones().unwrap().get(&RecordId::from("1")),
            Some(&Tombstone::new("1".into(), 20)),
            "{}",
            store.name()
        );

        store.upsert(&sample("1", 30)).unwrap();
        assert!(store.tombstones().unwrap().is_empty(), "{}", store.name());
        assert_eq!(store.get_all().unwrap().len(), 1, "{}", store.name());
    }
}

#[test]
fn test_snapshot_is_detached_from_later_writes() {
    let (_dir, stores) = backends();
    for store in stores {
        store.upsert(&sample("1", 10)).unwrap();
        let snapshot = store.get_all().unwrap();
        store.upsert(&sample("2", 20)).unwrap();

        assert_eq!(snapshot.len(), 1, "{}", store.name());
        assert_eq!(store.get_all().unwrap().len(), 2, "{}", store.name());
    }
}

#[test]
fn test_file_backends_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let descriptors = [
        StoreDescriptor::Sqlite(dir.path().join("nested/replica.db")),
        StoreDescriptor::Json(dir.path().join("nested/replica.json")),
    ];

    for descriptor in descriptors {
        {
            let store = descriptor.open("writer").unwrap();
            store.upsert(&sample("1", 10)).unwrap();
            store.bury(&Tombstone::new("2".into(), 20)).unwrap();
        }

        let reopened = descriptor.open("reader").unwrap();
        assert_eq!(
            reopened.get_all().unwrap().get(&RecordId::from("1")),
            Some(&sample("1", 10)),
            "{descriptor}"
        );
        assert_eq!(reopened.tombstones().unwrap().len(), 1, "{descriptor}");
    }
}

#[test]
fn test_tombstones_outlive_later_writes() {
    let (_dir, stores) = backends();
    for store in stores {
        store.bury(&Tombstone::new("1".into(), 20)).unwrap();
        for n in 2..50 {
            let id = n.to_string();
            store.upsert(&sample(&id, n)).unwrap();
            store.bury(&Tombstone::new(id.as_str().into(), n + 1)).unwrap();
        }

        let tombstones = store.tombstones().unwrap();
        assert_eq!(tombstones.len(), 49, "{}", store.name());
        assert_eq!(
            tombstones.get(&RecordId::from("1")),
            Some(&Tombstone::new("1".into(), 20)),
            "{}",
            store.name()
        );
    }
}
