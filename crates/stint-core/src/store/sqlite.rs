//! `SQLite` replica
//!
//! Deletions are remembered in the `tombstones` table, which is never pruned.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection};

use super::{migrations, RecordMap, Store, StoreError, TombstoneMap};
use crate::error::Result;
use crate::models::{Record, RecordId, Tombstone};
use crate::util::{duration_to_millis, millis_to_duration};

const SELECT_RECORDS: &str = "SELECT id, title, tags, started_at, ended_at, last_modified, \
     estimated_duration_ms, body FROM records";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Replica stored in a single `SQLite` database file.
pub struct SqliteStore {
    name: String,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `path`, creating it and its directory if missing.
    ///
    /// Runs migrations automatically.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(name.into(), Connection::open(path)?)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory(name: impl Into<String>) -> Result<Self> {
        Self::from_connection(name.into(), Connection::open_in_memory()?)
    }

    fn from_connection(name: String, mut conn: Connection) -> Result<Self> {
        Self::configure(&conn)?;
        migrations::run(&mut conn)?;
        Ok(Self {
            name,
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) -> Result<()> {
        // In-memory databases report "memory" instead of switching to WAL
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }

    fn parse_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let id: String = row.get(0)?;
        let tags: String = row.get(2)?;
        let tags = serde_json::from_str(&tags)
            .map_err(|error| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, error.into()))?;

        Ok(Record {
            id: RecordId::new(id),
            title: row.get(1)?,
            tags,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
            last_modified: row.get(5)?,
            estimated_duration: millis_to_duration(row.get(6)?),
            body: row.get(7)?,
        })
    }

    fn write_record(conn: &mut Connection, record: &Record) -> Result<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO records (id, title, tags, started_at, ended_at, last_modified, estimated_duration_ms, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                tags = excluded.tags,
                started_at = excluded.started_at,
                ended_at = excluded.ended_at,
                last_modified = excluded.last_modified,
                estimated_duration_ms = excluded.estimated_duration_ms,
                body = excluded.body",
            params![
                record.id.as_str(),
                record.title,
                tags,
                record.started_at,
                record.ended_at,
                record.last_modified,
                duration_to_millis(record.estimated_duration),
                record.body,
            ],
        )?;
        tx.execute(
            "DELETE FROM tombstones WHERE id = ?",
            params![record.id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn write_tombstone(conn: &mut Connection, tombstone: &Tombstone) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM records WHERE id = ?",
            params![tombstone.id.as_str()],
        )?;
        tx.execute(
            "INSERT INTO tombstones (id, deleted_at) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET deleted_at = excluded.deleted_at",
            params![tombstone.id.as_str(), tombstone.deleted_at],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_all(&self) -> std::result::Result<RecordMap, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_RECORDS).map_err(StoreError::query)?;
        let records = stmt
            .query_map([], Self::parse_record)
            .map_err(StoreError::query)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::query)?;

        Ok(records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect())
    }

    fn upsert(&self, record: &Record) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn.lock();
        Self::write_record(&mut conn, record).map_err(|error| StoreError::write(&record.id, error))
    }

    fn delete(&self, id: &RecordId) -> std::result::Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM records WHERE id = ?", params![id.as_str()])
            .map(|_| ())
            .map_err(|error| StoreError::write(id, error))
    }

    fn supports_tombstones(&self) -> bool {
        true
    }

    fn tombstones(&self) -> std::result::Result<TombstoneMap, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, deleted_at FROM tombstones")
            .map_err(StoreError::query)?;
        let tombstones = stmt
            .query_map([], |row| {
                Ok(Tombstone::new(
                    RecordId::new(row.get::<_, String>(0)?),
                    row.get(1)?,
                ))
            })
            .map_err(StoreError::query)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::query)?;

        Ok(tombstones
            .into_iter()
            .map(|tombstone| (tombstone.id.clone(), tombstone))
            .collect())
    }

    fn bury(&self, tombstone: &Tombstone) -> std::result::Result<(), StoreError> {
        let mut conn = self.conn.lock();
        Self::write_tombstone(&mut conn, tombstone)
            .map_err(|error| StoreError::write(&tombstone.id, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteStore {
        SqliteStore::open_in_memory("test").unwrap()
    }

    fn record(id: &str, last_modified: i64) -> Record {
        Record {
            id: id.into(),
            title: format!("Record {id}"),
            tags: vec!["learning".to_string()],
            started_at: Some(1_000),
            ended_at: None,
            last_modified,
            estimated_duration: Duration::from_secs(3 * 3600),
            body: "Test body".to_string(),
        }
    }

    #[test]
    fn test_upsert_and_get_all() {
        let store = setup();
        store.upsert(&record("1", 10)).unwrap();
        store.upsert(&record("2", 20)).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&RecordId::from("1")], record("1", 10));
    }

    #[test]
    fn test_upsert_replaces_every_field() {
        let store = setup();
        store.upsert(&record("1", 10)).unwrap();

        let mut replacement = record("1", 5);
        replacement.title = "Renamed".to_string();
        replacement.tags = Vec::new();
        replacement.started_at = None;
        replacement.ended_at = Some(9_000);
        store.upsert(&replacement).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all[&RecordId::from("1")], replacement);
    }

    #[test]
    fn test_bury_removes_record_and_keeps_tombstone() {
        let store = setup();
        store.upsert(&record("1", 10)).unwrap();
        store.bury(&Tombstone::new("1".into(), 50)).unwrap();

        assert!(store.get_all().unwrap().is_empty());
        let tombstones = store.tombstones().unwrap();
        assert_eq!(tombstones[&RecordId::from("1")].deleted_at, 50);
    }

    #[test]
    fn test_upsert_clears_tombstone() {
        let store = setup();
        store.bury(&Tombstone::new("1".into(), 50)).unwrap();
        store.upsert(&record("1", 60)).unwrap();

        assert!(store.tombstones().unwrap().is_empty());
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_file_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stint.db");
        {
            let store = SqliteStore::open("local", &path).unwrap();
            store.upsert(&record("1", 10)).unwrap();
        }

        let store = SqliteStore::open("local", &path).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
        assert_eq!(store.name(), "local");
    }
}
