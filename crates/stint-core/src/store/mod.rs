//! Store capability and its backends
//!
//! A [`Store`] is one replica: a keyed record collection that can hand out a
//! full snapshot and accept single-record writes. Every backend is
//! timestamp-transparent, it persists exactly the `last_modified` it is given.

mod json_file;
mod memory;
mod migrations;
mod sqlite;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::error::Error;
use crate::models::{Record, RecordId, Tombstone};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Full keyed snapshot of a replica, ordered by id
pub type RecordMap = BTreeMap<RecordId, Record>;

/// Tombstones held by a replica, ordered by id
pub type TombstoneMap = BTreeMap<RecordId, Tombstone>;

/// Errors surfaced through the store contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A snapshot read failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A single-record write failed
    #[error("Write failed for record {id}: {reason}")]
    WriteFailed { id: RecordId, reason: String },
}

impl StoreError {
    pub fn query(error: impl fmt::Display) -> Self {
        Self::QueryFailed(error.to_string())
    }

    pub fn write(id: &RecordId, error: impl fmt::Display) -> Self {
        Self::WriteFailed {
            id: id.clone(),
            reason: error.to_string(),
        }
    }
}

/// Keyed record collection backing one replica.
///
/// `upsert` inserts or fully replaces and never rewrites any field.
/// `delete` of an absent id succeeds. A backend that remembers deletions
/// overrides [`Store::supports_tombstones`], [`Store::tombstones`] and
/// [`Store::bury`]; a live record and a tombstone never coexist for the same
/// id. Tombstones are kept indefinitely; no backend prunes them.
pub trait Store: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &str;

    /// Snapshot of every live record
    fn get_all(&self) -> Result<RecordMap, StoreError>;

    /// Insert or fully replace one record
    fn upsert(&self, record: &Record) -> Result<(), StoreError>;

    /// Remove one record
    fn delete(&self, id: &RecordId) -> Result<(), StoreError>;

    /// Whether [`Store::bury`] leaves a tombstone behind
    fn supports_tombstones(&self) -> bool {
        false
    }

    /// Snapshot of remembered deletions
    fn tombstones(&self) -> Result<TombstoneMap, StoreError> {
        Ok(TombstoneMap::new())
    }

    /// Remove a record and remember its deletion
    fn bury(&self, tombstone: &Tombstone) -> Result<(), StoreError> {
        self.delete(&tombstone.id)
    }
}

/// Where a replica lives.
///
/// Parsed from `sqlite:PATH`, `json:PATH`, `memory`, or a bare path (`SQLite`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreDescriptor {
    Sqlite(PathBuf),
    Json(PathBuf),
    Memory,
}

impl StoreDescriptor {
    /// Open the backend this descriptor points at
    pub fn open(&self, name: &str) -> crate::Result<Arc<dyn Store>> {
        let store: Arc<dyn Store> = match self {
            Self::Sqlite(path) => Arc::new(SqliteStore::open(name, path)?),
            Self::Json(path) => Arc::new(JsonFileStore::open(name, path)?),
            Self::Memory => Arc::new(MemoryStore::new(name)),
        };
        tracing::debug!(store = name, descriptor = %self, "Opened store");
        Ok(store)
    }
}

impl FromStr for StoreDescriptor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::Config("store descriptor cannot be empty".into()));
        }
        if raw == "memory" || raw == "memory:" {
            return Ok(Self::Memory);
        }

        let (kind, path) = match raw.split_once(':') {
            Some(("sqlite", path)) => ("sqlite", path),
            Some(("json", path)) => ("json", path),
            _ => ("sqlite", raw),
        };
        let path = path.trim();
        if path.is_empty() {
            return Err(Error::Config(format!("store descriptor '{raw}' has no path")));
        }

        let path = PathBuf::from(path);
        Ok(if kind == "json" {
            Self::Json(path)
        } else {
            Self::Sqlite(path)
        })
    }
}

impl fmt::Display for StoreDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
            Self::Json(path) => write!(f, "json:{}", path.display()),
            Self::Memory => f.write_str("memory"),
        }
    }
}
