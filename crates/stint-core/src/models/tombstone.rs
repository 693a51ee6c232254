//! Tombstone model

use serde::{Deserialize, Serialize};

use super::RecordId;

/// Marker left behind when a record is deleted, so the deletion can travel
/// to the other replica instead of the record being pulled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Deleted record
    pub id: RecordId,
    /// Deletion timestamp (Unix ms), stamped by the record service
    pub deleted_at: i64,
}

impl Tombstone {
    pub const fn new(id: RecordId, deleted_at: i64) -> Self {
        Self { id, deleted_at }
    }
}
