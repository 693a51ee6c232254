//! Data models for Stint

mod record;
mod tombstone;

pub use record::{estimate_from, normalize_tags, Record, RecordDraft, RecordId};
pub use tombstone::Tombstone;
