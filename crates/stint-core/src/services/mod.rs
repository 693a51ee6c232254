//! Services layered over a store

mod records;

pub use records::{Clock, RecordService, SortOrder, SystemClock};
