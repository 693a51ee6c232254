//! stint-core - Core library for Stint
//!
//! This crate contains the record model, the store capability and its
//! backends, the record service that owns modification timestamps, and the
//! reconciler that keeps a local and a remote replica in step.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Record, RecordDraft, RecordId, Tombstone};
pub use services::{Clock, RecordService, SortOrder, SystemClock};
pub use state::ReconcilerState;
pub use store::{Store, StoreError};
pub use sync::{Reconciler, ReconcilerOptions, SyncReport};
