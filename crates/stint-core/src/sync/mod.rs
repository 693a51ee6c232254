//! Replica reconciliation
//!
//! A [`Reconciler`] keeps two stores in step with record-level
//! last-write-wins: on every pass it compares full snapshots of both replicas
//! and copies the whole record with the later `last_modified` over the older
//! one. It never stamps timestamps itself.

mod reconciler;
mod report;

pub use reconciler::{Reconciler, ReconcilerOptions, DEFAULT_INTERVAL};
pub use report::SyncReport;
