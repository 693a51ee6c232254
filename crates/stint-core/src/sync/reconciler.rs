//! Last-write-wins reconciler and its background loop.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Span;

use super::SyncReport;
use crate::error::{Error, Result};
use crate::models::{Record, RecordId, Tombstone};
use crate::state::ReconcilerState;
use crate::store::{RecordMap, Store, StoreError, TombstoneMap};

/// Interval used when none is configured
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Tuning for a [`Reconciler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// Time between scheduled passes
    pub interval: Duration,
    /// Carry deletions across replicas through tombstones
    pub propagate_deletes: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            propagate_deletes: true,
        }
    }
}

/// Keeps a primary and a secondary store consistent.
///
/// Passes run either on the background loop ([`Reconciler::start`]) or on
/// demand ([`Reconciler::reconcile_once`]). Both paths share one gate, so two
/// passes never overlap on the same pair of stores.
pub struct Reconciler {
    shared: Arc<Shared>,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    primary: Arc<dyn Store>,
    secondary: Arc<dyn Store>,
    options: ReconcilerOptions,
    state: watch::Sender<ReconcilerState>,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    gate: Mutex<()>,
    span: Span,
}

/// What one replica holds for an id
#[derive(Clone, Copy)]
enum Side<'a> {
    Live(&'a Record),
    Dead(&'a Tombstone),
    Absent,
}

/// Which replica receives a write
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target {
    Primary,
    Secondary,
}

/// Counter bumped when a write succeeds
#[derive(Clone, Copy)]
enum Outcome {
    Pushed,
    Pulled,
    Updated,
    Deleted,
}

struct Snapshot {
    records: RecordMap,
    tombstones: TombstoneMap,
}

impl Snapshot {
    fn side(&self, id: &RecordId) -> Side<'_> {
        if let Some(record) = self.records.get(id) {
            Side::Live(record)
        } else if let Some(tombstone) = self.tombstones.get(id) {
            Side::Dead(tombstone)
        } else {
            Side::Absent
        }
    }
}

impl Reconciler {
    /// Wire two stores together. Log events are recorded under `span`.
    pub fn new(
        primary: Arc<dyn Store>,
        secondary: Arc<dyn Store>,
        options: ReconcilerOptions,
        span: Span,
    ) -> Self {
        let (state, _) = watch::channel(ReconcilerState::Idle);
        let (stop, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                primary,
                secondary,
                options,
                state,
                last_sync: Mutex::new(None),
                gate: Mutex::new(()),
                span,
            }),
            stop,
            task: Mutex::new(None),
        }
    }

    pub fn options(&self) -> ReconcilerOptions {
        self.shared.options
    }

    /// Run one pass on the caller's thread.
    ///
    /// Blocks on store I/O, and waits for a scheduled pass already in flight.
    pub fn reconcile_once(&self) -> Result<SyncReport> {
        self.shared.reconcile_once()
    }

    /// Completion time of the last pass whose snapshots were both fetched
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_sync.lock()
    }

    pub fn state(&self) -> ReconcilerState {
        *self.shared.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ReconcilerState> {
        self.shared.state.subscribe()
    }

    /// Spawn the background loop on the current tokio runtime.
    ///
    /// The first pass runs immediately, then one per interval.
    pub fn start(&self) -> Result<()> {
        if self.state() == ReconcilerState::Stopped {
            return Err(Error::InvalidState("stopped"));
        }
        if self.shared.options.interval.is_zero() {
            return Err(Error::Config("reconciliation interval must be positive".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| Error::Task(error.to_string()))?;

        let mut task = self.task.lock();
        if task.is_some() {
            return Err(Error::InvalidState("already running"));
        }

        let shared = Arc::clone(&self.shared);
        let stop = self.stop.subscribe();
        *task = Some(runtime.spawn(shared.run(stop)));

        let _entered = self.shared.span.enter();
        tracing::info!(
            interval = ?self.shared.options.interval,
            primary = self.shared.primary.name(),
            secondary = self.shared.secondary.name(),
            "Started reconciler"
        );
        Ok(())
    }

    /// Stop the background loop.
    ///
    /// A pass already in flight is allowed to finish first. Afterwards the
    /// reconciler is `Stopped` and rejects further passes.
    pub async fn stop(&self) -> Result<()> {
        self.stop.send_replace(true);

        let handle = self.task.lock().take();
        let joined = match handle {
            Some(handle) => handle.await.map_err(|error| Error::Task(error.to_string())),
            None => Ok(()),
        };

        // Waits out an on-demand pass holding the gate
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.mark_stopped())
            .await
            .map_err(|error| Error::Task(error.to_string()))?;

        let _entered = self.shared.span.enter();
        tracing::info!("Reconciler stopped");
        joined
    }
}

impl Shared {
    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                // Also fires when the reconciler is dropped
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let shared = Arc::clone(&self);
                    match tokio::task::spawn_blocking(move || shared.reconcile_once()).await {
                        Ok(Ok(_)) | Ok(Err(Error::InvalidState(_))) => {}
                        Ok(Err(error)) => {
                            let _entered = self.span.enter();
                            tracing::warn!(error = %error, "Scheduled reconciliation pass failed; retrying next tick");
                        }
                        Err(error) => {
                            let _entered = self.span.enter();
                            tracing::error!(error = %error, "Reconciliation task panicked");
                        }
                    }
                }
            }
        }
    }

    fn mark_stopped(&self) {
        let _gate = self.gate.lock();
        self.state.send_replace(ReconcilerState::Stopped);
    }

    fn reconcile_once(&self) -> Result<SyncReport> {
        let _gate = self.gate.lock();
        if *self.state.borrow() == ReconcilerState::Stopped {
            return Err(Error::InvalidState("stopped"));
        }

        let _entered = self.span.enter();
        self.state.send_replace(ReconcilerState::Syncing);
        let result = self.run_pass();
        self.state.send_replace(ReconcilerState::Idle);

        if result.is_ok() {
            *self.last_sync.lock() = Some(Utc::now());
        }
        result
    }

    fn fetch(&self, store: &dyn Store) -> Result<Snapshot> {
        let unavailable = |source: StoreError| {
            tracing::warn!(store = store.name(), error = %source, "Snapshot fetch failed; pass aborted");
            Error::StoreUnavailable {
                store: store.name().to_string(),
                source,
            }
        };

        let records = store.get_all().map_err(unavailable)?;
        let tombstones = if self.options.propagate_deletes {
            store.tombstones().map_err(unavailable)?
        } else {
            TombstoneMap::new()
        };
        Ok(Snapshot {
            records,
            tombstones,
        })
    }

    fn run_pass(&self) -> Result<SyncReport> {
        tracing::debug!("Starting reconciliation pass");
        let primary = self.fetch(self.primary.as_ref())?;
        let secondary = self.fetch(self.secondary.as_ref())?;

        let ids = primary
            .records
            .keys()
            .chain(primary.tombstones.keys())
            .chain(secondary.records.keys())
            .chain(secondary.tombstones.keys())
            .collect::<BTreeSet<_>>();

        let mut report = SyncReport::default();
        for id in ids {
            self.reconcile_id(id, primary.side(id), secondary.side(id), &mut report);
        }

        tracing::info!(
            pushed = report.pushed,
            pulled = report.pulled,
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            failed = report.failed,
            "Reconciliation pass complete"
        );
        Ok(report)
    }

    fn reconcile_id(&self, id: &RecordId, primary: Side<'_>, secondary: Side<'_>, report: &mut SyncReport) {
        use std::cmp::Ordering;

        match (primary, secondary) {
            (Side::Live(local), Side::Live(remote)) => {
                match local.last_modified.cmp(&remote.last_modified) {
                    Ordering::Greater => {
                        self.upsert(Target::Secondary, local, Outcome::Updated, report);
                    }
                    Ordering::Less => self.upsert(Target::Primary, remote, Outcome::Updated, report),
                    Ordering::Equal => report.unchanged += 1,
                }
            }
            (Side::Live(local), Side::Absent) => {
                self.upsert(Target::Secondary, local, Outcome::Pushed, report);
            }
            (Side::Absent, Side::Live(remote)) => {
                self.upsert(Target::Primary, remote, Outcome::Pulled, report);
            }
            // A delete wins over an edit made at the same instant
            (Side::Live(local), Side::Dead(tombstone)) => {
                if tombstone.deleted_at >= local.last_modified {
                    self.bury(Target::Primary, tombstone, report);
                } else {
                    self.upsert(Target::Secondary, local, Outcome::Pushed, report);
                }
            }
            (Side::Dead(tombstone), Side::Live(remote)) => {
                if tombstone.deleted_at >= remote.last_modified {
                    self.bury(Target::Secondary, tombstone, report);
                } else {
                    self.upsert(Target::Primary, remote, Outcome::Pulled, report);
                }
            }
            // A side that cannot hold tombstones already reflects the delete
            (Side::Dead(tombstone), Side::Absent) => {
                self.copy_tombstone(Target::Secondary, tombstone, report);
            }
            (Side::Absent, Side::Dead(tombstone)) => {
                self.copy_tombstone(Target::Primary, tombstone, report);
            }
            (Side::Dead(_), Side::Dead(_)) | (Side::Absent, Side::Absent) => {
                tracing::trace!(id = %id, "Nothing to reconcile");
                report.unchanged += 1;
            }
        }
    }

    fn store(&self, target: Target) -> &dyn Store {
        match target {
            Target::Primary => self.primary.as_ref(),
            Target::Secondary => self.secondary.as_ref(),
        }
    }

    fn upsert(&self, target: Target, record: &Record, outcome: Outcome, report: &mut SyncReport) {
        let store = self.store(target);
        let result = store.upsert(record);
        Self::tally(store, &record.id, result, outcome, report);
    }

    fn bury(&self, target: Target, tombstone: &Tombstone, report: &mut SyncReport) {
        let store = self.store(target);
        let result = store.bury(tombstone);
        Self::tally(store, &tombstone.id, result, Outcome::Deleted, report);
    }

    fn copy_tombstone(&self, target: Target, tombstone: &Tombstone, report: &mut SyncReport) {
        if self.store(target).supports_tombstones() {
            self.bury(target, tombstone, report);
        } else {
            report.unchanged += 1;
        }
    }

    fn tally(
        store: &dyn Store,
        id: &RecordId,
        result: std::result::Result<(), StoreError>,
        outcome: Outcome,
        report: &mut SyncReport,
    ) {
        match result {
            Ok(()) => {
                let counter = match outcome {
                    Outcome::Pushed => &mut report.pushed,
                    Outcome::Pulled => &mut report.pulled,
                    Outcome::Updated => &mut report.updated,
                    Outcome::Deleted => &mut report.deleted,
                };
                *counter += 1;
            }
            Err(error) => {
                tracing::warn!(id = %id, store = store.name(), error = %error, "Write failed; continuing pass");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn record(id: &str, last_modified: i64) -> Record {
        Record {
            id: id.into(),
            title: format!("Record {id}"),
            tags: Vec::new(),
            started_at: Some(1),
            ended_at: None,
            last_modified,
            estimated_duration: Duration::ZERO,
            body: String::new(),
        }
    }

    fn reconciler(primary: &Arc<MemoryStore>, secondary: &Arc<MemoryStore>) -> Reconciler {
        Reconciler::new(
            primary.clone(),
            secondary.clone(),
            ReconcilerOptions::default(),
            Span::none(),
        )
    }

    #[test]
    fn empty_replicas_converge_immediately() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let report = reconciler(&primary, &secondary).reconcile_once().unwrap();
        assert!(report.is_converged());
    }

    #[test]
    fn newer_secondary_replaces_primary() {
        let primary = Arc::new(MemoryStore::with_records("primary", [record("3", 10)]));
        let secondary = Arc::new(MemoryStore::with_records("secondary", [record("3", 20)]));

        let report = reconciler(&primary, &secondary).reconcile_once().unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(primary.get(&"3".into()), Some(record("3", 20)));
    }

    #[test]
    fn pass_records_last_sync_time_and_returns_to_idle() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let reconciler = reconciler(&primary, &secondary);

        assert!(reconciler.last_sync_time().is_none());
        reconciler.reconcile_once().unwrap();
        assert!(reconciler.last_sync_time().is_some());
        assert_eq!(reconciler.state(), ReconcilerState::Idle);
    }

    #[test]
    fn start_requires_runtime() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        assert!(matches!(
            reconciler(&primary, &secondary).start(),
            Err(Error::Task(_))
        ));
    }

    #[test]
    fn start_rejects_zero_interval() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let reconciler = Reconciler::new(
            primary,
            secondary,
            ReconcilerOptions {
                interval: Duration::ZERO,
                propagate_deletes: true,
            },
            Span::none(),
        );
        assert!(matches!(reconciler.start(), Err(Error::Config(_))));
    }
}
