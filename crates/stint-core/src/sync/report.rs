//! Per-pass outcome

use serde::Serialize;

/// Counts produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records copied into the secondary replica because it lacked them
    pub pushed: usize,
    /// Records copied into the primary replica because it lacked them
    pub pulled: usize,
    /// Records replaced on the side holding the older `last_modified`
    pub updated: usize,
    /// Deletions applied from a tombstone
    pub deleted: usize,
    /// Ids that needed no write
    pub unchanged: usize,
    /// Individual writes that failed
    pub failed: usize,
}

impl SyncReport {
    /// Successful writes issued during the pass
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.pushed + self.pulled + self.updated + self.deleted
    }

    /// No write was needed and none failed
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.writes() == 0 && self.failed == 0
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pushed, {} pulled, {} updated, {} deleted, {} failed",
            self.pushed, self.pulled, self.updated, self.deleted, self.failed
        )
    }
}
