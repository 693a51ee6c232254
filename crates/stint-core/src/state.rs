//! Reconciler lifecycle state.

/// Operational state of a [`crate::Reconciler`].
///
/// `Idle` and `Syncing` alternate while the reconciler is alive. `Stopped` is
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Syncing,
    Stopped,
}

impl ReconcilerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ReconcilerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
