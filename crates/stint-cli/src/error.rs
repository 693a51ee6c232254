use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stint_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No activity title provided")]
    EmptyTitle,
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },
    #[error("Activity {0} is already finished")]
    AlreadyFinished(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Background task failed: {0}")]
    Task(String),
    #[error(
        "Sync is not configured ({0}). Run `stint config init --remote <DESCRIPTOR>` or set STINT_REMOTE_STORE."
    )]
    SyncNotConfigured(String),
}
