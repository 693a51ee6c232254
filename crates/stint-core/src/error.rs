//! Error types for stint-core

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using stint-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stint-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A full snapshot could not be fetched from a replica
    #[error("Store unavailable ({store}): {source}")]
    StoreUnavailable {
        store: String,
        #[source]
        source: StoreError,
    },

    /// Store error passed through unmodified
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Id prefix matched more than one record
    #[error("ID prefix '{prefix}' is ambiguous; matches: {matches}")]
    Ambiguous { prefix: String, matches: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// No remote replica configured
    #[error("Reconciliation is not configured: {0}")]
    ConfigurationMissing(String),

    /// Reconciler lifecycle misuse
    #[error("Reconciler is {0}")]
    InvalidState(&'static str),

    /// Background task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}
