// error.rs — Error types for the goal lifecycle subsystem.

use thiserror::Error;

/// Errors that can occur while recording or announcing goal changes.
///
/// "Not found" is deliberately absent: lookups that miss return `None` or
/// `false` and log a warning instead.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed (event log sink).
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A notification dispatch failed (non-fatal).
    #[error("notification error: {0}")]
    NotificationError(String),
}
