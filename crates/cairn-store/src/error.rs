// error.rs — Error types for the persistence tier.

use std::time::Duration;

use thiserror::Error;

use crate::table::TableShape;

/// Errors that can occur inside the persistence tier.
///
/// Only shape and registration mistakes ever reach callers of
/// [`PersistenceTier`](crate::PersistenceTier). Backend failures are
/// absorbed by the tier and logged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize an entry.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The table was never registered with the tier.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// An operation was used against a table of another shape.
    #[error("table {table} is a {actual} table, not a {expected} table")]
    ShapeMismatch {
        table: String,
        expected: TableShape,
        actual: TableShape,
    },

    /// An entity id that cannot be used as a storage key.
    #[error("invalid key {key:?} for table {table}")]
    InvalidKey { table: String, key: String },

    /// The durable backend refused the connection.
    #[error("durable backend {backend} unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// The durable backend did not answer within the connect timeout.
    #[error("durable backend {backend} did not connect within {timeout:?}")]
    ConnectTimeout { backend: String, timeout: Duration },
}
