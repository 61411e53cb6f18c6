// entry.rs — MemoryEntry: the record shape shared by every table.
//
// Every table stores the same four fields: `{ id, type, data, timestamp }`.
// `data` is free-form JSON so one tier can hold events, goals, and the agent
// snapshot alike. Timestamps are serialized as integer milliseconds.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Current time truncated to millisecond precision.
///
/// Entries are persisted with millisecond timestamps, so truncating up front
/// keeps an in-memory entry equal to its reloaded copy.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A single persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier (entity id for object tables, generated otherwise).
    pub id: String,

    /// Record kind, e.g. an event category or `"goal"`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Arbitrary JSON payload.
    pub data: Value,

    /// When the entry was last written.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create an entry with a freshly generated id.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), kind, data)
    }

    /// Create an entry with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, kind: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            data,
            timestamp: now_millis(),
        }
    }

    /// Shallow-merge `update` into `data` and refresh the timestamp.
    pub fn merge(&mut self, update: &Value) {
        merge_data(&mut self.data, update);
        self.timestamp = now_millis();
    }
}

/// Shallow merge: each top-level key of `update` overwrites the same key in
/// `target`. Nested values (arrays such as a goal's `milestones`) are replaced
/// wholesale, never merged element-wise.
///
/// A non-object on either side replaces `target` entirely.
pub fn merge_data(target: &mut Value, update: &Value) {
    match (target.as_object_mut(), update.as_object()) {
        (Some(fields), Some(updates)) => {
            for (key, value) in updates {
                fields.insert(key.clone(), value.clone());
            }
        }
        _ => *target = update.clone(),
    }
}
