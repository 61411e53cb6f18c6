// event.rs — Event categories and severities for the agent's event log.
//
// Events are stored as ordinary MemoryEntry rows in the `event` log table:
//   type = category (kebab-case), data = { "severity": n, "payload": {...} }

use std::fmt;
use std::str::FromStr;

use cairn_store::MemoryEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    Chat,
    Command,
    Discovery,
    WorldUpdate,
    GoalProgress,
    PlayerInteraction,
    BotAction,
    SystemEvent,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Chat,
        EventCategory::Command,
        EventCategory::Discovery,
        EventCategory::WorldUpdate,
        EventCategory::GoalProgress,
        EventCategory::PlayerInteraction,
        EventCategory::BotAction,
        EventCategory::SystemEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Chat => "chat",
            EventCategory::Command => "command",
            EventCategory::Discovery => "discovery",
            EventCategory::WorldUpdate => "world-update",
            EventCategory::GoalProgress => "goal-progress",
            EventCategory::PlayerInteraction => "player-interaction",
            EventCategory::BotAction => "bot-action",
            EventCategory::SystemEvent => "system-event",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept the snake_case spelling too (`system_event`).
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        EventCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown event category: {}", s))
    }
}

/// Event importance on a 0–10 scale. Out-of-range values clamp to 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const DEBUG: Severity = Severity(0);
    pub const INFO: Severity = Severity(1);
    pub const LOW: Severity = Severity(2);
    pub const MEDIUM: Severity = Severity(5);
    pub const HIGH: Severity = Severity(7);
    pub const CRITICAL: Severity = Severity(9);
    pub const EMERGENCY: Severity = Severity(10);

    pub fn new(level: u8) -> Self {
        Severity(level.min(10))
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::DEBUG
    }
}

impl From<u8> for Severity {
    fn from(level: u8) -> Self {
        Severity::new(level)
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.0
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored shape of an event's `data` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EventData {
    pub severity: Severity,
    pub payload: Value,
}

/// A decoded event row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub category: EventCategory,
    pub severity: Severity,
    pub payload: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Build the log row for a new event.
    pub(crate) fn entry(category: EventCategory, payload: Value, severity: Severity) -> MemoryEntry {
        let data = serde_json::json!({
            "severity": severity.level(),
            "payload": payload,
        });
        MemoryEntry::new(category.as_str(), data)
    }

    /// Decode a row of the event table. Rows written by other tools that do
    /// not fit the event shape are skipped.
    pub fn from_entry(entry: &MemoryEntry) -> Option<Self> {
        let category = entry.kind.parse().ok()?;
        let data: EventData = serde_json::from_value(entry.data.clone()).ok()?;
        Some(Self {
            id: entry.id.clone(),
            category,
            severity: data.severity,
            payload: data.payload,
            timestamp: entry.timestamp,
        })
    }
}
