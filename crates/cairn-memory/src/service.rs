// service.rs — MemoryService: typed operations over the agent's tables.
//
// All writes go through here. Store errors can only come from a caller naming
// a table that was never registered (or has another shape); those are logged
// at warn and answered with a sentinel, the same way a missing id is.

use std::collections::BTreeMap;

use cairn_store::{MemoryEntry, PersistenceTier, StoreConfig, StoreError, TierBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::event::{EventCategory, EventRecord, Severity};
use crate::tables;

/// Row counts and backend state, for operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySummary {
    /// Entries per log table.
    pub logs: BTreeMap<String, usize>,
    /// Entities per object table.
    pub entities: BTreeMap<String, usize>,
    /// When the agent snapshot was last written.
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub agent_state_at: Option<DateTime<Utc>>,
    /// Whether writes are being replicated to a durable backend.
    pub durable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

/// The agent's memory. One per agent, shared as `Arc<MemoryService>`.
pub struct MemoryService {
    tier: PersistenceTier,
}

impl MemoryService {
    /// Register the agent's tables on `builder` and build the tier.
    pub fn new(builder: TierBuilder) -> Self {
        let builder = tables::ALL
            .iter()
            .fold(builder, |builder, (name, shape)| builder.table(*name, *shape));
        Self {
            tier: builder.build(),
        }
    }

    /// Build from `[store]` configuration.
    pub fn open(config: &StoreConfig) -> Self {
        Self::new(TierBuilder::from_config(config))
    }

    /// Memory with no durable backend.
    pub fn in_memory() -> Self {
        Self::new(PersistenceTier::builder().in_memory())
    }

    pub fn is_durable(&self) -> bool {
        self.tier.is_durable()
    }

    /// Direct access to the underlying tier.
    pub fn tier(&self) -> &PersistenceTier {
        &self.tier
    }

    // ── Events ──────────────────────────────────────────────────

    /// Append an event and return its id.
    pub fn create_event(&self, category: EventCategory, payload: Value, severity: Severity) -> String {
        let entry = EventRecord::entry(category, payload, severity);
        let id = entry.id.clone();
        tracing::debug!(%category, severity = severity.level(), event_id = %id, "recording event");
        absorb(self.tier.append(tables::EVENT, entry), tables::EVENT);
        id
    }

    /// The `n` most recent events, oldest first.
    pub fn recent_events(&self, n: usize) -> Vec<EventRecord> {
        self.all_events()
            .into_iter()
            .rev()
            .take(n)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// The `n` most recent events of one category, oldest first.
    pub fn events_of(&self, category: EventCategory, n: usize) -> Vec<EventRecord> {
        self.last_matching(n, |event| event.category == category)
    }

    /// The `n` most recent events at or above `severity`, oldest first.
    pub fn events_at_least(&self, severity: Severity, n: usize) -> Vec<EventRecord> {
        self.last_matching(n, |event| event.severity >= severity)
    }

    fn all_events(&self) -> Vec<EventRecord> {
        let entries = absorb(
            self.tier.read(tables::EVENT, self.tier.max_log_size()),
            tables::EVENT,
        )
        .unwrap_or_default();
        entries.iter().filter_map(EventRecord::from_entry).collect()
    }

    fn last_matching(&self, n: usize, keep: impl Fn(&EventRecord) -> bool) -> Vec<EventRecord> {
        let mut matched: Vec<EventRecord> = self
            .all_events()
            .into_iter()
            .rev()
            .filter(|event| keep(event))
            .take(n)
            .collect();
        matched.reverse();
        matched
    }

    // ── Logs ────────────────────────────────────────────────────

    /// Append to any log table. `None` when `log` is not a registered log.
    pub fn record(&self, log: &str, kind: &str, data: Value) -> Option<String> {
        let entry = MemoryEntry::new(kind, data);
        let id = entry.id.clone();
        absorb(self.tier.append(log, entry), log).map(|()| id)
    }

    /// The `n` most recent rows of a log table, oldest first.
    pub fn recent(&self, log: &str, n: usize) -> Vec<MemoryEntry> {
        absorb(self.tier.read(log, n), log).unwrap_or_default()
    }

    pub fn add_chat_message(&self, username: &str, message: &str) -> String {
        let data = json!({ "username": username, "message": message });
        self.record(tables::CHAT, "chat", data).unwrap_or_default()
    }

    pub fn add_command(&self, command: &str, success: bool) -> String {
        let data = json!({ "command": command, "success": success });
        self.record(tables::COMMAND, "command", data).unwrap_or_default()
    }

    pub fn recent_chat(&self, n: usize) -> Vec<MemoryEntry> {
        self.recent(tables::CHAT, n)
    }

    pub fn recent_commands(&self, n: usize) -> Vec<MemoryEntry> {
        self.recent(tables::COMMAND, n)
    }

    /// Chat messages whose username or text contains `query`, ignoring case.
    pub fn search_chat(&self, query: &str) -> Vec<MemoryEntry> {
        let query = query.to_lowercase();
        let field = |entry: &MemoryEntry, key: &str| {
            entry.data[key]
                .as_str()
                .map(|s| s.to_lowercase().contains(&query))
                .unwrap_or(false)
        };
        self.recent(tables::CHAT, self.tier.max_log_size())
            .into_iter()
            .filter(|entry| field(entry, "message") || field(entry, "username"))
            .collect()
    }

    // ── Agent state ─────────────────────────────────────────────

    /// Replace the agent snapshot, stamping a fresh timestamp.
    pub fn update_agent_state(&self, snapshot: Value) -> MemoryEntry {
        let entry = MemoryEntry::with_id(tables::AGENT, "agent-state", snapshot);
        absorb(self.tier.set_singleton(tables::AGENT, entry.clone()), tables::AGENT);
        entry
    }

    pub fn agent_state(&self) -> Option<MemoryEntry> {
        absorb(self.tier.get_singleton(tables::AGENT), tables::AGENT).flatten()
    }

    // ── Entities ────────────────────────────────────────────────

    /// Insert or overwrite an entity. Returns `false` when `table` is not a
    /// registered object table.
    pub fn put_entity(&self, table: &str, id: &str, kind: &str, data: Value) -> bool {
        tracing::debug!(table, id, "writing entity");
        absorb(self.tier.put(table, id, MemoryEntry::new(kind, data)), table).is_some()
    }

    pub fn entity(&self, table: &str, id: &str) -> Option<MemoryEntry> {
        absorb(self.tier.get(table, id), table).flatten()
    }

    /// Shallow-merge `update` into an entity. `false` when it does not exist.
    pub fn update_entity(&self, table: &str, id: &str, update: &Value) -> bool {
        let patched = absorb(self.tier.patch(table, id, update), table).unwrap_or(false);
        if !patched {
            tracing::warn!(table, id, "entity not found for update");
        }
        patched
    }

    /// Remove an entity. `false` when it did not exist.
    pub fn delete_entity(&self, table: &str, id: &str) -> bool {
        absorb(self.tier.delete(table, id), table).unwrap_or(false)
    }

    /// Every entity in insertion order.
    pub fn entities(&self, table: &str) -> Vec<MemoryEntry> {
        absorb(self.tier.entries(table), table).unwrap_or_default()
    }

    /// Up to `n` entities, most recently written first.
    pub fn list_entities(&self, table: &str, n: usize) -> Vec<MemoryEntry> {
        absorb(self.tier.list(table, n), table).unwrap_or_default()
    }

    // ── Housekeeping ────────────────────────────────────────────

    pub fn summary(&self) -> MemorySummary {
        let count = |name: &str| absorb(self.tier.len(name), name).unwrap_or(0);
        MemorySummary {
            logs: tables::logs().map(|name| (name.to_string(), count(name))).collect(),
            entities: tables::objects()
                .map(|name| (name.to_string(), count(name)))
                .collect(),
            agent_state_at: self.agent_state().map(|entry| entry.timestamp),
            durable: self.tier.is_durable(),
            backend: self.tier.backend_name().map(str::to_string),
        }
    }

    /// Block until every write so far has reached the durable backend.
    pub fn flush(&self) {
        self.tier.flush();
    }
}

fn absorb<T>(result: Result<T, StoreError>, table: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(table, "memory operation failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn events_filter_by_category_and_severity() {
        let memory = MemoryService::in_memory();
        memory.create_event(EventCategory::Chat, json!({"m": 1}), Severity::INFO);
        memory.create_event(EventCategory::SystemEvent, json!({"m": 2}), Severity::CRITICAL);
        memory.create_event(EventCategory::Chat, json!({"m": 3}), Severity::HIGH);

        assert_eq!(memory.recent_events(2).len(), 2);
        assert_eq!(memory.recent_events(2)[0].payload["m"], 2);

        let chats = memory.events_of(EventCategory::Chat, 10);
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[1].payload["m"], 3);

        let serious = memory.events_at_least(Severity::HIGH, 10);
        let ms: Vec<i64> = serious.iter().map(|e| e.payload["m"].as_i64().unwrap()).collect();
        assert_eq!(ms, vec![2, 3]);
    }

    #[test]
    fn chat_search_ignores_case() {
        let memory = MemoryService::in_memory();
        memory.add_chat_message("Steve", "Found DIAMONDS at y=12");
        memory.add_chat_message("alex", "hello");
        memory.add_chat_message("Notch", "nothing here");

        assert_eq!(memory.search_chat("diamonds").len(), 1);
        assert_eq!(memory.search_chat("STEVE").len(), 1);
        assert_eq!(memory.search_chat("o").len(), 3);
        assert_eq!(memory.recent_chat(2)[1].data["username"], "Notch");
    }

    #[test]
    fn commands_are_logged_with_outcome() {
        let memory = MemoryService::in_memory();
        memory.add_command("/dig", true);
        memory.add_command("/fly", false);
        let commands = memory.recent_commands(10);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].data["success"], false);
    }

    #[test]
    fn record_into_unknown_log_is_a_sentinel() {
        let memory = MemoryService::in_memory();
        assert!(memory.record("nope", "x", json!({})).is_none());
        assert!(memory.record(tables::GOALS, "x", json!({})).is_none());
        assert!(memory.record(tables::DISCOVERY, "ore", json!({})).is_some());
    }

    #[test]
    fn entity_crud() {
        let memory = MemoryService::in_memory();
        assert!(memory.put_entity(tables::MEMORY, "home", "place", json!({"x": 1, "y": 64})));
        assert!(memory.update_entity(tables::MEMORY, "home", &json!({"y": 70})));
        assert!(!memory.update_entity(tables::MEMORY, "away", &json!({})));

        let home = memory.entity(tables::MEMORY, "home").unwrap();
        assert_eq!(home.data, json!({"x": 1, "y": 70}));

        assert!(memory.delete_entity(tables::MEMORY, "home"));
        assert!(!memory.delete_entity(tables::MEMORY, "home"));
        assert!(memory.entities(tables::MEMORY).is_empty());
    }

    #[test]
    fn agent_state_is_replaced_wholesale() {
        let memory = MemoryService::in_memory();
        assert!(memory.agent_state().is_none());
        memory.update_agent_state(json!({"health": 20, "food": 18}));
        memory.update_agent_state(json!({"health": 5}));
        let state = memory.agent_state().unwrap();
        assert_eq!(state.data, json!({"health": 5}));
    }

    #[test]
    fn summary_counts_rows() {
        let memory = MemoryService::in_memory();
        memory.add_chat_message("a", "b");
        memory.put_entity(tables::GOALS, "g", "goal", json!({}));
        let summary = memory.summary();
        assert_eq!(summary.logs["chat"], 1);
        assert_eq!(summary.logs["event"], 0);
        assert_eq!(summary.entities["goals"], 1);
        assert!(summary.agent_state_at.is_none());
        assert!(!summary.durable);
    }

    #[test]
    fn file_backed_memory_reloads() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::file(dir.path().join("store"));
        {
            let memory = MemoryService::open(&config);
            assert!(memory.is_durable());
            memory.create_event(EventCategory::Discovery, json!({"ore": "iron"}), Severity::LOW);
            memory.update_agent_state(json!({"health": 17}));
            memory.flush();
        }
        let memory = MemoryService::open(&config);
        assert_eq!(memory.events_of(EventCategory::Discovery, 5).len(), 1);
        assert_eq!(memory.agent_state().unwrap().data["health"], 17);
    }
}
