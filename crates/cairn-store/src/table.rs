// table.rs — The three table shapes and their local (in-process) storage.
//
// A table's shape is decided once, when it is registered with the tier.
// Operations then dispatch on the `Table` variant instead of re-deriving the
// shape from the table name on every call.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::MemoryEntry;

/// The storage shape of a registered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    /// Append-only, time-ordered, capacity-bounded.
    Log,
    /// Keyed entities.
    Object,
    /// Exactly one live record.
    Singleton,
}

impl fmt::Display for TableShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableShape::Log => write!(f, "log"),
            TableShape::Object => write!(f, "object"),
            TableShape::Singleton => write!(f, "singleton"),
        }
    }
}

/// Bounded append-only list. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct LogTable {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
}

impl LogTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry, trimming from the front once over capacity.
    pub fn append(&mut self, entry: MemoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// The `n` most recent entries, oldest first.
    pub fn read(&self, n: usize) -> Vec<MemoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Replace the contents (used when loading from the durable backend).
    pub fn replace(&mut self, entries: Vec<MemoryEntry>) {
        self.entries.clear();
        for entry in entries {
            self.append(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keyed entities, kept in insertion order.
///
/// The order of `entries` doubles as the index of live ids. Volumes are small
/// (goals, remembered things), so lookups are linear.
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    entries: Vec<MemoryEntry>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. An overwritten entity keeps its position.
    pub fn put(&mut self, entry: MemoryEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, id: &str) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Shallow-merge `update` into the entity's data. Returns the updated
    /// entry, or `None` when the id is not present.
    pub fn patch(&mut self, id: &str, update: &Value) -> Option<MemoryEntry> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.merge(update);
        Some(entry.clone())
    }

    /// Remove an entity, returning it if it existed.
    pub fn delete(&mut self, id: &str) -> Option<MemoryEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Up to `n` entries, most recent timestamp first. Equal timestamps put
    /// the later-inserted entity first.
    pub fn list(&self, n: usize) -> Vec<MemoryEntry> {
        let mut indexed: Vec<(usize, &MemoryEntry)> = self.entries.iter().enumerate().collect();
        indexed.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then(b.0.cmp(&a.0)));
        indexed.into_iter().take(n).map(|(_, e)| e.clone()).collect()
    }

    /// Every entry in insertion order.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Live ids in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn replace(&mut self, entries: Vec<MemoryEntry>) {
        self.entries.clear();
        for entry in entries {
            self.put(entry);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A table holding at most one record.
#[derive(Debug, Clone, Default)]
pub struct SingletonTable {
    entry: Option<MemoryEntry>,
}

impl SingletonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&MemoryEntry> {
        self.entry.as_ref()
    }

    pub fn set(&mut self, entry: MemoryEntry) {
        self.entry = Some(entry);
    }

    /// Shallow-merge into the record, creating it (id and kind = `name`)
    /// when none exists yet.
    pub fn patch(&mut self, name: &str, update: &Value) -> MemoryEntry {
        let entry = self
            .entry
            .get_or_insert_with(|| MemoryEntry::with_id(name, name, Value::Object(Default::default())));
        entry.merge(update);
        entry.clone()
    }
}

/// A registered table, tagged by shape.
#[derive(Debug, Clone)]
pub enum Table {
    Log(LogTable),
    Object(ObjectTable),
    Singleton(SingletonTable),
}

impl Table {
    /// Create an empty table of the given shape.
    pub fn new(shape: TableShape, log_capacity: usize) -> Self {
        match shape {
            TableShape::Log => Table::Log(LogTable::new(log_capacity)),
            TableShape::Object => Table::Object(ObjectTable::new()),
            TableShape::Singleton => Table::Singleton(SingletonTable::new()),
        }
    }

    pub fn shape(&self) -> TableShape {
        match self {
            Table::Log(_) => TableShape::Log,
            Table::Object(_) => TableShape::Object,
            Table::Singleton(_) => TableShape::Singleton,
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        match self {
            Table::Log(log) => log.len(),
            Table::Object(objects) => objects.len(),
            Table::Singleton(single) => usize::from(single.get().is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
