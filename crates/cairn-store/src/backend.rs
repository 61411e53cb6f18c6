// backend.rs — DurableBackend trait: the replica behind the local mirror.
//
// The tier owns the read-of-record copy of every table in memory. A durable
// backend only has to accept writes in order and hand everything back on the
// next process start. Implementations can be a directory of JSON files (the
// shipped `FileBackend`), a key/value server, or a test double.

use crate::entry::MemoryEntry;
use crate::error::StoreError;

/// A durable store that replicates the tier's tables.
///
/// Methods take `&mut self`: the tier moves the backend onto a single
/// replication worker thread, so there is never more than one caller.
pub trait DurableBackend: Send {
    /// Backend display name (for logs).
    fn name(&self) -> &str;

    /// Establish the connection. Called exactly once, on a helper thread,
    /// bounded by the tier's connect timeout.
    fn connect(&mut self) -> Result<(), StoreError>;

    /// Append one entry to a log table.
    fn push_log(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError>;

    /// Drop the oldest entries once the log outgrows `max_len`. A backend
    /// may batch this and keep a few extra entries between trims, as long
    /// as [`DurableBackend::load_log`] returns at most `max_len`.
    fn trim_log(&mut self, table: &str, max_len: usize) -> Result<(), StoreError>;

    /// Load up to `max_len` of the newest log entries, oldest first.
    fn load_log(&mut self, table: &str, max_len: usize) -> Result<Vec<MemoryEntry>, StoreError>;

    /// Insert or overwrite an entity and record its id in the table index.
    fn put_object(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError>;

    /// Remove an entity and its index entry. Missing ids are not an error.
    fn delete_object(&mut self, table: &str, id: &str) -> Result<(), StoreError>;

    /// Load every indexed entity, in index order.
    fn load_objects(&mut self, table: &str) -> Result<Vec<MemoryEntry>, StoreError>;

    /// Replace the singleton record.
    fn set_singleton(&mut self, table: &str, entry: &MemoryEntry) -> Result<(), StoreError>;

    /// Load the singleton record, if one was ever written.
    fn load_singleton(&mut self, table: &str) -> Result<Option<MemoryEntry>, StoreError>;
}
