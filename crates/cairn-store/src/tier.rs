// tier.rs — PersistenceTier: local mirror plus best-effort durable replica.
//
// Every operation updates the in-memory mirror first and returns; the
// durable backend (if one connected at startup) receives the same write
// asynchronously through the replication worker. The mirror and the replica
// queue are updated under the same lock, so concurrent writers are replicated
// in the same order they were applied locally.
//
// Startup:
//   1. One connect attempt on a helper thread, bounded by `connect_timeout`.
//   2. On success, every registered table is loaded into its mirror.
//   3. On failure or timeout, the durable path is disabled for good.

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde_json::Value;

use crate::backend::DurableBackend;
use crate::config::{StoreConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_LOG_SIZE};
use crate::entry::MemoryEntry;
use crate::error::StoreError;
use crate::replica::{Replica, ReplicaOp};
use crate::table::{LogTable, ObjectTable, SingletonTable, Table, TableShape};

/// Builder that registers tables and picks the durable backend.
pub struct TierBuilder {
    tables: Vec<(String, TableShape)>,
    backend: Option<Box<dyn DurableBackend>>,
    connect_timeout: Duration,
    max_log_size: usize,
}

impl TierBuilder {
    fn new() -> Self {
        Self {
            tables: Vec::new(),
            backend: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_log_size: DEFAULT_MAX_LOG_SIZE,
        }
    }

    /// Builder preloaded with the backend, timeout, and log size from config.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut builder = Self::new()
            .connect_timeout(config.connect_timeout())
            .max_log_size(config.max_log_size);
        builder.backend = config.durable_backend();
        builder
    }

    /// Register a table. Registering the same name twice keeps the last shape.
    pub fn table(mut self, name: impl Into<String>, shape: TableShape) -> Self {
        let name = name.into();
        self.tables.retain(|(existing, _)| existing != &name);
        self.tables.push((name, shape));
        self
    }

    pub fn backend(mut self, backend: Box<dyn DurableBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Run without a durable backend.
    pub fn in_memory(mut self) -> Self {
        self.backend = None;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn max_log_size(mut self, max_log_size: usize) -> Self {
        self.max_log_size = max_log_size.max(1);
        self
    }

    /// Connect (bounded), load every table, and start replication.
    ///
    /// Never fails: an unreachable backend degrades to in-memory storage.
    pub fn build(self) -> PersistenceTier {
        let mut tables: HashMap<String, Table> = self
            .tables
            .iter()
            .map(|(name, shape)| (name.clone(), Table::new(*shape, self.max_log_size)))
            .collect();

        let replica = match self.backend {
            None => {
                tracing::info!("no durable backend configured, using in-memory storage");
                None
            }
            Some(backend) => match connect_with_timeout(backend, self.connect_timeout) {
                Ok(mut backend) => {
                    tracing::info!(backend = backend.name(), "connected to durable backend");
                    load_tables(backend.as_mut(), &mut tables, self.max_log_size);
                    match Replica::spawn(backend) {
                        Ok(replica) => Some(replica),
                        Err(e) => {
                            tracing::info!("{}, using in-memory storage only", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    tracing::info!("{}, using in-memory storage only", e);
                    None
                }
            },
        };

        PersistenceTier {
            tables: Mutex::new(tables),
            replica,
            max_log_size: self.max_log_size,
        }
    }
}

/// Tables of all three shapes behind one lock, replicated when possible.
pub struct PersistenceTier {
    tables: Mutex<HashMap<String, Table>>,
    replica: Option<Replica>,
    max_log_size: usize,
}

impl PersistenceTier {
    pub fn builder() -> TierBuilder {
        TierBuilder::new()
    }

    /// Whether writes are being replicated to a durable backend.
    pub fn is_durable(&self) -> bool {
        self.replica.is_some()
    }

    /// Name of the connected durable backend, if any.
    pub fn backend_name(&self) -> Option<&str> {
        self.replica.as_ref().map(Replica::backend_name)
    }

    pub fn max_log_size(&self) -> usize {
        self.max_log_size
    }

    /// Registered table names with their shapes, sorted by name.
    pub fn tables(&self) -> Vec<(String, TableShape)> {
        let tables = self.lock();
        let mut shapes: Vec<(String, TableShape)> = tables
            .iter()
            .map(|(name, table)| (name.clone(), table.shape()))
            .collect();
        shapes.sort();
        shapes
    }

    /// Number of live records in a table.
    pub fn len(&self, table: &str) -> Result<usize, StoreError> {
        let mut tables = self.lock();
        Ok(table_mut(&mut tables, table)?.len())
    }

    // ── Log tables ──────────────────────────────────────────────

    /// Append to a log table.
    pub fn append(&self, table: &str, entry: MemoryEntry) -> Result<(), StoreError> {
        let mut tables = self.lock();
        log_mut(&mut tables, table)?.append(entry.clone());
        self.replicate(ReplicaOp::PushLog {
            table: table.to_string(),
            entry,
            max_len: self.max_log_size,
        });
        Ok(())
    }

    /// The `n` most recent entries of a log table, oldest first.
    pub fn read(&self, table: &str, n: usize) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut tables = self.lock();
        Ok(log_mut(&mut tables, table)?.read(n))
    }

    // ── Object tables ───────────────────────────────────────────

    /// Insert or overwrite an entity. `entry.id` is set to `id`.
    pub fn put(&self, table: &str, id: &str, mut entry: MemoryEntry) -> Result<(), StoreError> {
        entry.id = id.to_string();
        let mut tables = self.lock();
        object_mut(&mut tables, table)?.put(entry.clone());
        self.replicate(ReplicaOp::PutObject {
            table: table.to_string(),
            entry,
        });
        Ok(())
    }

    pub fn get(&self, table: &str, id: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let mut tables = self.lock();
        Ok(object_mut(&mut tables, table)?.get(id).cloned())
    }

    /// Shallow-merge `update` into an entity's data. Returns `false` when the
    /// id does not exist.
    pub fn patch(&self, table: &str, id: &str, update: &Value) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        match object_mut(&mut tables, table)?.patch(id, update) {
            Some(entry) => {
                self.replicate(ReplicaOp::PutObject {
                    table: table.to_string(),
                    entry,
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove an entity. Returns whether it existed.
    pub fn delete(&self, table: &str, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let existed = object_mut(&mut tables, table)?.delete(id).is_some();
        if existed {
            self.replicate(ReplicaOp::DeleteObject {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(existed)
    }

    /// Up to `n` entities, most recent timestamp first.
    pub fn list(&self, table: &str, n: usize) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut tables = self.lock();
        Ok(object_mut(&mut tables, table)?.list(n))
    }

    /// Every entity in insertion order.
    pub fn entries(&self, table: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut tables = self.lock();
        Ok(object_mut(&mut tables, table)?.entries().to_vec())
    }

    // ── Singleton tables ────────────────────────────────────────

    pub fn get_singleton(&self, table: &str) -> Result<Option<MemoryEntry>, StoreError> {
        let mut tables = self.lock();
        Ok(singleton_mut(&mut tables, table)?.get().cloned())
    }

    pub fn set_singleton(&self, table: &str, entry: MemoryEntry) -> Result<(), StoreError> {
        let mut tables = self.lock();
        singleton_mut(&mut tables, table)?.set(entry.clone());
        self.replicate(ReplicaOp::SetSingleton {
            table: table.to_string(),
            entry,
        });
        Ok(())
    }

    /// Shallow-merge into the singleton, creating it when absent.
    pub fn patch_singleton(&self, table: &str, update: &Value) -> Result<MemoryEntry, StoreError> {
        let mut tables = self.lock();
        let entry = singleton_mut(&mut tables, table)?.patch(table, update);
        self.replicate(ReplicaOp::SetSingleton {
            table: table.to_string(),
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Block until every write made so far has reached the durable backend.
    /// Returns immediately when running in-memory.
    pub fn flush(&self) {
        if let Some(replica) = &self.replica {
            replica.flush();
        }
    }

    fn replicate(&self, op: ReplicaOp) {
        if let Some(replica) = &self.replica {
            replica.submit(op);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Table>> {
        // Every mutation completes before the guard drops, so a panic
        // elsewhere cannot leave a table half-written.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut Table, StoreError> {
    tables
        .get_mut(name)
        .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

fn shape_mismatch(name: &str, expected: TableShape, actual: TableShape) -> StoreError {
    StoreError::ShapeMismatch {
        table: name.to_string(),
        expected,
        actual,
    }
}

fn log_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut LogTable, StoreError> {
    match table_mut(tables, name)? {
        Table::Log(log) => Ok(log),
        other => Err(shape_mismatch(name, TableShape::Log, other.shape())),
    }
}

fn object_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut ObjectTable, StoreError> {
    match table_mut(tables, name)? {
        Table::Object(objects) => Ok(objects),
        other => Err(shape_mismatch(name, TableShape::Object, other.shape())),
    }
}

fn singleton_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut SingletonTable, StoreError> {
    match table_mut(tables, name)? {
        Table::Singleton(single) => Ok(single),
        other => Err(shape_mismatch(name, TableShape::Singleton, other.shape())),
    }
}

/// Run `connect` on a helper thread and wait at most `timeout` for it.
///
/// A connect that outlives the timeout keeps running on its thread; its
/// result is discarded and the backend is dropped with it.
fn connect_with_timeout(
    mut backend: Box<dyn DurableBackend>,
    timeout: Duration,
) -> Result<Box<dyn DurableBackend>, StoreError> {
    let name = backend.name().to_string();
    let (sender, receiver) = mpsc::channel();

    thread::Builder::new()
        .name(format!("cairn-connect-{}", name))
        .spawn(move || {
            let result = match backend.connect() {
                Ok(()) => Ok(backend),
                Err(e) => Err(e),
            };
            // The receiver is gone if we already timed out.
            let _ = sender.send(result);
        })
        .map_err(|e| StoreError::BackendUnavailable {
            backend: name.clone(),
            reason: format!("failed to start connect thread: {}", e),
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(StoreError::ConnectTimeout {
            backend: name,
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(StoreError::BackendUnavailable {
            backend: name,
            reason: "connect thread exited without a result".to_string(),
        }),
    }
}

/// Fill every mirror from the backend. A table that fails to load stays empty.
fn load_tables(
    backend: &mut dyn DurableBackend,
    tables: &mut HashMap<String, Table>,
    max_log_size: usize,
) {
    for (name, table) in tables.iter_mut() {
        let loaded = match table {
            Table::Log(log) => backend
                .load_log(name, max_log_size)
                .map(|entries| log.replace(entries)),
            Table::Object(objects) => backend
                .load_objects(name)
                .map(|entries| objects.replace(entries)),
            Table::Singleton(single) => backend.load_singleton(name).map(|entry| {
                if let Some(entry) = entry {
                    single.set(entry);
                }
            }),
        };
        match loaded {
            Ok(()) => tracing::debug!(table = %name, rows = table.len(), "loaded table from durable backend"),
            Err(e) => tracing::warn!(table = %name, "failed to load table from durable backend: {}", e),
        }
    }
}
