// replica.rs — Background replication to the durable backend.
//
// Writes reach the backend through a channel drained by a single worker
// thread that owns the backend. One consumer means ops are applied in exactly
// the order the tier submitted them. Failures are logged and dropped; the
// local mirror stays authoritative and nothing is retried.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::backend::DurableBackend;
use crate::entry::MemoryEntry;
use crate::error::StoreError;

/// One unit of replication work.
pub(crate) enum ReplicaOp {
    PushLog {
        table: String,
        entry: MemoryEntry,
        max_len: usize,
    },
    PutObject {
        table: String,
        entry: MemoryEntry,
    },
    DeleteObject {
        table: String,
        id: String,
    },
    SetSingleton {
        table: String,
        entry: MemoryEntry,
    },
    /// Acknowledged once every earlier op has been applied.
    Flush(Sender<()>),
}

/// Handle to the replication worker.
pub(crate) struct Replica {
    sender: Option<Sender<ReplicaOp>>,
    worker: Option<JoinHandle<()>>,
    backend_name: String,
}

impl Replica {
    /// Move `backend` onto a new worker thread.
    pub(crate) fn spawn(backend: Box<dyn DurableBackend>) -> Result<Self, StoreError> {
        let backend_name = backend.name().to_string();
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name(format!("cairn-replica-{}", backend_name))
            .spawn(move || run(backend, receiver))
            .map_err(|e| StoreError::BackendUnavailable {
                backend: backend_name.clone(),
                reason: format!("failed to start replication worker: {}", e),
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
            backend_name,
        })
    }

    pub(crate) fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Queue an op. Never blocks on the backend.
    pub(crate) fn submit(&self, op: ReplicaOp) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(op).is_err() {
            tracing::warn!(backend = %self.backend_name, "replication worker has stopped, write not replicated");
        }
    }

    /// Block until every op queued so far has been applied.
    pub(crate) fn flush(&self) {
        let (ack, done) = mpsc::channel();
        self.submit(ReplicaOp::Flush(ack));
        // An error here means the worker is gone; nothing left to wait for.
        let _ = done.recv();
    }
}

impl Drop for Replica {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after the queue drains.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(backend = %self.backend_name, "replication worker panicked");
            }
        }
    }
}

fn run(mut backend: Box<dyn DurableBackend>, receiver: Receiver<ReplicaOp>) {
    for op in receiver {
        let (table, result) = match op {
            ReplicaOp::PushLog {
                table,
                entry,
                max_len,
            } => {
                let result = backend
                    .push_log(&table, &entry)
                    .and_then(|()| backend.trim_log(&table, max_len));
                (table, result)
            }
            ReplicaOp::PutObject { table, entry } => {
                let result = backend.put_object(&table, &entry);
                (table, result)
            }
            ReplicaOp::DeleteObject { table, id } => {
                let result = backend.delete_object(&table, &id);
                (table, result)
            }
            ReplicaOp::SetSingleton { table, entry } => {
                let result = backend.set_singleton(&table, &entry);
                (table, result)
            }
            ReplicaOp::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        if let Err(e) = result {
            tracing::warn!(backend = backend.name(), table = %table, "failed to replicate write: {}", e);
        }
    }
}
