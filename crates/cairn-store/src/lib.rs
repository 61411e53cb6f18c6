//! # cairn-store
//!
//! Tiered persistence for agent memory.
//!
//! Every table is registered once with a [`TableShape`]:
//!
//! - **Log** — append-only, time-ordered, capacity-bounded (FIFO eviction).
//! - **Object** — keyed entities with an ordered index of live ids.
//! - **Singleton** — exactly one live record, no id.
//!
//! The [`PersistenceTier`] keeps a local mirror of every table. That mirror is
//! the read-of-record: callers always observe their own writes immediately.
//! When a [`DurableBackend`] connects within the configured timeout, each
//! write is also replicated to it by a single background worker, in order.
//! When it does not, the tier silently runs on the mirror alone for the rest
//! of the process.
//!
//! ## Quick Example
//!
//! ```rust
//! use cairn_store::{MemoryEntry, PersistenceTier, TableShape};
//!
//! let tier = PersistenceTier::builder()
//!     .table("event", TableShape::Log)
//!     .table("goals", TableShape::Object)
//!     .build();
//!
//! tier.append("event", MemoryEntry::new("system-event", serde_json::json!({"boot": true})))
//!     .unwrap();
//! assert_eq!(tier.read("event", 10).unwrap().len(), 1);
//! ```

pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod file_backend;
mod replica;
pub mod table;
pub mod tier;

pub use backend::DurableBackend;
pub use config::{BackendKind, StoreConfig};
pub use entry::{merge_data, now_millis, MemoryEntry};
pub use error::StoreError;
pub use file_backend::FileBackend;
pub use table::{LogTable, ObjectTable, SingletonTable, Table, TableShape};
pub use tier::{PersistenceTier, TierBuilder};
