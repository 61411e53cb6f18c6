//! # cairn-memory
//!
//! The agent's memory: a typed layer over [`cairn_store::PersistenceTier`].
//!
//! [`MemoryService`] registers the agent's tables once, at startup, and
//! exposes typed operations on them:
//!
//! - categorized events with a 0–10 [`Severity`] ([`MemoryService::create_event`])
//! - chat and command history
//! - keyed entities (goals, remembered things)
//! - the single authoritative agent-state record
//!
//! No business validation happens here. The goal manager and agent façade
//! decide what to write; this crate only decides where it goes.

pub mod event;
pub mod service;
pub mod tables;

pub use event::{EventCategory, EventRecord, Severity};
pub use service::{MemoryService, MemorySummary};
