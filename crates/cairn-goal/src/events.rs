// events.rs — Goal lifecycle events and notification dispatch.
//
// The manager emits a GoalEvent at every transition. Sinks subscribe to
// them: the memory sink (always installed) writes each one into the agent's
// event log as `goal-progress`; the log sink appends JSONL to a file.
//
// Dispatch is synchronous and happens after the transition is persisted.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cairn_memory::{EventCategory, MemoryService, Severity};
use cairn_store::now_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::model::{Goal, GoalStatus, Milestone, Priority};

/// Events emitted at goal and milestone transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GoalEvent {
    GoalCreated {
        goal_id: Uuid,
        name: String,
        priority: Priority,
        status: GoalStatus,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    GoalStatusChanged {
        goal_id: Uuid,
        name: String,
        from: GoalStatus,
        to: GoalStatus,
        progress: u8,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    GoalDeleted {
        goal_id: Uuid,
        name: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    MilestoneCreated {
        goal_id: Uuid,
        milestone_id: Uuid,
        name: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    MilestoneStatusChanged {
        goal_id: Uuid,
        milestone_id: Uuid,
        name: String,
        from: GoalStatus,
        to: GoalStatus,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },

    MilestoneDeleted {
        goal_id: Uuid,
        milestone_id: Uuid,
        name: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
}

impl GoalEvent {
    pub fn event_type(&self) -> &str {
        match self {
            GoalEvent::GoalCreated { .. } => "goal_created",
            GoalEvent::GoalStatusChanged { .. } => "goal_status_changed",
            GoalEvent::GoalDeleted { .. } => "goal_deleted",
            GoalEvent::MilestoneCreated { .. } => "milestone_created",
            GoalEvent::MilestoneStatusChanged { .. } => "milestone_status_changed",
            GoalEvent::MilestoneDeleted { .. } => "milestone_deleted",
        }
    }

    /// How important the event is for the agent's event log.
    pub fn severity(&self) -> Severity {
        match self {
            GoalEvent::GoalStatusChanged {
                to: GoalStatus::Completed,
                ..
            } => Severity::MEDIUM,
            GoalEvent::GoalCreated {
                priority: Priority::Critical,
                ..
            } => Severity::HIGH,
            GoalEvent::MilestoneStatusChanged {
                to: GoalStatus::Completed,
                ..
            } => Severity::LOW,
            _ => Severity::INFO,
        }
    }

    pub fn goal_created(goal: &Goal) -> Self {
        GoalEvent::GoalCreated {
            goal_id: goal.id,
            name: goal.name.clone(),
            priority: goal.priority,
            status: goal.status,
            timestamp: now_millis(),
        }
    }

    pub fn goal_status_changed(goal: &Goal, from: GoalStatus) -> Self {
        GoalEvent::GoalStatusChanged {
            goal_id: goal.id,
            name: goal.name.clone(),
            from,
            to: goal.status,
            progress: goal.progress,
            timestamp: now_millis(),
        }
    }

    pub fn goal_deleted(goal: &Goal) -> Self {
        GoalEvent::GoalDeleted {
            goal_id: goal.id,
            name: goal.name.clone(),
            timestamp: now_millis(),
        }
    }

    pub fn milestone_created(milestone: &Milestone) -> Self {
        GoalEvent::MilestoneCreated {
            goal_id: milestone.parent_goal_id,
            milestone_id: milestone.id,
            name: milestone.name.clone(),
            timestamp: now_millis(),
        }
    }

    pub fn milestone_status_changed(milestone: &Milestone, from: GoalStatus) -> Self {
        GoalEvent::MilestoneStatusChanged {
            goal_id: milestone.parent_goal_id,
            milestone_id: milestone.id,
            name: milestone.name.clone(),
            from,
            to: milestone.status,
            timestamp: now_millis(),
        }
    }

    pub fn milestone_deleted(milestone: &Milestone) -> Self {
        GoalEvent::MilestoneDeleted {
            goal_id: milestone.parent_goal_id,
            milestone_id: milestone.id,
            name: milestone.name.clone(),
            timestamp: now_millis(),
        }
    }
}

/// Receives goal events from the [`EventDispatcher`].
pub trait NotificationSink: Send {
    /// Short label used when a delivery fails.
    fn name(&self) -> &str {
        "sink"
    }

    fn send(&self, event: &GoalEvent) -> Result<(), GoalError>;
}

/// Records events in the agent's memory as `goal-progress` events.
pub struct MemorySink {
    memory: Arc<MemoryService>,
}

impl MemorySink {
    pub fn new(memory: Arc<MemoryService>) -> Self {
        Self { memory }
    }
}

impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn send(&self, event: &GoalEvent) -> Result<(), GoalError> {
        let payload = serde_json::to_value(event)?;
        self.memory
            .create_event(EventCategory::GoalProgress, payload, event.severity());
        Ok(())
    }
}

/// Appends one JSON line per event to a file.
///
/// The file (and its parent directory) is created on the first event and
/// the handle kept open. A failed write drops the handle so the next event
/// reopens the file.
pub struct LogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File, GoalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| io_error(&self.path, source))
    }
}

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, event: &GoalEvent) -> Result<(), GoalError> {
        let line = serde_json::to_string(event)?;
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = match guard.take() {
            Some(file) => file,
            None => self.open()?,
        };
        writeln!(file, "{}", line).map_err(|source| io_error(&self.path, source))?;
        *guard = Some(file);
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> GoalError {
    GoalError::IoError {
        path: path.display().to_string(),
        source,
    }
}

/// Fans each event out to every registered sink, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver `event`, returning how many sinks accepted it. A failing sink
    /// is logged and skipped.
    pub fn dispatch(&self, event: &GoalEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match sink.send(event) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    sink = sink.name(),
                    event_type = event.event_type(),
                    "goal event not delivered: {}",
                    e
                ),
            }
        }
        tracing::debug!(event_type = event.event_type(), delivered, "goal event dispatched");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GoalType, NewMilestone};
    use tempfile::tempdir;

    fn sample_goal() -> Goal {
        let id = Uuid::new_v4();
        Goal {
            id,
            name: "mine_diamonds".to_string(),
            goal_type: GoalType::Goal,
            priority: Priority::High,
            status: GoalStatus::Pending,
            milestones: vec![Milestone::new(id, NewMilestone::new("find cave"))],
            created_at: now_millis(),
            completed_at: None,
            progress: 0,
            execute: None,
        }
    }

    /// Sink that always fails.
    struct BrokenSink;

    impl NotificationSink for BrokenSink {
        fn send(&self, _: &GoalEvent) -> Result<(), GoalError> {
            Err(GoalError::NotificationError("sink offline".to_string()))
        }
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = GoalEvent::goal_created(&sample_goal());
        let json = serde_json::to_string(&event).unwrap();
        let restored: GoalEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event, restored);
        assert!(json.contains("\"goal_created\""));
    }

    #[test]
    fn log_sink_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("goal-events.jsonl");
        let sink = LogSink::new(&path);
        let goal = sample_goal();

        sink.send(&GoalEvent::goal_created(&goal)).unwrap();
        sink.send(&GoalEvent::milestone_created(&goal.milestones[0]))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("milestone_created"));
    }

    #[test]
    fn memory_sink_records_goal_progress() {
        let memory = Arc::new(MemoryService::in_memory());
        let sink = MemorySink::new(memory.clone());
        let mut goal = sample_goal();
        goal.status = GoalStatus::Completed;

        sink.send(&GoalEvent::goal_status_changed(&goal, GoalStatus::Active))
            .unwrap();

        let events = memory.events_of(EventCategory::GoalProgress, 10);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::MEDIUM);
        assert_eq!(events[0].payload["event_type"], "goal_status_changed");
        assert_eq!(events[0].payload["to"], "completed");
    }

    #[test]
    fn broken_sink_does_not_stop_dispatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(BrokenSink));
        dispatcher.add_sink(Box::new(LogSink::new(&path)));
        let delivered = dispatcher.dispatch(&GoalEvent::goal_deleted(&sample_goal()));

        assert_eq!(dispatcher.sink_count(), 2);
        assert_eq!(delivered, 1);
        assert!(fs::read_to_string(&path).unwrap().contains("goal_deleted"));
    }
}
