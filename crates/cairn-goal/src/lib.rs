//! # cairn-goal
//!
//! Goal and milestone lifecycle for an autonomous agent.
//!
//! A [`Goal`] is a long-running intention with an ordered list of
//! [`Milestone`]s. The [`GoalManager`] keeps the invariants:
//!
//! - at most one goal is active, and at most one milestone per goal;
//! - completing the last open milestone completes the goal, and completing
//!   a goal completes all of its milestones;
//! - when the active goal finishes (or is archived or deleted) the
//!   highest-priority open goal takes over, earliest-created first on ties;
//! - `progress` always reflects the completed share of milestones.
//!
//! State lives in a [`cairn_memory::MemoryService`], so it survives restarts
//! whenever the memory has a durable backend.
//!
//! ```
//! use std::sync::Arc;
//! use cairn_goal::{GoalManager, GoalStatus, NewGoal, Priority};
//! use cairn_memory::MemoryService;
//!
//! let mut goals = GoalManager::new(Arc::new(MemoryService::in_memory()));
//! let goal = goals.create_goal(
//!     NewGoal::new("mine_diamonds")
//!         .priority(Priority::High)
//!         .milestone("find cave")
//!         .milestone("mine ore")
//!         .activate(),
//! );
//! for milestone in &goal.milestones {
//!     goals.complete_milestone(milestone.id);
//! }
//! assert_eq!(goals.get_goal(goal.id).unwrap().status, GoalStatus::Completed);
//! ```

pub mod error;
pub mod events;
pub mod manager;
pub mod model;
pub mod status;

pub use error::GoalError;
pub use events::{EventDispatcher, GoalEvent, LogSink, MemorySink, NotificationSink};
pub use manager::{FollowUp, GoalManager, SharedGoalManager};
pub use model::{
    Execute, Goal, GoalFilter, GoalStatus, GoalType, GoalUpdate, Milestone, MilestoneUpdate,
    NewGoal, NewMilestone, Priority,
};
pub use status::AgentStatus;
