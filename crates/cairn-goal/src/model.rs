// model.rs — Goal and Milestone records plus the request types that create
// and change them.
//
// A Goal owns its milestones: they are embedded in the goal record, in
// insertion order, and are stored and deleted together with it.
//
// Lifecycle of both:
//   pending → active → completed
//   archived is set only by an operator.

use std::fmt;
use std::str::FromStr;

use cairn_store::now_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of work a goal or milestone represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    /// Open-ended exploration.
    Discovery,
    /// A concrete objective.
    Goal,
    /// A single command or short command sequence.
    Command,
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalType::Discovery => write!(f, "discovery"),
            GoalType::Goal => write!(f, "goal"),
            GoalType::Command => write!(f, "command"),
        }
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discovery" => Ok(GoalType::Discovery),
            "goal" => Ok(GoalType::Goal),
            "command" => Ok(GoalType::Command),
            other => Err(format!(
                "unknown goal type '{}' (expected discovery, goal, or command)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Succession weight: higher wins.
    pub fn weight(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!(
                "unknown priority '{}' (expected critical, high, medium, or low)",
                other
            )),
        }
    }
}

/// Status shared by goals and milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Archived,
}

impl GoalStatus {
    /// Pending or active: still has work left.
    pub fn is_open(&self) -> bool {
        matches!(self, GoalStatus::Pending | GoalStatus::Active)
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Pending => write!(f, "pending"),
            GoalStatus::Active => write!(f, "active"),
            GoalStatus::Completed => write!(f, "completed"),
            GoalStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(GoalStatus::Pending),
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "archived" => Ok(GoalStatus::Archived),
            other => Err(format!(
                "unknown status '{}' (expected pending, active, completed, or archived)",
                other
            )),
        }
    }
}

/// Commands attached to a goal or milestone. Opaque to this crate: stored
/// and handed to an executor, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Execute {
    One(String),
    Many(Vec<String>),
}

impl Execute {
    /// The commands in order.
    pub fn commands(&self) -> Vec<&str> {
        match self {
            Execute::One(command) => vec![command.as_str()],
            Execute::Many(commands) => commands.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for Execute {
    fn from(command: &str) -> Self {
        Execute::One(command.to_string())
    }
}

impl From<Vec<String>> for Execute {
    fn from(commands: Vec<String>) -> Self {
        Execute::Many(commands)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub milestone_type: GoalType,
    pub priority: Priority,
    pub status: GoalStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    /// Owning goal. A back-reference only; the goal holds the milestone.
    pub parent_goal_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

impl Milestone {
    /// A fresh pending milestone under `parent_goal_id`.
    pub fn new(parent_goal_id: Uuid, request: NewMilestone) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            milestone_type: request.milestone_type,
            priority: request.priority,
            status: GoalStatus::Pending,
            created_at: now_millis(),
            completed_at: None,
            parent_goal_id,
            execute: request.execute,
        }
    }

    /// Mark completed. `completed_at` is only stamped the first time.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = GoalStatus::Completed;
        self.completed_at.get_or_insert(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub priority: Priority,
    pub status: GoalStatus,
    pub milestones: Vec<Milestone>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    /// Percent of milestones completed, 0–100.
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

impl Goal {
    pub fn milestone(&self, id: Uuid) -> Option<&Milestone> {
        self.milestones.iter().find(|m| m.id == id)
    }

    pub fn active_milestone(&self) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.status == GoalStatus::Active)
    }

    /// First pending milestone in sequence order.
    pub fn first_pending_mut(&mut self) -> Option<&mut Milestone> {
        self.milestones
            .iter_mut()
            .find(|m| m.status == GoalStatus::Pending)
    }

    /// Whether any milestone is still pending or active.
    pub fn has_open_milestones(&self) -> bool {
        self.milestones.iter().any(|m| m.status.is_open())
    }

    /// Recompute `progress` from the milestone list.
    ///
    /// With milestones: completed / total as a percentage, rounded half up.
    /// Without: 100 once the goal is completed, 0 before.
    pub fn recompute_progress(&mut self) {
        let total = self.milestones.len();
        self.progress = if total == 0 {
            if self.status == GoalStatus::Completed {
                100
            } else {
                0
            }
        } else {
            let completed = self
                .milestones
                .iter()
                .filter(|m| m.status == GoalStatus::Completed)
                .count();
            ((200 * completed + total) / (2 * total)) as u8
        };
    }
}

/// Milestone creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMilestone {
    pub name: String,
    #[serde(rename = "type", default = "default_milestone_type")]
    pub milestone_type: GoalType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

fn default_milestone_type() -> GoalType {
    GoalType::Command
}

impl NewMilestone {
    /// A `command`-type, `medium`-priority milestone.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            milestone_type: default_milestone_type(),
            priority: Priority::default(),
            execute: None,
        }
    }

    pub fn milestone_type(mut self, milestone_type: GoalType) -> Self {
        self.milestone_type = milestone_type;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn execute(mut self, execute: impl Into<Execute>) -> Self {
        self.execute = Some(execute.into());
        self
    }
}

impl From<&str> for NewMilestone {
    fn from(name: &str) -> Self {
        NewMilestone::new(name)
    }
}

/// Goal creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub name: String,
    #[serde(rename = "type", default = "default_goal_type")]
    pub goal_type: GoalType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub milestones: Vec<NewMilestone>,
    /// Make this the active goal, demoting whichever goal was active.
    #[serde(default)]
    pub activate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

fn default_goal_type() -> GoalType {
    GoalType::Goal
}

impl NewGoal {
    /// A `goal`-type, `medium`-priority goal with no milestones.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal_type: default_goal_type(),
            priority: Priority::default(),
            milestones: Vec::new(),
            activate: false,
            execute: None,
        }
    }

    pub fn goal_type(mut self, goal_type: GoalType) -> Self {
        self.goal_type = goal_type;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn milestone(mut self, milestone: impl Into<NewMilestone>) -> Self {
        self.milestones.push(milestone.into());
        self
    }

    pub fn activate(mut self) -> Self {
        self.activate = true;
        self
    }

    pub fn execute(mut self, execute: impl Into<Execute>) -> Self {
        self.execute = Some(execute.into());
        self
    }
}

/// Field changes for an existing goal. `None` leaves a field alone.
///
/// Progress is derived and cannot be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<GoalType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

impl GoalUpdate {
    /// An update that only changes status.
    pub fn to_status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Field changes for an existing milestone. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub milestone_type: Option<GoalType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GoalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<Execute>,
}

impl MilestoneUpdate {
    pub fn to_status(status: GoalStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Equality filters for listing goals; unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoalFilter {
    pub status: Option<GoalStatus>,
    pub goal_type: Option<GoalType>,
}

impl GoalFilter {
    pub fn matches(&self, goal: &Goal) -> bool {
        self.status.map_or(true, |s| goal.status == s)
            && self.goal_type.map_or(true, |t| goal.goal_type == t)
    }
}
