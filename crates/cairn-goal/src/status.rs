// status.rs — Agent activity classification derived from goal state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Goal, GoalType};

/// What the agent is doing right now. Derived on demand, never stored by
/// the goal manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Working,
    Exploring,
    Combat,
    Gathering,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Exploring => write!(f, "exploring"),
            AgentStatus::Combat => write!(f, "combat"),
            AgentStatus::Gathering => write!(f, "gathering"),
        }
    }
}

const GATHERING: &[&str] = &["mine", "collect", "harvest"];
const COMBAT: &[&str] = &["attack", "defend", "flee"];
const EXPLORING: &[&str] = &["explore", "scout"];

impl AgentStatus {
    /// Classify from the active goal (if any).
    ///
    /// Discovery goals are always exploring. Otherwise the active
    /// milestone's name decides, first keyword class wins.
    pub fn classify(active_goal: Option<&Goal>) -> AgentStatus {
        let Some(goal) = active_goal else {
            return AgentStatus::Idle;
        };
        if goal.goal_type == GoalType::Discovery {
            return AgentStatus::Exploring;
        }

        let name = goal
            .active_milestone()
            .map(|m| m.name.to_lowercase())
            .unwrap_or_default();
        let mentions = |words: &[&str]| words.iter().any(|w| name.contains(w));

        if mentions(GATHERING) {
            AgentStatus::Gathering
        } else if mentions(COMBAT) {
            AgentStatus::Combat
        } else if mentions(EXPLORING) {
            AgentStatus::Exploring
        } else {
            AgentStatus::Working
        }
    }
}
