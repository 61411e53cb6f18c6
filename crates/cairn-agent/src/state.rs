// state.rs — The agent status snapshot and partial overrides of it.

use std::collections::BTreeMap;
use std::fmt;

use cairn_goal::AgentStatus;
use cairn_store::now_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::world::{Position, WorldObservation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatus {
    Enabled,
    Disabled,
    Failed,
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureStatus::Enabled => write!(f, "enabled"),
            FeatureStatus::Disabled => write!(f, "disabled"),
            FeatureStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A named capability of the agent (chat interaction, movement, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub status: FeatureStatus,
}

/// Denormalized status snapshot: the one record outside callers read.
///
/// Every field is defaulted on read so older or partial snapshots decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentState {
    pub connected: bool,
    pub status: AgentStatus,
    pub username: Option<String>,
    pub health: f32,
    pub food: f32,
    pub position: Position,
    pub dimension: Option<String>,
    pub game_mode: Option<String>,
    /// Name of the active goal.
    pub current_goal: Option<String>,
    pub feature_list: Vec<Feature>,
    pub inventory: BTreeMap<String, u32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            connected: false,
            status: AgentStatus::Idle,
            username: None,
            health: 20.0,
            food: 20.0,
            position: Position::default(),
            dimension: None,
            game_mode: None,
            current_goal: None,
            feature_list: Vec::new(),
            inventory: BTreeMap::new(),
            timestamp: now_millis(),
        }
    }
}

impl AgentState {
    /// Overwrite every live observable with a fresh observation.
    pub fn observe(&mut self, observation: WorldObservation) {
        self.connected = true;
        self.username = Some(observation.username);
        self.health = observation.health;
        self.food = observation.food;
        self.position = observation.position;
        self.dimension = Some(observation.dimension);
        self.game_mode = Some(observation.game_mode);
        self.inventory = observation.inventory;
    }
}

/// Caller-supplied values that win over both the previous snapshot and
/// the live observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<BTreeMap<String, u32>>,
}

impl StatusOverride {
    pub fn apply(self, state: &mut AgentState) {
        if let Some(status) = self.status {
            state.status = status;
        }
        if let Some(username) = self.username {
            state.username = Some(username);
        }
        if let Some(health) = self.health {
            state.health = health;
        }
        if let Some(food) = self.food {
            state.food = food;
        }
        if let Some(position) = self.position {
            state.position = position;
        }
        if let Some(dimension) = self.dimension {
            state.dimension = Some(dimension);
        }
        if let Some(game_mode) = self.game_mode {
            state.game_mode = Some(game_mode);
        }
        if let Some(current_goal) = self.current_goal {
            state.current_goal = Some(current_goal);
        }
        if let Some(inventory) = self.inventory {
            state.inventory = inventory;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_snapshot_decodes_with_defaults() {
        let state: AgentState = serde_json::from_value(json!({
            "connected": true,
            "health": 7.5,
            "currentGoal": "find_shelter"
        }))
        .unwrap();
        assert!(state.connected);
        assert_eq!(state.health, 7.5);
        assert_eq!(state.food, 20.0);
        assert_eq!(state.status, AgentStatus::Idle);
        assert_eq!(state.current_goal.as_deref(), Some("find_shelter"));
    }

    #[test]
    fn snapshot_json_is_camel_case() {
        let mut state = AgentState::default();
        state.game_mode = Some("survival".to_string());
        state.feature_list.push(Feature {
            name: "chat".to_string(),
            status: FeatureStatus::Enabled,
        });
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["gameMode"], "survival");
        assert_eq!(value["featureList"][0]["status"], "enabled");
        assert_eq!(value["status"], "idle");
        assert!(value["timestamp"].is_i64());
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let mut state = AgentState::default();
        state.username = Some("steve".to_string());
        StatusOverride {
            health: Some(3.0),
            status: Some(AgentStatus::Combat),
            ..StatusOverride::default()
        }
        .apply(&mut state);

        assert_eq!(state.health, 3.0);
        assert_eq!(state.status, AgentStatus::Combat);
        assert_eq!(state.username.as_deref(), Some("steve"));
    }
}
