//! Agent configuration (`[agent]` section of `.cairn/config.toml`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Name the agent reports before the world tells it otherwise.
    #[serde(default = "default_username")]
    pub username: String,

    /// Health below this triggers the emergency shelter goal.
    #[serde(default = "default_low_health_threshold")]
    pub low_health_threshold: f32,

    /// Optional JSONL file receiving every goal lifecycle event.
    #[serde(default)]
    pub events_log: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            low_health_threshold: default_low_health_threshold(),
            events_log: None,
        }
    }
}

// Serde default functions
fn default_username() -> String {
    "cairn".to_string()
}

fn default_low_health_threshold() -> f32 {
    10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config: AgentConfig = toml::from_str("").unwrap();
        assert_eq!(config.username, "cairn");
        assert_eq!(config.low_health_threshold, 10.0);
        assert!(config.events_log.is_none());
    }

    #[test]
    fn overrides() {
        let config: AgentConfig = toml::from_str(
            r#"
            username = "scout"
            low_health_threshold = 6.5
            events_log = ".cairn/goal-events.jsonl"
            "#,
        )
        .unwrap();
        assert_eq!(config.username, "scout");
        assert_eq!(config.low_health_threshold, 6.5);
        assert_eq!(
            config.events_log,
            Some(PathBuf::from(".cairn/goal-events.jsonl"))
        );
    }
}
