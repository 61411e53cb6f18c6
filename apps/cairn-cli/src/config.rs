//! Project configuration from `.cairn/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cairn_agent::AgentConfig;
use cairn_store::StoreConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration. Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CairnConfig {
    /// Persistence tier settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Agent facade settings.
    #[serde(default)]
    pub agent: AgentConfig,
}

impl CairnConfig {
    /// `<project_root>/.cairn/config.toml`
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(".cairn").join("config.toml")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file is missing.
    /// A file that exists but does not parse is reported and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("{:#}, using default configuration", e);
            Self::default()
        })
    }

    /// Resolve relative paths against the project root.
    pub fn rooted(mut self, project_root: &Path) -> Self {
        self.store = self.store.rooted(project_root);
        if let Some(log) = &self.agent.events_log {
            if log.is_relative() {
                self.agent.events_log = Some(project_root.join(log));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_store::BackendKind;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CairnConfig::load_or_default(&CairnConfig::path_for(dir.path()));
        assert_eq!(config.store.backend, BackendKind::File);
        assert_eq!(config.agent.low_health_threshold, 10.0);
    }

    #[test]
    fn sections_parse_and_paths_are_rooted() {
        let dir = TempDir::new().unwrap();
        let path = CairnConfig::path_for(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"
[store]
backend = "none"
max_log_size = 200

[agent]
username = "miner"
events_log = "logs/goal-events.jsonl"
"#,
        )
        .unwrap();

        let config = CairnConfig::load(&path).unwrap().rooted(dir.path());
        assert_eq!(config.store.backend, BackendKind::None);
        assert_eq!(config.store.max_log_size, 200);
        assert_eq!(config.store.data_dir, dir.path().join(".cairn/store"));
        assert_eq!(config.agent.username, "miner");
        assert_eq!(
            config.agent.events_log,
            Some(dir.path().join("logs/goal-events.jsonl"))
        );
    }

    #[test]
    fn broken_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store\nbackend = ").unwrap();
        assert!(CairnConfig::load(&path).is_err());
        let config = CairnConfig::load_or_default(&path);
        assert_eq!(config.agent.username, "cairn");
    }
}
