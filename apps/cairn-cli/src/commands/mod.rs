// mod.rs — Subcommand implementations and the runtime they share.

pub mod goal;
pub mod memory;
pub mod milestone;
pub mod status;

use std::sync::{Arc, MutexGuard, PoisonError};

use cairn_agent::{Agent, Disconnected};
use cairn_goal::GoalManager;
use cairn_memory::MemoryService;
use uuid::Uuid;

use crate::config::CairnConfig;

/// Open memory, goals, and the agent facade for one CLI invocation.
///
/// The CLI has no world connection, so the facade runs disconnected.
pub fn open_agent(config: &CairnConfig) -> Agent {
    let memory = Arc::new(MemoryService::open(&config.store));
    let mut goals = GoalManager::new(memory.clone());
    if let Some(path) = &config.agent.events_log {
        goals = goals.with_event_log(path);
    }
    Agent::new(
        memory,
        goals.into_shared(),
        Box::new(Disconnected),
        config.agent.clone(),
    )
}

pub(crate) fn lock_goals(agent: &Agent) -> MutexGuard<'_, GoalManager> {
    agent.goals().lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn parse_id(id: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(id).map_err(|e| anyhow::anyhow!("invalid id '{}': {}", id, e))
}

/// Truncate a string for table display.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
pub(crate) fn test_agent() -> Agent {
    let mut config = CairnConfig::default();
    config.store = cairn_store::StoreConfig::in_memory();
    open_agent(&config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("mine", 10), "mine");
        assert_eq!(truncate("mine_diamonds_deep", 10), "mine_di...");
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
