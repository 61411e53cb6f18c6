// agent.rs — Agent: the facade outside callers talk to.
//
// Read path: `status()` returns the last snapshot written to memory, as-is.
// Write path: `update_status()` gathers live observables, feature flags, and
// goal state, merges them over the previous snapshot, and writes the result
// through MemoryService. Without a world connection the write is skipped
// and the last known snapshot is returned.

use std::sync::{Arc, MutexGuard, PoisonError};

use cairn_goal::{AgentStatus, Goal, GoalManager, SharedGoalManager};
use cairn_memory::{EventCategory, MemoryService, Severity};
use serde_json::json;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::state::{AgentState, Feature, FeatureStatus, StatusOverride};
use crate::world::{CommandExecutor, WorldObserver};

/// Outcome of handing the current commands to an executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Agent {
    memory: Arc<MemoryService>,
    goals: SharedGoalManager,
    world: Box<dyn WorldObserver>,
    config: AgentConfig,
    features: Vec<Feature>,
}

impl Agent {
    pub fn new(
        memory: Arc<MemoryService>,
        goals: SharedGoalManager,
        world: Box<dyn WorldObserver>,
        config: AgentConfig,
    ) -> Self {
        Self {
            memory,
            goals,
            world,
            config,
            features: Vec::new(),
        }
    }

    pub fn memory(&self) -> &Arc<MemoryService> {
        &self.memory
    }

    pub fn goals(&self) -> &SharedGoalManager {
        &self.goals
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The last written snapshot. A default, disconnected snapshot when none
    /// has been written yet.
    pub fn status(&self) -> AgentState {
        let Some(entry) = self.memory.agent_state() else {
            return self.initial_state();
        };
        match decode(entry.data) {
            Ok(mut state) => {
                state.timestamp = entry.timestamp;
                state
            }
            Err(e) => {
                tracing::warn!("stored agent state is unreadable, using defaults: {}", e);
                self.initial_state()
            }
        }
    }

    /// Refresh the snapshot from the world and goal state, then apply
    /// `overrides` on top.
    pub fn update_status(&self, overrides: StatusOverride) -> AgentState {
        let Some(observation) = self.world.observe() else {
            tracing::info!("no world connection, keeping last known agent status");
            return self.status();
        };

        let (status, current_goal) = self.goal_summary();
        let mut state = self.status();
        state.observe(observation);
        state.feature_list = self.features.clone();
        state.status = status;
        state.current_goal = current_goal;
        overrides.apply(&mut state);
        self.write(state)
    }

    /// Refresh the snapshot after a goal change. Same write path as
    /// [`Agent::update_status`], so nothing is written while disconnected.
    pub fn update_goal_state(&self) -> AgentState {
        self.update_status(StatusOverride::default())
    }

    /// Escalate to the emergency shelter goal.
    pub fn handle_low_health(&self) -> Goal {
        let health = self.status().health;
        tracing::warn!(health, "low health detected, prioritizing safety");
        self.memory.create_event(
            EventCategory::SystemEvent,
            json!({ "reason": "low_health", "health": health }),
            Severity::CRITICAL,
        );
        let goal = self.lock_goals().create_emergency_health_goal();
        self.update_goal_state();
        goal
    }

    /// Escalate when `health` is under the configured threshold.
    pub fn check_vitals(&self, health: f32) -> Option<Goal> {
        if health < self.config.low_health_threshold {
            Some(self.handle_low_health())
        } else {
            None
        }
    }

    /// Hand the active milestone's commands (or the active goal's, when the
    /// milestone has none) to `executor`, recording each outcome in the
    /// command log.
    pub fn dispatch_active_commands(&self, executor: &dyn CommandExecutor) -> DispatchReport {
        let execute = {
            let goals = self.lock_goals();
            let Some(goal) = goals.get_active_goal() else {
                tracing::debug!("no active goal, nothing to dispatch");
                return DispatchReport::default();
            };
            goal.active_milestone()
                .and_then(|m| m.execute.clone())
                .or(goal.execute)
        };

        let mut report = DispatchReport::default();
        let Some(execute) = execute else {
            return report;
        };
        for command in execute.commands() {
            match run(executor, command) {
                Ok(()) => {
                    report.succeeded += 1;
                    self.memory.add_command(command, true);
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!("{}", e);
                    self.memory.add_command(command, false);
                }
            }
        }
        report
    }

    /// Set (or add) a feature flag. Published on the next `update_status`.
    pub fn set_feature(&mut self, name: &str, status: FeatureStatus) {
        match self.features.iter_mut().find(|f| f.name == name) {
            Some(feature) => feature.status = status,
            None => self.features.push(Feature {
                name: name.to_string(),
                status,
            }),
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    fn initial_state(&self) -> AgentState {
        AgentState {
            username: Some(self.config.username.clone()),
            ..AgentState::default()
        }
    }

    fn goal_summary(&self) -> (AgentStatus, Option<String>) {
        let goals = self.lock_goals();
        let current = goals.get_active_goal().map(|g| g.name);
        (goals.determine_agent_status(), current)
    }

    fn write(&self, mut state: AgentState) -> AgentState {
        match serde_json::to_value(&state) {
            Ok(snapshot) => {
                let entry = self.memory.update_agent_state(snapshot);
                state.timestamp = entry.timestamp;
                tracing::debug!(status = %state.status, connected = state.connected, "agent status updated");
            }
            Err(e) => tracing::error!("failed to encode agent state: {}", e),
        }
        state
    }

    fn lock_goals(&self) -> MutexGuard<'_, GoalManager> {
        self.goals.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode(data: serde_json::Value) -> Result<AgentState, AgentError> {
    Ok(serde_json::from_value(data)?)
}

fn run(executor: &dyn CommandExecutor, command: &str) -> Result<(), AgentError> {
    tracing::debug!(command, "executing command");
    executor
        .execute(command)
        .map_err(|reason| AgentError::CommandFailed {
            command: command.to_string(),
            reason,
        })
}
