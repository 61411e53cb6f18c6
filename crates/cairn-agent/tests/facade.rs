// Agent facade behaviour against fake world and executor collaborators.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use cairn_agent::{
    Agent, AgentConfig, CommandExecutor, Disconnected, FeatureStatus, Position, StatusOverride,
    WorldObservation, WorldObserver,
};
use cairn_goal::{AgentStatus, GoalManager, GoalStatus, NewGoal, NewMilestone, Priority};
use cairn_memory::{EventCategory, MemoryService, Severity};

/// World whose observation can be swapped from the test.
#[derive(Clone, Default)]
struct FakeWorld {
    observation: Arc<Mutex<Option<WorldObservation>>>,
}

impl FakeWorld {
    fn connect(&self, health: f32) {
        let mut inventory = BTreeMap::new();
        inventory.insert("cobblestone".to_string(), 32);
        *self.observation.lock().unwrap() = Some(WorldObservation {
            username: "steve".to_string(),
            health,
            food: 18.0,
            position: Position::new(10.5, 64.0, -3.0),
            dimension: "overworld".to_string(),
            game_mode: "survival".to_string(),
            inventory,
        });
    }

    fn disconnect(&self) {
        *self.observation.lock().unwrap() = None;
    }
}

impl WorldObserver for FakeWorld {
    fn observe(&self) -> Option<WorldObservation> {
        self.observation.lock().unwrap().clone()
    }
}

/// Executor that records commands and rejects any starting with `/fail`.
#[derive(Default)]
struct RecordingExecutor {
    seen: Mutex<Vec<String>>,
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, command: &str) -> Result<(), String> {
        self.seen.lock().unwrap().push(command.to_string());
        if command.starts_with("/fail") {
            Err("unknown command".to_string())
        } else {
            Ok(())
        }
    }
}

fn agent_with(world: Box<dyn WorldObserver>) -> Agent {
    let memory = Arc::new(MemoryService::in_memory());
    let goals = GoalManager::new(memory.clone()).into_shared();
    Agent::new(memory, goals, world, AgentConfig::default())
}

#[test]
fn status_before_any_write_is_disconnected_default() {
    let agent = agent_with(Box::new(Disconnected));
    let state = agent.status();
    assert!(!state.connected);
    assert_eq!(state.status, AgentStatus::Idle);
    assert_eq!(state.username.as_deref(), Some("cairn"));
    assert!(agent.memory().agent_state().is_none());
}

#[test]
fn update_status_without_world_is_a_no_op() {
    let agent = agent_with(Box::new(Disconnected));
    let state = agent.update_status(StatusOverride {
        health: Some(1.0),
        ..StatusOverride::default()
    });
    assert_eq!(state.health, 20.0);
    assert!(agent.memory().agent_state().is_none());
}

#[test]
fn update_status_merges_observation_goal_and_overrides() {
    let world = FakeWorld::default();
    world.connect(19.0);
    let mut agent = agent_with(Box::new(world.clone()));
    agent.set_feature("chat", FeatureStatus::Enabled);
    agent.set_feature("move", FeatureStatus::Disabled);
    agent.set_feature("chat", FeatureStatus::Failed);

    agent.goals().lock().unwrap().create_goal(
        NewGoal::new("stockpile")
            .milestone("mine stone")
            .activate(),
    );

    let state = agent.update_status(StatusOverride {
        food: Some(4.0),
        ..StatusOverride::default()
    });

    assert!(state.connected);
    assert_eq!(state.username.as_deref(), Some("steve"));
    assert_eq!(state.health, 19.0);
    assert_eq!(state.food, 4.0);
    assert_eq!(state.position, Position::new(10.5, 64.0, -3.0));
    assert_eq!(state.game_mode.as_deref(), Some("survival"));
    assert_eq!(state.inventory["cobblestone"], 32);
    assert_eq!(state.status, AgentStatus::Gathering);
    assert_eq!(state.current_goal.as_deref(), Some("stockpile"));
    assert_eq!(state.feature_list.len(), 2);
    assert_eq!(state.feature_list[0].status, FeatureStatus::Failed);

    // The read path returns exactly what was written.
    assert_eq!(agent.status(), state);
}

#[test]
fn disconnect_keeps_last_known_snapshot() {
    let world = FakeWorld::default();
    world.connect(15.0);
    let agent = agent_with(Box::new(world.clone()));
    let written = agent.update_status(StatusOverride::default());

    world.disconnect();
    let stale = agent.update_status(StatusOverride::default());
    assert_eq!(stale, written);
    assert!(stale.connected);
}

#[test]
fn goal_state_is_not_written_while_disconnected() {
    let agent = agent_with(Box::new(Disconnected));
    agent
        .goals()
        .lock()
        .unwrap()
        .create_goal(NewGoal::new("scout").milestone("scout the valley").activate());

    let state = agent.update_goal_state();
    assert!(!state.connected);
    assert_eq!(state.status, AgentStatus::Idle);
    assert!(state.current_goal.is_none());
    assert!(agent.memory().agent_state().is_none());
}

#[test]
fn goal_state_refreshes_once_connected() {
    let world = FakeWorld::default();
    world.connect(18.0);
    let agent = agent_with(Box::new(world.clone()));
    agent
        .goals()
        .lock()
        .unwrap()
        .create_goal(NewGoal::new("scout").milestone("scout the valley").activate());

    let state = agent.update_goal_state();
    assert_eq!(state.status, AgentStatus::Exploring);
    assert_eq!(state.current_goal.as_deref(), Some("scout"));

    // Goal changes made after a disconnect leave the snapshot as it was.
    world.disconnect();
    agent
        .goals()
        .lock()
        .unwrap()
        .create_goal(NewGoal::new("hide").priority(Priority::Critical).activate());
    assert_eq!(agent.update_goal_state(), state);
    assert_eq!(agent.status().current_goal.as_deref(), Some("scout"));
}

#[test]
fn low_health_creates_emergency_goal() {
    let world = FakeWorld::default();
    world.connect(4.0);
    let agent = agent_with(Box::new(world));
    agent.goals().lock().unwrap().create_goal(
        NewGoal::new("build house")
            .priority(Priority::High)
            .activate(),
    );
    agent.update_status(StatusOverride::default());

    assert!(agent.check_vitals(12.0).is_none());
    let goal = agent.check_vitals(4.0).unwrap();

    assert_eq!(goal.name, "find_shelter");
    assert_eq!(goal.status, GoalStatus::Active);
    let state = agent.status();
    assert_eq!(state.current_goal.as_deref(), Some("find_shelter"));
    assert_eq!(state.status, AgentStatus::Working);

    let alerts = agent
        .memory()
        .events_at_least(Severity::CRITICAL, 10);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, EventCategory::SystemEvent);
    assert_eq!(alerts[0].payload["health"], 4.0);
}

#[test]
fn commands_come_from_milestone_then_goal() {
    let agent = agent_with(Box::new(Disconnected));
    let executor = RecordingExecutor::default();

    assert_eq!(agent.dispatch_active_commands(&executor).succeeded, 0);

    let goal = agent.goals().lock().unwrap().create_goal(
        NewGoal::new("tunnel")
            .execute(vec!["/goal-level".to_string()])
            .milestone(NewMilestone::new("dig").execute(vec![
                "/dig down".to_string(),
                "/fail here".to_string(),
            ]))
            .milestone("rest")
            .activate(),
    );

    let report = agent.dispatch_active_commands(&executor);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);

    agent
        .goals()
        .lock()
        .unwrap()
        .complete_milestone(goal.milestones[0].id);
    let report = agent.dispatch_active_commands(&executor);
    assert_eq!(report.succeeded, 1);

    let seen = executor.seen.lock().unwrap().clone();
    assert_eq!(seen, vec!["/dig down", "/fail here", "/goal-level"]);

    let log = agent.memory().recent_commands(10);
    assert_eq!(log.len(), 3);
    assert_eq!(log[1].data["success"], false);
}
