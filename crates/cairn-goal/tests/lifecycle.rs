// End-to-end lifecycle tests for GoalManager over a real MemoryService.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cairn_goal::{
    GoalFilter, GoalManager, GoalStatus, GoalType, GoalUpdate, MilestoneUpdate, NewGoal,
    NewMilestone, Priority,
};
use cairn_memory::MemoryService;
use cairn_store::{DurableBackend, MemoryEntry, PersistenceTier, StoreConfig, StoreError};
use tempfile::tempdir;
use uuid::Uuid;

fn manager() -> GoalManager {
    GoalManager::new(Arc::new(MemoryService::in_memory()))
}

fn active_count(manager: &GoalManager) -> usize {
    manager
        .get_goals(&GoalFilter {
            status: Some(GoalStatus::Active),
            goal_type: None,
        })
        .len()
}

#[test]
fn mine_diamonds_scenario() {
    let mut goals = manager();
    let goal = goals.create_goal(
        NewGoal::new("mine_diamonds")
            .goal_type(GoalType::Goal)
            .priority(Priority::High)
            .milestone("find cave")
            .milestone("mine ore")
            .activate(),
    );
    let first = goal.milestones[0].id;
    let second = goal.milestones[1].id;

    assert!(goals.complete_milestone(first));
    let midway = goals.get_goal(goal.id).unwrap();
    assert_eq!(midway.progress, 50);
    assert_eq!(midway.status, GoalStatus::Active);
    assert_eq!(goals.get_active_milestone(goal.id).unwrap().id, second);

    assert!(goals.complete_milestone(second));
    let done = goals.get_goal(goal.id).unwrap();
    assert_eq!(done.status, GoalStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());
    assert!(done
        .milestones
        .iter()
        .all(|m| m.status == GoalStatus::Completed));
}

#[test]
fn succession_follows_priority() {
    let mut goals = manager();
    let a = goals.create_goal(NewGoal::new("A").priority(Priority::Medium));
    let b = goals.create_goal(NewGoal::new("B").priority(Priority::Critical));
    let c = goals.create_goal(NewGoal::new("C").priority(Priority::High).activate());

    assert!(goals.complete_goal(c.id));
    assert_eq!(goals.get_active_goal().unwrap().id, b.id);

    assert!(goals.complete_goal(b.id));
    assert_eq!(goals.get_active_goal().unwrap().id, a.id);

    assert!(goals.complete_goal(a.id));
    assert!(goals.get_active_goal().is_none());
}

#[test]
fn succession_ties_go_to_earliest_created() {
    let mut goals = manager();
    let first = goals.create_goal(NewGoal::new("first").priority(Priority::High));
    goals.create_goal(NewGoal::new("second").priority(Priority::High));
    let current = goals.create_goal(NewGoal::new("current").activate());

    goals.complete_goal(current.id);
    assert_eq!(goals.get_active_goal().unwrap().id, first.id);
}

#[test]
fn at_most_one_active_goal_under_any_activation_order() {
    let mut goals = manager();
    let ids: Vec<Uuid> = (0..5)
        .map(|i| goals.create_goal(NewGoal::new(format!("g{}", i))).id)
        .collect();

    let order = [3, 1, 4, 1, 0, 2, 2, 4, 3, 0];
    for &i in &order {
        assert!(goals.activate_goal(ids[i]));
        assert_eq!(active_count(&goals), 1);
        assert_eq!(goals.get_active_goal().unwrap().id, ids[i]);
    }

    goals.create_goal(NewGoal::new("late").activate());
    assert_eq!(active_count(&goals), 1);
}

#[test]
fn milestone_activation_is_scoped_to_its_goal() {
    let mut goals = manager();
    let g1 = goals.create_goal(NewGoal::new("g1").milestone("a").milestone("b").activate());
    let g2 = goals.create_goal(NewGoal::new("g2").milestone("c").milestone("d"));

    assert!(goals.activate_milestone(g2.milestones[1].id));
    assert!(goals.activate_milestone(g1.milestones[1].id));

    let g1 = goals.get_goal(g1.id).unwrap();
    let g2 = goals.get_goal(g2.id).unwrap();
    assert_eq!(g1.active_milestone().unwrap().name, "b");
    assert_eq!(g1.milestones[0].status, GoalStatus::Pending);
    assert_eq!(g2.active_milestone().unwrap().name, "d");
}

#[test]
fn progress_is_monotonic_and_ends_at_100() {
    let mut goals = manager();
    let mut request = NewGoal::new("build").activate();
    for i in 0..7 {
        request = request.milestone(NewMilestone::new(format!("step {}", i)));
    }
    let goal = goals.create_goal(request);

    let mut last = 0;
    for milestone in &goal.milestones {
        goals.complete_milestone(milestone.id);
        let progress = goals.get_goal(goal.id).unwrap().progress;
        assert!(progress >= last);
        last = progress;
    }
    assert_eq!(last, 100);
    assert_eq!(goals.get_goal(goal.id).unwrap().status, GoalStatus::Completed);
}

#[test]
fn completing_goal_cascades_to_milestones() {
    let mut goals = manager();
    let goal = goals.create_goal(
        NewGoal::new("g")
            .milestone("a")
            .milestone("b")
            .milestone("c")
            .activate(),
    );
    goals.complete_milestone(goal.milestones[0].id);
    let first_stamp = goals.get_milestone(goal.milestones[0].id).unwrap().completed_at;

    assert!(goals.complete_goal(goal.id));
    let goal = goals.get_goal(goal.id).unwrap();
    assert_eq!(goal.progress, 100);
    assert!(goal.milestones.iter().all(|m| m.status == GoalStatus::Completed));
    assert!(goal.milestones.iter().all(|m| m.completed_at.is_some()));
    assert_eq!(goal.milestones[0].completed_at, first_stamp);
}

#[test]
fn completion_is_idempotent() {
    let mut goals = manager();
    let goal = goals.create_goal(NewGoal::new("g").activate());

    assert!(goals.complete_goal(goal.id));
    let stamp = goals.get_goal(goal.id).unwrap().completed_at;
    assert!(stamp.is_some());

    thread::sleep(Duration::from_millis(5));
    assert!(goals.complete_goal(goal.id));
    assert_eq!(goals.get_goal(goal.id).unwrap().completed_at, stamp);
}

#[test]
fn milestones_of_completed_goal_stay_completed() {
    let mut goals = manager();
    let goal = goals.create_goal(NewGoal::new("g").milestone("a").milestone("b").activate());
    let a = goal.milestones[0].id;
    let b = goal.milestones[1].id;
    goals.complete_goal(goal.id);

    assert!(goals.activate_milestone(a));
    assert!(goals.update_milestone(
        b,
        MilestoneUpdate {
            name: Some("b2".to_string()),
            status: Some(GoalStatus::Pending),
            ..MilestoneUpdate::default()
        },
    ));

    let goal = goals.get_goal(goal.id).unwrap();
    assert_eq!(goal.status, GoalStatus::Completed);
    assert_eq!(goal.progress, 100);
    assert!(goal.milestones.iter().all(|m| m.status == GoalStatus::Completed));
    assert_eq!(goal.milestones[1].name, "b2");
}

#[test]
fn archived_goal_is_not_completed_by_its_milestones() {
    let mut goals = manager();
    let goal = goals.create_goal(NewGoal::new("g").milestone("a").milestone("b").activate());
    let a = goal.milestones[0].id;
    let b = goal.milestones[1].id;
    goals.archive_goal(goal.id);

    goals.delete_milestone(a);
    goals.complete_milestone(b);

    let goal = goals.get_goal(goal.id).unwrap();
    assert_eq!(goal.status, GoalStatus::Archived);
    assert!(goal.completed_at.is_none());
    assert_eq!(goal.progress, 100);
}

#[test]
fn reopened_goal_keeps_first_completion_stamp() {
    let mut goals = manager();
    let goal = goals.create_goal(NewGoal::new("g"));
    goals.complete_goal(goal.id);
    let stamp = goals.get_goal(goal.id).unwrap().completed_at;

    thread::sleep(Duration::from_millis(5));
    goals.update_goal(goal.id, GoalUpdate::to_status(GoalStatus::Active));
    goals.complete_goal(goal.id);
    assert_eq!(goals.get_goal(goal.id).unwrap().completed_at, stamp);
}

#[test]
fn filters_combine_and_keep_insertion_order() {
    let mut goals = manager();
    goals.create_goal(NewGoal::new("explore").goal_type(GoalType::Discovery));
    goals.create_goal(NewGoal::new("dig").goal_type(GoalType::Command));
    goals.create_goal(NewGoal::new("scout").goal_type(GoalType::Discovery));
    let done = goals.create_goal(NewGoal::new("map").goal_type(GoalType::Discovery));
    goals.complete_goal(done.id);

    let names = |filter: GoalFilter| -> Vec<String> {
        goals.get_goals(&filter).into_iter().map(|g| g.name).collect()
    };
    assert_eq!(names(GoalFilter::default()), vec!["explore", "dig", "scout", "map"]);
    assert_eq!(
        names(GoalFilter {
            status: Some(GoalStatus::Pending),
            goal_type: Some(GoalType::Discovery),
        }),
        vec!["explore", "scout"]
    );
}

#[test]
fn concurrent_activation_keeps_single_active_goal() {
    let shared = manager().into_shared();
    let ids: Vec<Uuid> = {
        let mut goals = shared.lock().unwrap();
        (0..6)
            .map(|i| goals.create_goal(NewGoal::new(format!("g{}", i)).milestone("step")).id)
            .collect()
    };

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let shared = shared.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                for round in 0..40 {
                    let id = ids[(t + round) % ids.len()];
                    let mut goals = shared.lock().unwrap();
                    goals.activate_goal(id);
                    assert_eq!(active_count(&goals), 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let goals = shared.lock().unwrap();
    assert_eq!(active_count(&goals), 1);
    for goal in goals.get_goals(&GoalFilter::default()) {
        let active = goal
            .milestones
            .iter()
            .filter(|m| m.status == GoalStatus::Active)
            .count();
        assert!(active <= 1);
    }
}

#[test]
fn agent_status_follows_active_milestone() {
    let mut goals = manager();
    assert_eq!(goals.determine_agent_status().to_string(), "idle");

    let goal = goals.create_goal(
        NewGoal::new("supplies")
            .milestone("collect wood")
            .milestone("defend camp")
            .activate(),
    );
    assert_eq!(goals.determine_agent_status().to_string(), "gathering");

    goals.complete_milestone(goal.milestones[0].id);
    assert_eq!(goals.determine_agent_status().to_string(), "combat");
    assert_eq!(goals.current_milestone().unwrap().name, "defend camp");
}

/// Backend that refuses every connection.
struct UnreachableBackend;

impl DurableBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }
    fn connect(&mut self) -> Result<(), StoreError> {
        Err(StoreError::BackendUnavailable {
            backend: "unreachable".to_string(),
            reason: "connection refused".to_string(),
        })
    }
    fn push_log(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn trim_log(&mut self, _: &str, _: usize) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_log(&mut self, _: &str, _: usize) -> Result<Vec<MemoryEntry>, StoreError> {
        Ok(Vec::new())
    }
    fn put_object(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn delete_object(&mut self, _: &str, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_objects(&mut self, _: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        Ok(Vec::new())
    }
    fn set_singleton(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_singleton(&mut self, _: &str) -> Result<Option<MemoryEntry>, StoreError> {
        Ok(None)
    }
}

/// Backend whose connect never finishes in time.
struct HangingBackend;

impl DurableBackend for HangingBackend {
    fn name(&self) -> &str {
        "hanging"
    }
    fn connect(&mut self) -> Result<(), StoreError> {
        thread::sleep(Duration::from_secs(5));
        Ok(())
    }
    fn push_log(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn trim_log(&mut self, _: &str, _: usize) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_log(&mut self, _: &str, _: usize) -> Result<Vec<MemoryEntry>, StoreError> {
        Ok(Vec::new())
    }
    fn put_object(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn delete_object(&mut self, _: &str, _: &str) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_objects(&mut self, _: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        Ok(Vec::new())
    }
    fn set_singleton(&mut self, _: &str, _: &MemoryEntry) -> Result<(), StoreError> {
        Ok(())
    }
    fn load_singleton(&mut self, _: &str) -> Result<Option<MemoryEntry>, StoreError> {
        Ok(None)
    }
}

#[test]
fn unreachable_backend_falls_back_to_local_storage() {
    let memory = MemoryService::new(PersistenceTier::builder().backend(Box::new(UnreachableBackend)));
    assert!(!memory.is_durable());

    let mut goals = GoalManager::new(Arc::new(memory));
    let goal = goals.create_goal(NewGoal::new("offline").milestone("step").activate());
    let loaded = goals.get_goal(goal.id).unwrap();
    assert_eq!(loaded, goal);
}

#[test]
fn hanging_backend_times_out_and_falls_back() {
    let started = Instant::now();
    let memory = MemoryService::new(
        PersistenceTier::builder()
            .backend(Box::new(HangingBackend))
            .connect_timeout(Duration::from_millis(100)),
    );
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!memory.is_durable());

    let mut goals = GoalManager::new(Arc::new(memory));
    let goal = goals.create_goal(NewGoal::new("slow"));
    assert_eq!(goals.get_goal(goal.id).unwrap().name, "slow");
}

#[test]
fn goals_survive_restart_with_file_backend() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::file(dir.path().join("store"));

    let (first, second) = {
        let memory = Arc::new(MemoryService::open(&config));
        assert!(memory.is_durable());
        let mut goals = GoalManager::new(memory.clone());
        let first = goals.create_goal(NewGoal::new("first").milestone("a").activate());
        let second = goals.create_goal(NewGoal::new("second").priority(Priority::Low));
        goals.complete_milestone(first.milestones[0].id);
        memory.flush();
        (first.id, second.id)
    };

    let goals = GoalManager::new(Arc::new(MemoryService::open(&config)));
    let restored = goals.get_goal(first).unwrap();
    assert_eq!(restored.status, GoalStatus::Completed);
    assert_eq!(restored.progress, 100);
    assert_eq!(goals.get_active_goal().unwrap().id, second);
    let names: Vec<String> = goals
        .get_goals(&GoalFilter::default())
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn event_log_sink_writes_jsonl() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("goal-events.jsonl");
    let mut goals = manager().with_event_log(&path);

    let goal = goals.create_goal(NewGoal::new("g").milestone("a").activate());
    goals.complete_milestone(goal.milestones[0].id);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.lines().count() >= 3);
    assert!(content.contains("\"milestone_status_changed\""));
    assert!(content.contains("\"completed\""));
}
