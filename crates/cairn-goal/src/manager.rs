// manager.rs — GoalManager: the goal/milestone state machine.
//
// Every public mutator runs in two phases:
//   1. apply the requested transition and persist it through MemoryService;
//   2. drain the follow-up queue (activate the next goal, complete a goal
//      whose milestones are all done), each of which may queue more.
// Phase-1 helpers never call public mutators, so no transition is applied
// while another is half-written.
//
// Goals are read live from the `goals` table on every call; there is no
// separate cache to fall out of date.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use cairn_memory::tables;
use cairn_memory::MemoryService;
use cairn_store::{now_millis, MemoryEntry};
use uuid::Uuid;

use crate::error::GoalError;
use crate::events::{EventDispatcher, GoalEvent, LogSink, MemorySink, NotificationSink};
use crate::model::{
    Goal, GoalFilter, GoalStatus, GoalType, GoalUpdate, Milestone, MilestoneUpdate, NewGoal,
    NewMilestone, Priority,
};
use crate::status::AgentStatus;

/// Entry kind used for goal rows in the `goals` table.
const GOAL_KIND: &str = "goal";

/// Work deferred until the current transition has been persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    /// Promote the best eligible goal unless one is already active.
    ActivateNextGoal,
    /// Complete a goal whose milestones are all done.
    CompleteGoal(Uuid),
}

/// Goal manager shared between threads. Each call holds the lock for the
/// whole read-modify-write.
pub type SharedGoalManager = Arc<Mutex<GoalManager>>;

pub struct GoalManager {
    memory: Arc<MemoryService>,
    dispatcher: EventDispatcher,
    follow_ups: VecDeque<FollowUp>,
}

impl GoalManager {
    /// A manager writing through `memory`. Lifecycle events are recorded in
    /// the same memory as `goal-progress` events.
    pub fn new(memory: Arc<MemoryService>) -> Self {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(MemorySink::new(memory.clone())));
        Self {
            memory,
            dispatcher,
            follow_ups: VecDeque::new(),
        }
    }

    /// Also append lifecycle events as JSONL to `path`.
    pub fn with_event_log(mut self, path: impl AsRef<Path>) -> Self {
        self.add_sink(Box::new(LogSink::new(path)));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.dispatcher.add_sink(sink);
    }

    pub fn memory(&self) -> &Arc<MemoryService> {
        &self.memory
    }

    pub fn into_shared(self) -> SharedGoalManager {
        Arc::new(Mutex::new(self))
    }

    // ── Mutators ────────────────────────────────────────────────

    /// Create a goal with fresh ids. With `activate`, any active goal is
    /// demoted to pending and the new goal's first milestone starts active.
    pub fn create_goal(&mut self, request: NewGoal) -> Goal {
        let id = Uuid::new_v4();
        let status = if request.activate {
            GoalStatus::Active
        } else {
            GoalStatus::Pending
        };
        let mut goal = Goal {
            id,
            name: request.name,
            goal_type: request.goal_type,
            priority: request.priority,
            status,
            milestones: request
                .milestones
                .into_iter()
                .map(|m| Milestone::new(id, m))
                .collect(),
            created_at: now_millis(),
            completed_at: None,
            progress: 0,
            execute: request.execute,
        };

        if request.activate {
            self.demote_active_goals(id);
            if let Some(first) = goal.milestones.first_mut() {
                first.status = GoalStatus::Active;
            }
        }
        goal.recompute_progress();

        match encode(&goal) {
            Ok(data) => {
                self.memory
                    .put_entity(tables::GOALS, &id.to_string(), GOAL_KIND, data);
            }
            Err(e) => tracing::error!(goal_id = %id, "failed to encode goal: {}", e),
        }
        tracing::info!(
            goal_id = %id,
            name = %goal.name,
            priority = %goal.priority,
            status = %goal.status,
            milestones = goal.milestones.len(),
            "goal created"
        );
        self.dispatcher.dispatch(&GoalEvent::goal_created(&goal));

        self.drain_follow_ups();
        goal
    }

    /// Append a milestone to a goal. It starts pending (or completed when the
    /// goal already is) and is never activated here.
    pub fn create_milestone(&mut self, goal_id: Uuid, request: NewMilestone) -> Option<Milestone> {
        let Some(mut goal) = self.load_goal(goal_id) else {
            tracing::warn!(goal_id = %goal_id, "cannot add milestone: goal not found");
            return None;
        };

        let mut milestone = Milestone::new(goal_id, request);
        if goal.status == GoalStatus::Completed {
            milestone.complete(now_millis());
        }
        goal.milestones.push(milestone.clone());
        goal.recompute_progress();
        self.persist(&goal);

        tracing::info!(
            goal_id = %goal_id,
            milestone_id = %milestone.id,
            name = %milestone.name,
            "milestone created"
        );
        self.dispatcher
            .dispatch(&GoalEvent::milestone_created(&milestone));

        self.drain_follow_ups();
        Some(milestone)
    }

    /// Merge field changes into a goal, applying status transitions.
    /// Returns `false` when the goal does not exist.
    pub fn update_goal(&mut self, id: Uuid, update: GoalUpdate) -> bool {
        let applied = self.apply_goal_update(id, update);
        self.drain_follow_ups();
        applied
    }

    /// Merge field changes into a milestone, applying status transitions.
    /// Returns `false` when no goal owns a milestone with this id.
    pub fn update_milestone(&mut self, id: Uuid, update: MilestoneUpdate) -> bool {
        let applied = self.apply_milestone_update(id, update);
        self.drain_follow_ups();
        applied
    }

    /// Delete a goal and its milestones. Deleting the active goal promotes
    /// its successor.
    pub fn delete_goal(&mut self, id: Uuid) -> bool {
        let Some(goal) = self.load_goal(id) else {
            tracing::warn!(goal_id = %id, "cannot delete: goal not found");
            return false;
        };
        if !self.memory.delete_entity(tables::GOALS, &id.to_string()) {
            return false;
        }

        tracing::info!(goal_id = %id, name = %goal.name, "goal deleted");
        self.dispatcher.dispatch(&GoalEvent::goal_deleted(&goal));
        if goal.status == GoalStatus::Active {
            self.follow_ups.push_back(FollowUp::ActivateNextGoal);
        }

        self.drain_follow_ups();
        true
    }

    /// Delete a milestone. Deleting the active milestone promotes the next
    /// pending one, or completes the goal when none are left open.
    pub fn delete_milestone(&mut self, id: Uuid) -> bool {
        let Some(mut goal) = self.find_owner(id) else {
            tracing::warn!(milestone_id = %id, "cannot delete: milestone not found");
            return false;
        };
        let Some(index) = goal.milestones.iter().position(|m| m.id == id) else {
            return false;
        };

        let removed = goal.milestones.remove(index);
        let mut promoted = None;
        if removed.status == GoalStatus::Active {
            promoted = promote_first_pending(&mut goal);
            if !goal.has_open_milestones() && goal.status.is_open() {
                self.follow_ups.push_back(FollowUp::CompleteGoal(goal.id));
            }
        }
        goal.recompute_progress();
        self.persist(&goal);

        tracing::info!(goal_id = %goal.id, milestone_id = %id, "milestone deleted");
        self.dispatcher
            .dispatch(&GoalEvent::milestone_deleted(&removed));
        if let Some(promoted) = promoted.and_then(|pid| goal.milestone(pid)) {
            self.dispatcher.dispatch(&GoalEvent::milestone_status_changed(
                promoted,
                GoalStatus::Pending,
            ));
        }

        self.drain_follow_ups();
        true
    }

    pub fn activate_goal(&mut self, id: Uuid) -> bool {
        self.update_goal(id, GoalUpdate::to_status(GoalStatus::Active))
    }

    pub fn complete_goal(&mut self, id: Uuid) -> bool {
        self.update_goal(id, GoalUpdate::to_status(GoalStatus::Completed))
    }

    pub fn archive_goal(&mut self, id: Uuid) -> bool {
        self.update_goal(id, GoalUpdate::to_status(GoalStatus::Archived))
    }

    pub fn activate_milestone(&mut self, id: Uuid) -> bool {
        self.update_milestone(id, MilestoneUpdate::to_status(GoalStatus::Active))
    }

    pub fn complete_milestone(&mut self, id: Uuid) -> bool {
        self.update_milestone(id, MilestoneUpdate::to_status(GoalStatus::Completed))
    }

    /// Create and activate the canned shelter-seeking goal used when the
    /// agent's vitals run low.
    pub fn create_emergency_health_goal(&mut self) -> Goal {
        tracing::warn!("creating emergency health goal");
        let request = ["move to safety", "find cover", "locate food", "collect food"]
            .into_iter()
            .fold(
                NewGoal::new("find_shelter")
                    .goal_type(GoalType::Goal)
                    .priority(Priority::Critical)
                    .activate(),
                |request, name| request.milestone(name),
            );
        self.create_goal(request)
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn get_goal(&self, id: Uuid) -> Option<Goal> {
        self.load_goal(id)
    }

    /// Goals matching `filter`, in insertion order.
    pub fn get_goals(&self, filter: &GoalFilter) -> Vec<Goal> {
        self.load_goals()
            .into_iter()
            .filter(|goal| filter.matches(goal))
            .collect()
    }

    pub fn get_active_goal(&self) -> Option<Goal> {
        self.load_goals()
            .into_iter()
            .find(|goal| goal.status == GoalStatus::Active)
    }

    pub fn get_milestone(&self, id: Uuid) -> Option<Milestone> {
        self.find_owner(id)
            .and_then(|goal| goal.milestone(id).cloned())
    }

    pub fn get_active_milestone(&self, goal_id: Uuid) -> Option<Milestone> {
        self.load_goal(goal_id)
            .and_then(|goal| goal.active_milestone().cloned())
    }

    /// The active milestone of the active goal.
    pub fn current_milestone(&self) -> Option<Milestone> {
        self.get_active_goal()
            .and_then(|goal| goal.active_milestone().cloned())
    }

    pub fn determine_agent_status(&self) -> AgentStatus {
        AgentStatus::classify(self.get_active_goal().as_ref())
    }

    /// The goal succession would promote next, if any.
    pub fn next_goal(&self) -> Option<Goal> {
        let mut best: Option<Goal> = None;
        for goal in self.load_goals() {
            if !goal.status.is_open() {
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |b| goal.priority.weight() > b.priority.weight());
            if better {
                best = Some(goal);
            }
        }
        best
    }

    // ── Transitions (phase 1) ───────────────────────────────────

    fn apply_goal_update(&mut self, id: Uuid, update: GoalUpdate) -> bool {
        let Some(mut goal) = self.load_goal(id) else {
            tracing::warn!(goal_id = %id, "cannot update: goal not found");
            return false;
        };
        let previous = goal.status;

        if let Some(name) = update.name {
            goal.name = name;
        }
        if let Some(goal_type) = update.goal_type {
            goal.goal_type = goal_type;
        }
        if let Some(priority) = update.priority {
            goal.priority = priority;
        }
        if let Some(execute) = update.execute {
            goal.execute = Some(execute);
        }

        let mut milestone_changes: Vec<(Uuid, GoalStatus)> = Vec::new();
        match update.status {
            None => {}
            Some(GoalStatus::Active) => {
                if previous != GoalStatus::Active {
                    self.demote_active_goals(id);
                }
                goal.status = GoalStatus::Active;
                if goal.active_milestone().is_none() {
                    if let Some(promoted) = promote_first_pending(&mut goal) {
                        milestone_changes.push((promoted, GoalStatus::Pending));
                    }
                }
            }
            Some(GoalStatus::Completed) => {
                if previous != GoalStatus::Completed {
                    let now = now_millis();
                    goal.status = GoalStatus::Completed;
                    goal.completed_at.get_or_insert(now);
                    for milestone in goal.milestones.iter_mut() {
                        if milestone.status != GoalStatus::Completed {
                            milestone_changes.push((milestone.id, milestone.status));
                            milestone.complete(now);
                        }
                    }
                    if previous == GoalStatus::Active {
                        self.follow_ups.push_back(FollowUp::ActivateNextGoal);
                    }
                }
            }
            Some(GoalStatus::Archived) => {
                if previous == GoalStatus::Completed {
                    tracing::warn!(goal_id = %id, "completed goals cannot be archived");
                } else {
                    goal.status = GoalStatus::Archived;
                    if previous == GoalStatus::Active {
                        self.follow_ups.push_back(FollowUp::ActivateNextGoal);
                    }
                }
            }
            Some(GoalStatus::Pending) => {
                goal.status = GoalStatus::Pending;
            }
        }

        goal.recompute_progress();
        self.persist(&goal);

        if goal.status != previous {
            tracing::info!(
                goal_id = %id,
                from = %previous,
                to = %goal.status,
                progress = goal.progress,
                "goal status changed"
            );
            self.dispatcher
                .dispatch(&GoalEvent::goal_status_changed(&goal, previous));
        }
        self.dispatch_milestone_changes(&goal, &milestone_changes);
        true
    }

    fn apply_milestone_update(&mut self, id: Uuid, update: MilestoneUpdate) -> bool {
        let Some(mut goal) = self.find_owner(id) else {
            tracing::warn!(milestone_id = %id, "cannot update: milestone not found");
            return false;
        };
        let Some(index) = goal.milestones.iter().position(|m| m.id == id) else {
            return false;
        };
        let previous = goal.milestones[index].status;
        let mut milestone_changes: Vec<(Uuid, GoalStatus)> = Vec::new();

        {
            let milestone = &mut goal.milestones[index];
            if let Some(name) = update.name {
                milestone.name = name;
            }
            if let Some(milestone_type) = update.milestone_type {
                milestone.milestone_type = milestone_type;
            }
            if let Some(priority) = update.priority {
                milestone.priority = priority;
            }
            if let Some(execute) = update.execute {
                milestone.execute = Some(execute);
            }
        }

        let reopens_completed_goal = goal.status == GoalStatus::Completed
            && update.status.is_some_and(|status| status != GoalStatus::Completed);
        if reopens_completed_goal {
            tracing::warn!(
                milestone_id = %id,
                goal_id = %goal.id,
                "milestones of a completed goal cannot be reopened"
            );
        }

        match update.status {
            None => {}
            Some(_) if reopens_completed_goal => {}
            Some(GoalStatus::Active) => {
                for other in goal.milestones.iter_mut() {
                    if other.id != id && other.status == GoalStatus::Active {
                        other.status = GoalStatus::Pending;
                        milestone_changes.push((other.id, GoalStatus::Active));
                    }
                }
                goal.milestones[index].status = GoalStatus::Active;
            }
            Some(GoalStatus::Completed) => {
                if previous != GoalStatus::Completed {
                    goal.milestones[index].complete(now_millis());
                    if previous == GoalStatus::Active {
                        if let Some(promoted) = promote_first_pending(&mut goal) {
                            milestone_changes.push((promoted, GoalStatus::Pending));
                        }
                    }
                    if !goal.has_open_milestones() && goal.status.is_open() {
                        self.follow_ups.push_back(FollowUp::CompleteGoal(goal.id));
                    }
                }
            }
            Some(status) => {
                goal.milestones[index].status = status;
            }
        }

        goal.recompute_progress();
        self.persist(&goal);

        if goal.milestones[index].status != previous {
            milestone_changes.insert(0, (id, previous));
        }
        self.dispatch_milestone_changes(&goal, &milestone_changes);
        true
    }

    /// Demote every active goal other than `keep` to pending. No succession.
    fn demote_active_goals(&mut self, keep: Uuid) {
        for mut other in self.load_goals() {
            if other.id == keep || other.status != GoalStatus::Active {
                continue;
            }
            other.status = GoalStatus::Pending;
            self.persist(&other);
            tracing::info!(goal_id = %other.id, "demoted previously active goal");
            self.dispatcher
                .dispatch(&GoalEvent::goal_status_changed(&other, GoalStatus::Active));
        }
    }

    // ── Follow-ups (phase 2) ────────────────────────────────────

    fn drain_follow_ups(&mut self) {
        while let Some(follow_up) = self.follow_ups.pop_front() {
            tracing::debug!(?follow_up, "running follow-up");
            match follow_up {
                FollowUp::ActivateNextGoal => {
                    if self.get_active_goal().is_some() {
                        continue;
                    }
                    match self.next_goal() {
                        Some(next) => {
                            tracing::info!(goal_id = %next.id, name = %next.name, "activating next goal");
                            self.apply_goal_update(next.id, GoalUpdate::to_status(GoalStatus::Active));
                        }
                        None => tracing::info!("no eligible goals left, agent is idle"),
                    }
                }
                FollowUp::CompleteGoal(goal_id) => {
                    let open = self.load_goal(goal_id).is_some_and(|g| g.status.is_open());
                    if !open {
                        tracing::debug!(goal_id = %goal_id, "goal no longer open, not completing");
                        continue;
                    }
                    self.apply_goal_update(goal_id, GoalUpdate::to_status(GoalStatus::Completed));
                }
            }
        }
    }

    // ── Storage ─────────────────────────────────────────────────

    fn load_goals(&self) -> Vec<Goal> {
        self.memory
            .entities(tables::GOALS)
            .iter()
            .filter_map(decode)
            .collect()
    }

    fn load_goal(&self, id: Uuid) -> Option<Goal> {
        self.memory
            .entity(tables::GOALS, &id.to_string())
            .as_ref()
            .and_then(decode)
    }

    /// The goal whose milestone list contains `milestone_id`.
    fn find_owner(&self, milestone_id: Uuid) -> Option<Goal> {
        self.load_goals()
            .into_iter()
            .find(|goal| goal.milestone(milestone_id).is_some())
    }

    /// Write the whole goal back. Top-level keys replace the stored ones, so
    /// the milestone list is replaced as a unit.
    fn persist(&self, goal: &Goal) {
        match encode(goal) {
            Ok(data) => {
                self.memory
                    .update_entity(tables::GOALS, &goal.id.to_string(), &data);
            }
            Err(e) => tracing::error!(goal_id = %goal.id, "failed to encode goal: {}", e),
        }
    }

    fn dispatch_milestone_changes(&self, goal: &Goal, changes: &[(Uuid, GoalStatus)]) {
        for (milestone_id, from) in changes {
            if let Some(milestone) = goal.milestone(*milestone_id) {
                self.dispatcher
                    .dispatch(&GoalEvent::milestone_status_changed(milestone, *from));
            }
        }
    }
}

/// Activate the first pending milestone; returns its id.
fn promote_first_pending(goal: &mut Goal) -> Option<Uuid> {
    goal.first_pending_mut().map(|milestone| {
        milestone.status = GoalStatus::Active;
        milestone.id
    })
}

fn encode(goal: &Goal) -> Result<serde_json::Value, GoalError> {
    Ok(serde_json::to_value(goal)?)
}

fn decode(entry: &MemoryEntry) -> Option<Goal> {
    match serde_json::from_value(entry.data.clone()) {
        Ok(goal) => Some(goal),
        Err(e) => {
            tracing::warn!(id = %entry.id, "skipping unreadable goal record: {}", e);
            None
        }
    }
}
