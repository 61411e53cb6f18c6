// milestone.rs — Milestone subcommands: add, activate, complete, delete.

use cairn_agent::Agent;
use cairn_goal::{GoalManager, GoalType, Milestone, NewMilestone, Priority};
use clap::Subcommand;
use uuid::Uuid;

use super::{lock_goals, parse_id};

#[derive(Subcommand)]
pub enum MilestoneCommands {
    /// Append a milestone to a goal.
    Add {
        /// Goal ID.
        goal_id: String,
        /// Milestone name (e.g., "mine ore").
        name: String,
        /// discovery, goal, or command.
        #[arg(long = "type", default_value = "command")]
        milestone_type: GoalType,
        /// critical, high, medium, or low.
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Make a milestone the active one within its goal.
    Activate {
        /// Milestone ID.
        id: String,
    },
    /// Complete a milestone.
    Complete {
        /// Milestone ID.
        id: String,
    },
    /// Delete a milestone.
    Delete {
        /// Milestone ID.
        id: String,
    },
}

pub fn execute(cmd: &MilestoneCommands, agent: &Agent) -> anyhow::Result<()> {
    match cmd {
        MilestoneCommands::Add {
            goal_id,
            name,
            milestone_type,
            priority,
        } => {
            let goal_id = parse_id(goal_id)?;
            let milestone = add_milestone(agent, goal_id, name, *milestone_type, *priority)?;
            println!("Milestone added: {}", milestone.id);
            println!("  Goal:   {}", milestone.parent_goal_id);
            println!("  Status: {}", milestone.status);
            Ok(())
        }
        MilestoneCommands::Activate { id } => transition(agent, id, "activated", |goals, id| {
            goals.activate_milestone(id)
        }),
        MilestoneCommands::Complete { id } => transition(agent, id, "completed", |goals, id| {
            goals.complete_milestone(id)
        }),
        MilestoneCommands::Delete { id } => transition(agent, id, "deleted", |goals, id| {
            goals.delete_milestone(id)
        }),
    }
}

fn add_milestone(
    agent: &Agent,
    goal_id: Uuid,
    name: &str,
    milestone_type: GoalType,
    priority: Priority,
) -> anyhow::Result<Milestone> {
    let request = NewMilestone::new(name)
        .milestone_type(milestone_type)
        .priority(priority);
    let created = lock_goals(agent).create_milestone(goal_id, request);
    created.ok_or_else(|| anyhow::anyhow!("goal not found: {}", goal_id))
}

fn transition(
    agent: &Agent,
    id: &str,
    verb: &str,
    apply: impl FnOnce(&mut GoalManager, Uuid) -> bool,
) -> anyhow::Result<()> {
    let milestone_id = parse_id(id)?;
    let (applied, owner) = {
        let mut goals = lock_goals(agent);
        let owner = goals.get_milestone(milestone_id).map(|m| m.parent_goal_id);
        (apply(&mut *goals, milestone_id), owner)
    };
    if !applied {
        anyhow::bail!("milestone not found: {}", milestone_id);
    }
    agent.update_goal_state();

    println!("Milestone {}: {}", verb, milestone_id);
    if let Some(goal) = owner.and_then(|goal_id| lock_goals(agent).get_goal(goal_id)) {
        println!(
            "Goal {} is {} ({}% complete)",
            goal.name, goal.status, goal.progress
        );
    }
    Ok(())
}
