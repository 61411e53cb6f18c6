// goal.rs — Goal subcommands: create, list, show, activate, complete,
// archive, delete.

use cairn_agent::Agent;
use cairn_goal::{Execute, Goal, GoalFilter, GoalStatus, GoalType, NewGoal, Priority};
use clap::Subcommand;
use uuid::Uuid;

use super::{lock_goals, parse_id, truncate};

#[derive(Subcommand)]
pub enum GoalCommands {
    /// Create a goal.
    Create {
        /// Goal name (e.g., "mine_diamonds").
        name: String,
        /// discovery, goal, or command.
        #[arg(long = "type", default_value = "goal")]
        goal_type: GoalType,
        /// critical, high, medium, or low.
        #[arg(long, default_value = "medium")]
        priority: Priority,
        /// Milestone name; repeat for several, in order.
        #[arg(long = "milestone")]
        milestones: Vec<String>,
        /// Make this the active goal.
        #[arg(long)]
        activate: bool,
        /// Command to attach; repeat for several.
        #[arg(long = "execute")]
        execute: Vec<String>,
    },
    /// List goals.
    List {
        /// Filter by status (pending, active, completed, archived).
        #[arg(long)]
        status: Option<GoalStatus>,
        /// Filter by type (discovery, goal, command).
        #[arg(long = "type")]
        goal_type: Option<GoalType>,
    },
    /// Show one goal as JSON.
    Show {
        /// Goal ID.
        id: String,
    },
    /// Make a goal the active one.
    Activate {
        /// Goal ID.
        id: String,
    },
    /// Complete a goal and all of its milestones.
    Complete {
        /// Goal ID.
        id: String,
    },
    /// Archive a goal.
    Archive {
        /// Goal ID.
        id: String,
    },
    /// Delete a goal and its milestones.
    Delete {
        /// Goal ID.
        id: String,
    },
}

pub fn execute(cmd: &GoalCommands, agent: &Agent) -> anyhow::Result<()> {
    match cmd {
        GoalCommands::Create {
            name,
            goal_type,
            priority,
            milestones,
            activate,
            execute,
        } => {
            let goal = create_goal(agent, name, *goal_type, *priority, milestones, *activate, execute);
            println!("Goal created: {}", goal.id);
            print_goal(&goal);
            Ok(())
        }
        GoalCommands::List { status, goal_type } => list_goals(agent, *status, *goal_type),
        GoalCommands::Show { id } => show_goal(agent, id),
        GoalCommands::Activate { id } => transition(agent, id, "activated", |goals, id| {
            goals.activate_goal(id)
        }),
        GoalCommands::Complete { id } => transition(agent, id, "completed", |goals, id| {
            goals.complete_goal(id)
        }),
        GoalCommands::Archive { id } => transition(agent, id, "archived", |goals, id| {
            goals.archive_goal(id)
        }),
        GoalCommands::Delete { id } => transition(agent, id, "deleted", |goals, id| {
            goals.delete_goal(id)
        }),
    }
}

fn create_goal(
    agent: &Agent,
    name: &str,
    goal_type: GoalType,
    priority: Priority,
    milestones: &[String],
    activate: bool,
    execute: &[String],
) -> Goal {
    let mut request = NewGoal::new(name).goal_type(goal_type).priority(priority);
    for milestone in milestones {
        request = request.milestone(milestone.as_str());
    }
    if activate {
        request = request.activate();
    }
    match execute {
        [] => {}
        [one] => request = request.execute(one.as_str()),
        many => request = request.execute(Execute::Many(many.to_vec())),
    }

    let goal = lock_goals(agent).create_goal(request);
    agent.update_goal_state();
    goal
}

fn list_goals(
    agent: &Agent,
    status: Option<GoalStatus>,
    goal_type: Option<GoalType>,
) -> anyhow::Result<()> {
    let goals = lock_goals(agent).get_goals(&GoalFilter { status, goal_type });

    if goals.is_empty() {
        println!("No goals found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<24} {:<10} {:<9} {:<10} {:>8}",
        "ID", "NAME", "TYPE", "PRIORITY", "STATUS", "PROGRESS"
    );
    println!("{}", "-".repeat(104));

    for g in &goals {
        println!(
            "{:<38} {:<24} {:<10} {:<9} {:<10} {:>7}%",
            g.id,
            truncate(&g.name, 22),
            g.goal_type.to_string(),
            g.priority.to_string(),
            g.status.to_string(),
            g.progress,
        );
    }
    println!("\n{} goal(s) total.", goals.len());

    Ok(())
}

fn show_goal(agent: &Agent, id: &str) -> anyhow::Result<()> {
    let goal_id = parse_id(id)?;
    match lock_goals(agent).get_goal(goal_id) {
        Some(goal) => {
            println!("{}", serde_json::to_string_pretty(&goal)?);
            Ok(())
        }
        None => anyhow::bail!("goal not found: {}", goal_id),
    }
}

fn transition(
    agent: &Agent,
    id: &str,
    verb: &str,
    apply: impl FnOnce(&mut cairn_goal::GoalManager, Uuid) -> bool,
) -> anyhow::Result<()> {
    let goal_id = parse_id(id)?;
    let applied = {
        let mut goals = lock_goals(agent);
        apply(&mut *goals, goal_id)
    };
    if !applied {
        anyhow::bail!("goal not found: {}", goal_id);
    }
    agent.update_goal_state();
    println!("Goal {}: {}", verb, goal_id);
    let (active, status) = {
        let goals = lock_goals(agent);
        (goals.get_active_goal(), goals.determine_agent_status())
    };
    match active {
        Some(goal) => println!("Active goal: {} ({})", goal.name, status),
        None => println!("No active goal, agent is idle."),
    }
    Ok(())
}

fn print_goal(goal: &Goal) {
    println!("  Name:     {}", goal.name);
    println!("  Type:     {}", goal.goal_type);
    println!("  Priority: {}", goal.priority);
    println!("  Status:   {}", goal.status);
    for (i, m) in goal.milestones.iter().enumerate() {
        println!("  {}. {} [{}] {}", i + 1, m.name, m.status, m.id);
    }
}
