// memory.rs — Memory subcommands: summary, events.

use cairn_agent::Agent;
use cairn_memory::{EventCategory, EventRecord};
use chrono::SecondsFormat;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Show row counts and backend state.
    Summary,
    /// Show recent events, oldest first.
    Events {
        /// Number of events to show.
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// Only events of this category (e.g., "goal-progress").
        #[arg(long)]
        category: Option<EventCategory>,
    },
}

pub fn execute(cmd: &MemoryCommands, agent: &Agent) -> anyhow::Result<()> {
    match cmd {
        MemoryCommands::Summary => {
            let summary = agent.memory().summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        MemoryCommands::Events { count, category } => {
            let events = recent_events(agent, *count, *category);
            if events.is_empty() {
                println!("No events recorded.");
                return Ok(());
            }
            for event in &events {
                println!(
                    "{} [{:>2}] {:<18} {}",
                    event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                    event.severity,
                    event.category,
                    event.payload,
                );
            }
            println!("\n{} event(s).", events.len());
            Ok(())
        }
    }
}

fn recent_events(agent: &Agent, count: usize, category: Option<EventCategory>) -> Vec<EventRecord> {
    match category {
        Some(category) => agent.memory().events_of(category, count),
        None => agent.memory().recent_events(count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{lock_goals, test_agent};
    use cairn_goal::NewGoal;

    #[test]
    fn goal_changes_show_up_as_events() {
        let agent = test_agent();
        lock_goals(&agent).create_goal(NewGoal::new("g").activate());
        agent.handle_low_health();

        let progress = recent_events(&agent, 50, Some(EventCategory::GoalProgress));
        assert!(!progress.is_empty());
        let system = recent_events(&agent, 50, Some(EventCategory::SystemEvent));
        assert_eq!(system.len(), 1);
        assert_eq!(recent_events(&agent, 2, None).len(), 2);
        assert!(execute(&MemoryCommands::Summary, &agent).is_ok());
    }
}
