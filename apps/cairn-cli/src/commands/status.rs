// status.rs — `cairn status` and `cairn emergency`.

use cairn_agent::{Agent, AgentState};

/// Print the last written snapshot as-is.
pub fn show_status(agent: &Agent) -> anyhow::Result<()> {
    print_state(&agent.status())
}

/// Escalate to the emergency shelter goal and print the result.
pub fn emergency(agent: &Agent) -> anyhow::Result<()> {
    let goal = agent.handle_low_health();
    println!("Emergency goal activated: {} ({})", goal.name, goal.id);
    for (i, m) in goal.milestones.iter().enumerate() {
        println!("  {}. {} [{}]", i + 1, m.name, m.status);
    }
    Ok(())
}

fn print_state(state: &AgentState) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(state)?);
    Ok(())
}
