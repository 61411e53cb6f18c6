//! # cairn
//!
//! Operator command-line interface for a cairn agent's goals and memory.
//!
//! - `cairn goal create/list/show/activate/complete/archive/delete` — manage goals
//! - `cairn milestone add/activate/complete/delete` — manage milestones
//! - `cairn status` — print the agent status snapshot
//! - `cairn emergency` — escalate to the emergency shelter goal
//! - `cairn memory summary/events` — inspect the agent's memory
//!
//! State lives under `<project-root>/.cairn/` unless `.cairn/config.toml`
//! says otherwise.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::CairnConfig;

/// cairn — goals, milestones, and memory for an autonomous agent.
#[derive(Parser)]
#[command(name = "cairn", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Manage milestones.
    Milestone {
        #[command(subcommand)]
        command: commands::milestone::MilestoneCommands,
    },
    /// Print the agent status snapshot.
    Status,
    /// Activate the emergency shelter goal.
    Emergency,
    /// Inspect the agent's memory.
    Memory {
        #[command(subcommand)]
        command: commands::memory::MemoryCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("cairn_store=info".parse()?)
                .add_directive("cairn_memory=info".parse()?)
                .add_directive("cairn_goal=info".parse()?)
                .add_directive("cairn_agent=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let config = CairnConfig::load_or_default(&CairnConfig::path_for(&project_root))
        .rooted(&project_root);

    let agent = commands::open_agent(&config);
    let result = match &cli.command {
        Commands::Goal { command } => commands::goal::execute(command, &agent),
        Commands::Milestone { command } => commands::milestone::execute(command, &agent),
        Commands::Status => commands::status::show_status(&agent),
        Commands::Emergency => commands::status::emergency(&agent),
        Commands::Memory { command } => commands::memory::execute(command, &agent),
    };

    agent.memory().flush();
    result
}
