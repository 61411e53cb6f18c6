// tables.rs — The agent's table names and their storage shapes.

use cairn_store::TableShape;

/// Every event, whatever its category.
pub const EVENT: &str = "event";
/// Things the agent found in the world.
pub const DISCOVERY: &str = "discovery";
/// Chat messages heard or sent.
pub const CHAT: &str = "chat";
/// Commands run and whether they succeeded.
pub const COMMAND: &str = "command";
/// World-state observations.
pub const WORLD: &str = "world";
/// Goals, each with its milestones embedded.
pub const GOALS: &str = "goals";
/// Long-lived remembered things.
pub const MEMORY: &str = "memory";
/// The agent status snapshot.
pub const AGENT: &str = "agent";

/// Registration list: each table with the shape chosen for it.
pub const ALL: &[(&str, TableShape)] = &[
    (EVENT, TableShape::Log),
    (DISCOVERY, TableShape::Log),
    (CHAT, TableShape::Log),
    (COMMAND, TableShape::Log),
    (WORLD, TableShape::Log),
    (GOALS, TableShape::Object),
    (MEMORY, TableShape::Object),
    (AGENT, TableShape::Singleton),
];

/// Names of the log tables.
pub fn logs() -> impl Iterator<Item = &'static str> {
    ALL.iter()
        .filter(|(_, shape)| *shape == TableShape::Log)
        .map(|(name, _)| *name)
}

/// Names of the object tables.
pub fn objects() -> impl Iterator<Item = &'static str> {
    ALL.iter()
        .filter(|(_, shape)| *shape == TableShape::Object)
        .map(|(name, _)| *name)
}
