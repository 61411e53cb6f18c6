// world.rs — Seams to the outside world: observing it and acting in it.
//
// The game client lives elsewhere. The facade only needs a snapshot of the
// agent's live observables and somewhere to send commands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Live observables read from a connected world client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldObservation {
    pub username: String,
    pub health: f32,
    pub food: f32,
    pub position: Position,
    pub dimension: String,
    pub game_mode: String,
    /// Item name → count.
    pub inventory: BTreeMap<String, u32>,
}

/// Source of live observations.
pub trait WorldObserver: Send {
    /// Current observables, or `None` when the world connection is down.
    fn observe(&self) -> Option<WorldObservation>;
}

/// Observer for an agent that has no world connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disconnected;

impl WorldObserver for Disconnected {
    fn observe(&self) -> Option<WorldObservation> {
        None
    }
}

/// Runs the opaque commands attached to goals and milestones.
pub trait CommandExecutor {
    fn execute(&self, command: &str) -> Result<(), String>;
}
