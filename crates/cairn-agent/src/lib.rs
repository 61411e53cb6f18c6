//! # cairn-agent
//!
//! The agent facade: a single status snapshot (connection, vitals, position,
//! inventory, feature flags, activity, current goal) derived from the goal
//! manager and live world observations, and stored in the agent's memory.
//!
//! The world client and command runner are outside this crate; they plug in
//! through [`WorldObserver`] and [`CommandExecutor`].

pub mod agent;
pub mod config;
pub mod error;
pub mod state;
pub mod world;

pub use agent::{Agent, DispatchReport};
pub use config::AgentConfig;
pub use error::AgentError;
pub use state::{AgentState, Feature, FeatureStatus, StatusOverride};
pub use world::{CommandExecutor, Disconnected, Position, WorldObservation, WorldObserver};
