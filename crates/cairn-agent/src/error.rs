// error.rs — Error types for the agent facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The status snapshot could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The command executor rejected a command.
    #[error("command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },
}
