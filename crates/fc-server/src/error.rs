// error.rs — Error types for the goal server.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during goal server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A goal lifecycle operation failed.
    #[error("goal error: {0}")]
    Goal(#[from] fc_goal::GoalError),

    /// The admission policy is inconsistent.
    #[error("policy error: {0}")]
    Policy(#[from] fc_policy::PolicyError),

    /// No goal with this id is known to the server.
    #[error("goal not found: {0}")]
    GoalNotFound(Uuid),

    /// The server is shutting down and admits no new goals.
    #[error("server is shutting down")]
    ShuttingDown,

    /// The server was created outside a tokio runtime.
    #[error("no tokio runtime available to run goals")]
    NoRuntime,

    /// The configuration file could not be read or parsed.
    #[error("invalid config at {path}: {reason}")]
    Config { path: String, reason: String },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A wire message could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
