// error.rs — Error types for the goal lifecycle subsystem.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during goal lifecycle operations.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Invalid state transition.
    #[error("invalid transition from {from} to {to} for goal {goal_id}")]
    InvalidTransition {
        goal_id: Uuid,
        from: String,
        to: String,
    },

    /// Feedback was published after the goal reached a terminal state.
    #[error("goal {goal_id} is already {status}, feedback not accepted")]
    FeedbackAfterTerminal { goal_id: Uuid, status: String },

    /// Nobody is listening for this goal's updates any more.
    #[error("update stream for goal {0} is closed")]
    StreamClosed(Uuid),

    /// A notification dispatch failed (non-fatal).
    #[error("notification error: {0}")]
    NotificationError(String),
}
