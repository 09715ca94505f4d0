// events.rs — Event model and notification dispatch.
//
// The server emits events at key lifecycle points: admission decisions,
// cancellation decisions, feedback, and terminal outcomes. Notification sinks
// (a JSONL log file, the tracing subscriber) subscribe to these events.
//
// Events are an observability side channel. The requester's own feedback and
// result stream does not go through here, and a failing sink never affects a
// goal's outcome.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::GoalStatus;

/// Events emitted at key goal lifecycle points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GoalEvent {
    /// A request was admitted and its worker is starting.
    GoalAccepted {
        goal_id: Uuid,
        order: u32,
        timestamp: DateTime<Utc>,
    },

    /// A request was refused before any goal was created.
    GoalRejected {
        order: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A cancellation request was evaluated.
    CancelRequested {
        goal_id: Uuid,
        accepted: bool,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A feedback snapshot was published.
    FeedbackPublished {
        goal_id: Uuid,
        step: usize,
        length: usize,
        timestamp: DateTime<Utc>,
    },

    /// A goal reached its terminal status.
    GoalFinished {
        goal_id: Uuid,
        status: GoalStatus,
        length: usize,
        timestamp: DateTime<Utc>,
    },

    /// A goal was left unresolved because the server is shutting down.
    GoalAbandoned {
        goal_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl GoalEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            GoalEvent::GoalAccepted { .. } => "goal_accepted",
            GoalEvent::GoalRejected { .. } => "goal_rejected",
            GoalEvent::CancelRequested { .. } => "cancel_requested",
            GoalEvent::FeedbackPublished { .. } => "feedback_published",
            GoalEvent::GoalFinished { .. } => "goal_finished",
            GoalEvent::GoalAbandoned { .. } => "goal_abandoned",
        }
    }

    /// The goal this event is about, if one was created.
    pub fn goal_id(&self) -> Option<Uuid> {
        match self {
            GoalEvent::GoalRejected { .. } => None,
            GoalEvent::GoalAccepted { goal_id, .. }
            | GoalEvent::CancelRequested { goal_id, .. }
            | GoalEvent::FeedbackPublished { goal_id, .. }
            | GoalEvent::GoalFinished { goal_id, .. }
            | GoalEvent::GoalAbandoned { goal_id, .. } => Some(*goal_id),
        }
    }

    pub fn goal_accepted(goal_id: Uuid, order: u32) -> Self {
        GoalEvent::GoalAccepted {
            goal_id,
            order,
            timestamp: Utc::now(),
        }
    }

    pub fn goal_rejected(order: u32, reason: &str) -> Self {
        GoalEvent::GoalRejected {
            order,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn cancel_requested(goal_id: Uuid, accepted: bool, reason: Option<&str>) -> Self {
        GoalEvent::CancelRequested {
            goal_id,
            accepted,
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    pub fn feedback_published(goal_id: Uuid, step: usize, length: usize) -> Self {
        GoalEvent::FeedbackPublished {
            goal_id,
            step,
            length,
            timestamp: Utc::now(),
        }
    }

    pub fn goal_finished(goal_id: Uuid, status: GoalStatus, length: usize) -> Self {
        GoalEvent::GoalFinished {
            goal_id,
            status,
            length,
            timestamp: Utc::now(),
        }
    }

    pub fn goal_abandoned(goal_id: Uuid) -> Self {
        GoalEvent::GoalAbandoned {
            goal_id,
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving goal events.
///
/// Implementations decide what to do with each event: append it to a file,
/// forward it to the tracing subscriber, and so on. Sinks are called from
/// worker tasks, so they must be `Send + Sync`.
pub trait NotificationSink: Send + Sync {
    /// Handle an event. Errors are logged but don't stop the system.
    fn send(&self, event: &GoalEvent) -> Result<(), GoalError>;
}

/// Logs events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &GoalEvent) -> Result<(), GoalError> {
        // Ensure parent directory exists.
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| GoalError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| GoalError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| GoalError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Forwards events to the tracing subscriber at debug level.
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn send(&self, event: &GoalEvent) -> Result<(), GoalError> {
        let json = serde_json::to_string(event)?;
        tracing::debug!(event_type = event.event_type(), "{}", json);
        Ok(())
    }
}

/// Dispatches events to multiple sinks.
///
/// Errors from individual sinks are logged (via tracing) but don't
/// prevent other sinks from receiving the event.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// Create a new dispatcher with no sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a notification sink.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &GoalEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!("notification sink error: {}", e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
