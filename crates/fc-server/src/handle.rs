// handle.rs — Per-goal handle, update stream, and substrate liveness.
//
// A GoalHandle is shared between exactly two parties:
// - the executor, which owns the strong reference while the goal runs and is
//   the only one that publishes feedback or resolves the goal;
// - the registry, which keeps a `Weak` reference and may only raise the
//   cancellation flag.
//
// The cancellation flag is the one piece of state written and read
// concurrently, so it is an `AtomicBool`. Status changes go through a small
// mutex so that "publish feedback" and "resolve" cannot interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use fc_goal::{FeedbackMessage, GoalError, GoalRequest, GoalStatus, ResultMessage};

/// One message on a goal's update stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalUpdate {
    Feedback(FeedbackMessage),
    Result(ResultMessage),
}

/// The requester's end of a goal's update stream.
///
/// Feedback arrives in step order and the result, if any, is always last.
/// The stream closes without a result only when the goal was abandoned
/// during shutdown.
#[derive(Debug)]
pub struct GoalSubscription {
    goal_id: Uuid,
    updates: mpsc::UnboundedReceiver<GoalUpdate>,
}

impl GoalSubscription {
    pub fn goal_id(&self) -> Uuid {
        self.goal_id
    }

    /// Wait for the next update; `None` once the stream is closed.
    pub async fn next(&mut self) -> Option<GoalUpdate> {
        self.updates.recv().await
    }

    /// Drain the stream, returning every feedback and the result (if any).
    pub async fn collect(mut self) -> (Vec<FeedbackMessage>, Option<ResultMessage>) {
        let mut feedback = Vec::new();
        let mut result = None;
        while let Some(update) = self.updates.recv().await {
            match update {
                GoalUpdate::Feedback(msg) => feedback.push(msg),
                GoalUpdate::Result(msg) => result = Some(msg),
            }
        }
        (feedback, result)
    }
}

/// Mutable lifecycle state of one admitted goal.
#[derive(Debug)]
pub struct GoalHandle {
    id: Uuid,
    request: GoalRequest,
    cancel_requested: AtomicBool,
    status: Mutex<GoalStatus>,
    updates: mpsc::UnboundedSender<GoalUpdate>,
}

impl GoalHandle {
    /// Create a handle in the `Executing` state plus its subscription.
    pub fn new(id: Uuid, request: GoalRequest) -> (Self, GoalSubscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id,
            request,
            cancel_requested: AtomicBool::new(false),
            status: Mutex::new(GoalStatus::Executing),
            updates: tx,
        };
        let subscription = GoalSubscription {
            goal_id: id,
            updates: rx,
        };
        (handle, subscription)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &GoalRequest {
        &self.request
    }

    pub fn status(&self) -> GoalStatus {
        *self.lock_status()
    }

    /// Whether a cancellation request has been accepted for this goal.
    pub fn is_canceling(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Raise the cancellation flag. The worker decides when to honor it.
    pub(crate) fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    /// Send a progress snapshot to the requester.
    ///
    /// Fails once the goal is terminal, or if the requester has gone away.
    pub fn publish_feedback(&self, partial_sequence: &[u64]) -> Result<(), GoalError> {
        let status = self.lock_status();
        if status.is_terminal() {
            return Err(GoalError::FeedbackAfterTerminal {
                goal_id: self.id,
                status: status.to_string(),
            });
        }
        self.updates
            .send(GoalUpdate::Feedback(FeedbackMessage {
                goal_id: self.id,
                partial_sequence: partial_sequence.to_vec(),
            }))
            .map_err(|_| GoalError::StreamClosed(self.id))
    }

    /// Resolve the goal as fully computed.
    pub fn succeed(&self, sequence: Vec<u64>) -> Result<ResultMessage, GoalError> {
        self.resolve(GoalStatus::Succeeded, sequence)
    }

    /// Resolve the goal as canceled with whatever was computed so far.
    pub fn canceled(&self, sequence: Vec<u64>) -> Result<ResultMessage, GoalError> {
        self.resolve(GoalStatus::Canceled, sequence)
    }

    /// Resolve the goal as aborted.
    pub fn abort(&self, sequence: Vec<u64>) -> Result<ResultMessage, GoalError> {
        self.resolve(GoalStatus::Aborted, sequence)
    }

    fn resolve(&self, next: GoalStatus, sequence: Vec<u64>) -> Result<ResultMessage, GoalError> {
        let mut status = self.lock_status();
        status.transition(self.id, next)?;

        let result = ResultMessage {
            goal_id: self.id,
            status: next,
            sequence,
        };
        // The terminal transition stands even if nobody is listening.
        if self.updates.send(GoalUpdate::Result(result.clone())).is_err() {
            tracing::debug!(goal_id = %self.id, "result dropped, requester went away");
        }
        Ok(result)
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, GoalStatus> {
        // A poisoned lock still holds a valid status value.
        self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Read side of the "is the substrate still operational" signal.
#[derive(Debug, Clone)]
pub struct Liveness {
    rx: watch::Receiver<bool>,
}

impl Liveness {
    /// Create a live signal and the sender that can take it down.
    pub fn channel() -> (watch::Sender<bool>, Liveness) {
        let (tx, rx) = watch::channel(true);
        (tx, Liveness { rx })
    }

    pub fn is_operational(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the substrate stops being operational.
    pub async fn shutting_down(&mut self) {
        if self.rx.wait_for(|live| !*live).await.is_err() {
            // Sender dropped while still live: the last value stands forever.
            std::future::pending::<()>().await;
        }
    }
}
