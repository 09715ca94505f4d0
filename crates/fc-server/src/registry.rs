// registry.rs — GoalServer: admission, goal tracking, and orderly shutdown.
//
// GoalServer is the external-facing surface of the engine:
//   submit   — synchronous admission; on accept, spawns the goal's executor
//   cancel   — synchronous cancellation decision; may raise the goal's flag
//   status   — current or recently finished status of a goal
//   shutdown — takes the substrate down and waits for every worker to exit
//
// The registry keeps a `Weak` reference to each running goal's handle plus
// the `JoinHandle` of its task. The executor owns the only strong reference,
// so a finished goal's handle is freed as soon as its worker returns.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle as RuntimeHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use fc_goal::{EventDispatcher, GoalEvent, GoalRequest, GoalStatus, LogSink, TracingSink};
use fc_policy::{AdmissionGate, CancelResponse, GoalResponse};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::executor::{ExecutionOutcome, GoalExecutor};
use crate::handle::{GoalHandle, GoalSubscription, Liveness};

/// What `submit` produced.
#[derive(Debug)]
pub enum Submission {
    /// The goal is running; its updates arrive on the subscription.
    Accepted(GoalSubscription),
    /// No goal was created.
    Rejected { reason: String },
}

impl Submission {
    /// The admission decision, without the subscription.
    pub fn response(&self) -> GoalResponse {
        match self {
            Submission::Accepted(_) => GoalResponse::AcceptAndExecute,
            Submission::Rejected { reason } => GoalResponse::Reject {
                reason: reason.clone(),
            },
        }
    }
}

/// A running goal as the registry sees it.
struct GoalEntry {
    handle: Weak<GoalHandle>,
    task: JoinHandle<()>,
}

/// Terminal statuses of recently finished goals, oldest first.
struct FinishedGoals {
    limit: usize,
    entries: VecDeque<(Uuid, GoalStatus)>,
}

impl FinishedGoals {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: VecDeque::new(),
        }
    }

    fn record(&mut self, goal_id: Uuid, status: GoalStatus) {
        if self.limit == 0 {
            return;
        }
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back((goal_id, status));
    }

    fn get(&self, goal_id: Uuid) -> Option<GoalStatus> {
        self.entries
            .iter()
            .rev()
            .find(|(id, _)| *id == goal_id)
            .map(|(_, status)| *status)
    }
}

/// State shared between the server and the tasks it spawns.
struct Registry {
    goals: Mutex<HashMap<Uuid, GoalEntry>>,
    finished: Mutex<FinishedGoals>,
}

impl Registry {
    fn goals(&self) -> MutexGuard<'_, HashMap<Uuid, GoalEntry>> {
        self.goals.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn finished(&self) -> MutexGuard<'_, FinishedGoals> {
        self.finished.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Called by a goal's own task once its executor has returned.
    fn retire(&self, goal_id: Uuid, outcome: ExecutionOutcome) {
        if let ExecutionOutcome::Finished(status) = outcome {
            self.finished().record(goal_id, status);
        }
        self.goals().remove(&goal_id);
    }
}

/// The goal server.
///
/// Create it inside a tokio runtime; goal workers are spawned onto that
/// runtime. `submit` and `cancel` are plain synchronous calls and never wait
/// on a goal.
pub struct GoalServer {
    gate: AdmissionGate,
    step_interval: Duration,
    events: Arc<EventDispatcher>,
    registry: Arc<Registry>,
    runtime: RuntimeHandle,
    liveness_tx: watch::Sender<bool>,
    liveness: Liveness,
}

impl GoalServer {
    /// Build a server from config, with the stock event sinks.
    pub fn new(config: &ServerConfig) -> Result<Self, ServerError> {
        let mut events = EventDispatcher::new();
        events.add_sink(Box::new(TracingSink));
        if let Some(path) = &config.events_log {
            events.add_sink(Box::new(LogSink::new(path)));
        }
        Self::with_events(config, events)
    }

    /// Build a server from config with a caller-supplied event dispatcher.
    pub fn with_events(config: &ServerConfig, events: EventDispatcher) -> Result<Self, ServerError> {
        config.validate()?;
        let gate = AdmissionGate::new(config.admission_policy())?;
        let runtime = RuntimeHandle::try_current().map_err(|_| ServerError::NoRuntime)?;
        let (liveness_tx, liveness) = Liveness::channel();

        Ok(Self {
            gate,
            step_interval: config.step_interval(),
            events: Arc::new(events),
            registry: Arc::new(Registry {
                goals: Mutex::new(HashMap::new()),
                finished: Mutex::new(FinishedGoals::new(config.history_limit)),
            }),
            runtime,
            liveness_tx,
            liveness,
        })
    }

    /// Whether the server still accepts and resolves goals.
    pub fn is_operational(&self) -> bool {
        self.liveness.is_operational()
    }

    /// Admit or reject a new goal.
    ///
    /// Returns promptly regardless of `order`: accepted goals are handed to
    /// their own task before this returns.
    pub fn submit(&self, request: GoalRequest) -> Result<Submission, ServerError> {
        if !self.is_operational() {
            return Err(ServerError::ShuttingDown);
        }

        if let GoalResponse::Reject { reason } = self.gate.evaluate_goal(&request) {
            error!(order = request.order, "received invalid request REJECTED: {}", reason);
            self.events
                .dispatch(&GoalEvent::goal_rejected(request.order, &reason));
            return Ok(Submission::Rejected { reason });
        }

        let goal_id = Uuid::new_v4();
        info!(goal_id = %goal_id, order = request.order, "received request ACCEPTED");
        self.events
            .dispatch(&GoalEvent::goal_accepted(goal_id, request.order));

        let (handle, subscription) = GoalHandle::new(goal_id, request);
        self.handle_accepted(Arc::new(handle));
        Ok(Submission::Accepted(subscription))
    }

    /// Hand an accepted goal to its own task and start tracking it.
    fn handle_accepted(&self, handle: Arc<GoalHandle>) {
        let goal_id = handle.id();
        let weak = Arc::downgrade(&handle);
        let executor = GoalExecutor::new(
            handle,
            self.step_interval,
            self.liveness.clone(),
            self.events.clone(),
        );
        let registry = self.registry.clone();

        // Hold the map while spawning so a goal that finishes instantly
        // cannot retire before it has been registered.
        let mut goals = self.registry.goals();
        let task = self.runtime.spawn(async move {
            let outcome = executor.run().await;
            registry.retire(goal_id, outcome);
        });
        goals.insert(goal_id, GoalEntry { handle: weak, task });
    }

    /// Decide on a cancellation request and, if accepted, raise the flag.
    ///
    /// A goal that already finished answers `Reject` and is left untouched.
    /// An id the server has never seen (or has forgotten) is an error.
    pub fn cancel(&self, goal_id: Uuid) -> Result<CancelResponse, ServerError> {
        let (known, handle) = {
            let goals = self.registry.goals();
            match goals.get(&goal_id) {
                Some(entry) => (true, entry.handle.upgrade()),
                None => (false, None),
            }
        };

        let handle = match handle {
            Some(handle) if !handle.status().is_terminal() => handle,
            Some(handle) => return Ok(self.reject_finished(goal_id, handle.status())),
            None => {
                let finished = self.registry.finished().get(goal_id);
                return match finished {
                    Some(status) => Ok(self.reject_finished(goal_id, status)),
                    // Still registered but its worker has just dropped the handle.
                    None if known => Ok(self.reject_finished(goal_id, GoalStatus::Executing)),
                    None => Err(ServerError::GoalNotFound(goal_id)),
                };
            }
        };

        let decision = self.gate.evaluate_cancellation(handle.request());
        match &decision {
            CancelResponse::Accept => {
                handle.request_cancel();
                warn!(goal_id = %goal_id, "received cancellation request ACCEPTED");
                self.events
                    .dispatch(&GoalEvent::cancel_requested(goal_id, true, None));
            }
            CancelResponse::Reject { reason } => {
                error!(goal_id = %goal_id, "received cancellation request REJECTED: {}", reason);
                self.events
                    .dispatch(&GoalEvent::cancel_requested(goal_id, false, Some(reason)));
            }
        }
        Ok(decision)
    }

    fn reject_finished(&self, goal_id: Uuid, status: GoalStatus) -> CancelResponse {
        let reason = if status.is_terminal() {
            format!("goal already {}", status)
        } else {
            "goal is finishing".to_string()
        };
        info!(goal_id = %goal_id, "cancellation of finished goal ignored");
        self.events
            .dispatch(&GoalEvent::cancel_requested(goal_id, false, Some(&reason)));
        CancelResponse::Reject { reason }
    }

    /// Status of a running goal, or of a recently finished one.
    pub fn status(&self, goal_id: Uuid) -> Result<GoalStatus, ServerError> {
        let running = self
            .registry
            .goals()
            .get(&goal_id)
            .and_then(|entry| entry.handle.upgrade())
            .map(|handle| handle.status());
        if let Some(status) = running {
            return Ok(status);
        }
        self.registry
            .finished()
            .get(goal_id)
            .ok_or(ServerError::GoalNotFound(goal_id))
    }

    /// Ids of goals whose workers are still running.
    pub fn active_goals(&self) -> Vec<Uuid> {
        self.registry
            .goals()
            .iter()
            .filter(|(_, entry)| !entry.task.is_finished())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Take the substrate down and wait for every worker to exit.
    ///
    /// Goals still computing are abandoned without a result. New submissions
    /// fail with [`ServerError::ShuttingDown`] from the moment this is called.
    pub async fn shutdown(&self) {
        self.liveness_tx.send_replace(false);

        let tasks: Vec<(Uuid, JoinHandle<()>)> = self
            .registry
            .goals()
            .drain()
            .map(|(id, entry)| (id, entry.task))
            .collect();
        info!(goals = tasks.len(), "shutting down, waiting for goal workers");

        for (goal_id, task) in tasks {
            if let Err(e) = task.await {
                error!(goal_id = %goal_id, "goal worker failed: {}", e);
            }
        }
        info!("goal server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_goals_evicts_oldest() {
        let mut finished = FinishedGoals::new(2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        finished.record(ids[0], GoalStatus::Succeeded);
        finished.record(ids[1], GoalStatus::Canceled);
        finished.record(ids[2], GoalStatus::Aborted);

        assert_eq!(finished.get(ids[0]), None);
        assert_eq!(finished.get(ids[1]), Some(GoalStatus::Canceled));
        assert_eq!(finished.get(ids[2]), Some(GoalStatus::Aborted));
    }

    #[test]
    fn zero_limit_keeps_nothing() {
        let mut finished = FinishedGoals::new(0);
        let id = Uuid::new_v4();
        finished.record(id, GoalStatus::Succeeded);
        assert_eq!(finished.get(id), None);
    }

    #[test]
    fn server_needs_a_runtime() {
        let result = GoalServer::new(&ServerConfig::default());
        assert!(matches!(result, Err(ServerError::NoRuntime)));
    }

    #[tokio::test]
    async fn rejected_submission_reports_reason() {
        let server = GoalServer::new(&ServerConfig::default()).unwrap();
        let submission = server.submit(GoalRequest::new(21)).unwrap();
        assert!(!submission.response().is_accepted());
        assert!(server.active_goals().is_empty());
    }
}
