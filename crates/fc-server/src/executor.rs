// executor.rs — The per-goal worker.
//
// A GoalExecutor runs on its own tokio task, never on the dispatch path that
// admitted it. It drives the sequence one step at a time:
//
//   order 0           → Aborted (empty result, no feedback)
//   seed [0, 1]
//   per step          → check cancel flag → append → feedback → sleep
//   loop finished     → Succeeded (only if the substrate is still live)
//   substrate down    → abandoned, no terminal transition
//
// The sleep is the only suspension point. It also bounds how often the
// cancellation flag is polled.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use fc_goal::{EventDispatcher, FibonacciSequence, GoalError, GoalEvent, GoalStatus, ResultMessage};

use crate::handle::{GoalHandle, Liveness};

/// How an executor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The goal reached this terminal status and its result was delivered.
    Finished(GoalStatus),
    /// The server shut down before the goal could be resolved.
    Abandoned,
}

/// Computes one goal from admission to its terminal status.
pub struct GoalExecutor {
    handle: Arc<GoalHandle>,
    step_interval: Duration,
    liveness: Liveness,
    events: Arc<EventDispatcher>,
}

impl GoalExecutor {
    pub fn new(
        handle: Arc<GoalHandle>,
        step_interval: Duration,
        liveness: Liveness,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            handle,
            step_interval,
            liveness,
            events,
        }
    }

    /// Run the goal to completion. Consumes the executor, and with it the
    /// strong reference to the goal handle.
    pub async fn run(mut self) -> ExecutionOutcome {
        let goal_id = self.handle.id();
        let order = self.handle.request().order;
        info!(goal_id = %goal_id, order, "starting computation");

        // Order 0 is a valid request but there is nothing to compute.
        if order == 0 {
            error!(goal_id = %goal_id, "request has invalid order 0, ABORTED");
            return self.record(self.handle.abort(Vec::new()));
        }

        let mut sequence = FibonacciSequence::seeded(order);

        while !sequence.is_complete() && self.liveness.is_operational() {
            if self.handle.is_canceling() {
                warn!(
                    goal_id = %goal_id,
                    steps = sequence.steps_taken(),
                    "computation CANCELED"
                );
                return self.record(self.handle.canceled(sequence.into_vec()));
            }

            if sequence.advance().is_none() {
                // Orders are bounded by the admission policy, so this means
                // the policy was bypassed.
                error!(goal_id = %goal_id, order, "sequence overflowed, ABORTED");
                return self.record(self.handle.abort(Vec::new()));
            }

            match self.handle.publish_feedback(sequence.as_slice()) {
                Ok(()) => debug!(goal_id = %goal_id, "published feedback"),
                Err(e) => debug!(goal_id = %goal_id, "feedback not delivered: {}", e),
            }
            self.events.dispatch(&GoalEvent::feedback_published(
                goal_id,
                sequence.steps_taken(),
                sequence.as_slice().len(),
            ));

            self.pause().await;
        }

        if !self.liveness.is_operational() {
            info!(goal_id = %goal_id, "server shutting down, goal abandoned");
            self.events.dispatch(&GoalEvent::goal_abandoned(goal_id));
            return ExecutionOutcome::Abandoned;
        }

        info!(goal_id = %goal_id, "goal completed");
        self.record(self.handle.succeed(sequence.into_vec()))
    }

    /// Sleep for one step interval, waking early if the server shuts down.
    async fn pause(&mut self) {
        let interval = self.step_interval;
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = self.liveness.shutting_down() => {}
        }
    }

    fn record(&self, resolved: Result<ResultMessage, GoalError>) -> ExecutionOutcome {
        match resolved {
            Ok(result) => {
                self.events.dispatch(&GoalEvent::goal_finished(
                    result.goal_id,
                    result.status,
                    result.sequence.len(),
                ));
                ExecutionOutcome::Finished(result.status)
            }
            Err(e) => {
                // Only the executor resolves its goal, so this is a logic error.
                warn!(goal_id = %self.handle.id(), "could not resolve goal: {}", e);
                ExecutionOutcome::Finished(self.handle.status())
            }
        }
    }
}
