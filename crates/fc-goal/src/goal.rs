// goal.rs — Goal requests, lifecycle status, and the messages a requester sees.
//
// The state machine is deliberately small:
//   Executing → Succeeded
//   Executing → Canceled
//   Executing → Aborted
// All three outcomes are terminal. There is no pending state: admission
// implies execution starts right away.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;

/// A computation request: "give me the Fibonacci sequence up to `order`".
///
/// Immutable once submitted. The admission gate reads it first, then the
/// executor that runs the goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalRequest {
    pub order: u32,
}

impl GoalRequest {
    pub fn new(order: u32) -> Self {
        Self { order }
    }
}

/// The lifecycle status of an admitted goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    /// The worker is computing.
    Executing,

    /// The sequence was computed in full.
    Succeeded,

    /// A cancellation request was honored at a step boundary.
    Canceled,

    /// The goal was given up on (order 0).
    Aborted,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalStatus::Executing => write!(f, "executing"),
            GoalStatus::Succeeded => write!(f, "succeeded"),
            GoalStatus::Canceled => write!(f, "canceled"),
            GoalStatus::Aborted => write!(f, "aborted"),
        }
    }
}

impl GoalStatus {
    /// Whether no further transitions or messages can follow this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GoalStatus::Executing)
    }

    /// Check whether moving from this status to `next` is valid.
    ///
    /// Only `Executing` has outgoing edges, and each leads to a terminal state.
    pub fn can_transition_to(&self, next: &GoalStatus) -> bool {
        matches!(self, GoalStatus::Executing) && next.is_terminal()
    }

    /// Move to `next`, or return an error if the transition is invalid.
    pub fn transition(&mut self, goal_id: Uuid, next: GoalStatus) -> Result<(), GoalError> {
        if !self.can_transition_to(&next) {
            return Err(GoalError::InvalidTransition {
                goal_id,
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

/// Incremental progress: the sequence computed so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub goal_id: Uuid,
    pub partial_sequence: Vec<u64>,
}

/// The single terminal message of a goal.
///
/// `sequence` is partial when the goal was canceled and empty when it was
/// aborted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultMessage {
    pub goal_id: Uuid,
    pub status: GoalStatus,
    pub sequence: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executing_can_reach_every_terminal_state() {
        for next in [GoalStatus::Succeeded, GoalStatus::Canceled, GoalStatus::Aborted] {
            let mut status = GoalStatus::Executing;
            status.transition(Uuid::new_v4(), next).unwrap();
            assert_eq!(status, next);
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        let terminals = [GoalStatus::Succeeded, GoalStatus::Canceled, GoalStatus::Aborted];
        for from in terminals {
            for to in terminals.iter().chain([GoalStatus::Executing].iter()) {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be invalid");
            }
        }
    }

    #[test]
    fn second_transition_returns_error_and_keeps_first_outcome() {
        let id = Uuid::new_v4();
        let mut status = GoalStatus::Executing;
        status.transition(id, GoalStatus::Canceled).unwrap();

        let result = status.transition(id, GoalStatus::Succeeded);
        assert!(matches!(result, Err(GoalError::InvalidTransition { .. })));
        assert_eq!(status, GoalStatus::Canceled);
    }

    #[test]
    fn executing_to_executing_is_invalid() {
        assert!(!GoalStatus::Executing.can_transition_to(&GoalStatus::Executing));
    }

    #[test]
    fn status_display_and_serde_agree() {
        assert_eq!(GoalStatus::Succeeded.to_string(), "succeeded");
        assert_eq!(
            serde_json::to_string(&GoalStatus::Aborted).unwrap(),
            "\"aborted\""
        );
    }

    #[test]
    fn request_deserializes_from_wire_shape() {
        let request: GoalRequest = serde_json::from_str(r#"{"order": 7}"#).unwrap();
        assert_eq!(request, GoalRequest::new(7));
    }
}
