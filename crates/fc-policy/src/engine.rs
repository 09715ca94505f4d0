// engine.rs — Admission decisions for goals and cancellation requests.
//
// Every inbound request passes through `evaluate_goal()`:
//
// 1. Is `order` above the configured maximum? → Reject
// 2. Otherwise → AcceptAndExecute (the goal starts running immediately)
//
// Every inbound cancellation passes through `evaluate_cancellation()`:
//
// 1. Is the goal's `order` below the cancelable threshold? → Reject
// 2. Otherwise → Accept (the worker decides when to actually stop)
//
// Both run on the dispatch path, so they only look at the request.

use serde::{Deserialize, Serialize};

use fc_goal::sequence::MAX_REPRESENTABLE_ORDER;
use fc_goal::GoalRequest;

use crate::error::PolicyError;

/// Default largest order the server will compute.
pub const DEFAULT_MAX_ORDER: u32 = 20;

/// Default smallest order whose goals may be canceled.
pub const DEFAULT_MIN_CANCELABLE_ORDER: u32 = 10;

/// The limits the gate enforces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Requests with a larger order are rejected outright.
    pub max_order: u32,
    /// Goals with a smaller order refuse cancellation.
    pub min_cancelable_order: u32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            max_order: DEFAULT_MAX_ORDER,
            min_cancelable_order: DEFAULT_MIN_CANCELABLE_ORDER,
        }
    }
}

impl AdmissionPolicy {
    /// Check that the limits make sense together.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_order > MAX_REPRESENTABLE_ORDER {
            return Err(PolicyError::OrderLimitTooLarge {
                max_order: self.max_order,
                limit: MAX_REPRESENTABLE_ORDER,
            });
        }
        if self.min_cancelable_order > self.max_order.saturating_add(1) {
            return Err(PolicyError::CancelThresholdUnreachable {
                min_cancelable_order: self.min_cancelable_order,
                max_order: self.max_order,
            });
        }
        Ok(())
    }
}

/// The answer to a new goal request.
///
/// `#[derive(PartialEq)]` lets us use `==` to compare decisions in tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GoalResponse {
    /// The goal is created and marked executing right away.
    AcceptAndExecute,
    /// No goal is created.
    Reject { reason: String },
}

impl GoalResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GoalResponse::AcceptAndExecute)
    }
}

/// The answer to a cancellation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum CancelResponse {
    /// The cancellation flag may be raised; the worker stops at its next step.
    Accept,
    /// The flag stays down and execution continues unaffected.
    Reject { reason: String },
}

impl CancelResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CancelResponse::Accept)
    }
}

/// The admission gate. Evaluates requests against an [`AdmissionPolicy`].
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    policy: AdmissionPolicy,
}

impl AdmissionGate {
    /// Create a gate, rejecting inconsistent limits.
    pub fn new(policy: AdmissionPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// Decide whether a new goal runs at all.
    pub fn evaluate_goal(&self, request: &GoalRequest) -> GoalResponse {
        if request.order > self.policy.max_order {
            return GoalResponse::Reject {
                reason: format!(
                    "order {} exceeds the maximum of {}",
                    request.order, self.policy.max_order
                ),
            };
        }
        GoalResponse::AcceptAndExecute
    }

    /// Decide whether a running goal may be canceled.
    ///
    /// Accepting is advisory. The caller raises the goal's cancellation flag;
    /// the worker is the only one that acts on it.
    pub fn evaluate_cancellation(&self, request: &GoalRequest) -> CancelResponse {
        if request.order < self.policy.min_cancelable_order {
            return CancelResponse::Reject {
                reason: format!(
                    "goals below order {} are not cancelable",
                    self.policy.min_cancelable_order
                ),
            };
        }
        CancelResponse::Accept
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self {
            policy: AdmissionPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_up_to_twenty_are_accepted() {
        let gate = AdmissionGate::default();
        for order in 0..=20 {
            assert_eq!(
                gate.evaluate_goal(&GoalRequest::new(order)),
                GoalResponse::AcceptAndExecute,
                "order {order}"
            );
        }
    }

    #[test]
    fn orders_above_twenty_are_rejected() {
        let gate = AdmissionGate::default();
        for order in [21, 22, 50, u32::MAX] {
            let decision = gate.evaluate_goal(&GoalRequest::new(order));
            assert!(
                matches!(decision, GoalResponse::Reject { .. }),
                "order {order}"
            );
        }
    }

    #[test]
    fn zero_is_admitted_here_and_aborted_later() {
        // Order 0 is a valid request; the executor aborts it after creation.
        let gate = AdmissionGate::default();
        assert!(gate.evaluate_goal(&GoalRequest::new(0)).is_accepted());
    }

    #[test]
    fn short_goals_refuse_cancellation() {
        let gate = AdmissionGate::default();
        for order in 0..10 {
            let decision = gate.evaluate_cancellation(&GoalRequest::new(order));
            assert!(!decision.is_accepted(), "order {order}");
        }
    }

    #[test]
    fn long_goals_accept_cancellation() {
        let gate = AdmissionGate::default();
        for order in 10..=20 {
            assert_eq!(
                gate.evaluate_cancellation(&GoalRequest::new(order)),
                CancelResponse::Accept
            );
        }
    }

    #[test]
    fn custom_limits_are_respected() {
        let gate = AdmissionGate::new(AdmissionPolicy {
            max_order: 40,
            min_cancelable_order: 3,
        })
        .unwrap();
        assert!(gate.evaluate_goal(&GoalRequest::new(40)).is_accepted());
        assert!(!gate.evaluate_goal(&GoalRequest::new(41)).is_accepted());
        assert!(gate.evaluate_cancellation(&GoalRequest::new(3)).is_accepted());
    }

    #[test]
    fn overflowing_max_order_is_invalid() {
        let result = AdmissionGate::new(AdmissionPolicy {
            max_order: MAX_REPRESENTABLE_ORDER + 1,
            min_cancelable_order: 10,
        });
        assert!(matches!(result, Err(PolicyError::OrderLimitTooLarge { .. })));
    }

    #[test]
    fn unreachable_cancel_threshold_is_invalid() {
        let result = AdmissionGate::new(AdmissionPolicy {
            max_order: 20,
            min_cancelable_order: 22,
        });
        assert!(matches!(
            result,
            Err(PolicyError::CancelThresholdUnreachable { .. })
        ));

        // One past the max is allowed: it simply disables cancellation.
        assert!(AdmissionGate::new(AdmissionPolicy {
            max_order: 20,
            min_cancelable_order: 21,
        })
        .is_ok());
    }

    #[test]
    fn decisions_serialize_with_decision_tag() {
        let json = serde_json::to_string(&GoalResponse::Reject {
            reason: "too big".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"decision\":\"reject\""));
        assert_eq!(
            serde_json::to_string(&CancelResponse::Accept).unwrap(),
            r#"{"decision":"accept"}"#
        );
    }
}
