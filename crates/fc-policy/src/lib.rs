//! # fc-policy
//!
//! Admission policy for the Fibonacci Computer.
//!
//! The [`AdmissionGate`] answers two synchronous questions from the request
//! parameters alone: should this goal run at all, and may this running goal
//! be canceled. It never touches shared state and never computes anything
//! proportional to the goal's size, so it is safe on the dispatch path.
//!
//! ## Key invariants
//!
//! - **Bounded orders**: `order > max_order` is rejected before a goal exists.
//! - **Accept means execute**: there is no deferred or queued admission.
//! - **Short goals run to completion**: `order < min_cancelable_order` refuses
//!   cancellation.
//! - **Cancellation is advisory**: accepting it only permits the worker to stop.

pub mod engine;
pub mod error;

pub use engine::{AdmissionGate, AdmissionPolicy, CancelResponse, GoalResponse};
pub use error::PolicyError;
