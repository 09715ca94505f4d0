//! # fc-goal
//!
//! Goal lifecycle, sequence computation, and event dispatch for the
//! Fibonacci Computer action server.
//!
//! A goal is one admitted computation request. It starts `Executing` and
//! ends in exactly one terminal state; nothing happens to it afterwards.
//!
//! ## Key components
//!
//! - [`GoalRequest`] — the immutable request (`order`)
//! - [`GoalStatus`] — the lifecycle state machine (Executing → Succeeded |
//!   Canceled | Aborted)
//! - [`FibonacciSequence`] — the step-at-a-time sequence engine
//! - [`FeedbackMessage`] / [`ResultMessage`] — what a requester sees
//! - [`GoalEvent`] — events emitted at key lifecycle points
//! - [`EventDispatcher`] — dispatches events to notification sinks
//! - [`NotificationSink`] — trait for receiving events (log file, tracing, ...)

pub mod error;
pub mod events;
pub mod goal;
pub mod sequence;

pub use error::GoalError;
pub use events::{EventDispatcher, GoalEvent, LogSink, NotificationSink, TracingSink};
pub use goal::{FeedbackMessage, GoalRequest, GoalStatus, ResultMessage};
pub use sequence::FibonacciSequence;
