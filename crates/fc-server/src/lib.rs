//! # fc-server
//!
//! The Fibonacci Computer goal server.
//!
//! Accepts computation requests, admits or rejects them synchronously, runs
//! each admitted goal on its own tokio task, streams per-step feedback, and
//! resolves every goal into exactly one terminal status while staying
//! responsive to cancellation requests.
//!
//! ## Key components
//!
//! - [`GoalServer`] — admission, cancellation routing, status, shutdown
//! - [`GoalExecutor`] — the per-goal worker driving the sequence engine
//! - [`GoalHandle`] — one goal's status, cancellation flag, and update stream
//! - [`transport::serve`] — JSON-lines transport over any async byte stream
//! - [`ServerConfig`] — limits and timing, loaded from TOML

pub mod config;
pub mod error;
pub mod executor;
pub mod handle;
pub mod registry;
pub mod transport;

pub use config::ServerConfig;
pub use error::ServerError;
pub use executor::{ExecutionOutcome, GoalExecutor};
pub use handle::{GoalHandle, GoalSubscription, GoalUpdate, Liveness};
pub use registry::{GoalServer, Submission};
