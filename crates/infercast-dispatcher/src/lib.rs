//! # Infercast Dispatcher
//!
//! Batch dispatch of completion requests across a cluster of HTTP inference
//! servers.
//!
//! A batch goes through five stages:
//!
//! - [`prober`] - one parallel liveness probe over the candidate endpoints
//! - [`selector`] - round-robin choice among the endpoints that answered
//! - [`queue`] - a FIFO the worker pool drains; its size bounds concurrency
//! - [`retry`] - a fixed attempt budget per request, always on one endpoint
//! - [`collector`] - prompt → response map shared by every worker
//!
//! [`Dispatcher`] wires them together; [`DispatchStats`] counts what happened.

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod prober;
pub mod queue;
pub mod retry;
pub mod selector;
pub mod stats;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{Assignment, CollectedResults, Outcome, ResultCollector, ResultMap};
pub use config::DispatchConfig;
pub use dispatcher::{DispatchReport, Dispatcher};
pub use prober::{ExcludedEndpoint, ExclusionReason, LivenessProber, ProbeConfig, ProbeReport};
pub use queue::WorkQueue;
pub use retry::{RetryBudget, RetryConfig, RetryPolicy};
pub use selector::EndpointSelector;
pub use stats::{DispatchStats, EndpointStats, StatsSnapshot};
