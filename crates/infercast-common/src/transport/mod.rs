//! Infercast Transport Layer
//!
//! The dispatcher never talks to the network directly; it goes through the
//! [`Transport`] trait so the worker pool can be driven by an instrumented
//! in-memory transport in tests.
//!
//! # Components
//!
//! - **[`Transport`]**: liveness probe + completion send, both bounded by a timeout
//! - **[`HttpTransport`]**: hyper client speaking the inference server's HTTP API

pub mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::protocol::{CompletionRequest, CompletionResponse};
use std::future::Future;
use std::time::Duration;

/// Network seam between the dispatcher and an inference cluster.
pub trait Transport: Send + Sync + 'static {
    /// Cheap unauthenticated read used to decide liveness.
    ///
    /// `Ok(())` means the endpoint answered with a 2xx status within `timeout`.
    fn probe(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Sends one completion request and parses the response.
    ///
    /// The whole exchange (connect, send, read body) is bounded by `timeout`.
    /// Non-2xx statuses and bodies without `choices[0].text` are errors.
    fn complete(
        &self,
        endpoint: &Endpoint,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> impl Future<Output = Result<CompletionResponse>> + Send;
}
