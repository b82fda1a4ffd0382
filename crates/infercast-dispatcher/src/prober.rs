use infercast_common::{Endpoint, InfercastError, Result, Transport};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::selector::EndpointSelector;

/// Why a candidate endpoint was left out of the live set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The address string is not an IP literal; it was never probed
    InvalidAddress,
    /// The probe failed (timeout, connection error, non-2xx status)
    Unreachable(String),
}

/// A candidate that did not make it into the live set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedEndpoint {
    pub address: String,
    pub reason: ExclusionReason,
}

/// Outcome of probing a candidate list.
///
/// Every candidate ends up in exactly one of `live` or `excluded`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeReport {
    /// Reachable endpoints, in candidate order
    pub live: Vec<Endpoint>,
    pub excluded: Vec<ExcludedEndpoint>,
}

impl ProbeReport {
    /// Wraps the live set in a round-robin selector.
    ///
    /// Fails with [`InfercastError::NoLiveEndpoints`] when nothing answered.
    pub fn selector(&self) -> Result<EndpointSelector> {
        EndpointSelector::new(self.live.clone())
    }
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Port every candidate is probed on
    pub port: u16,
    /// Timeout for one probe
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 8088,
            timeout: Duration::from_secs(2),
        }
    }
}

/// One-shot liveness check over a candidate endpoint list.
pub struct LivenessProber<'a, T: Transport> {
    transport: &'a T,
    config: ProbeConfig,
}

impl<'a, T: Transport> LivenessProber<'a, T> {
    pub fn new(transport: &'a T, config: ProbeConfig) -> Self {
        Self { transport, config }
    }

    /// Validates and probes every candidate.
    ///
    /// Invalid addresses are excluded up front and never probed. The
    /// remaining endpoints are probed in parallel; the call returns once the
    /// slowest probe has answered or timed out.
    ///
    /// # Arguments
    /// * `candidates` - Address strings, e.g. `["10.0.0.1", "10.0.0.2"]`
    pub async fn probe_all(&self, candidates: &[String]) -> ProbeReport {
        let mut report = ProbeReport::default();
        let mut to_probe = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match Endpoint::parse(candidate, self.config.port) {
                Ok(endpoint) => to_probe.push((candidate, endpoint)),
                Err(_) => {
                    warn!(
                        "Address {} is not a valid IP address and will be excluded",
                        candidate
                    );
                    report.excluded.push(ExcludedEndpoint {
                        address: candidate.clone(),
                        reason: ExclusionReason::InvalidAddress,
                    });
                }
            }
        }

        // Check all endpoints in parallel
        let checks: Vec<_> = to_probe
            .into_iter()
            .map(|(candidate, endpoint)| {
                let timeout = self.config.timeout;
                async move {
                    let result = Self::check_endpoint(self.transport, &endpoint, timeout).await;
                    (candidate, endpoint, result)
                }
            })
            .collect();

        let results = futures::future::join_all(checks).await;

        for (candidate, endpoint, result) in results {
            match result {
                Ok(()) => report.live.push(endpoint),
                Err(e) => {
                    warn!(
                        "Endpoint {} is not responding and will be excluded: {}",
                        endpoint, e
                    );
                    report.excluded.push(ExcludedEndpoint {
                        address: candidate.clone(),
                        reason: ExclusionReason::Unreachable(e.to_string()),
                    });
                }
            }
        }

        info!(
            live = report.live.len(),
            excluded = report.excluded.len(),
            "Liveness probe completed"
        );
        report
    }

    /// Probes a single endpoint, enforcing the timeout here as well as in the transport.
    async fn check_endpoint(transport: &T, endpoint: &Endpoint, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, transport.probe(endpoint, timeout))
            .await
            .map_err(|_| InfercastError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| InfercastError::EndpointUnreachable {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })
    }
}
