// Copyright 2025 Infercast Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sequential per-endpoint smoke test.
//!
//! Sends one short completion to each candidate in turn, without probing
//! first, and records how long each endpoint took to answer.

use infercast_common::{CompletionRequest, CompletionResponse, Endpoint, Transport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const SMOKE_PROMPT: &str = "The capital of France is ";
pub const SMOKE_MAX_TOKENS: u32 = 10;

/// Result for one endpoint that answered.
#[derive(Debug, Clone, Serialize)]
pub struct SmokeResult {
    pub endpoint: Endpoint,
    /// Wall time from sending the request to having the full response
    pub latency_ms: u64,
    pub response: CompletionResponse,
}

/// Runs the smoke test, keyed by candidate address.
///
/// Invalid addresses are skipped; endpoints that fail are logged and left
/// out of the map.
pub async fn smoke_test<T: Transport>(
    transport: &T,
    candidates: &[String],
    port: u16,
    timeout: Duration,
) -> BTreeMap<String, SmokeResult> {
    let request = CompletionRequest::new(SMOKE_PROMPT, SMOKE_MAX_TOKENS);
    let mut results = BTreeMap::new();

    for candidate in candidates {
        let endpoint = match Endpoint::parse(candidate, port) {
            Ok(endpoint) => endpoint,
            Err(_) => {
                warn!(
                    "Address {} is not a valid IP address and will be excluded from the test",
                    candidate
                );
                continue;
            }
        };

        let start = Instant::now();
        match transport.complete(&endpoint, &request, timeout).await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                info!(%endpoint, latency_ms, "smoke test passed");
                results.insert(
                    candidate.clone(),
                    SmokeResult {
                        endpoint,
                        latency_ms,
                        response,
                    },
                );
            }
            Err(e) => warn!("Smoke test against {} failed: {}", endpoint, e),
        }
    }

    results
}
