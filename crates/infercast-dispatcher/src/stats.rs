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

use infercast_common::Endpoint;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock-free counters for one batch.
///
/// The per-endpoint table is fixed when the batch starts (one row per live
/// endpoint), so recording never takes a lock. Counters use relaxed ordering;
/// a snapshot taken after the workers have been joined is exact.
#[derive(Debug)]
pub struct DispatchStats {
    attempts: AtomicU64,
    retries: AtomicU64,
    completed: AtomicU64,
    exhausted: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    endpoints: Vec<(Endpoint, EndpointCounters)>,
}

#[derive(Debug, Default)]
struct EndpointCounters {
    selected: AtomicU64,
    attempts: AtomicU64,
    failures: AtomicU64,
}

/// Per-endpoint figures in a [`StatsSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStats {
    pub endpoint: Endpoint,
    /// Requests routed to this endpoint by the selector
    pub selected: u64,
    /// Send attempts, retries included
    pub attempts: u64,
    pub failures: u64,
}

/// Serializable view of [`DispatchStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub attempts: u64,
    pub retries: u64,
    pub completed: u64,
    pub exhausted: u64,
    /// Highest number of sends observed in flight at once
    pub peak_in_flight: usize,
    pub endpoints: Vec<EndpointStats>,
}

impl StatsSnapshot {
    pub fn endpoint(&self, endpoint: &Endpoint) -> Option<&EndpointStats> {
        self.endpoints.iter().find(|e| &e.endpoint == endpoint)
    }
}

/// Marks one send as in flight until dropped.
pub struct InFlightGuard<'a> {
    stats: &'a DispatchStats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl DispatchStats {
    pub fn new(live: &[Endpoint]) -> Self {
        let mut endpoints: Vec<(Endpoint, EndpointCounters)> = Vec::with_capacity(live.len());
        for endpoint in live {
            if !endpoints.iter().any(|(e, _)| e == endpoint) {
                endpoints.push((*endpoint, EndpointCounters::default()));
            }
        }

        Self {
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            endpoints,
        }
    }

    fn counters(&self, endpoint: &Endpoint) -> Option<&EndpointCounters> {
        self.endpoints
            .iter()
            .find(|(e, _)| e == endpoint)
            .map(|(_, c)| c)
    }

    pub fn record_selection(&self, endpoint: &Endpoint) {
        if let Some(c) = self.counters(endpoint) {
            c.selected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Counts an attempt and holds an in-flight slot for its duration.
    pub fn begin_send(&self, endpoint: &Endpoint) -> InFlightGuard<'_> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if let Some(c) = self.counters(endpoint) {
            c.attempts.fetch_add(1, Ordering::Relaxed);
        }

        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        InFlightGuard { stats: self }
    }

    pub fn record_success(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, endpoint: &Endpoint) {
        if let Some(c) = self.counters(endpoint) {
            c.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            endpoints: self
                .endpoints
                .iter()
                .map(|(endpoint, c)| EndpointStats {
                    endpoint: *endpoint,
                    selected: c.selected.load(Ordering::Relaxed),
                    attempts: c.attempts.load(Ordering::Relaxed),
                    failures: c.failures.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}
