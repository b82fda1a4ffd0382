//! In-memory transport for exercising the dispatcher without sockets.

use infercast_common::{
    CompletionChoice, CompletionRequest, CompletionResponse, Endpoint, InfercastError, Result,
    Transport,
};
use serde_json::Map;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable transport that records every probe and send.
#[derive(Default)]
pub(crate) struct MockTransport {
    live: HashSet<Endpoint>,
    failing: HashSet<Endpoint>,
    fail_times: Mutex<HashMap<String, u32>>,
    panic_prompts: HashSet<String>,
    latency: Duration,
    pub probes: Mutex<Vec<Endpoint>>,
    pub sends: Mutex<Vec<(String, Endpoint)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints that answer probes; all others are unreachable.
    pub fn with_live(mut self, endpoints: &[Endpoint]) -> Self {
        self.live.extend(endpoints.iter().copied());
        self
    }

    /// Endpoints whose completion sends always fail.
    pub fn with_failing(mut self, endpoints: &[Endpoint]) -> Self {
        self.failing.extend(endpoints.iter().copied());
        self
    }

    /// Fails the first `times` sends of `prompt`, then succeeds.
    pub fn with_flaky_prompt(self, prompt: &str, times: u32) -> Self {
        self.fail_times
            .lock()
            .unwrap()
            .insert(prompt.to_string(), times);
        self
    }

    /// Panics inside `complete` whenever `prompt` is sent.
    pub fn with_panic_prompt(mut self, prompt: &str) -> Self {
        self.panic_prompts.insert(prompt.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn sends_to(&self, endpoint: &Endpoint) -> usize {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e == endpoint)
            .count()
    }

    pub fn endpoints_for(&self, prompt: &str) -> Vec<Endpoint> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == prompt)
            .map(|(_, e)| *e)
            .collect()
    }

    fn should_fail(&self, endpoint: &Endpoint, prompt: &str) -> bool {
        if self.failing.contains(endpoint) {
            return true;
        }
        let mut fail_times = self.fail_times.lock().unwrap();
        match fail_times.get_mut(prompt) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

pub(crate) fn response_for(prompt: &str, endpoint: &Endpoint) -> CompletionResponse {
    CompletionResponse {
        id: None,
        object: None,
        created: None,
        model: None,
        choices: vec![CompletionChoice {
            text: format!("{}@{}", prompt, endpoint),
            index: Some(0),
            finish_reason: None,
            logprobs: None,
        }],
        usage: None,
        extra: Map::new(),
    }
}

impl Transport for MockTransport {
    async fn probe(&self, endpoint: &Endpoint, _timeout: Duration) -> Result<()> {
        self.probes.lock().unwrap().push(*endpoint);
        if self.live.contains(endpoint) {
            Ok(())
        } else {
            Err(InfercastError::Connection("connection refused".to_string()))
        }
    }

    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &CompletionRequest,
        _timeout: Duration,
    ) -> Result<CompletionResponse> {
        if self.panic_prompts.contains(&request.prompt) {
            panic!("transport blew up on {:?}", request.prompt);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.sends
            .lock()
            .unwrap()
            .push((request.prompt.clone(), *endpoint));
        let fail = self.should_fail(endpoint, &request.prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fail {
            Err(InfercastError::HttpStatus {
                status: 503,
                body: "unavailable".to_string(),
            })
        } else {
            Ok(response_for(&request.prompt, endpoint))
        }
    }
}

pub(crate) fn endpoint(last_octet: u8) -> Endpoint {
    Endpoint::parse(&format!("10.0.0.{}", last_octet), 8088).unwrap()
}
