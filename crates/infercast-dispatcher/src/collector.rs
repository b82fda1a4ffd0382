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

use infercast_common::{CompletionResponse, Endpoint, InfercastError, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Prompt → response, holding only prompts that got a successful response.
pub type ResultMap = HashMap<String, CompletionResponse>;

/// Final result of one request after its attempt loop.
#[derive(Debug)]
pub struct Outcome {
    /// Request identity
    pub prompt: String,
    /// Endpoint every attempt went to
    pub endpoint: Endpoint,
    /// Attempts made, initial one included
    pub attempts: u32,
    /// The response, or [`InfercastError::RetriesExhausted`]
    pub result: Result<CompletionResponse>,
}

impl Outcome {
    pub fn completed(
        prompt: String,
        endpoint: Endpoint,
        attempts: u32,
        response: CompletionResponse,
    ) -> Self {
        Self {
            prompt,
            endpoint,
            attempts,
            result: Ok(response),
        }
    }

    pub fn exhausted(
        prompt: String,
        endpoint: Endpoint,
        attempts: u32,
        last_error: InfercastError,
    ) -> Self {
        Self {
            prompt,
            endpoint,
            attempts,
            result: Err(InfercastError::RetriesExhausted {
                attempts,
                last_error: last_error.to_string(),
            }),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Where an outcome was routed, kept for every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub endpoint: Endpoint,
    pub attempts: u32,
    pub completed: bool,
}

#[derive(Debug, Default)]
struct CollectorInner {
    results: ResultMap,
    exhausted: Vec<String>,
    assignments: HashMap<String, Assignment>,
}

/// Shared sink the workers write outcomes into.
///
/// Writes from any number of workers are serialized by an async mutex, so
/// entries for distinct prompts never clobber each other. Duplicate prompts
/// collapse to one entry; the last write wins.
#[derive(Debug, Default)]
pub struct ResultCollector {
    inner: Mutex<CollectorInner>,
}

/// Everything gathered by a [`ResultCollector`] once the workers are done.
#[derive(Debug, Default)]
pub struct CollectedResults {
    pub results: ResultMap,
    /// Prompts whose every attempt failed, in completion order
    pub exhausted: Vec<String>,
    /// Endpoint and attempt count per prompt, successful or not
    pub assignments: HashMap<String, Assignment>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one outcome.
    ///
    /// Completed outcomes land in the result map; exhausted ones are only
    /// remembered by prompt, so the caller sees them as absent keys.
    pub async fn record(&self, outcome: Outcome) {
        let mut inner = self.inner.lock().await;
        inner.assignments.insert(
            outcome.prompt.clone(),
            Assignment {
                endpoint: outcome.endpoint,
                attempts: outcome.attempts,
                completed: outcome.is_completed(),
            },
        );

        match outcome.result {
            Ok(response) => {
                if inner.results.insert(outcome.prompt, response).is_some() {
                    debug!("Duplicate prompt overwrote an earlier result");
                }
            }
            Err(_) => inner.exhausted.push(outcome.prompt),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.results.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.results.is_empty()
    }

    /// Consumes the collector once no worker holds it any more.
    pub fn into_results(self) -> CollectedResults {
        let inner = self.inner.into_inner();
        CollectedResults {
            results: inner.results,
            exhausted: inner.exhausted,
            assignments: inner.assignments,
        }
    }
}
