use futures::FutureExt;
use infercast_common::{CompletionRequest, Endpoint, InfercastError, Result, Transport};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::collector::Outcome;
use crate::stats::DispatchStats;

/// Configuration for retrying failed sends.
///
/// A failed attempt is retried against the same endpoint up to `max_retries`
/// times. Backoff is off by default: the next attempt goes out immediately.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (excluding initial attempt)
    ///
    /// Total attempts = max_retries + 1
    /// Default: 3
    pub max_retries: u32,
    /// Wait before the first retry, in milliseconds
    ///
    /// Default: 0 (retry immediately)
    pub initial_backoff_ms: u64,
    /// Cap on the wait between retries, in milliseconds
    ///
    /// Default: 5000ms
    pub max_backoff_ms: u64,
    /// Each retry waits: previous_backoff * multiplier
    ///
    /// Default: 2.0
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 0,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(InfercastError::InvalidConfig(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Backoff that follows `current_ms`, capped at `max_backoff_ms`.
    pub fn next_backoff_ms(&self, current_ms: u64) -> u64 {
        std::cmp::min(
            (current_ms as f64 * self.backoff_multiplier) as u64,
            self.max_backoff_ms,
        )
    }
}

/// Attempts left for one request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining: max_retries,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Spends one retry. Returns `false` when the budget is already empty.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Drives the attempt loop for one request against one endpoint.
///
/// Retries never move to a different endpoint: an endpoint that dies
/// mid-batch costs every request routed to it its full retry budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    timeout: Duration,
}

impl RetryPolicy {
    /// # Arguments
    /// * `config` - Retry budget and backoff
    /// * `timeout` - Timeout for each individual attempt
    pub fn new(config: RetryConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Sends `request` to `endpoint` until it succeeds or the budget runs out.
    ///
    /// The loop is iterative, so the caller's worker slot is held once for the
    /// whole attempt sequence. A transport that panics ends the request with
    /// [`InfercastError::Internal`] instead of taking the worker down. A failure is never returned as an error here:
    /// it ends up in [`Outcome::result`] as [`InfercastError::RetriesExhausted`].
    pub async fn execute<T: Transport>(
        &self,
        transport: &T,
        endpoint: Endpoint,
        request: CompletionRequest,
        stats: &DispatchStats,
    ) -> Outcome {
        let mut budget = RetryBudget::new(self.config.max_retries);
        let mut backoff_ms = self.config.initial_backoff_ms;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let result = {
                let _in_flight = stats.begin_send(&endpoint);
                AssertUnwindSafe(transport.complete(&endpoint, &request, self.timeout))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(InfercastError::Internal(format!(
                            "transport panicked: {}",
                            panic_message(payload.as_ref())
                        )))
                    })
            };

            let error = match result {
                Ok(response) => {
                    stats.record_success();
                    debug!(%endpoint, attempts, "request completed");
                    return Outcome::completed(request.prompt, endpoint, attempts, response);
                }
                Err(e) => e,
            };
            stats.record_failure(&endpoint);

            if !error.is_retryable() || !budget.consume() {
                warn!(
                    "Request to {} abandoned after {} attempt(s): {}",
                    endpoint, attempts, error
                );
                stats.record_exhausted();
                return Outcome::exhausted(request.prompt, endpoint, attempts, error);
            }

            warn!(
                "Request to {} failed (attempt {}): {}, {} retries left",
                endpoint,
                attempts,
                error,
                budget.remaining()
            );
            stats.record_retry();

            if backoff_ms > 0 {
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = self.config.next_backoff_ms(backoff_ms);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{endpoint, MockTransport};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig {
                max_retries,
                ..Default::default()
            },
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 0);
        assert_eq!(config.max_backoff_ms, 5000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = RetryConfig {
            backoff_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            initial_backoff_ms: 50,
            ..Default::default()
        };
        let mut backoff_ms = config.initial_backoff_ms;

        let expected = [50, 100, 200, 400, 800, 1600, 3200, 5000, 5000];
        for expected_ms in expected {
            assert_eq!(backoff_ms, expected_ms);
            backoff_ms = config.next_backoff_ms(backoff_ms);
        }
    }

    #[test]
    fn test_budget_consume() {
        let mut budget = RetryBudget::new(2);
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(!budget.consume());
        assert_eq!(budget.remaining(), 0);

        let mut empty = RetryBudget::new(0);
        assert!(!empty.consume());
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let a = endpoint(1);
        let transport = MockTransport::new();
        let stats = DispatchStats::new(&[a]);

        let outcome = policy(3)
            .execute(&transport, a, CompletionRequest::new("p1", 10), &stats)
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(outcome.is_completed());
        assert_eq!(transport.send_count(), 1);
    }

    #[tokio::test]
    async fn test_always_failing_consumes_k_plus_one_attempts() {
        let a = endpoint(1);
        let transport = MockTransport::new().with_failing(&[a]);
        let stats = DispatchStats::new(&[a]);

        let outcome = policy(2)
            .execute(&transport, a, CompletionRequest::new("p1", 10), &stats)
            .await;

        assert_eq!(outcome.attempts, 3);
        assert!(matches!(
            outcome.result,
            Err(InfercastError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(transport.sends_to(&a), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.attempts, 3);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.exhausted, 1);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let a = endpoint(1);
        let transport = MockTransport::new().with_failing(&[a]);
        let stats = DispatchStats::new(&[a]);

        let outcome = policy(0)
            .execute(&transport, a, CompletionRequest::new("p1", 10), &stats)
            .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.is_completed());
    }

    #[tokio::test]
    async fn test_flaky_request_recovers_on_same_endpoint() {
        let a = endpoint(1);
        let transport = MockTransport::new().with_flaky_prompt("p1", 2);
        let stats = DispatchStats::new(&[a]);

        let outcome = policy(3)
            .execute(&transport, a, CompletionRequest::new("p1", 10), &stats)
            .await;

        assert_eq!(outcome.attempts, 3);
        assert!(outcome.is_completed());
        assert_eq!(transport.endpoints_for("p1"), vec![a, a, a]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_between_attempts() {
        let a = endpoint(1);
        let transport = MockTransport::new().with_failing(&[a]);
        let stats = DispatchStats::new(&[a]);
        let policy = RetryPolicy::new(
            RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 100,
                ..Default::default()
            },
            Duration::from_secs(1),
        );

        let start = tokio::time::Instant::now();
        let outcome = policy
            .execute(&transport, a, CompletionRequest::new("p1", 10), &stats)
            .await;

        // 100ms before the first retry, 200ms before the second
        assert_eq!(outcome.attempts, 3);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_transport_panic_ends_request_without_retry() {
        let a = endpoint(1);
        let transport = MockTransport::new().with_panic_prompt("boom");
        let stats = DispatchStats::new(&[a]);

        let outcome = policy(3)
            .execute(&transport, a, CompletionRequest::new("boom", 10), &stats)
            .await;

        assert_eq!(outcome.attempts, 1);
        match outcome.result {
            Err(InfercastError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 1);
                assert!(last_error.contains("transport blew up"), "{}", last_error);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(stats.in_flight(), 0);
        assert_eq!(stats.snapshot().exhausted, 1);
    }
}
