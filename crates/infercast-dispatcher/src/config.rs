use infercast_common::{HttpTransportConfig, InfercastError, Result};
use std::time::Duration;

use crate::retry::RetryConfig;

/// Configuration for one [`Dispatcher`](crate::Dispatcher).
///
/// Every value the batch needs is carried here; there is no process-wide
/// state. Defaults match a cluster of `llama2_13B_chat` servers on port 8088.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Candidate endpoint addresses (IP literals), probed before each batch
    pub endpoints: Vec<String>,
    /// Listening port shared by every endpoint in the cluster
    ///
    /// Default: 8088
    pub port: u16,
    /// Number of workers, and therefore the maximum number of sends in flight
    ///
    /// Default: 100
    pub concurrency: usize,
    /// Retry behaviour for failed sends
    pub retry: RetryConfig,
    /// Timeout for one completion attempt
    ///
    /// Default: 60s
    pub request_timeout: Duration,
    /// Timeout for one liveness probe; must be shorter than `request_timeout`
    ///
    /// Default: 2s
    pub probe_timeout: Duration,
    /// TCP connect timeout
    ///
    /// Default: 5s
    pub connect_timeout: Duration,
    /// `max_tokens` sent with every request
    ///
    /// Default: 500
    pub max_tokens: u32,
    /// Model identifier in the completion route
    ///
    /// Default: `llama2_13B_chat`
    pub model: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            port: 8088,
            concurrency: 100,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            max_tokens: 500,
            model: "llama2_13B_chat".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Rejects values the worker pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(InfercastError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(InfercastError::InvalidConfig(
                "request timeout must be non-zero".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(InfercastError::InvalidConfig(
                "probe timeout must be non-zero".to_string(),
            ));
        }
        if self.probe_timeout >= self.request_timeout {
            return Err(InfercastError::InvalidConfig(format!(
                "probe timeout ({:?}) must be shorter than request timeout ({:?})",
                self.probe_timeout, self.request_timeout
            )));
        }
        if self.model.trim().is_empty() {
            return Err(InfercastError::InvalidConfig(
                "model identifier must not be empty".to_string(),
            ));
        }
        self.retry.validate()
    }

    /// Transport settings derived from this config.
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            model: self.model.clone(),
            connect_timeout: self.connect_timeout,
        }
    }
}
