//! HTTP Transport
//!
//! Talks to inference servers over plain HTTP/1.1 with a hyper client.
//!
//! - Probe: `GET /`, any 2xx is live
//! - Completion: `POST /v1/engines/{model}/completions` with a JSON body
//!
//! One client is shared by every worker of a [`HttpTransport`]; it is cheap to
//! clone and multiplexes connections per endpoint internally.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{InfercastError, Result};
use crate::protocol::{CompletionRequest, CompletionResponse};
use crate::transport::Transport;

/// Longest slice of an error body kept in [`InfercastError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Model identifier placed in the completion route
    pub model: String,
    /// TCP connect timeout, applied independently of the per-call timeout
    pub connect_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            model: "llama2_13B_chat".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Hyper-based [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    model: String,
}

impl HttpTransport {
    /// Creates a transport with its own connection pool.
    pub fn new(config: HttpTransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            model: config.model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `request` and returns the status and the full body.
    ///
    /// The timeout covers the response body as well as the headers.
    async fn execute(
        &self,
        request: Request<Full<Bytes>>,
        timeout: Duration,
    ) -> Result<(StatusCode, Bytes)> {
        let exchange = async {
            let response = self.client.request(request).await.map_err(|e| {
                if e.is_connect() {
                    InfercastError::Connection(e.to_string())
                } else {
                    InfercastError::Transport(format!("HTTP request failed: {}", e))
                }
            })?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| InfercastError::Transport(format!("Failed to read response: {}", e)))?
                .to_bytes();
            Ok::<_, InfercastError>((status, body))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| InfercastError::Timeout(timeout.as_millis() as u64))?
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> InfercastError {
    InfercastError::HttpStatus {
        status: status.as_u16(),
        body: String::from_utf8_lossy(body)
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect(),
    }
}

impl Transport for HttpTransport {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> Result<()> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(endpoint.probe_url())
            .body(Full::new(Bytes::new()))
            .map_err(|e| InfercastError::InvalidRequest(format!("Failed to build probe: {}", e)))?;

        let (status, body) = self.execute(request, timeout).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        debug!(%endpoint, status = status.as_u16(), "probe succeeded");
        Ok(())
    }

    async fn complete(
        &self,
        endpoint: &Endpoint,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse> {
        let body = serde_json::to_vec(request)?;
        let http_request = Request::builder()
            .method(Method::POST)
            .uri(endpoint.completions_url(&self.model))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| InfercastError::InvalidRequest(format!("Failed to build request: {}", e)))?;

        let (status, body) = self.execute(http_request, timeout).await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        CompletionResponse::from_slice(&body)
    }
}
