use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfercastError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Endpoint {endpoint} unreachable: {reason}")]
    EndpointUnreachable { endpoint: String, reason: String },

    #[error("No live endpoints")]
    NoLiveEndpoints,

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfercastError {
    /// Whether a failed send attempt may be retried against the same endpoint.
    ///
    /// Every transport-level failure is retryable: timeouts, connection
    /// errors, non-2xx statuses and bodies that do not match the completion
    /// schema. A request that could not even be built is not, and neither is
    /// an [`Internal`](InfercastError::Internal) failure such as a panic.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InfercastError::Timeout(_)
                | InfercastError::Connection(_)
                | InfercastError::HttpStatus { .. }
                | InfercastError::MalformedResponse(_)
                | InfercastError::Transport(_)
                | InfercastError::EndpointUnreachable { .. }
        )
    }
}

impl From<std::net::AddrParseError> for InfercastError {
    fn from(err: std::net::AddrParseError) -> Self {
        InfercastError::InvalidAddress(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InfercastError>;
