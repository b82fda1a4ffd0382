//! Infercast Common Types and Transport
//!
//! Shared building blocks for dispatching completion requests to a cluster
//! of HTTP inference servers.
//!
//! # Components
//!
//! - [`error`] - [`InfercastError`] and the crate-wide [`Result`] alias
//! - [`endpoint`] - [`Endpoint`], one addressable inference server
//! - [`protocol`] - completion request/response wire types
//! - [`transport`] - the [`Transport`] trait and its hyper-based [`HttpTransport`]
//!
//! # Example
//!
//! ```no_run
//! use infercast_common::{CompletionRequest, Endpoint, HttpTransport, HttpTransportConfig, Transport};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTransportConfig::default());
//! let endpoint = Endpoint::parse("10.0.0.1", 8088)?;
//!
//! transport.probe(&endpoint, Duration::from_secs(2)).await?;
//! let request = CompletionRequest::new("The capital of France is ", 10);
//! let response = transport
//!     .complete(&endpoint, &request, Duration::from_secs(60))
//!     .await?;
//! println!("{:?}", response.text());
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod transport;

pub use endpoint::Endpoint;
pub use error::{InfercastError, Result};
pub use protocol::*;
pub use transport::{HttpTransport, HttpTransportConfig, Transport};
