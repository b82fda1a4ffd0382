use crate::error::{InfercastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// One inference server in the cluster.
///
/// The host must be a literal IP address; hostnames are rejected so that an
/// address list can be validated without DNS before any probe goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    host: IpAddr,
    port: u16,
}

impl Endpoint {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self { host, port }
    }

    /// Parses a candidate address string.
    ///
    /// Surrounding whitespace is ignored. Anything that is not an IPv4 or IPv6
    /// literal yields [`InfercastError::InvalidAddress`].
    ///
    /// # Arguments
    /// * `host` - Address string from the endpoint list
    /// * `port` - Cluster-wide listening port
    pub fn parse(host: &str, port: u16) -> Result<Self> {
        let trimmed = host.trim();
        trimmed
            .parse::<IpAddr>()
            .map(|host| Self::new(host, port))
            .map_err(|_| InfercastError::InvalidAddress(trimmed.to_string()))
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Base URL, e.g. `http://10.0.0.1:8088`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.socket_addr())
    }

    /// URL of the liveness probe (`GET /`).
    pub fn probe_url(&self) -> String {
        format!("{}/", self.base_url())
    }

    /// URL of the completion route for `model`.
    pub fn completions_url(&self, model: &str) -> String {
        format!("{}/v1/engines/{}/completions", self.base_url(), model)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv4() {
        let endpoint = Endpoint::parse("10.0.0.1", 8088).unwrap();
        assert_eq!(endpoint.to_string(), "10.0.0.1:8088");
        assert_eq!(endpoint.port(), 8088);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let endpoint = Endpoint::parse("  192.168.1.7\n", 80).unwrap();
        assert_eq!(endpoint.host().to_string(), "192.168.1.7");
    }

    #[test]
    fn test_parse_ipv6_uses_brackets_in_urls() {
        let endpoint = Endpoint::parse("::1", 8088).unwrap();
        assert_eq!(endpoint.base_url(), "http://[::1]:8088");
    }

    #[test]
    fn test_parse_rejects_hostnames() {
        let err = Endpoint::parse("not-an-ip", 8088).unwrap_err();
        assert!(matches!(err, InfercastError::InvalidAddress(ref a) if a == "not-an-ip"));
        assert!(Endpoint::parse("localhost", 8088).is_err());
        assert!(Endpoint::parse("10.0.0.1:8088", 8088).is_err());
        assert!(Endpoint::parse("", 8088).is_err());
    }

    #[test]
    fn test_urls() {
        let endpoint = Endpoint::parse("10.0.0.1", 8088).unwrap();
        assert_eq!(endpoint.probe_url(), "http://10.0.0.1:8088/");
        assert_eq!(
            endpoint.completions_url("llama2_13B_chat"),
            "http://10.0.0.1:8088/v1/engines/llama2_13B_chat/completions"
        );
    }
}
