//! Endpoint URI parsing

use crate::TransportError;
use std::fmt;
use std::net::IpAddr;

/// A `tcp://host:port` transport address.
///
/// `*` as host binds every interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Only supported scheme
    pub const SCHEME: &'static str = "tcp";

    /// Create an endpoint from host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `tcp://host:port`
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let invalid = || TransportError::InvalidEndpoint(uri.to_string());

        let (scheme, address) = uri.split_once("://").ok_or_else(invalid)?;
        if scheme != Self::SCHEME {
            return Err(TransportError::InvalidEndpoint(format!(
                "{} (unsupported scheme '{}')",
                uri, scheme
            )));
        }

        let colon = address.rfind(':').ok_or_else(invalid)?;
        let host = address[..colon].trim_start_matches('[').trim_end_matches(']');
        let port = address[colon + 1..].parse::<u16>().map_err(|_| invalid())?;

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(host, port))
    }

    /// Host part
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the endpoint only reaches the local host
    pub fn is_loopback(&self) -> bool {
        if self.host.eq_ignore_ascii_case("localhost") {
            return true;
        }
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => write!(f, "{}://[{}]:{}", Self::SCHEME, self.host, self.port),
            _ => write!(f, "{}://{}:{}", Self::SCHEME, self.host, self.port),
        }
    }
}
