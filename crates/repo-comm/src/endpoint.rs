//! Host/port endpoint with the canonical `"host:port"` string form.
//!
//! The string form is what travels on the wire in the `to`/`from` keys of a
//! [`Message`](crate::message::Message), so parsing must round-trip exactly.

use crate::error::CommError;
use std::fmt;
use std::str::FromStr;

/// One side of a message exchange.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = CommError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| CommError::InvalidEndpoint(s.to_string()))?;
        if host.is_empty() {
            return Err(CommError::InvalidEndpoint(s.to_string()));
        }
        let port = port
            .parse()
            .map_err(|_| CommError::InvalidEndpoint(s.to_string()))?;
        Ok(Self::new(host, port))
    }
}
