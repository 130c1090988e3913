//! Connection configuration.
//!
//! [`ConnectConfig`] is the payload of `WEBSOCKET:CONNECT` and the input to
//! [`TransportFactory::create`](super::TransportFactory::create).
//!
//! # Example
//!
//! ```ignore
//! use ws_middleware::ConnectConfig;
//!
//! let config = ConnectConfig::new("wss://example.com/feed")
//!     .with_protocol("graphql-ws");
//!
//! let url = config.parse_url()?;
//! assert_eq!(url.scheme(), "wss");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// ConnectConfig
// ============================================================================

/// Configuration for a single WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectConfig {
    /// Target url, `ws://` or `wss://`.
    ///
    /// Also the registry key for the connection.
    pub url: String,

    /// Requested sub-protocols, sent as `Sec-WebSocket-Protocol`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectConfig {
    /// Creates a configuration for `url` with no sub-protocols.
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
        }
    }

    /// Adds a requested sub-protocol.
    #[inline]
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds multiple requested sub-protocols.
    #[inline]
    #[must_use]
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectConfig {
    /// Parses and checks the url.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the url does not parse
    /// - [`Error::InvalidUrl`] if the scheme is not `ws` or `wss`
    pub fn parse_url(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| Error::invalid_url(&self.url, e.to_string()))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(Error::invalid_url(
                &self.url,
                format!("unsupported scheme {other}, expected ws or wss"),
            )),
        }
    }

    /// Validates the whole configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if the url is rejected by [`Self::parse_url`]
    /// - [`Error::Config`] if a sub-protocol is empty or contains separators
    pub fn validate(&self) -> Result<()> {
        self.parse_url()?;

        for protocol in &self.protocols {
            if protocol.is_empty()
                || protocol
                    .chars()
                    .any(|c| c.is_whitespace() || c == ',' || c.is_control())
            {
                return Err(Error::config(format!(
                    "Invalid sub-protocol {protocol:?} for {}",
                    self.url
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
