//! Action types consumed and produced by the middleware.
//!
//! # Format
//!
//! Actions are JSON objects discriminated by a `type` string:
//!
//! ```json
//! { "type": "WEBSOCKET:SEND_TEXT", "url": "ws://host/feed", "payload": { "a": 1 } }
//! ```
//!
//! # Action Types
//!
//! | Direction | Types |
//! |-----------|-------|
//! | Consumed | `CONNECT`, `DISCONNECT`, `SEND_TEXT`, `SEND_BINARY` |
//! | Produced | `CONNECTING`, `OPEN`, `CLOSED`, `MESSAGE` |
//!
//! Every type string carries the `WEBSOCKET:` prefix. Any other `type`
//! deserializes into [`Action::Other`] with all of its fields and passes
//! through untouched. A `WEBSOCKET:` action with a malformed body fails to
//! deserialize instead.

// ============================================================================
// Imports
// ============================================================================

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::identifiers::ConnectionId;
use crate::transport::ConnectConfig;

use super::event::{CloseEvent, MessageEvent, base64_bytes};

// ============================================================================
// Action Type Constants
// ============================================================================

/// Prefix reserved for the actions below.
pub const WEBSOCKET_PREFIX: &str = "WEBSOCKET:";

/// User request to open a connection.
pub const WEBSOCKET_CONNECT: &str = "WEBSOCKET:CONNECT";
/// User request to close a connection.
pub const WEBSOCKET_DISCONNECT: &str = "WEBSOCKET:DISCONNECT";
/// User request to send a JSON-encoded text frame.
pub const WEBSOCKET_SEND_TEXT: &str = "WEBSOCKET:SEND_TEXT";
/// User request to send a binary frame.
pub const WEBSOCKET_SEND_BINARY: &str = "WEBSOCKET:SEND_BINARY";
/// Transport started connecting.
pub const WEBSOCKET_CONNECTING: &str = "WEBSOCKET:CONNECTING";
/// Transport is open.
pub const WEBSOCKET_OPEN: &str = "WEBSOCKET:OPEN";
/// Transport closed.
pub const WEBSOCKET_CLOSED: &str = "WEBSOCKET:CLOSED";
/// Transport received a message.
pub const WEBSOCKET_MESSAGE: &str = "WEBSOCKET:MESSAGE";

// ============================================================================
// Action
// ============================================================================

/// An action flowing through the middleware.
///
/// `url: None` on the disconnect and send variants targets the single
/// registered connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    // ========================================================================
    // Consumed
    // ========================================================================
    /// Open a connection for `payload.url`, replacing any existing one.
    #[serde(rename = "WEBSOCKET:CONNECT")]
    Connect {
        /// Transport configuration.
        payload: ConnectConfig,
    },

    /// Close the connection for `url`.
    #[serde(rename = "WEBSOCKET:DISCONNECT")]
    Disconnect {
        /// Target url.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    /// Send `payload` as JSON text.
    #[serde(rename = "WEBSOCKET:SEND_TEXT")]
    SendText {
        /// Target url.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Value to encode.
        payload: Value,
    },

    /// Send `payload` as a binary frame.
    #[serde(rename = "WEBSOCKET:SEND_BINARY")]
    SendBinary {
        /// Target url.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// Raw bytes, base64 in JSON.
        #[serde(with = "base64_bytes")]
        payload: Vec<u8>,
    },

    // ========================================================================
    // Produced
    // ========================================================================
    /// A transport was created and is connecting.
    #[serde(rename = "WEBSOCKET:CONNECTING")]
    Connecting {
        /// Connection url.
        url: String,
        /// Transport handle.
        connection: ConnectionId,
    },

    /// The handshake completed.
    #[serde(rename = "WEBSOCKET:OPEN")]
    Open {
        /// Connection url.
        url: String,
        /// Transport handle.
        connection: ConnectionId,
    },

    /// The socket closed.
    #[serde(rename = "WEBSOCKET:CLOSED")]
    Closed {
        /// Connection url.
        url: String,
        /// Transport handle.
        connection: ConnectionId,
        /// Close details.
        event: CloseEvent,
    },

    /// A frame arrived.
    #[serde(rename = "WEBSOCKET:MESSAGE")]
    Message {
        /// Connection url.
        url: String,
        /// Transport handle.
        connection: ConnectionId,
        /// Message payload.
        event: MessageEvent,
    },

    // ========================================================================
    // Pass-through
    // ========================================================================
    /// Any action this middleware does not handle.
    #[serde(untagged)]
    Other(PassThrough),
}

// ============================================================================
// PassThrough
// ============================================================================

/// An application action, kept field for field.
///
/// Deserialization rejects `type` strings with the [`WEBSOCKET_PREFIX`],
/// so a malformed intent never passes through as a foreign action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassThrough {
    /// The action's `type` string.
    #[serde(rename = "type")]
    pub action_type: String,

    /// Every other field of the action.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl PassThrough {
    /// Creates an action with no fields besides `type`.
    #[inline]
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            body: Map::new(),
        }
    }

    /// Adds a field.
    #[inline]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.body.insert(key.into(), value);
        self
    }

    /// Returns a field of the action.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

impl<'de> Deserialize<'de> for PassThrough {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "type")]
            action_type: String,
            #[serde(flatten)]
            body: Map<String, Value>,
        }

        let raw = Raw::deserialize(deserializer)?;

        if raw.action_type.starts_with(WEBSOCKET_PREFIX) {
            return Err(D::Error::custom(format!(
                "malformed or unknown {} action",
                raw.action_type
            )));
        }

        Ok(Self {
            action_type: raw.action_type,
            body: raw.body,
        })
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl Action {
    /// Creates a connect action.
    #[inline]
    #[must_use]
    pub fn connect(config: ConnectConfig) -> Self {
        Self::Connect { payload: config }
    }

    /// Creates a disconnect action for `url`.
    #[inline]
    #[must_use]
    pub fn disconnect(url: impl Into<String>) -> Self {
        Self::Disconnect {
            url: Some(url.into()),
        }
    }

    /// Creates a text send action for `url`.
    #[inline]
    #[must_use]
    pub fn send_text(url: impl Into<String>, payload: Value) -> Self {
        Self::SendText {
            url: Some(url.into()),
            payload,
        }
    }

    /// Creates a binary send action for `url`.
    #[inline]
    #[must_use]
    pub fn send_binary(url: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::SendBinary {
            url: Some(url.into()),
            payload: payload.into(),
        }
    }

    /// Creates a pass-through action of the form `{ type, payload }`.
    #[inline]
    #[must_use]
    pub fn other(action_type: impl Into<String>, payload: Value) -> Self {
        Self::Other(PassThrough::new(action_type).with_field("payload", payload))
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Action {
    /// Returns the action's `type` string.
    #[must_use]
    pub fn action_type(&self) -> &str {
        match self {
            Self::Connect { .. } => WEBSOCKET_CONNECT,
            Self::Disconnect { .. } => WEBSOCKET_DISCONNECT,
            Self::SendText { .. } => WEBSOCKET_SEND_TEXT,
            Self::SendBinary { .. } => WEBSOCKET_SEND_BINARY,
            Self::Connecting { .. } => WEBSOCKET_CONNECTING,
            Self::Open { .. } => WEBSOCKET_OPEN,
            Self::Closed { .. } => WEBSOCKET_CLOSED,
            Self::Message { .. } => WEBSOCKET_MESSAGE,
            Self::Other(action) => &action.action_type,
        }
    }

    /// Returns the url the action refers to, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Connect { payload } => Some(&payload.url),
            Self::Disconnect { url }
            | Self::SendText { url, .. }
            | Self::SendBinary { url, .. } => url.as_deref(),
            Self::Connecting { url, .. }
            | Self::Open { url, .. }
            | Self::Closed { url, .. }
            | Self::Message { url, .. } => Some(url),
            Self::Other(_) => None,
        }
    }

    /// Returns `true` for actions produced from transport events.
    #[inline]
    #[must_use]
    pub fn is_transport_event(&self) -> bool {
        matches!(
            self,
            Self::Connecting { .. } | Self::Open { .. } | Self::Closed { .. } | Self::Message { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
