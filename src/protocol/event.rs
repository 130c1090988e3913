//! Transport event types.
//!
//! Events are what a [`Transport`](crate::transport::Transport) reports
//! about its socket. The middleware turns each of them into a dispatched
//! [`Action`](super::Action).
//!
//! # Event Types
//!
//! | Event | Produced action |
//! |-------|-----------------|
//! | `Connecting` | `WEBSOCKET:CONNECTING` |
//! | `Open` | `WEBSOCKET:OPEN` |
//! | `Message` | `WEBSOCKET:MESSAGE` |
//! | `Closed` | `WEBSOCKET:CLOSED` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Close Codes
// ============================================================================

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// No status code was present in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Connection dropped without a closing handshake.
///
/// Never sent on the wire; reported locally when the socket fails.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ============================================================================
// TransportEvent
// ============================================================================

/// A lifecycle notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport started its opening handshake.
    Connecting,
    /// The handshake completed.
    Open,
    /// A data frame arrived.
    Message(MessageData),
    /// The socket closed. Errors surface here too.
    Closed(CloseEvent),
}

impl TransportEvent {
    /// Returns the event name, used in log lines.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Closed(_) => "closed",
        }
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Details of a socket closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseEvent {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason sent by the peer, empty if none.
    #[serde(default)]
    pub reason: String,
    /// Whether the closing handshake completed.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Creates a close event.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// Creates a clean close with [`CLOSE_NORMAL`].
    #[inline]
    #[must_use]
    pub fn normal() -> Self {
        Self::new(CLOSE_NORMAL, "", true)
    }

    /// Creates an unclean close with [`CLOSE_ABNORMAL`].
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self::new(CLOSE_ABNORMAL, "", false)
    }

    /// Returns `true` for code 1006.
    #[inline]
    #[must_use]
    pub const fn is_abnormal(&self) -> bool {
        self.code == CLOSE_ABNORMAL
    }
}

// ============================================================================
// MessageData / MessageEvent
// ============================================================================

/// Payload of a received data frame.
///
/// Binary payloads are base64 strings in the JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum MessageData {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl MessageData {
    /// Returns the text, if this is a text frame.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A received message, as carried by `WEBSOCKET:MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Frame payload.
    pub data: MessageData,
}

// ============================================================================
// Base64 serde helper
// ============================================================================

/// Serializes `Vec<u8>` as a standard base64 string.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_close_event_abnormal() {
        assert!(CloseEvent::abnormal().is_abnormal());
        assert!(!CloseEvent::normal().is_abnormal());
        assert!(!CloseEvent::new(CLOSE_NO_STATUS, "", true).is_abnormal());
    }

    #[test]
    fn test_close_event_json_shape() {
        let event = CloseEvent::new(4000, "going away", true);
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            json!({ "code": 4000, "reason": "going away", "wasClean": true })
        );
    }

    #[test]
    fn test_binary_message_is_base64() {
        let data = MessageData::Binary(vec![0xde, 0xad, 0xbe, 0xef]);
        let value = serde_json::to_value(&data).expect("serialize");
        assert_eq!(value, json!({ "kind": "binary", "data": "3q2+7w==" }));

        let back: MessageData = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, data);
    }

    #[test]
    fn test_text_message_shape() {
        let data = MessageData::Text("hi".into());
        let value = serde_json::to_value(&data).expect("serialize");
        assert_eq!(value, json!({ "kind": "text", "data": "hi" }));
        assert_eq!(data.as_text(), Some("hi"));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result = serde_json::from_value::<MessageData>(json!({
            "kind": "binary",
            "data": "not base64!"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(TransportEvent::Connecting.name(), "connecting");
        assert_eq!(
            TransportEvent::Closed(CloseEvent::normal()).name(),
            "closed"
        );
    }
}
