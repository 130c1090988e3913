//! WebSocket transport layer.
//!
//! The middleware never touches sockets directly. It asks a
//! [`TransportFactory`] for a [`Transport`] and listens to what the
//! transport reports through its [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   create(config, sink)   ┌──────────────────┐
//! │   Middleware    │─────────────────────────►│ TransportFactory │
//! │                 │                          └────────┬─────────┘
//! │  send / close   │──────────────┐                    │
//! │                 │              ▼                    ▼
//! │  on_event  ◄────┼──── EventSink ◄──── Transport (socket task)
//! └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | [`ConnectConfig`] |
//! | `connection` | `tokio-tungstenite` implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Connection configuration.
pub mod config;

/// `tokio-tungstenite` transport and its event loop.
pub mod connection;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::ConnectConfig;
pub use connection::{TungsteniteFactory, WsTransport};

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::TransportEvent;

// ============================================================================
// Types
// ============================================================================

/// Callback receiving `(url, connection, event)` for every transport event.
pub type EventCallback = Arc<dyn Fn(&str, ConnectionId, TransportEvent) + Send + Sync>;

// ============================================================================
// Transport
// ============================================================================

/// A live socket owned by the middleware.
///
/// Implementations must not block. Sends issued before the socket is open
/// may be queued or rejected; the tungstenite implementation queues them.
pub trait Transport: Send + Sync {
    /// Sends a text frame.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    /// socket is gone.
    fn send_text(&self, text: String) -> Result<()>;

    /// Sends a binary frame.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    /// socket is gone.
    fn send_binary(&self, data: Vec<u8>) -> Result<()>;

    /// Starts the closing handshake. Idempotent.
    fn close(&self);
}

/// Creates transports for the middleware.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport for `config` that reports through `sink`.
    ///
    /// Construction failures are returned, never reported as events.
    ///
    /// # Errors
    ///
    /// Implementation-defined; the tungstenite factory returns
    /// [`Error::InvalidUrl`](crate::Error::InvalidUrl) and
    /// [`Error::Config`](crate::Error::Config).
    fn create(&self, config: &ConnectConfig, sink: EventSink) -> Result<Arc<dyn Transport>>;
}

// ============================================================================
// EventSink
// ============================================================================

/// Reporting channel bound to one transport instance.
#[derive(Clone)]
pub struct EventSink {
    url: String,
    connection: ConnectionId,
    callback: EventCallback,
}

impl EventSink {
    /// Creates a sink for the transport `connection` serving `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, connection: ConnectionId, callback: EventCallback) -> Self {
        Self {
            url: url.into(),
            connection,
            callback,
        }
    }

    /// Reports an event.
    #[inline]
    pub fn emit(&self, event: TransportEvent) {
        (self.callback)(&self.url, self.connection, event);
    }

    /// Returns the url this sink reports for.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the transport this sink is bound to.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("url", &self.url)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
