//! WebSocket middleware - action-driven connection management.
//!
//! This library manages any number of client WebSocket connections on
//! behalf of an application that communicates through dispatched actions
//! (a Redux-style store).
//!
//! # Architecture
//!
//! - **Intents in**: `CONNECT`, `DISCONNECT`, `SEND_TEXT`, `SEND_BINARY`
//!   become transport calls, then continue down the chain via `next`
//! - **Events out**: connecting, open, message and close callbacks become
//!   `CONNECTING`, `OPEN`, `MESSAGE` and `CLOSED` actions
//! - **Reconnect**: abnormal closes (code 1006) are retried with a linear
//!   backoff, up to 500 attempts
//!
//! Key design principles:
//!
//! - One registry per [`Middleware`] instance, keyed by url
//! - Each transport has a [`ConnectionId`]; events from replaced
//!   transports never drive the registry
//! - Socket I/O behind the [`TransportFactory`] seam, timers behind the
//!   [`Scheduler`] seam
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use ws_middleware::{Action, ConnectConfig, Middleware, Result, dispatcher_channel};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (dispatcher, mut actions) = dispatcher_channel();
//!     let middleware = Middleware::builder().dispatcher_arc(dispatcher).build()?;
//!
//!     let url = "ws://127.0.0.1:9001/feed";
//!     middleware.handle(Action::connect(ConnectConfig::new(url)), |_| {})?;
//!
//!     while let Some(action) = actions.recv().await {
//!         if let Action::Open { .. } = action {
//!             middleware.handle(Action::send_text(url, json!({ "subscribe": "ticks" })), |_| {})?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`ConnectionId`] |
//! | [`middleware`] | [`Middleware`], registry, reconnect policy |
//! | [`protocol`] | [`Action`] and transport event types |
//! | [`transport`] | Transport traits and the `tokio-tungstenite` transport |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection registry and middleware.
///
/// Use [`Middleware::builder()`] to create a configured instance.
pub mod middleware;

/// Action and transport event types.
pub mod protocol;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Middleware types
pub use middleware::{
    ConnectionState, Dispatcher, ManualScheduler, Middleware, MiddlewareBuilder, ReconnectPolicy,
    Scheduler, TokioScheduler, dispatcher_channel,
};

// Protocol types
pub use protocol::{Action, CloseEvent, MessageData, MessageEvent, PassThrough, TransportEvent};

// Transport types
pub use transport::{
    ConnectConfig, EventSink, Transport, TransportFactory, TungsteniteFactory, WsTransport,
};
