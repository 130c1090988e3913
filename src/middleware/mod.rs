//! Connection registry and middleware.
//!
//! This module turns dispatched intents into socket operations and socket
//! events into dispatched actions.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Middleware`] | Action handler owning the registry |
//! | [`MiddlewareBuilder`] | Fluent configuration builder |
//! | [`ReconnectPolicy`] | Backoff and ceiling for abnormal closes |
//! | [`Scheduler`] | Retry timer seam |
//! | [`Registry`] | Per-url handles and their state machine |
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use ws_middleware::{Action, ConnectConfig, Middleware, dispatcher_channel};
//!
//! # async fn example() -> ws_middleware::Result<()> {
//! let (dispatcher, mut actions) = dispatcher_channel();
//! let middleware = Middleware::builder().dispatcher_arc(dispatcher).build()?;
//!
//! let url = "ws://127.0.0.1:9001";
//! middleware.handle(Action::connect(ConnectConfig::new(url)), |_| {})?;
//! middleware.handle(Action::send_text(url, json!({ "hello": "world" })), |_| {})?;
//!
//! while let Some(action) = actions.recv().await {
//!     println!("{}", action.action_type());
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for middleware configuration.
pub mod builder;

/// Middleware action handling and transport event handling.
pub mod core;

/// Dispatcher type and helpers.
pub mod dispatch;

/// Reconnect policy.
pub mod reconnect;

/// Per-url handles and connection state machine.
pub mod registry;

/// Retry timers.
pub mod scheduler;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::MiddlewareBuilder;
pub use self::core::Middleware;
pub use dispatch::{Dispatcher, dispatcher_channel};
pub use reconnect::ReconnectPolicy;
pub use registry::{ConnectionState, Registry};
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};
