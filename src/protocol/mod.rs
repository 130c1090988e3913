//! Action and event types.
//!
//! This module defines what flows into and out of the middleware.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | `Action` (intent) | Application → Middleware | connect, disconnect, send |
//! | `TransportEvent` | Transport → Middleware | socket lifecycle |
//! | `Action` (event) | Middleware → Application | dispatched notifications |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | [`Action`], [`PassThrough`] and type strings |
//! | `event` | [`TransportEvent`], [`CloseEvent`], [`MessageData`] |

// ============================================================================
// Submodules
// ============================================================================

/// Action enum and type string constants.
pub mod action;

/// Transport event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{
    Action, PassThrough, WEBSOCKET_CLOSED, WEBSOCKET_CONNECT, WEBSOCKET_CONNECTING,
    WEBSOCKET_DISCONNECT, WEBSOCKET_MESSAGE, WEBSOCKET_OPEN, WEBSOCKET_PREFIX,
    WEBSOCKET_SEND_BINARY, WEBSOCKET_SEND_TEXT,
};
pub use event::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, CloseEvent, MessageData, MessageEvent,
    TransportEvent,
};
