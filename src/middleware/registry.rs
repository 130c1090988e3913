//! Per-url connection registry and connection state machine.
//!
//! # State Machine
//!
//! ```text
//!              Open                  Closed (other)
//! Connecting ────────► Open ───────────────────────► Closed (removed)
//!     │                 │
//!     │ Closed (retry)  │ Closed (retry)
//!     ▼                 ▼
//! Reconnecting ◄────────┘
//!     │ timer fires
//!     ▼
//! Connecting (new transport, same attempt counter)
//! ```
//!
//! [`Handle::apply`] is the whole transition table. It never touches the
//! transport or the clock; it returns an [`Effect`] for the caller.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::identifiers::ConnectionId;
use crate::protocol::TransportEvent;
use crate::transport::{ConnectConfig, Transport};

use super::reconnect::ReconnectPolicy;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Handshake in progress.
    Connecting,
    /// Handshake completed.
    Open,
    /// Closed abnormally, retry scheduled. No transport.
    Reconnecting,
    /// Terminal. Handles in this state are removed.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if the state has a live transport.
    #[inline]
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Reconnecting => "RECONNECTING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Effect
// ============================================================================

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing.
    None,
    /// Schedule a retry after `delay`. `attempt` is the new counter value.
    ScheduleReconnect {
        /// Time to wait.
        delay: Duration,
        /// Attempt number being scheduled, starting at 1.
        attempt: u32,
    },
    /// Closed for good: remove the handle.
    Remove,
    /// Abnormal close past the ceiling: remove the handle, no retry.
    GiveUp,
}

// ============================================================================
// Handle
// ============================================================================

/// Registry record for one url.
pub struct Handle {
    /// Current transport instance.
    pub(crate) id: ConnectionId,
    /// Configuration used for this and every retried transport.
    pub(crate) config: ConnectConfig,
    /// Live transport; `None` while reconnecting or before attachment.
    pub(crate) transport: Option<Arc<dyn Transport>>,
    /// Lifecycle state.
    pub(crate) state: ConnectionState,
    /// Retries scheduled since the connection was last open.
    pub(crate) attempts: u32,
}

impl Handle {
    /// Creates a handle in `Connecting` with no transport attached yet.
    #[must_use]
    pub(crate) fn new(id: ConnectionId, config: ConnectConfig, attempts: u32) -> Self {
        Self {
            id,
            config,
            transport: None,
            state: ConnectionState::Connecting,
            attempts,
        }
    }

    /// Returns the handle's url.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Applies a transport event and returns the resulting effect.
    pub(crate) fn apply(&mut self, event: &TransportEvent, policy: &ReconnectPolicy) -> Effect {
        match (self.state, event) {
            (ConnectionState::Connecting, TransportEvent::Open) => {
                self.state = ConnectionState::Open;
                self.attempts = 0;
                Effect::None
            }

            (ConnectionState::Connecting | ConnectionState::Open, TransportEvent::Closed(close)) => {
                self.transport = None;

                if policy.should_retry(close, self.attempts) {
                    let delay = policy.delay_for(self.attempts);
                    self.attempts += 1;
                    self.state = ConnectionState::Reconnecting;
                    Effect::ScheduleReconnect {
                        delay,
                        attempt: self.attempts,
                    }
                } else {
                    self.state = ConnectionState::Closed;
                    if close.code == policy.trigger_code {
                        Effect::GiveUp
                    } else {
                        Effect::Remove
                    }
                }
            }

            _ => Effect::None,
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("url", &self.config.url)
            .field("id", &self.id)
            .field("state", &self.state)
            .field("attempts", &self.attempts)
            .field("has_transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Handles keyed by url. At most one handle per url.
#[derive(Debug, Default)]
pub struct Registry {
    handles: FxHashMap<String, Handle>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of handles.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no handle is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Registers `handle`, returning the one it replaced.
    pub(crate) fn insert(&mut self, handle: Handle) -> Option<Handle> {
        self.handles.insert(handle.config.url.clone(), handle)
    }

    /// Returns the handle for `url`.
    #[inline]
    #[must_use]
    pub fn get(&self, url: &str) -> Option<&Handle> {
        self.handles.get(url)
    }

    /// Returns the handle for `url` if it is the transport `id`.
    pub(crate) fn current_mut(&mut self, url: &str, id: ConnectionId) -> Option<&mut Handle> {
        self.handles.get_mut(url).filter(|handle| handle.id == id)
    }

    /// Resolves an action target: a url, or `None` for the only handle.
    #[must_use]
    pub fn resolve(&self, url: Option<&str>) -> Option<&Handle> {
        match url {
            Some(url) => self.handles.get(url),
            None if self.handles.len() == 1 => self.handles.values().next(),
            None => None,
        }
    }

    /// Removes and returns the handle resolved from `url`.
    pub(crate) fn remove(&mut self, url: Option<&str>) -> Option<Handle> {
        let key = self.resolve(url)?.config.url.clone();
        self.handles.remove(&key)
    }

    /// Removes the handle for `url` only if it is the transport `id`.
    pub(crate) fn remove_current(&mut self, url: &str, id: ConnectionId) -> Option<Handle> {
        self.current_mut(url, id)?;
        self.handles.remove(url)
    }

    /// Attaches `transport` to the handle for `url` if it is still the
    /// live transport `id`. Gives the transport back otherwise.
    pub(crate) fn attach(
        &mut self,
        url: &str,
        id: ConnectionId,
        transport: Arc<dyn Transport>,
    ) -> Option<Arc<dyn Transport>> {
        match self.current_mut(url, id) {
            Some(handle) if handle.state.is_live() => {
                handle.transport = Some(transport);
                None
            }
            _ => Some(transport),
        }
    }

    /// Removes every handle.
    pub(crate) fn drain(&mut self) -> Vec<Handle> {
        self.handles.drain().map(|(_, handle)| handle).collect()
    }

    /// Returns the registered urls.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.handles.keys().cloned().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
