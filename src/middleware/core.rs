//! Core middleware implementation.
//!
//! # Flow
//!
//! ```text
//! handle(action, next)
//!   CONNECT      → close old handle, create transport, register, next
//!   DISCONNECT   → close + remove handle, next
//!   SEND_TEXT    → JSON-encode, send, next    (no handle: warn, drop)
//!   SEND_BINARY  → send raw bytes, next       (no handle: warn, drop)
//!   other        → next
//!
//! transport event (url, id, event)
//!   → Handle::apply (only if id is the registered transport)
//!   → dispatch CONNECTING / OPEN / MESSAGE / CLOSED
//!   → schedule retry | remove | nothing
//! ```
//!
//! The registry lock is never held while calling the dispatcher, `next`,
//! the factory, a transport, or the scheduler.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::error::Result;
use crate::identifiers::ConnectionId;
use crate::protocol::{Action, MessageEvent, TransportEvent};
use crate::transport::{ConnectConfig, EventCallback, EventSink, Transport, TransportFactory};

use super::builder::MiddlewareBuilder;
use super::dispatch::Dispatcher;
use super::reconnect::ReconnectPolicy;
use super::registry::{ConnectionState, Effect, Handle, Registry};
use super::scheduler::{Scheduler, delay_millis};

// ============================================================================
// Frame
// ============================================================================

/// Outgoing payload, already encoded.
enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

// ============================================================================
// Middleware
// ============================================================================

/// WebSocket connection middleware.
///
/// Owns its registry; separate instances share nothing. Cloning yields
/// another handle to the same instance.
///
/// # Example
///
/// ```ignore
/// let middleware = Middleware::builder()
///     .dispatcher(move |action| store.dispatch(action))
///     .build()?;
///
/// middleware.handle(Action::connect(ConnectConfig::new(url)), |action| reducer(action))?;
/// ```
#[derive(Clone)]
pub struct Middleware {
    inner: Arc<Inner>,
}

/// Shared state behind [`Middleware`].
struct Inner {
    /// Back-reference handed to event sinks and retry tasks.
    this: Weak<Inner>,
    registry: Mutex<Registry>,
    dispatcher: Dispatcher,
    factory: Arc<dyn TransportFactory>,
    scheduler: Arc<dyn Scheduler>,
    policy: ReconnectPolicy,
}

// ============================================================================
// Middleware - Constructor
// ============================================================================

impl Middleware {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> MiddlewareBuilder {
        MiddlewareBuilder::new()
    }

    /// Creates a middleware from validated parts.
    pub(crate) fn new(
        dispatcher: Dispatcher,
        factory: Arc<dyn TransportFactory>,
        scheduler: Arc<dyn Scheduler>,
        policy: ReconnectPolicy,
    ) -> Self {
        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            registry: Mutex::new(Registry::new()),
            dispatcher,
            factory,
            scheduler,
            policy,
        });

        Self { inner }
    }
}

// ============================================================================
// Middleware - Public API
// ============================================================================

impl Middleware {
    /// Handles one action.
    ///
    /// WebSocket intents are performed, then forwarded to `next` unchanged.
    /// A send without a matching connection is logged and not forwarded.
    /// Every other action goes straight to `next`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`](crate::Error::InvalidUrl) /
    ///   [`Error::Config`](crate::Error::Config) if CONNECT cannot create
    ///   its transport
    /// - [`Error::Json`](crate::Error::Json) if a text payload does not encode
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the
    ///   matched transport is gone
    ///
    /// On error the action is not forwarded.
    pub fn handle(&self, action: Action, next: impl FnOnce(Action)) -> Result<()> {
        let forward = match &action {
            Action::Connect { payload } => {
                self.inner.connect(payload)?;
                true
            }

            Action::Disconnect { url } => {
                self.inner.disconnect(url.as_deref());
                true
            }

            Action::SendText { url, payload } => {
                let text = serde_json::to_string(payload)?;
                self.inner.send(url.as_deref(), Frame::Text(text))?
            }

            Action::SendBinary { url, payload } => {
                self.inner.send(url.as_deref(), Frame::Binary(payload.clone()))?
            }

            _ => true,
        };

        if forward {
            next(action);
        }

        Ok(())
    }

    /// Returns the number of registered connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Returns the state of the connection for `url`.
    #[must_use]
    pub fn state(&self, url: &str) -> Option<ConnectionState> {
        self.inner.registry.lock().get(url).map(|handle| handle.state)
    }

    /// Returns the retry counter of the connection for `url`.
    #[must_use]
    pub fn attempts(&self, url: &str) -> Option<u32> {
        self.inner
            .registry
            .lock()
            .get(url)
            .map(|handle| handle.attempts)
    }

    /// Returns the transport id registered for `url`.
    #[must_use]
    pub fn connection_id(&self, url: &str) -> Option<ConnectionId> {
        self.inner.registry.lock().get(url).map(|handle| handle.id)
    }

    /// Returns the registered urls.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.inner.registry.lock().urls()
    }

    /// Returns the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        self.inner.policy
    }

    /// Closes and removes every connection. Pending retries become no-ops.
    pub fn shutdown(&self) {
        let handles = self.inner.registry.lock().drain();
        info!(count = handles.len(), "Middleware shutting down");

        for handle in handles {
            close_handle(handle);
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("registry", &*self.inner.registry.lock())
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Inner - Operations
// ============================================================================

impl Inner {
    /// Replaces any connection for `config.url` with a new one.
    fn connect(&self, config: &ConnectConfig) -> Result<()> {
        config.validate()?;

        if let Some(id) = self.install(config.clone(), 0, None)? {
            info!(url = %config.url, connection = %id, "WebSocket connecting");
        }
        Ok(())
    }

    /// Closes and removes the connection for `url`.
    fn disconnect(&self, url: Option<&str>) {
        let removed = self.registry.lock().remove(url);

        match removed {
            Some(handle) => {
                close_handle(handle);
            }
            None => debug!(url = ?url, "Disconnect for unknown connection"),
        }
    }

    /// Sends `frame` on the connection for `url`.
    ///
    /// Returns `false` when no live connection matches.
    fn send(&self, url: Option<&str>, frame: Frame) -> Result<bool> {
        let transport = self
            .registry
            .lock()
            .resolve(url)
            .and_then(|handle| handle.transport.clone());

        let Some(transport) = transport else {
            match &frame {
                Frame::Text(text) => warn!(
                    url = ?url,
                    message = %text,
                    "WebSocket is closed, ignoring text message. Trigger a WEBSOCKET:CONNECT first."
                ),
                Frame::Binary(data) => warn!(
                    url = ?url,
                    bytes = data.len(),
                    "WebSocket is closed, ignoring binary message. Trigger a WEBSOCKET:CONNECT first."
                ),
            }
            return Ok(false);
        };

        match frame {
            Frame::Text(text) => transport.send_text(text)?,
            Frame::Binary(data) => transport.send_binary(data)?,
        }

        Ok(true)
    }

    /// Registers a new handle for `config.url` and creates its transport.
    ///
    /// With `expect` set, only proceeds if the registered handle is that
    /// transport and is still waiting to reconnect; returns `Ok(None)`
    /// otherwise.
    fn install(
        &self,
        config: ConnectConfig,
        attempts: u32,
        expect: Option<ConnectionId>,
    ) -> Result<Option<ConnectionId>> {
        let id = ConnectionId::generate();
        let url = config.url.clone();

        let replaced = {
            let mut registry = self.registry.lock();

            if let Some(expected) = expect {
                let pending = registry.get(&url).is_some_and(|handle| {
                    handle.id == expected && handle.state == ConnectionState::Reconnecting
                });
                if !pending {
                    return Ok(None);
                }
            }

            registry.insert(Handle::new(id, config.clone(), attempts))
        };

        if let Some(old) = replaced {
            close_handle(old);
        }

        let sink = EventSink::new(url.clone(), id, self.event_callback());

        match self.factory.create(&config, sink) {
            Ok(transport) => {
                let rejected = self.registry.lock().attach(&url, id, transport);
                if let Some(transport) = rejected {
                    trace!(url = %url, connection = %id, "Transport finished before attach");
                    transport.close();
                }
                Ok(Some(id))
            }
            Err(e) => {
                self.registry.lock().remove_current(&url, id);
                Err(e)
            }
        }
    }

    /// Builds the callback event sinks report through.
    fn event_callback(&self) -> EventCallback {
        let this = self.this.clone();
        Arc::new(move |url: &str, id: ConnectionId, event: TransportEvent| {
            if let Some(inner) = this.upgrade() {
                inner.on_event(url, id, event);
            }
        })
    }
}

// ============================================================================
// Inner - Transport Events
// ============================================================================

impl Inner {
    /// Applies a transport event and dispatches the matching action.
    fn on_event(&self, url: &str, id: ConnectionId, event: TransportEvent) {
        trace!(url, connection = %id, event = event.name(), "Transport event");

        let effect = {
            let mut registry = self.registry.lock();
            let effect = registry
                .current_mut(url, id)
                .map(|handle| handle.apply(&event, &self.policy));
            if matches!(effect, Some(Effect::Remove | Effect::GiveUp)) {
                registry.remove_current(url, id);
            }
            effect
        };

        if effect.is_none() {
            debug!(url, connection = %id, event = event.name(), "Event from stale transport");
        }

        (self.dispatcher)(to_action(url, id, event));

        match effect {
            Some(Effect::ScheduleReconnect { delay, attempt }) => {
                info!(
                    url,
                    attempt,
                    delay_ms = delay_millis(delay),
                    "Scheduling WebSocket reconnect"
                );
                self.schedule_retry(url, id, delay);
            }
            Some(Effect::GiveUp) => {
                debug!(url, "Reconnect attempts exhausted");
            }
            Some(Effect::Remove) => {
                info!(url, "WebSocket closed");
            }
            Some(Effect::None) | None => {}
        }
    }

    /// Schedules a retry for the transport `id` serving `url`.
    fn schedule_retry(&self, url: &str, id: ConnectionId, delay: Duration) {
        let this = self.this.clone();
        let url = url.to_string();

        self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(inner) = this.upgrade() {
                    inner.retry(&url, id);
                }
            }),
        );
    }

    /// Reopens `url` if the closed transport `id` is still registered.
    fn retry(&self, url: &str, id: ConnectionId) {
        let pending = self
            .registry
            .lock()
            .get(url)
            .filter(|handle| handle.id == id && handle.state == ConnectionState::Reconnecting)
            .map(|handle| (handle.config.clone(), handle.attempts));

        let Some((config, attempts)) = pending else {
            debug!(url, "Reconnect superseded");
            return;
        };

        info!(url, attempt = attempts, "Reconnecting WebSocket");

        match self.install(config, attempts, Some(id)) {
            Ok(Some(_)) => {}
            Ok(None) => debug!(url, "Reconnect superseded"),
            Err(e) => error!(url, error = %e, "Reconnect failed"),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Closes a removed handle's transport. Returns `false` if it had none.
fn close_handle(handle: Handle) -> bool {
    let Some(transport) = &handle.transport else {
        trace!(url = %handle.url(), state = %handle.state, "Dropped handle without transport");
        return false;
    };

    info!(url = %handle.url(), state = %handle.state, "Closing WebSocket connection");
    transport.close();
    true
}

/// Maps a transport event to the action dispatched for it.
fn to_action(url: &str, id: ConnectionId, event: TransportEvent) -> Action {
    let url = url.to_string();
    match event {
        TransportEvent::Connecting => Action::Connecting {
            url,
            connection: id,
        },
        TransportEvent::Open => Action::Open {
            url,
            connection: id,
        },
        TransportEvent::Message(data) => Action::Message {
            url,
            connection: id,
            event: MessageEvent { data },
        },
        TransportEvent::Closed(event) => Action::Closed {
            url,
            connection: id,
            event,
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
