//! Dispatch seam between the middleware and the application store.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::protocol::Action;

// ============================================================================
// Types
// ============================================================================

/// Store dispatch function.
///
/// Receives every action produced from transport events. May be called
/// from any thread, and may re-enter [`Middleware::handle`](super::Middleware::handle).
pub type Dispatcher = Arc<dyn Fn(Action) + Send + Sync>;

// ============================================================================
// Helpers
// ============================================================================

/// Creates a dispatcher that forwards actions into a channel.
///
/// Actions sent after the receiver is dropped are discarded.
#[must_use]
pub fn dispatcher_channel() -> (Dispatcher, mpsc::UnboundedReceiver<Action>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher: Dispatcher = Arc::new(move |action: Action| {
        if tx.send(action).is_err() {
            trace!("Action receiver dropped");
        }
    });
    (dispatcher, rx)
}

// ============================================================================
// Tests
// ============================================================================
