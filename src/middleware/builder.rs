//! Builder pattern for middleware configuration.
//!
//! Provides a fluent API for configuring and creating [`Middleware`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use ws_middleware::{Middleware, ReconnectPolicy, dispatcher_channel};
//!
//! # fn example() -> ws_middleware::Result<()> {
//! let (dispatcher, _actions) = dispatcher_channel();
//! let middleware = Middleware::builder()
//!     .dispatcher_arc(dispatcher)
//!     .reconnect_policy(ReconnectPolicy::fixed(1000))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::Action;
use crate::transport::{TransportFactory, TungsteniteFactory};

use super::core::Middleware;
use super::dispatch::Dispatcher;
use super::reconnect::ReconnectPolicy;
use super::scheduler::{Scheduler, TokioScheduler};

// ============================================================================
// MiddlewareBuilder
// ============================================================================

/// Builder for configuring a [`Middleware`] instance.
///
/// Use [`Middleware::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct MiddlewareBuilder {
    /// Store dispatch function.
    dispatcher: Option<Dispatcher>,
    /// Transport factory, tungstenite if unset.
    factory: Option<Arc<dyn TransportFactory>>,
    /// Retry timer, tokio if unset.
    scheduler: Option<Arc<dyn Scheduler>>,
    /// Retry policy.
    policy: ReconnectPolicy,
}

// ============================================================================
// MiddlewareBuilder Implementation
// ============================================================================

impl MiddlewareBuilder {
    /// Creates a builder with the default policy and no dispatcher.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the store dispatch function.
    #[inline]
    #[must_use]
    pub fn dispatcher(mut self, dispatch: impl Fn(Action) + Send + Sync + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatch));
        self
    }

    /// Sets an already shared dispatch function.
    #[inline]
    #[must_use]
    pub fn dispatcher_arc(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the transport factory.
    #[inline]
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the scheduler used for reconnect timers.
    #[inline]
    #[must_use]
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the reconnect policy.
    #[inline]
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the middleware with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no dispatcher is set
    /// - [`Error::Config`] if the reconnect policy is invalid
    pub fn build(self) -> Result<Middleware> {
        let dispatcher = self.dispatcher.ok_or_else(|| {
            Error::config(
                "A dispatcher is required. Use .dispatcher() to set it.\n\
                 Example: Middleware::builder().dispatcher(|action| store.dispatch(action))",
            )
        })?;

        self.policy.validate()?;

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(TungsteniteFactory::new()));
        let scheduler = self.scheduler.unwrap_or_else(|| Arc::new(TokioScheduler));

        Ok(Middleware::new(dispatcher, factory, scheduler, self.policy))
    }
}

impl fmt::Debug for MiddlewareBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareBuilder")
            .field("dispatcher", &self.dispatcher.is_some())
            .field("factory", &self.factory.is_some())
            .field("scheduler", &self.scheduler.is_some())
            .field("policy", &self.policy)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
