//! Reconnect policy for abnormal closures.
//!
//! A closed connection is retried when its close code equals the policy's
//! trigger code (1006 by default) and fewer than `max_attempts` retries
//! were scheduled since it was last open.
//!
//! # Backoff
//!
//! ```text
//! delay(attempts) = base_delay_ms + step_ms × attempts
//! ```
//!
//! | Attempts | Default delay |
//! |----------|---------------|
//! | 0 | 5000 ms |
//! | 3 | 5750 ms |
//! | 499 | 129 750 ms |
//! | 500 | no retry |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{CLOSE_ABNORMAL, CloseEvent};

// ============================================================================
// Constants
// ============================================================================

/// Delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 5000;

/// Delay added per previous attempt.
pub const DEFAULT_STEP_MS: u64 = 250;

/// Retries scheduled before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 500;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// When and how soon to retry a closed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Extra delay per previous attempt, in milliseconds.
    pub step_ms: u64,

    /// Retry ceiling. `None` retries forever.
    pub max_attempts: Option<u32>,

    /// Close code that triggers a retry.
    pub trigger_code: u16,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            step_ms: DEFAULT_STEP_MS,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            trigger_code: CLOSE_ABNORMAL,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ReconnectPolicy {
    /// Linear backoff with a ceiling.
    #[inline]
    #[must_use]
    pub const fn linear(base_delay_ms: u64, step_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            step_ms,
            max_attempts: Some(max_attempts),
            trigger_code: CLOSE_ABNORMAL,
        }
    }

    /// Constant delay, retried forever.
    #[inline]
    #[must_use]
    pub const fn fixed(delay_ms: u64) -> Self {
        Self {
            base_delay_ms: delay_ms,
            step_ms: 0,
            max_attempts: None,
            trigger_code: CLOSE_ABNORMAL,
        }
    }

    /// Never retries.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            base_delay_ms: 0,
            step_ms: 0,
            max_attempts: Some(0),
            trigger_code: CLOSE_ABNORMAL,
        }
    }

    /// Sets the trigger close code.
    #[inline]
    #[must_use]
    pub const fn with_trigger_code(mut self, code: u16) -> Self {
        self.trigger_code = code;
        self
    }
}

// ============================================================================
// Policy
// ============================================================================

impl ReconnectPolicy {
    /// Returns `true` if `close` should be retried after `attempts` retries.
    #[inline]
    #[must_use]
    pub fn should_retry(&self, close: &CloseEvent, attempts: u32) -> bool {
        close.code == self.trigger_code && self.max_attempts.is_none_or(|max| attempts < max)
    }

    /// Returns the delay before retry number `attempts + 1`.
    #[inline]
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let extra = self.step_ms.saturating_mul(u64::from(attempts));
        Duration::from_millis(self.base_delay_ms.saturating_add(extra))
    }

    /// Checks the policy can be used.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the trigger code is outside 1000..=4999, or if
    /// an unbounded policy has a zero delay.
    pub fn validate(&self) -> Result<()> {
        if !(1000..=4999).contains(&self.trigger_code) {
            return Err(Error::config(format!(
                "Reconnect trigger code {} is not a WebSocket close code",
                self.trigger_code
            )));
        }

        if self.max_attempts.is_none() && self.base_delay_ms == 0 && self.step_ms == 0 {
            return Err(Error::config(
                "Unbounded reconnect policy needs a non-zero delay",
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
