//! Delayed task execution for reconnects.
//!
//! [`TokioScheduler`] is used in production. [`ManualScheduler`] only
//! records tasks; tests fire them explicitly and check the recorded delays.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{error, trace};

// ============================================================================
// Types
// ============================================================================

/// A deferred callback.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Returns `delay` in whole milliseconds, saturating at `u64::MAX`.
#[inline]
pub(crate) fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs a task once after a delay.
///
/// Fire-and-forget: there is no handle to cancel a scheduled task. Tasks
/// check on their own whether they are still relevant when they run.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run after `delay`.
    fn schedule(&self, delay: Duration, task: Task);
}

// ============================================================================
// TokioScheduler
// ============================================================================

/// Sleeps on the current tokio runtime, then runs the task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    task();
                });
            }
            Err(e) => {
                error!(error = %e, "No tokio runtime, dropping scheduled task");
            }
        }
    }
}

// ============================================================================
// ManualScheduler
// ============================================================================

/// Records tasks until they are fired by hand.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<VecDeque<(Duration, Task)>>,
}

impl ManualScheduler {
    /// Creates an empty scheduler.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tasks waiting to run.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the delays of the waiting tasks, oldest first.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        self.pending.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Runs the oldest waiting task and returns its delay.
    pub fn run_next(&self) -> Option<Duration> {
        // Popped before running: the task may schedule again.
        let (delay, task) = self.pending.lock().pop_front()?;
        trace!(delay_ms = delay_millis(delay), "Running scheduled task");
        task();
        Some(delay)
    }

    /// Runs every task waiting right now, not the ones they schedule.
    pub fn run_pending(&self) -> usize {
        let tasks: Vec<_> = self.pending.lock().drain(..).collect();
        let count = tasks.len();
        for (_, task) in tasks {
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.pending.lock().push_back((delay, task));
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("delays", &self.delays())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
