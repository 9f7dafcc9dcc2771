//! Cancellable debounce timer
//!
//! Holds at most one pending delayed action. Scheduling a new action cancels
//! the previous one, and dropping the timer cancels whatever is still pending.
//! Once the delay elapses the action is detached onto its own task, so a fired
//! action runs to completion even if the timer is cancelled or dropped later.

use std::future::Future;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Identifies one scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

struct Pending {
    handle: TimerHandle,
    task: JoinHandle<()>,
}

/// Single-slot debounce timer backed by the tokio runtime
#[derive(Default)]
pub struct CancellableTimer {
    next_id: u64,
    pending: Option<Pending>,
}

impl std::fmt::Debug for CancellableTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableTimer")
            .field("pending", &self.pending.as_ref().map(|p| p.handle))
            .finish()
    }
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, replacing any pending action.
    ///
    /// Returns `None` when called outside a tokio runtime; nothing is scheduled
    /// in that case.
    pub fn schedule<F>(&mut self, delay: Duration, action: F) -> Option<TimerHandle>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel_pending();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No tokio runtime available; timer not scheduled");
                return None;
            }
        };

        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        // Deadline is fixed now, not when the task is first polled.
        let deadline = tokio::time::sleep(delay);
        let spawner = runtime.clone();
        let task = runtime.spawn(async move {
            deadline.await;
            spawner.spawn(action);
        });

        debug!(timer = handle.0, delay_ms = delay.as_millis() as u64, "Timer scheduled");
        self.pending = Some(Pending { handle, task });
        Some(handle)
    }

    /// Cancel the action identified by `handle` if it is still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match &self.pending {
            Some(pending) if pending.handle == handle => self.cancel_pending(),
            _ => false,
        }
    }

    /// Cancel whatever action is pending. Returns true if one was cancelled.
    pub fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) if !pending.task.is_finished() => {
                pending.task.abort();
                debug!(timer = pending.handle.0, "Timer cancelled");
                true
            }
            _ => false,
        }
    }

    /// True while an action is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map_or(false, |pending| !pending.task.is_finished())
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
