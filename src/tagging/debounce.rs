//! Single-shot debounce timer.
//!
//! Each schedule aborts the previous timer task and spawns a new one, so a
//! burst of requests produces one firing, `duration` after the last request.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Logging target for debounce timers.
const LOG_TARGET: &str = "async_tagger::debounce";

pub(crate) struct DebounceTimer {
    /// The AbortHandle allows cancelling the timer when a new request arrives.
    active: Option<AbortHandle>,
}

impl DebounceTimer {
    pub(crate) fn new() -> Self {
        Self { active: None }
    }

    /// Start the timer, replacing any running one. `on_fire` runs on the
    /// runtime once `duration` elapses without another schedule or cancel.
    pub(crate) fn schedule<F>(&mut self, runtime: &Handle, duration: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.cancel() {
            log::trace!(target: LOG_TARGET, "Restarted debounce timer");
        }

        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire();
        });
        self.active = Some(task.abort_handle());
    }

    /// Abort the running timer. Returns whether one was running.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(handle) => {
                let was_running = !handle.is_finished();
                handle.abort();
                was_running
            }
            None => false,
        }
    }

    /// Forget the timer after it fired.
    pub(crate) fn clear(&mut self) {
        self.active = None;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
