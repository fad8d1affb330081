use std::{
    sync::{
        Arc, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{AttemptGuard, Clock};

/// Interval used by [`AttemptGuard::run_cleanup_loop`].
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 60_000;

pub(crate) struct CleanupLoopHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl<C: Clock> AttemptGuard<C> {
    /// Start a background thread that evicts records that can no longer
    /// influence a decision.
    ///
    /// Records are evicted once their last attempt is older than the window.
    /// The pass runs every [`DEFAULT_CLEANUP_INTERVAL_MS`].
    ///
    /// See [`run_cleanup_loop_with_config`](Self::run_cleanup_loop_with_config).
    pub fn run_cleanup_loop(self: &Arc<Self>) {
        self.run_cleanup_loop_with_config(self.default_stale_after_ms(), DEFAULT_CLEANUP_INTERVAL_MS);
    }

    /// Start a background thread that evicts records whose last attempt is more
    /// than `stale_after_ms` old, every `interval_ms`.
    ///
    /// - Idempotent: a call while a loop is running does nothing
    /// - The first pass runs immediately
    /// - The thread holds a weak reference and stops when the guard is dropped
    ///
    /// A `stale_after_ms` shorter than the window evicts records that still
    /// carry a penalty.
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use attempt_guard::{AttemptGuard, AttemptGuardOptions};
    ///
    /// let guard = Arc::new(AttemptGuard::new(AttemptGuardOptions::default()));
    /// guard.run_cleanup_loop_with_config(60 * 60 * 1000, 60_000);
    ///
    /// guard.check_and_record("a@test.com");
    ///
    /// guard.stop_cleanup_loop();
    /// ```
    pub fn run_cleanup_loop_with_config(self: &Arc<Self>, stale_after_ms: u64, interval_ms: u64) {
        let mut running = self
            .cleanup_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if running.is_some() {
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let guard = Arc::downgrade(self);
        let interval = Duration::from_millis(interval_ms.max(1));

        let spawned = {
            let stop = stop.clone();

            thread::Builder::new()
                .name("attempt-guard-cleanup".to_string())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        let Some(guard) = guard.upgrade() else {
                            break;
                        };

                        guard.cleanup_stale(stale_after_ms);
                        drop(guard);

                        // Woken early by `stop_cleanup_loop` and on guard drop.
                        thread::park_timeout(interval);
                    }
                })
        };

        match spawned {
            Ok(thread) => {
                *running = Some(CleanupLoopHandle { stop, thread });
                tracing::debug!(stale_after_ms, interval_ms, "cleanup loop started");
            }
            Err(err) => {
                tracing::error!(error = ?err, "Failed to spawn cleanup loop thread");
            }
        }
    } // end method run_cleanup_loop_with_config

    /// Stop the cleanup loop, if running.
    ///
    /// Idempotent. The thread is woken and exits without running another pass.
    /// A new loop may be started right away.
    pub fn stop_cleanup_loop(&self) {
        // Detached: the thread exits on its own once woken.
        let _ = self.halt_cleanup_loop();
    }

    /// Signal the loop to stop and wake it. Returns the thread handle.
    pub(crate) fn halt_cleanup_loop(&self) -> Option<JoinHandle<()>> {
        let handle = self
            .cleanup_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        handle.stop.store(true, Ordering::Release);
        handle.thread.thread().unpark();
        tracing::debug!("cleanup loop stopped");

        Some(handle.thread)
    } // end method halt_cleanup_loop
}

impl<C: Clock> Drop for AttemptGuard<C> {
    fn drop(&mut self) {
        let _ = self.halt_cleanup_loop();
    }
}
