//! Trailing-edge debouncer
//!
//! [`Debouncer::trigger`] records a pending token with a deadline. A later
//! trigger replaces the token rather than stacking another timer, so a burst
//! of triggers fires the callback once, `delay` after the last of them.
//!
//! One background task owns the timer. It sleeps until the pending deadline
//! and fires only if the token it woke for is still the pending one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Pending {
    token: u64,
    deadline: Instant,
}

struct Shared {
    pending: Mutex<Option<Pending>>,
    wake: Notify,
    next_token: AtomicU64,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Coalesces bursts of triggers into one delayed callback.
pub struct Debouncer {
    shared: Arc<Shared>,
    on_fire: Callback,
    delay: Duration,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the timer task. Must be called inside a tokio runtime.
    pub fn new<F>(delay: Duration, on_fire: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            pending: Mutex::new(None),
            wake: Notify::new(),
            next_token: AtomicU64::new(0),
        });
        let on_fire: Callback = Arc::new(on_fire);
        let task = tokio::spawn(run_timer(Arc::clone(&shared), Arc::clone(&on_fire)));

        Self {
            shared,
            on_fire,
            delay,
            task,
        }
    }

    /// Schedule the callback `delay` from now, superseding any pending one.
    pub fn trigger(&self) {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        *self.shared.pending() = Some(Pending {
            token,
            deadline: Instant::now() + self.delay,
        });
        self.shared.wake.notify_one();
    }

    /// Fire a pending callback now. Returns whether one was pending.
    pub fn flush(&self) -> bool {
        let taken = self.shared.pending().take();
        if taken.is_some() {
            self.shared.wake.notify_one();
            (self.on_fire)();
        }
        taken.is_some()
    }

    /// Drop a pending callback without firing it.
    pub fn cancel(&self) -> bool {
        let taken = self.shared.pending().take();
        if taken.is_some() {
            self.shared.wake.notify_one();
        }
        taken.is_some()
    }

    /// Whether a callback is waiting for its deadline.
    pub fn is_pending(&self) -> bool {
        self.shared.pending().is_some()
    }

    /// Configured delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Stop the timer task. Pending callbacks are discarded.
    pub fn shutdown(&self) {
        self.shared.pending().take();
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_timer(shared: Arc<Shared>, on_fire: Callback) {
    loop {
        let next = *shared.pending();
        let Some(Pending { token, deadline }) = next else {
            shared.wake.notified().await;
            continue;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {
                let fire = {
                    let mut pending = shared.pending();
                    if pending.as_ref().map(|p| p.token) == Some(token) {
                        *pending = None;
                        true
                    } else {
                        false
                    }
                };
                if fire {
                    tracing::debug!(token, "Debounce deadline reached");
                    on_fire();
                }
            }
            _ = shared.wake.notified() => {}
        }
    }
}
