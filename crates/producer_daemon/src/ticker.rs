//! Flush ticker abstraction
//!
//! The flush scheduler only needs three things from a clock: wait for the next
//! tick, push the next tick one full period out, and stop.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Resettable repeating ticker
#[trait_variant::make(Ticker: Send)]
pub trait LocalTicker {
    /// Wait for the next tick
    ///
    /// Returns false once the ticker was stopped. Cancel safe.
    async fn tick(&self) -> bool;

    /// Restart the current period from now
    fn reset(&self);

    /// Stop ticking; pending and future `tick` calls return false
    fn stop(&self);
}

/// Ticker backed by `tokio::time`
///
/// Keeps an absolute deadline. `reset` only moves the deadline, and a waiting
/// `tick` re-checks it after waking, so a reset racing with the sleep is never
/// lost.
#[derive(Debug)]
pub struct IntervalTicker {
    period: Duration,
    deadline: Mutex<Instant>,
    wake: Notify,
    stopped: AtomicBool,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Mutex::new(Instant::now() + period),
            wake: Notify::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    fn deadline(&self) -> Instant {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume the deadline if it has passed
    fn try_fire(&self) -> bool {
        let mut deadline = self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now < *deadline {
            return false;
        }
        *deadline = now + self.period;
        true
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&self) -> bool {
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return false;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(self.deadline()) => {
                    if self.try_fire() {
                        return !self.stopped.load(Ordering::Acquire);
                    }
                }
                _ = self.wake.notified() => {}
            }
        }
    }

    fn reset(&self) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now() + self.period;
        self.wake.notify_one();
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

#[derive(Debug, Default)]
struct ManualState {
    pending: AtomicUsize,
    resets: AtomicUsize,
    stopped: AtomicBool,
    wake: Notify,
}

/// Ticker driven by hand, for tests
///
/// Clones share state: keep one clone to `fire` while the daemon owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    state: Arc<ManualState>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one tick
    pub fn fire(&self) {
        self.state.pending.fetch_add(1, Ordering::AcqRel);
        self.state.wake.notify_one();
    }

    /// Number of `reset` calls so far
    pub fn reset_count(&self) -> usize {
        self.state.resets.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }

    fn take_pending(&self) -> bool {
        self.state
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Ticker for ManualTicker {
    async fn tick(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if self.take_pending() {
                return true;
            }
            self.state.wake.notified().await;
        }
    }

    fn reset(&self) {
        self.state.resets.fetch_add(1, Ordering::AcqRel);
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::Release);
        self.state.wake.notify_one();
    }
}
