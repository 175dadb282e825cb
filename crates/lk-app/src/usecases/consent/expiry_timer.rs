//! Countdown task for a pending consent request.
//!
//! One tokio task per open flow recomputes the remaining TTL on a fixed
//! cadence and publishes it on a `watch` channel. When the value reaches zero
//! the expiry callback is spawned once and the task ends. Cancelling or
//! dropping the [`ExpiryTimer`] aborts the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lk_core::consent::remaining_ms;
use lk_core::ports::ClockPort;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

pub struct ExpiryTimer {
    remaining_rx: watch::Receiver<u64>,
    abort_handle: Option<AbortHandle>,
}

impl ExpiryTimer {
    /// Starts ticking every `tick` until `expires_at_ms` is reached on `clock`.
    ///
    /// `on_expired` runs on its own task, so it may tear down the owner of
    /// this timer without cancelling itself.
    pub fn start<F, Fut>(
        expires_at_ms: i64,
        clock: Arc<dyn ClockPort>,
        tick: Duration,
        on_expired: F,
    ) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let initial = remaining_ms(expires_at_ms, clock.now_ms());
        let (remaining_tx, remaining_rx) = watch::channel(initial);
        let tick = tick.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = initial;
            loop {
                interval.tick().await;
                // Never report more time than last tick, even if the wall clock steps back.
                let remaining = remaining_ms(expires_at_ms, clock.now_ms()).min(last);
                last = remaining;
                remaining_tx.send_replace(remaining);
                if remaining == 0 {
                    break;
                }
            }
            tracing::debug!(expires_at_ms, "countdown reached zero");
            tokio::spawn(on_expired());
        });

        Self {
            remaining_rx,
            abort_handle: Some(handle.abort_handle()),
        }
    }

    /// Last published remaining time in milliseconds.
    pub fn remaining_ms(&self) -> u64 {
        *self.remaining_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining_rx.clone()
    }

    pub fn is_running(&self) -> bool {
        self.abort_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.abort_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
