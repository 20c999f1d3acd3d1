//! Cancel/pause flags shared between a running injection and its controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Advisory control flags for a single run.
///
/// Writers flip a flag and wake any waiter; the run loop polls the flags at
/// its suspension points. A wake that races with a waiter registering is
/// covered by the bounded timeout on [`RunSignal::changed`].
#[derive(Debug, Default)]
pub struct RunSignal {
    cancelled: AtomicBool,
    paused: AtomicBool,
    notify: Notify,
}

impl RunSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Flip the pause flag and return the new state.
    pub fn toggle_pause(&self) -> bool {
        let was_paused = self.paused.fetch_xor(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        !was_paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Wait until either flag is written or `timeout` elapses.
    pub async fn changed(&self, timeout: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(timeout) => {}
        }
    }
}
