use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::foundation::core::Fps;

/// Cooperative cancellation flag checked by the paint loop every tick.
///
/// Clones share one flag. Besides polling it, a task can await [`CancelToken::cancelled`].
#[derive(Clone, Debug)]
pub struct CancelToken(Arc<watch::Sender<bool>>);

impl Default for CancelToken {
    fn default() -> Self {
        Self(Arc::new(watch::Sender::new(false)))
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.0.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Drive `fut` until it completes or the token is cancelled, whichever comes first.
    ///
    /// Returns `None` on cancellation; `fut` is dropped without being polled again.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

/// Paces the paint loop at exact rational frame boundaries.
///
/// Tick `k` is due at `start + fps.frame_start(k)`. When the loop falls behind, the ticks that
/// already passed are skipped rather than fired in a burst.
#[derive(Debug)]
pub struct PaintTicker {
    fps: Fps,
    start: Instant,
    next: u64,
    skipped: u64,
}

impl PaintTicker {
    /// Start the clock now; the first tick fires immediately.
    pub fn start(fps: Fps) -> Self {
        Self {
            fps,
            start: Instant::now(),
            next: 0,
            skipped: 0,
        }
    }

    /// Wait for the next due tick and return the elapsed time since start.
    pub async fn tick(&mut self) -> Duration {
        let due = self.start + self.fps.frame_start(self.next);
        tokio::time::sleep_until(due).await;

        let elapsed = self.start.elapsed();
        let current = self.fps.frame_at(elapsed);
        if current > self.next {
            self.skipped += current - self.next;
        }
        self.next = current.max(self.next) + 1;
        elapsed
    }

    /// Ticks skipped because the loop fell behind.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/ticker.rs"]
mod tests;
