//! Countdown barrier with a bounded wait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// How a [`CompletionBarrier::wait`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierWait {
    /// Every participant counted down.
    Completed,
    /// The timeout elapsed first.
    TimedOut,
}

impl BarrierWait {
    /// Returns true if the wait ended because of the timeout.
    #[must_use]
    pub fn is_timed_out(self) -> bool {
        self == Self::TimedOut
    }
}

/// A countdown barrier.
///
/// `count_down` never blocks and never goes below zero. `wait` returns once
/// the count reaches zero or the timeout elapses; a timeout is not an error
/// and does not stop whoever has yet to count down.
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CompletionBarrier {
    /// Creates a barrier expecting `count` calls to [`count_down`](Self::count_down).
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            notify: Notify::new(),
        }
    }

    /// Decrements the count, floored at zero.
    ///
    /// Returns the count after the call.
    pub fn count_down(&self) -> usize {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
        {
            Ok(1) => {
                self.notify.notify_waiters();
                0
            }
            Ok(previous) => previous - 1,
            Err(_) => 0,
        }
    }

    /// Returns the current count.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Returns true once the count has reached zero.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Waits until the count reaches zero or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> BarrierWait {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a count_down in between is not missed.
            notified.as_mut().enable();

            if self.is_complete() {
                return BarrierWait::Completed;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return if self.is_complete() {
                    BarrierWait::Completed
                } else {
                    BarrierWait::TimedOut
                };
            }
        }
    }
}
