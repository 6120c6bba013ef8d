#![forbid(unsafe_code)]

//! One-shot cancellation for timer worker threads.
//!
//! A [`CancellationSource`] stays with the owner of a scheduled timer; the
//! worker thread holds the matching [`CancellationToken`] and sleeps on it
//! with [`CancellationToken::wait_timeout`]. Cancelling wakes the worker
//! immediately instead of letting it sleep out the interval.

use std::sync::{Arc, Condvar, Mutex};

use web_time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flag {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Owner side of a cancellation flag.
#[derive(Debug, Default)]
pub struct CancellationSource {
    flag: Arc<Flag>,
}

/// Observer side of a cancellation flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<Flag>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Arc::clone(&self.flag),
        }
    }

    /// Set the flag and wake every waiting token.
    pub fn cancel(&self) {
        let mut cancelled = self
            .flag
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *cancelled = true;
        self.flag.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .flag
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self
            .flag
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep until cancelled or until `duration` has passed.
    ///
    /// Returns `true` when cancelled. Spurious wakeups are absorbed. Time is
    /// measured as elapsed since the call, so `Duration::MAX` waits for a
    /// cancel instead of overflowing a deadline.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let start = Instant::now();
        let mut cancelled = self
            .flag
            .cancelled
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while !*cancelled {
            let elapsed = start.elapsed();
            if elapsed >= duration {
                return false;
            }
            let (guard, _) = self
                .flag
                .wake
                .wait_timeout(cancelled, duration - elapsed)
                .unwrap_or_else(|e| e.into_inner());
            cancelled = guard;
        }
        true
    }
}
