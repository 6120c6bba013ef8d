#![forbid(unsafe_code)]

//! Cancellable one-shot timers driving playback.
//!
//! Playback needs exactly one capability from its environment: "call me back
//! after this long, unless I cancel first". [`Timer`] is that capability.
//!
//! - [`VirtualTimer`] is a manual clock. Nothing fires until the host calls
//!   [`VirtualTimer::advance`], which makes playback fully deterministic.
//! - [`ThreadTimer`] sleeps on a worker thread per scheduled handle and
//!   delivers fired handles over a channel.
//!
//! Timers only report handles. Deciding whether a fired handle is still the
//! live one is the caller's job (see `PlaybackController::on_timer`).

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;

use web_time::{Duration, Instant};

use crate::cancellation::CancellationSource;

/// Identifies one scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A clock that can schedule and cancel one-shot callbacks.
pub trait Timer {
    /// Time since the timer was created.
    fn now(&self) -> Duration;

    /// Schedule a callback `after` from now.
    fn schedule(&mut self, after: Duration) -> TimerHandle;

    /// Cancel a scheduled callback. Returns `false` if it already fired or
    /// was never scheduled.
    fn cancel(&mut self, handle: TimerHandle) -> bool;
}

// ============================================================================
// VirtualTimer
// ============================================================================

/// Deterministic timer advanced by hand.
#[derive(Debug, Default)]
pub struct VirtualTimer {
    now: Duration,
    next_handle: u64,
    pending: Vec<(TimerHandle, Duration)>,
}

impl VirtualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and return every handle that came due, in due
    /// order (ties in scheduling order).
    pub fn advance(&mut self, delta: Duration) -> Vec<TimerHandle> {
        self.now = self.now.saturating_add(delta);
        let now = self.now;
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|(_, at)| *at <= now);
        self.pending = pending;
        due.sort_by_key(|(handle, at)| (*at, *handle));
        due.into_iter().map(|(handle, _)| handle).collect()
    }

    /// Jump straight to the earliest pending deadline and fire it.
    pub fn advance_to_next(&mut self) -> Vec<TimerHandle> {
        match self.next_due() {
            Some(due) => self.advance(due.saturating_sub(self.now)),
            None => Vec::new(),
        }
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.iter().map(|(_, at)| *at).min()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|(h, _)| *h == handle)
    }
}

impl Timer for VirtualTimer {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule(&mut self, after: Duration) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.pending.push((handle, self.now.saturating_add(after)));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(h, _)| *h != handle);
        self.pending.len() != before
    }
}

// ============================================================================
// ThreadTimer
// ============================================================================

/// Wall-clock timer backed by one sleeping worker thread per handle.
///
/// Fired handles queue up on an internal channel; drain them with
/// [`recv_timeout`](Self::recv_timeout) or [`try_recv`](Self::try_recv).
/// Dropping the timer cancels everything still pending.
pub struct ThreadTimer {
    epoch: Instant,
    next_handle: u64,
    live: HashMap<TimerHandle, CancellationSource>,
    fired_tx: mpsc::Sender<TimerHandle>,
    fired_rx: mpsc::Receiver<TimerHandle>,
}

impl ThreadTimer {
    pub fn new() -> Self {
        let (fired_tx, fired_rx) = mpsc::channel();
        Self {
            epoch: Instant::now(),
            next_handle: 0,
            live: HashMap::new(),
            fired_tx,
            fired_rx,
        }
    }

    /// Wait up to `timeout` for the next live handle to fire.
    ///
    /// Handles cancelled after their worker already woke are dropped here.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<TimerHandle> {
        let start = Instant::now();
        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            let handle = self.fired_rx.recv_timeout(remaining).ok()?;
            if self.live.remove(&handle).is_some() {
                return Some(handle);
            }
            tracing::trace!(handle = handle.get(), "dropping cancelled timer delivery");
        }
    }

    /// Next live handle that has already fired, without blocking.
    pub fn try_recv(&mut self) -> Option<TimerHandle> {
        while let Ok(handle) = self.fired_rx.try_recv() {
            if self.live.remove(&handle).is_some() {
                return Some(handle);
            }
        }
        None
    }

    pub fn pending_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ThreadTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadTimer")
            .field("next_handle", &self.next_handle)
            .field("pending", &self.live.len())
            .finish()
    }
}

impl Timer for ThreadTimer {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn schedule(&mut self, after: Duration) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        let source = CancellationSource::new();
        let token = source.token();
        let tx = self.fired_tx.clone();
        thread::spawn(move || {
            if !token.wait_timeout(after) {
                let _ = tx.send(handle);
            }
        });
        self.live.insert(handle, source);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.live.remove(&handle) {
            Some(source) => {
                source.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        for (_, source) in self.live.drain() {
            source.cancel();
        }
    }
}
