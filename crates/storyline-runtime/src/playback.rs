#![forbid(unsafe_code)]

//! Timed playback of a timeline.
//!
//! [`PlaybackController`] walks the cursor forward one record per timer
//! callback, waiting the recorded gap between records. It owns the timer and
//! keeps at most one callback scheduled at any time.
//!
//! # State Machine
//!
//! ```text
//!          play (has next)          pause
//!   Idle ─────────────────► Playing ─────► Paused
//!    ▲                        │  ▲           │
//!    │  stop / finished       │  └───────────┘
//!    └────────────────────────┘     play / resume
//! ```
//!
//! `stop` from `Paused` also returns to `Idle`.
//!
//! # Invariants
//!
//! 1. Starting an interval cancels the pending one first.
//! 2. `pending` is `Some` exactly when the state is `Playing`.
//! 3. A fired handle that is not the pending one never moves the cursor.
//! 4. After pause then resume the remaining wait is `duration - elapsed`.

use serde::{Deserialize, Serialize};
use storyline_core::{ActionId, JumpTarget, Timeline};
use web_time::Duration;

use crate::timer::{Timer, TimerHandle};

/// Where playback currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Result of a timer callback that moved the cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// Timeline with the cursor on the reached record.
    pub timeline: Timeline,
    /// Record the cursor moved to.
    pub reached: ActionId,
    /// `true` when the reached record is the last one and playback stopped.
    pub finished: bool,
}

/// Drives the cursor through a timeline on a [`Timer`].
#[derive(Debug)]
pub struct PlaybackController<T> {
    timer: T,
    state: PlaybackState,
    pending: Option<TimerHandle>,
    interval_start: Duration,
    duration: Duration,
    elapsed: Duration,
    speed: f64,
}

impl<T: Timer> PlaybackController<T> {
    pub fn new(timer: T) -> Self {
        Self {
            timer,
            state: PlaybackState::Idle,
            pending: None,
            interval_start: Duration::ZERO,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            speed: 1.0,
        }
    }

    /// Playback rate. `2.0` halves every wait; non-finite or non-positive
    /// values mean real time.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = normalize_speed(speed);
        self
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    #[inline]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Handle of the scheduled callback, if any.
    #[inline]
    pub fn pending(&self) -> Option<TimerHandle> {
        self.pending
    }

    /// Length of the current interval.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    pub fn timer(&self) -> &T {
        &self.timer
    }

    #[inline]
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Wait before leaving the current record of `timeline`.
    pub fn interval_for(&self, timeline: &Timeline) -> Duration {
        let Some(cursor) = timeline.cursor() else {
            return Duration::ZERO;
        };
        let gap = timeline.diff_at(cursor).unwrap_or(0);
        let gap = Duration::from_millis(u64::try_from(gap).unwrap_or(0));
        scale_interval(gap, self.speed)
    }

    /// Time spent in the current interval so far.
    pub fn elapsed(&self) -> Duration {
        match self.state {
            PlaybackState::Playing => {
                let running = self.timer.now().saturating_sub(self.interval_start);
                self.elapsed.saturating_add(running).min(self.duration)
            }
            _ => self.elapsed,
        }
    }

    /// Fraction of the current interval that has passed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.state == PlaybackState::Idle {
            return 0.0;
        }
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed().as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn can_play(&self, timeline: &Timeline) -> bool {
        match self.state {
            PlaybackState::Idle => timeline.next().is_some(),
            PlaybackState::Paused => true,
            PlaybackState::Playing => false,
        }
    }

    pub fn can_pause(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Playing, or paused part way through an interval.
    pub fn can_stop(&self) -> bool {
        match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Paused => !self.elapsed.is_zero(),
            PlaybackState::Idle => false,
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Start playing from the current record, or resume when paused.
    ///
    /// A no-op returning `false` while already playing or when nothing
    /// follows the cursor.
    pub fn play(&mut self, timeline: &Timeline) -> bool {
        match self.state {
            PlaybackState::Playing => false,
            PlaybackState::Paused => self.resume(),
            PlaybackState::Idle => {
                if timeline.next().is_none() {
                    tracing::debug!(cursor = timeline.cursor_index(), "play ignored: no next record");
                    return false;
                }
                self.state = PlaybackState::Playing;
                tracing::info!(
                    cursor = timeline.cursor_index(),
                    records = timeline.editable_count(),
                    speed = self.speed,
                    "playback started"
                );
                self.start_interval(self.interval_for(timeline));
                true
            }
        }
    }

    /// Freeze the running interval, keeping the elapsed part.
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.elapsed = self.elapsed();
        self.cancel_pending();
        self.state = PlaybackState::Paused;
        tracing::info!(
            elapsed_ms = self.elapsed.as_millis() as u64,
            duration_ms = self.duration.as_millis() as u64,
            "playback paused"
        );
        true
    }

    /// Continue a paused interval for its remaining time.
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Playing;
        let remaining = self.duration.saturating_sub(self.elapsed);
        self.interval_start = self.timer.now();
        self.schedule(remaining);
        tracing::info!(remaining_ms = remaining.as_millis() as u64, "playback resumed");
        true
    }

    /// Cancel any pending callback and return to `Idle`.
    pub fn stop(&mut self) -> bool {
        if self.state == PlaybackState::Idle {
            return false;
        }
        self.cancel_pending();
        self.state = PlaybackState::Idle;
        self.elapsed = Duration::ZERO;
        self.duration = Duration::ZERO;
        tracing::info!("playback stopped");
        true
    }

    /// Handle a fired timer callback.
    ///
    /// Returns `None` for stale handles or when nothing follows the cursor.
    pub fn on_timer(&mut self, handle: TimerHandle, timeline: &Timeline) -> Option<Advance> {
        if self.state != PlaybackState::Playing || self.pending != Some(handle) {
            tracing::trace!(handle = handle.get(), "ignoring stale timer");
            return None;
        }
        self.pending = None;

        let Some(next) = timeline.next() else {
            self.stop();
            return None;
        };
        let reached = next.id;
        let advanced = timeline.jump_to(JumpTarget::Id(reached));
        let finished = advanced.next().is_none();
        tracing::debug!(
            reached = reached.get(),
            cursor = advanced.cursor_index(),
            finished,
            "playback advanced"
        );

        if finished {
            self.state = PlaybackState::Idle;
            self.elapsed = Duration::ZERO;
            self.duration = Duration::ZERO;
            tracing::info!(last = reached.get(), "playback finished");
        } else {
            self.start_interval(self.interval_for(&advanced));
        }
        Some(Advance {
            timeline: advanced,
            reached,
            finished,
        })
    }

    /// Start the interval leaving the current record from zero.
    ///
    /// While paused nothing is scheduled; the next resume waits the fresh
    /// interval in full.
    pub fn restart_interval(&mut self, timeline: &Timeline) {
        match self.state {
            PlaybackState::Playing => self.start_interval(self.interval_for(timeline)),
            PlaybackState::Paused => {
                self.duration = self.interval_for(timeline);
                self.elapsed = Duration::ZERO;
                tracing::debug!(
                    duration_ms = self.duration.as_millis() as u64,
                    "paused interval rewound"
                );
            }
            PlaybackState::Idle => {}
        }
    }

    /// Bring playback in line with an edited timeline.
    ///
    /// Stops when nothing follows the cursor any more.
    pub fn sync(&mut self, timeline: &Timeline) {
        if self.state != PlaybackState::Idle && timeline.next().is_none() {
            tracing::debug!("no next record after edit");
            self.stop();
        }
    }

    fn start_interval(&mut self, duration: Duration) {
        self.duration = duration;
        self.elapsed = Duration::ZERO;
        self.interval_start = self.timer.now();
        self.schedule(duration);
    }

    fn schedule(&mut self, after: Duration) {
        self.cancel_pending();
        let handle = self.timer.schedule(after);
        tracing::debug!(
            handle = handle.get(),
            after_ms = after.as_millis() as u64,
            "interval scheduled"
        );
        self.pending = Some(handle);
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            let cancelled = self.timer.cancel(handle);
            tracing::debug!(handle = handle.get(), cancelled, "interval cancelled");
        }
    }
}

fn normalize_speed(speed: f64) -> f64 {
    if !speed.is_finite() || speed <= 0.0 {
        return 1.0;
    }
    speed
}

fn scale_interval(gap: Duration, speed: f64) -> Duration {
    if gap.is_zero() || speed == 1.0 {
        return gap;
    }
    duration_from_secs_f64_saturating(gap.as_secs_f64() / speed)
}

fn duration_from_secs_f64_saturating(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
