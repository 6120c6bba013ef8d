#![forbid(unsafe_code)]

//! The devtools session: one timeline, its replayed states and playback.
//!
//! [`DevToolsSession`] is the single owner of the staged timeline. Captures
//! and user edits go through it, so after every change it can replay the
//! snapshot store and keep playback consistent with the new order.
//!
//! Failed edits leave the session exactly as it was and are returned to the
//! caller; the session itself only logs them.

use serde::Serialize;
use storyline_core::{
    ActionId, ActionRecord, JumpTarget, Payload, ReorderTarget, Result, SnapshotStore, Timeline,
    TimelineError, delete_record, edit_payload,
};

use crate::config::SessionConfig;
use crate::playback::{PlaybackController, PlaybackState};
use crate::timer::{Timer, TimerHandle};

/// Id of the synthetic initial record in every session.
pub const INITIAL_ID: ActionId = ActionId(0);

/// One card in a [`TimelineSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub id: ActionId,
    pub kind: &'static str,
    pub payload: Payload,
    /// Playback timestamp of the card's slot.
    pub timestamp: i64,
    /// Gap to the next card; `None` on the last one.
    pub time_diff: Option<i64>,
    pub skipped: bool,
    pub current: bool,
}

/// Which timeline buttons are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub can_play: bool,
    pub can_pause: bool,
    pub can_stop: bool,
    pub can_sweep: bool,
    pub can_reset: bool,
}

/// Everything a renderer needs to draw the timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub initial_id: ActionId,
    pub cards: Vec<CardView>,
    /// `-1` at the initial record.
    pub cursor: isize,
    pub current_id: ActionId,
    pub time_diffs: Vec<i64>,
    pub playback: PlaybackState,
    pub progress: f64,
    pub last_jumped_to: ActionId,
    pub controls: Controls,
}

/// A capture-and-edit session over one timeline.
pub struct DevToolsSession<S: SnapshotStore, T> {
    timeline: Timeline,
    store: S,
    states: Vec<S::State>,
    playback: PlaybackController<T>,
    last_jumped_to: ActionId,
    next_id: u64,
    config: SessionConfig,
}

impl<S: SnapshotStore, T: Timer> DevToolsSession<S, T> {
    pub fn new(store: S, timer: T) -> Self {
        Self::with_config(store, timer, SessionConfig::default())
    }

    pub fn with_config(store: S, timer: T, config: SessionConfig) -> Self {
        let timeline = Timeline::new(INITIAL_ID);
        let states = store.replay_timeline(&timeline);
        let playback = PlaybackController::new(timer).with_speed(config.playback.speed);
        Self {
            timeline,
            store,
            states,
            playback,
            last_jumped_to: INITIAL_ID,
            next_id: INITIAL_ID.get() + 1,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Replayed state per staged position, initial state first.
    #[inline]
    pub fn states(&self) -> &[S::State] {
        &self.states
    }

    /// Replayed state at the cursor.
    pub fn current_state(&self) -> Option<&S::State> {
        let index = self.timeline.cursor().map_or(0, |c| c + 1);
        self.states.get(index)
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn playback(&self) -> &PlaybackController<T> {
        &self.playback
    }

    #[inline]
    pub fn timer(&self) -> &T {
        self.playback.timer()
    }

    #[inline]
    pub fn timer_mut(&mut self) -> &mut T {
        self.playback.timer_mut()
    }

    #[inline]
    pub fn last_jumped_to(&self) -> ActionId {
        self.last_jumped_to
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Record a freshly dispatched action.
    ///
    /// When the cursor is behind the tail, the capture is spliced in right
    /// after the current record and becomes current, since its effect
    /// already happened on the canvas the user is looking at. A running
    /// interval restarts from the new record.
    pub fn capture(&mut self, payload: Payload, timestamp: i64) -> Result<ActionId> {
        let id = ActionId(self.next_id);
        let splice_before = if self.config.playback.follow_live_captures {
            self.timeline.next().map(|r| r.id)
        } else {
            None
        };
        let kind = payload.kind();

        let appended = match self.timeline.append(ActionRecord::new(id, payload, timestamp)) {
            Ok(timeline) => timeline,
            Err(err) => {
                tracing::warn!(id = id.get(), timestamp, error = %err, "dropping captured action");
                return Err(err);
            }
        };
        self.next_id += 1;

        match splice_before {
            Some(before) => {
                self.timeline = appended
                    .reorder(id, ReorderTarget::Before(before))?
                    .jump_to(JumpTarget::Id(id));
                self.last_jumped_to = id;
                tracing::debug!(
                    id = id.get(),
                    before = before.get(),
                    "live capture spliced after cursor"
                );
                self.commit();
                self.playback.restart_interval(&self.timeline);
            }
            None => {
                self.timeline = appended;
                self.commit();
            }
        }
        tracing::debug!(id = id.get(), kind = %kind, timestamp, "captured");
        Ok(id)
    }

    // ========================================================================
    // Edits
    // ========================================================================

    pub fn reorder(&mut self, id: ActionId, target: ReorderTarget) -> Result<()> {
        self.edit("reorder", |t| t.reorder(id, target))
    }

    pub fn toggle_skip(&mut self, id: ActionId) -> Result<()> {
        self.edit("toggle_skip", |t| t.toggle_skip(id))
    }

    pub fn sweep(&mut self) {
        self.timeline = self.timeline.sweep();
        self.retarget_last_jumped();
        self.commit();
    }

    /// Delete a card, cascading through a created block's dependents.
    ///
    /// Returns the ids that left the timeline.
    pub fn delete(&mut self, id: ActionId) -> Result<Vec<ActionId>> {
        let deletion = delete_record(&self.timeline, id).inspect_err(|err| {
            tracing::debug!(id = id.get(), error = %err, "delete rejected");
        })?;
        self.timeline = deletion.timeline;
        if deletion.removed.contains(&self.last_jumped_to) {
            self.last_jumped_to = deletion.fallback.unwrap_or(INITIAL_ID);
        }
        self.commit();
        Ok(deletion.removed)
    }

    pub fn set_time_diff(&mut self, id: ActionId, diff: i64) -> Result<()> {
        self.edit("set_time_diff", |t| t.set_time_diff(id, diff))
    }

    /// Replace a transform card's value.
    ///
    /// Returns the id of the replacement, or `None` if the payload is
    /// unchanged.
    pub fn edit_payload(&mut self, id: ActionId, payload: Payload) -> Result<Option<ActionId>> {
        let new_id = ActionId(self.next_id);
        let edited = edit_payload(&self.timeline, id, payload, new_id).inspect_err(|err| {
            tracing::debug!(id = id.get(), error = %err, "payload edit rejected");
        })?;
        let Some(timeline) = edited else {
            return Ok(None);
        };
        self.next_id += 1;
        self.timeline = timeline;
        if self.last_jumped_to == id {
            self.last_jumped_to = new_id;
        }
        self.commit();
        Ok(Some(new_id))
    }

    /// Apply a card form: the time diff if it changed, then the payload.
    pub fn submit_card(
        &mut self,
        id: ActionId,
        time_diff: Option<i64>,
        payload: Option<Payload>,
    ) -> Result<()> {
        if let Some(diff) = time_diff
            && self.timeline.time_diff_of(id) != Some(diff)
        {
            self.set_time_diff(id, diff)?;
        }
        if let Some(payload) = payload {
            self.edit_payload(id, payload)?;
        }
        Ok(())
    }

    /// Stop playback and drop every editable record.
    pub fn reset(&mut self) {
        self.playback.stop();
        self.timeline = self.timeline.reset();
        self.last_jumped_to = INITIAL_ID;
        tracing::info!("session reset");
        self.commit();
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Move the cursor without touching `last_jumped_to`.
    pub fn jump_to(&mut self, target: JumpTarget) {
        self.timeline = self.timeline.jump_to(target);
        self.playback.sync(&self.timeline);
    }

    /// Click on a card: move the cursor there and remember it.
    ///
    /// The interval leaving the selected card starts from zero: at once
    /// while playing, on the next play while paused.
    pub fn select(&mut self, id: ActionId) -> Result<()> {
        self.require(id)?;
        self.timeline = self.timeline.jump_to(JumpTarget::Id(id));
        self.last_jumped_to = id;
        self.playback.restart_interval(&self.timeline);
        self.playback.sync(&self.timeline);
        Ok(())
    }

    /// Hover over a card. Ignored while playing.
    pub fn preview(&mut self, id: ActionId) -> Result<bool> {
        self.require(id)?;
        if self.playback.is_playing() {
            return Ok(false);
        }
        self.timeline = self.timeline.jump_to(JumpTarget::Id(id));
        self.playback.sync(&self.timeline);
        Ok(true)
    }

    /// Hover left the cards: go back to the last selected one.
    pub fn end_preview(&mut self) -> bool {
        if self.playback.is_playing() {
            return false;
        }
        self.timeline = self.timeline.jump_to(JumpTarget::Id(self.last_jumped_to));
        self.playback.sync(&self.timeline);
        true
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub fn play(&mut self) -> bool {
        self.playback.play(&self.timeline)
    }

    pub fn pause(&mut self) -> bool {
        self.playback.pause()
    }

    pub fn stop(&mut self) -> bool {
        self.playback.stop()
    }

    /// Feed a fired timer handle. Returns the record reached, if any.
    pub fn on_timer(&mut self, handle: TimerHandle) -> Option<ActionId> {
        let advance = self.playback.on_timer(handle, &self.timeline)?;
        self.timeline = advance.timeline;
        self.last_jumped_to = advance.reached;
        Some(advance.reached)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    pub fn controls(&self) -> Controls {
        Controls {
            can_play: self.playback.can_play(&self.timeline),
            can_pause: self.playback.can_pause(),
            can_stop: self.playback.can_stop(),
            can_sweep: !self.timeline.skipped().is_empty(),
            can_reset: !self.timeline.is_empty(),
        }
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        let timeline = &self.timeline;
        let cards = timeline
            .records()
            .iter()
            .enumerate()
            .map(|(index, record)| CardView {
                id: record.id,
                kind: record.kind().as_str(),
                payload: record.payload.clone(),
                timestamp: timeline.schedule()[index],
                time_diff: timeline.diff_at(index),
                skipped: timeline.is_skipped(record.id),
                current: timeline.cursor() == Some(index),
            })
            .collect();
        TimelineSnapshot {
            initial_id: timeline.initial_id(),
            cards,
            cursor: timeline.cursor_index(),
            current_id: timeline.current_id(),
            time_diffs: timeline.time_diffs(),
            playback: self.playback.state(),
            progress: self.playback.progress(),
            last_jumped_to: self.last_jumped_to,
            controls: self.controls(),
        }
    }

    fn require(&self, id: ActionId) -> Result<()> {
        if self.timeline.contains(id) {
            Ok(())
        } else {
            Err(TimelineError::UnknownId(id))
        }
    }

    fn edit(
        &mut self,
        op: &'static str,
        apply: impl FnOnce(&Timeline) -> Result<Timeline>,
    ) -> Result<()> {
        match apply(&self.timeline) {
            Ok(timeline) => {
                self.timeline = timeline;
                self.commit();
                Ok(())
            }
            Err(err) => {
                tracing::debug!(op, error = %err, "edit rejected");
                Err(err)
            }
        }
    }

    fn retarget_last_jumped(&mut self) {
        if !self.timeline.contains(self.last_jumped_to) {
            self.last_jumped_to = self.timeline.current_id();
        }
    }

    /// Replay the store and let playback react to the new order.
    fn commit(&mut self) {
        self.states = self.store.replay_timeline(&self.timeline);
        self.playback.sync(&self.timeline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::VirtualTimer;
    use storyline_core::{Block, BlockId, CanvasState, CanvasStore};
    use web_time::Duration;

    type Session = DevToolsSession<CanvasStore, VirtualTimer>;

    fn session() -> Session {
        DevToolsSession::new(CanvasStore::default(), VirtualTimer::new())
    }

    fn create(id: &str) -> Payload {
        Payload::Create(Block {
            id: BlockId::new(id),
            text: id.into(),
            x: 0.0,
            y: 0.0,
        })
    }

    #[test]
    fn capture_allocates_ids_and_replays() {
        let mut s = session();
        assert_eq!(s.capture(create("a"), 0).unwrap(), ActionId(1));
        assert_eq!(s.capture(Payload::SetScale(2.0), 40).unwrap(), ActionId(2));
        assert_eq!(s.states().len(), 3);
        let state: &CanvasState = s.current_state().unwrap();
        assert_eq!(state.blocks.len(), 1);
        assert_eq!(state.transform.scale, 2.0);
    }

    #[test]
    fn capture_behind_tail_splices_after_cursor() {
        let mut s = session();
        for (scale, ts) in [(1.0, 0), (2.0, 100), (3.0, 250)] {
            s.capture(Payload::SetScale(scale), ts).unwrap();
        }
        s.select(ActionId(1)).unwrap();

        let new = s.capture(Payload::SetScale(9.0), 300).unwrap();
        assert_eq!(
            s.timeline().staged_ids(),
            vec![INITIAL_ID, ActionId(1), new, ActionId(2), ActionId(3)]
        );
        assert_eq!(s.timeline().current_id(), new);
        assert_eq!(s.last_jumped_to(), new);
        assert_eq!(s.current_state().unwrap().transform.scale, 9.0);
        assert_eq!(s.playback().state(), PlaybackState::Idle);
        assert_eq!(s.timer().pending_count(), 0);
    }

    #[test]
    fn capture_stays_at_tail_when_splicing_is_off() {
        let mut config = SessionConfig::default();
        config.playback.follow_live_captures = false;
        let mut s =
            DevToolsSession::with_config(CanvasStore::default(), VirtualTimer::new(), config);
        let a = s.capture(Payload::SetScale(1.0), 0).unwrap();
        s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.select(a).unwrap();

        let new = s.capture(Payload::SetScale(3.0), 20).unwrap();
        assert_eq!(s.timeline().records().last().map(|r| r.id), Some(new));
        assert_eq!(s.timeline().current_id(), a);
    }

    #[test]
    fn out_of_order_capture_is_dropped() {
        let mut s = session();
        s.capture(Payload::SetScale(1.0), 100).unwrap();
        let err = s.capture(Payload::SetScale(2.0), 50).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidOrder { .. }));
        assert_eq!(s.timeline().editable_count(), 1);
        assert_eq!(s.capture(Payload::SetScale(3.0), 150).unwrap(), ActionId(2));
    }

    #[test]
    fn skip_changes_replayed_state() {
        let mut s = session();
        let a = s.capture(create("a"), 0).unwrap();
        s.capture(create("b"), 10).unwrap();
        s.toggle_skip(a).unwrap();
        assert_eq!(s.current_state().unwrap().blocks.len(), 1);
        assert!(s.controls().can_sweep);
        s.sweep();
        assert_eq!(s.timeline().editable_count(), 1);
        assert!(!s.controls().can_sweep);
    }

    #[test]
    fn preview_and_end_preview() {
        let mut s = session();
        let a = s.capture(Payload::SetScale(1.0), 0).unwrap();
        let b = s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.select(a).unwrap();
        assert!(s.preview(b).unwrap());
        assert_eq!(s.timeline().current_id(), b);
        assert!(s.end_preview());
        assert_eq!(s.timeline().current_id(), a);
        assert_eq!(s.last_jumped_to(), a);
    }

    #[test]
    fn preview_ignored_while_playing() {
        let mut s = session();
        s.capture(Payload::SetScale(1.0), 0).unwrap();
        let b = s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.jump_to(JumpTarget::Initial);
        assert!(s.play());
        assert!(!s.preview(b).unwrap());
        assert_eq!(s.timeline().cursor(), None);
    }

    #[test]
    fn reset_stops_and_clears() {
        let mut s = session();
        s.capture(Payload::SetScale(1.0), 0).unwrap();
        s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.jump_to(JumpTarget::Initial);
        s.play();
        s.reset();
        assert!(s.timeline().is_empty());
        assert_eq!(s.playback().state(), PlaybackState::Idle);
        assert_eq!(s.timer().pending_count(), 0);
        assert_eq!(s.last_jumped_to(), INITIAL_ID);
        assert!(!s.controls().can_reset);
    }

    #[test]
    fn edit_payload_keeps_slot_and_moves_selection() {
        let mut s = session();
        s.capture(Payload::SetScale(1.0), 0).unwrap();
        let b = s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.capture(Payload::SetScale(3.0), 30).unwrap();
        s.select(b).unwrap();

        let replaced = s.edit_payload(b, Payload::SetScale(5.0)).unwrap().unwrap();
        assert_eq!(replaced, ActionId(4));
        assert_eq!(s.last_jumped_to(), replaced);
        assert_eq!(s.timeline().position(replaced), Some(1));
        assert_eq!(s.timeline().time_diffs(), vec![10, 20]);
        assert_eq!(s.current_state().unwrap().transform.scale, 5.0);
        assert_eq!(s.edit_payload(replaced, Payload::SetScale(5.0)).unwrap(), None);
    }

    #[test]
    fn submit_card_skips_unchanged_diff() {
        let mut s = session();
        let a = s.capture(Payload::SetScale(1.0), 0).unwrap();
        s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.submit_card(a, Some(10), Some(Payload::SetScale(1.5))).unwrap();
        assert_eq!(s.timeline().time_diffs(), vec![10]);
        s.submit_card(ActionId(3), Some(25), None).unwrap();
        assert_eq!(s.timeline().time_diffs(), vec![25]);
    }

    #[test]
    fn snapshot_reports_cards() {
        let mut s = session();
        let a = s.capture(Payload::SetScale(1.0), 0).unwrap();
        s.capture(Payload::SetScale(2.0), 10).unwrap();
        s.toggle_skip(a).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap.cards.len(), 2);
        assert!(snap.cards[0].skipped);
        assert_eq!(snap.cards[0].time_diff, Some(10));
        assert_eq!(snap.cards[1].time_diff, None);
        assert!(snap.cards[1].current);
        assert_eq!(snap.cursor, 1);
        assert_eq!(snap.cards[0].kind, "transform/scale/set");
    }

    #[test]
    fn playback_walks_every_record() {
        let mut s = session();
        s.capture(Payload::SetScale(1.0), 0).unwrap();
        s.capture(Payload::SetScale(2.0), 100).unwrap();
        s.jump_to(JumpTarget::Initial);
        s.play();
        let mut reached = Vec::new();
        for handle in s.timer_mut().advance(Duration::from_millis(100)) {
            reached.extend(s.on_timer(handle));
        }
        // Only the zero-delay interval was due when the clock moved.
        assert_eq!(reached, vec![ActionId(1)]);
        let next = s.timer_mut().advance_to_next();
        reached.extend(s.on_timer(next[0]));
        assert_eq!(reached, vec![ActionId(1), ActionId(2)]);
        assert_eq!(s.playback().state(), PlaybackState::Idle);
    }
}
