#![forbid(unsafe_code)]

//! The ordered action timeline.
//!
//! A [`Timeline`] is the staged list of recorded actions behind the canvas
//! devtools: a synthetic initial record followed by the editable tail. Every
//! operation takes `&self` and returns a new value, so a rejected edit leaves
//! the caller's timeline exactly as it was.
//!
//! # Schedule slots
//!
//! Playback timing lives in a positional schedule: one absolute timestamp per
//! editable *index*, not per record.
//!
//! ```text
//! records:   [ A ,  B ,  C  ]        reorder(C, Before(A))   [ C ,  A ,  B  ]
//! schedule:  [ 0 , 100, 250 ]      ─────────────────────►    [ 0 , 100, 250 ]
//! diffs:        [100, 150]                                      [100, 150]
//! ```
//!
//! Reordering moves records between slots while the slots keep their times,
//! so moving a card and moving it back restores the diffs exactly. Diffs are
//! derived from adjacent slots, which keeps `time_diffs().len()` at
//! `editable_count - 1` after every operation.
//!
//! # Invariants
//!
//! 1. Ids are unique, the initial id included.
//! 2. `schedule.len() == records.len()` and the schedule is non-decreasing.
//! 3. `skipped` only holds ids of editable records.
//! 4. `cursor` is `None` (initial record) or `< records.len()`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::action::{ActionId, ActionRecord};
use crate::error::{Result, TimelineError};

/// Where [`Timeline::reorder`] places the moved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderTarget {
    /// Immediately before the given record.
    Before(ActionId),
    /// After the last editable record.
    End,
}

/// Cursor destination for [`Timeline::jump_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpTarget {
    /// The synthetic initial record.
    Initial,
    /// An editable index; `-1` and below mean the initial record.
    Index(isize),
    /// A record id.
    Id(ActionId),
}

/// Staged actions, skip set, cursor and playback schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    initial_id: ActionId,
    records: Vec<ActionRecord>,
    schedule: Vec<i64>,
    skipped: BTreeSet<ActionId>,
    cursor: Option<usize>,
    last_captured_at: Option<i64>,
}

impl Timeline {
    /// An empty timeline holding only the synthetic initial record.
    pub fn new(initial_id: ActionId) -> Self {
        Self {
            initial_id,
            records: Vec::new(),
            schedule: Vec::new(),
            skipped: BTreeSet::new(),
            cursor: None,
            last_captured_at: None,
        }
    }

    /// Build a timeline by appending `records` in order.
    pub fn from_records(
        initial_id: ActionId,
        records: impl IntoIterator<Item = ActionRecord>,
    ) -> Result<Self> {
        records
            .into_iter()
            .try_fold(Self::new(initial_id), |timeline, record| {
                timeline.append(record)
            })
    }

    // ====================================================================
    // Query
    // ====================================================================

    #[inline]
    pub fn initial_id(&self) -> ActionId {
        self.initial_id
    }

    /// The editable tail in staged order.
    #[inline]
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    #[inline]
    pub fn editable_count(&self) -> usize {
        self.records.len()
    }

    /// `true` when only the initial record is staged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All staged ids, initial record first.
    pub fn staged_ids(&self) -> Vec<ActionId> {
        std::iter::once(self.initial_id)
            .chain(self.records.iter().map(|r| r.id))
            .collect()
    }

    pub fn position(&self, id: ActionId) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    pub fn get(&self, id: ActionId) -> Option<&ActionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Whether `id` is staged, the initial record included.
    pub fn contains(&self, id: ActionId) -> bool {
        id == self.initial_id || self.position(id).is_some()
    }

    /// Absolute playback timestamps, one per editable index.
    #[inline]
    pub fn schedule(&self) -> &[i64] {
        &self.schedule
    }

    /// Playback timestamp of the slot `id` currently occupies.
    pub fn timestamp_of(&self, id: ActionId) -> Option<i64> {
        self.position(id).map(|pos| self.schedule[pos])
    }

    /// Gaps between consecutive editable records, in milliseconds.
    pub fn time_diffs(&self) -> Vec<i64> {
        self.schedule.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Gap between `id` and its successor. `None` for the last record.
    pub fn time_diff_of(&self, id: ActionId) -> Option<i64> {
        let pos = self.position(id)?;
        self.diff_at(pos)
    }

    /// Gap leaving editable index `index`.
    pub fn diff_at(&self, index: usize) -> Option<i64> {
        let next = self.schedule.get(index + 1)?;
        Some(next - self.schedule[index])
    }

    #[inline]
    pub fn skipped(&self) -> &BTreeSet<ActionId> {
        &self.skipped
    }

    #[inline]
    pub fn is_skipped(&self, id: ActionId) -> bool {
        self.skipped.contains(&id)
    }

    /// Editable index of the current record; `None` is the initial record.
    #[inline]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Signed cursor in `[-1, editable_count)`.
    pub fn cursor_index(&self) -> isize {
        self.cursor.map_or(-1, |c| c as isize)
    }

    /// Record under the cursor, `None` at the initial record.
    pub fn current(&self) -> Option<&ActionRecord> {
        self.cursor.map(|c| &self.records[c])
    }

    /// Id under the cursor, the initial id at the initial record.
    pub fn current_id(&self) -> ActionId {
        self.current().map_or(self.initial_id, |r| r.id)
    }

    /// Record after the cursor, if any.
    pub fn next(&self) -> Option<&ActionRecord> {
        let next = self.cursor.map_or(0, |c| c + 1);
        self.records.get(next)
    }

    /// Whether the cursor sits on the last staged record.
    pub fn cursor_at_tail(&self) -> bool {
        match self.cursor {
            Some(c) => c + 1 == self.records.len(),
            None => self.records.is_empty(),
        }
    }

    /// Highest capture timestamp seen so far.
    #[inline]
    pub fn last_captured_at(&self) -> Option<i64> {
        self.last_captured_at
    }

    fn require_position(&self, id: ActionId) -> Result<usize> {
        self.position(id).ok_or(TimelineError::UnknownId(id))
    }

    /// Whether a tail slot at `last` keeps every pairwise gap within `i64`.
    fn span_fits(&self, last: i64) -> bool {
        self.schedule
            .first()
            .is_none_or(|&head| last.checked_sub(head).is_some())
    }

    // ====================================================================
    // Operations
    // ====================================================================

    /// Append a freshly captured record at the tail.
    ///
    /// The new slot is placed after the current tail slot by the capture-clock
    /// delta since the previous capture. The cursor follows the tail only if
    /// it was already there.
    pub fn append(&self, record: ActionRecord) -> Result<Self> {
        if self.contains(record.id) {
            return Err(TimelineError::DuplicateId(record.id));
        }
        if let Some(previous) = self.last_captured_at
            && record.timestamp <= previous
        {
            return Err(TimelineError::InvalidOrder {
                id: record.id,
                timestamp: record.timestamp,
                previous,
            });
        }

        let slot = match (self.schedule.last(), self.last_captured_at) {
            (Some(&tail), Some(previous)) => record
                .timestamp
                .checked_sub(previous)
                .and_then(|gap| tail.checked_add(gap)),
            _ => Some(record.timestamp),
        }
        .filter(|&slot| self.span_fits(slot))
        .ok_or(TimelineError::ScheduleOverflow(record.id))?;

        let mut next = self.clone();
        let follow = self.cursor_at_tail();
        next.last_captured_at = Some(record.timestamp);
        tracing::debug!(
            timeline_event = "append",
            id = record.id.get(),
            kind = %record.kind(),
            slot,
            follow,
        );
        next.records.push(record);
        next.schedule.push(slot);
        if follow {
            next.cursor = Some(next.records.len() - 1);
        }
        Ok(next)
    }

    /// Move `id` so it sits immediately before `target`.
    ///
    /// Slots stay where they are, so the moved record takes the timestamp of
    /// the slot it lands in. The cursor keeps pointing at the same record.
    pub fn reorder(&self, id: ActionId, target: ReorderTarget) -> Result<Self> {
        let from = self.require_position(id)?;
        if let ReorderTarget::Before(before) = target {
            self.require_position(before)?;
            if before == id {
                return Ok(self.clone());
            }
        }

        let current = self.current().map(|r| r.id);
        let mut next = self.clone();
        let record = next.records.remove(from);
        let to = match target {
            ReorderTarget::Before(before) => next
                .position(before)
                .ok_or(TimelineError::UnknownId(before))?,
            ReorderTarget::End => next.records.len(),
        };
        next.records.insert(to, record);
        next.cursor = current.and_then(|cid| next.position(cid));

        tracing::debug!(timeline_event = "reorder", id = id.get(), from, to);
        Ok(next)
    }

    /// Flip whether `id` is excluded from replay.
    pub fn toggle_skip(&self, id: ActionId) -> Result<Self> {
        self.require_position(id)?;
        let mut next = self.clone();
        let skipped = if next.skipped.remove(&id) {
            false
        } else {
            next.skipped.insert(id);
            true
        };
        tracing::debug!(timeline_event = "toggle_skip", id = id.get(), skipped);
        Ok(next)
    }

    /// Exclude `id` from replay; already skipped ids stay skipped.
    pub fn skip(&self, id: ActionId) -> Result<Self> {
        self.require_position(id)?;
        let mut next = self.clone();
        next.skipped.insert(id);
        Ok(next)
    }

    /// Remove every skipped record together with its schedule slot.
    ///
    /// Dropping slot `i` leaves `schedule[i + 1] - schedule[i - 1]` between
    /// the surviving neighbours, the sum of the removed spans. The cursor
    /// keeps its record when it survives, otherwise it falls back to the
    /// nearest surviving record before it.
    pub fn sweep(&self) -> Self {
        if self.skipped.is_empty() {
            return self.clone();
        }

        let cursor = self.cursor.and_then(|c| {
            (0..=c)
                .rev()
                .find(|&i| !self.skipped.contains(&self.records[i].id))
        });
        let mut next = Self {
            initial_id: self.initial_id,
            records: Vec::with_capacity(self.records.len()),
            schedule: Vec::with_capacity(self.schedule.len()),
            skipped: BTreeSet::new(),
            cursor: None,
            last_captured_at: self.last_captured_at,
        };
        for (i, (record, slot)) in self.records.iter().zip(&self.schedule).enumerate() {
            if self.skipped.contains(&record.id) {
                continue;
            }
            if cursor == Some(i) {
                next.cursor = Some(next.records.len());
            }
            next.records.push(record.clone());
            next.schedule.push(*slot);
        }

        tracing::debug!(
            timeline_event = "sweep",
            removed = self.records.len() - next.records.len(),
            remaining = next.records.len(),
        );
        next
    }

    /// Set the gap between `id` and its successor to `new_diff`.
    ///
    /// The change cascades onto every later slot, so gaps among later
    /// records are unchanged and only their offset from `id` moves.
    pub fn set_time_diff(&self, id: ActionId, new_diff: i64) -> Result<Self> {
        if new_diff < 0 {
            return Err(TimelineError::NegativeDiff { id, diff: new_diff });
        }
        let pos = self.require_position(id)?;
        let old_diff = self.diff_at(pos).ok_or(TimelineError::NoSuccessor(id))?;
        // Both gaps are non-negative, so the difference cannot overflow.
        let delta = new_diff - old_diff;

        let mut next = self.clone();
        if delta != 0 {
            for slot in &mut next.schedule[pos + 1..] {
                *slot = slot
                    .checked_add(delta)
                    .ok_or(TimelineError::ScheduleOverflow(id))?;
            }
            let last = next.schedule.last().copied().unwrap_or_default();
            if !self.span_fits(last) {
                return Err(TimelineError::ScheduleOverflow(id));
            }
        }
        tracing::debug!(
            timeline_event = "set_time_diff",
            id = id.get(),
            old_diff,
            new_diff,
        );
        Ok(next)
    }

    /// Swap the record `id` for `record`, keeping its slot, skip flag and
    /// cursor position.
    ///
    /// The replacement must carry a fresh id and a payload of the same kind.
    pub fn replace(&self, id: ActionId, record: ActionRecord) -> Result<Self> {
        let pos = self.require_position(id)?;
        let expected = self.records[pos].kind();
        if record.kind() != expected {
            return Err(TimelineError::PayloadKindMismatch {
                id,
                expected,
                actual: record.kind(),
            });
        }
        if self.contains(record.id) {
            return Err(TimelineError::DuplicateId(record.id));
        }

        let mut next = self.clone();
        if next.skipped.remove(&id) {
            next.skipped.insert(record.id);
        }
        tracing::debug!(
            timeline_event = "replace",
            id = id.get(),
            replacement = record.id.get(),
            kind = %expected,
        );
        next.records[pos] = record;
        Ok(next)
    }

    /// Drop the whole editable tail.
    pub fn reset(&self) -> Self {
        tracing::debug!(timeline_event = "reset", dropped = self.records.len());
        Self {
            last_captured_at: self.last_captured_at,
            ..Self::new(self.initial_id)
        }
    }

    /// Move the cursor. Out-of-range indices clamp to the nearest valid
    /// position and unknown ids leave the cursor in place.
    pub fn jump_to(&self, target: JumpTarget) -> Self {
        let cursor = match target {
            JumpTarget::Initial => None,
            JumpTarget::Index(index) if index < 0 || self.records.is_empty() => None,
            JumpTarget::Index(index) => Some((index as usize).min(self.records.len() - 1)),
            JumpTarget::Id(id) if id == self.initial_id => None,
            JumpTarget::Id(id) => match self.position(id) {
                Some(pos) => Some(pos),
                None => self.cursor,
            },
        };
        Self {
            cursor,
            ..self.clone()
        }
    }
}
