#![forbid(unsafe_code)]

//! Replay contract between the timeline and the state it drives.
//!
//! A [`SnapshotStore`] turns the staged records into one state per staged
//! position. The engine never mutates application state itself: after every
//! edit that changes order or inclusion it asks the store for a fresh replay.
//!
//! # Invariants
//!
//! 1. `replay` returns `records.len() + 1` states; index 0 is the initial
//!    state and index `i + 1` the state after record `i`.
//! 2. A skipped record contributes nothing: its state equals the previous one.
//! 3. Replay is pure. The same records and skip set give the same states.

use std::collections::BTreeSet;

use crate::action::{ActionId, ActionRecord, Payload};
use crate::timeline::Timeline;

/// Folds recorded actions into application states.
pub trait SnapshotStore {
    type State;

    fn replay(&self, records: &[ActionRecord], skipped: &BTreeSet<ActionId>) -> Vec<Self::State>;

    /// Replay the editable tail of `timeline` with its skip set.
    fn replay_timeline(&self, timeline: &Timeline) -> Vec<Self::State> {
        self.replay(timeline.records(), timeline.skipped())
    }
}

/// A pure reducer over action payloads.
pub trait Reducer {
    type State: Clone;

    fn initial(&self) -> Self::State;

    fn reduce(&self, state: &Self::State, payload: &Payload) -> Self::State;
}

/// [`SnapshotStore`] that folds a [`Reducer`] over the included records.
#[derive(Debug, Clone, Default)]
pub struct ReducerStore<R> {
    reducer: R,
}

impl<R: Reducer> ReducerStore<R> {
    pub fn new(reducer: R) -> Self {
        Self { reducer }
    }

    pub fn reducer(&self) -> &R {
        &self.reducer
    }
}

impl<R: Reducer> SnapshotStore for ReducerStore<R> {
    type State = R::State;

    fn replay(&self, records: &[ActionRecord], skipped: &BTreeSet<ActionId>) -> Vec<R::State> {
        let mut states = Vec::with_capacity(records.len() + 1);
        let mut state = self.reducer.initial();
        states.push(state.clone());
        for record in records {
            if !skipped.contains(&record.id) {
                state = self.reducer.reduce(&state, &record.payload);
            }
            states.push(state.clone());
        }
        states
    }
}
