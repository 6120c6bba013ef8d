#![forbid(unsafe_code)]

//! Canvas editor state and its reducer.
//!
//! Blocks are kept in creation order; the transform is the viewport zoom and
//! pan. Updates to unknown blocks are ignored so a replay over an edited
//! timeline never invents blocks.

use serde::{Deserialize, Serialize};

use crate::action::{Block, BlockId, BlockPatch, Payload, Transform};
use crate::snapshot::{Reducer, ReducerStore};

/// State produced by replaying canvas actions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CanvasState {
    pub blocks: Vec<Block>,
    pub transform: Transform,
}

impl CanvasState {
    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }
}

/// Reducer for [`CanvasState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasReducer;

/// Snapshot store replaying canvas actions.
pub type CanvasStore = ReducerStore<CanvasReducer>;

impl Reducer for CanvasReducer {
    type State = CanvasState;

    fn initial(&self) -> CanvasState {
        CanvasState::default()
    }

    fn reduce(&self, state: &CanvasState, payload: &Payload) -> CanvasState {
        let mut next = state.clone();
        match payload {
            Payload::Create(block) => next.blocks.push(block.clone()),
            Payload::Update(patch) => apply_patch(&mut next.blocks, patch),
            Payload::Delete { id } => next.blocks.retain(|b| &b.id != id),
            Payload::SetScale(scale) => next.transform.scale = *scale,
            Payload::SetPosition(position) => {
                next.transform.x = position.x;
                next.transform.y = position.y;
            }
            Payload::SetTransform(transform) => next.transform = *transform,
        }
        next
    }
}

fn apply_patch(blocks: &mut [Block], patch: &BlockPatch) {
    let Some(block) = blocks.iter_mut().find(|b| b.id == patch.id) else {
        return;
    };
    if let Some(text) = &patch.text {
        block.text.clone_from(text);
    }
    if let Some(x) = patch.x {
        block.x = x;
    }
    if let Some(y) = patch.y {
        block.y = y;
    }
}
