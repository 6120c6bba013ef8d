#![forbid(unsafe_code)]

//! Storyline Core
//!
//! Data model and pure operations behind the canvas action devtools.
//!
//! # Key Components
//!
//! - [`ActionRecord`] / [`Payload`] - Recorded actions and their effects
//! - [`Timeline`] - Staged actions with skip set, cursor and playback schedule
//! - [`delete_record`] - Card deletion with the create-cascade
//! - [`SnapshotStore`] - Replay contract, with [`ReducerStore`] as the pure fold
//! - [`CanvasReducer`] - Reducer for the canvas editor state
//!
//! # Role in Storyline
//! `storyline-core` owns every rule about ordering, skipping and timing.
//! `storyline-runtime` drives it from user commands and a playback timer;
//! nothing here blocks, allocates timers or logs above `debug`.

pub mod action;
pub mod canvas;
pub mod edit;
pub mod error;
pub mod snapshot;
pub mod timeline;

pub use action::{
    ActionId, ActionRecord, Block, BlockId, BlockPatch, Payload, PayloadKind, Position, Transform,
};
pub use canvas::{CanvasReducer, CanvasState, CanvasStore};
pub use edit::{
    Deletion, dangling_references, delete_record, dependents, edit_payload, fallback_target,
};
pub use error::{Result, TimelineError};
pub use snapshot::{Reducer, ReducerStore, SnapshotStore};
pub use timeline::{JumpTarget, ReorderTarget, Timeline};
