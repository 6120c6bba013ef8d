use thiserror::Error;

use crate::action::{ActionId, PayloadKind};

pub type Result<T> = std::result::Result<T, TimelineError>;

/// Reasons a timeline operation is rejected.
///
/// A rejected operation never changes the timeline it was called on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("action {id} captured at {timestamp}ms is not after the previous capture at {previous}ms")]
    InvalidOrder {
        id: ActionId,
        timestamp: i64,
        previous: i64,
    },

    #[error("action {0} is already present in the timeline")]
    DuplicateId(ActionId),

    #[error("action {0} is not in the editable timeline")]
    UnknownId(ActionId),

    #[error("time difference for action {id} must not be negative (got {diff}ms)")]
    NegativeDiff { id: ActionId, diff: i64 },

    #[error("action {0} is the last action and has no following gap")]
    NoSuccessor(ActionId),

    #[error("action {id} of kind {kind} has no editable value")]
    NotEditable { id: ActionId, kind: PayloadKind },

    #[error("gap for action {0} pushes the playback schedule out of range")]
    ScheduleOverflow(ActionId),

    #[error("action {id} is a {expected} action, cannot replace it with {actual}")]
    PayloadKindMismatch {
        id: ActionId,
        expected: PayloadKind,
        actual: PayloadKind,
    },
}
