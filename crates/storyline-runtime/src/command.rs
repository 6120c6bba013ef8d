#![forbid(unsafe_code)]

//! Serializable user commands.
//!
//! A [`DevToolsCommand`] is one UI gesture against a session. Commands are
//! tagged by `op`, so an edit script is a plain JSON array:
//!
//! ```json
//! [
//!   { "op": "toggle_skip", "id": 2 },
//!   { "op": "reorder", "id": 3, "target": { "before": 1 } },
//!   { "op": "set_time_diff", "id": 1, "diff": 50 },
//!   { "op": "sweep" }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use storyline_core::{ActionId, JumpTarget, Payload, ReorderTarget, Result, SnapshotStore};

use crate::session::DevToolsSession;
use crate::timer::Timer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DevToolsCommand {
    Capture {
        payload: Payload,
        timestamp: i64,
    },
    Reorder {
        id: ActionId,
        target: ReorderTarget,
    },
    ToggleSkip {
        id: ActionId,
    },
    Sweep,
    Delete {
        id: ActionId,
    },
    SetTimeDiff {
        id: ActionId,
        diff: i64,
    },
    EditPayload {
        id: ActionId,
        payload: Payload,
    },
    SubmitCard {
        id: ActionId,
        #[serde(default)]
        time_diff: Option<i64>,
        #[serde(default)]
        payload: Option<Payload>,
    },
    Reset,
    JumpTo {
        target: JumpTarget,
    },
    Select {
        id: ActionId,
    },
    Preview {
        id: ActionId,
    },
    EndPreview,
    Play,
    Pause,
    Stop,
}

impl DevToolsCommand {
    /// The `op` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capture { .. } => "capture",
            Self::Reorder { .. } => "reorder",
            Self::ToggleSkip { .. } => "toggle_skip",
            Self::Sweep => "sweep",
            Self::Delete { .. } => "delete",
            Self::SetTimeDiff { .. } => "set_time_diff",
            Self::EditPayload { .. } => "edit_payload",
            Self::SubmitCard { .. } => "submit_card",
            Self::Reset => "reset",
            Self::JumpTo { .. } => "jump_to",
            Self::Select { .. } => "select",
            Self::Preview { .. } => "preview",
            Self::EndPreview => "end_preview",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
        }
    }
}

impl<S: SnapshotStore, T: Timer> DevToolsSession<S, T> {
    /// Dispatch one command.
    pub fn apply(&mut self, command: DevToolsCommand) -> Result<()> {
        tracing::debug!(op = command.name(), "apply command");
        match command {
            DevToolsCommand::Capture { payload, timestamp } => {
                self.capture(payload, timestamp)?;
            }
            DevToolsCommand::Reorder { id, target } => self.reorder(id, target)?,
            DevToolsCommand::ToggleSkip { id } => self.toggle_skip(id)?,
            DevToolsCommand::Sweep => self.sweep(),
            DevToolsCommand::Delete { id } => {
                self.delete(id)?;
            }
            DevToolsCommand::SetTimeDiff { id, diff } => self.set_time_diff(id, diff)?,
            DevToolsCommand::EditPayload { id, payload } => {
                self.edit_payload(id, payload)?;
            }
            DevToolsCommand::SubmitCard {
                id,
                time_diff,
                payload,
            } => self.submit_card(id, time_diff, payload)?,
            DevToolsCommand::Reset => self.reset(),
            DevToolsCommand::JumpTo { target } => self.jump_to(target),
            DevToolsCommand::Select { id } => self.select(id)?,
            DevToolsCommand::Preview { id } => {
                self.preview(id)?;
            }
            DevToolsCommand::EndPreview => {
                self.end_preview();
            }
            DevToolsCommand::Play => {
                self.play();
            }
            DevToolsCommand::Pause => {
                self.pause();
            }
            DevToolsCommand::Stop => {
                self.stop();
            }
        }
        Ok(())
    }

    /// Apply `commands` in order, stopping at the first failure.
    pub fn apply_all(&mut self, commands: impl IntoIterator<Item = DevToolsCommand>) -> Result<()> {
        commands.into_iter().try_for_each(|command| self.apply(command))
    }
}
