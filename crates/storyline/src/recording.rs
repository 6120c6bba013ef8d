//! Recording and edit-script files.
//!
//! A recording is what the capture side saw, in dispatch order:
//!
//! ```json
//! {
//!   "name": "two blocks",
//!   "actions": [
//!     { "payload": { "type": "create", "payload": { "id": "a", "text": "A", "x": 0, "y": 0 } }, "timestamp": 0 },
//!     { "payload": { "type": "transform/scale/set", "payload": 2.0 }, "timestamp": 120 }
//!   ]
//! }
//! ```
//!
//! An edit script is a JSON array of `DevToolsCommand`s.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storyline_core::{Payload, SnapshotStore};
use storyline_runtime::{DevToolsCommand, DevToolsSession, Timer};

use crate::error::{CliError, Result};

/// A captured action stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    #[serde(default)]
    pub name: String,
    pub actions: Vec<RecordedAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedAction {
    pub payload: Payload,
    pub timestamp: i64,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    /// Capture every action into `session`.
    ///
    /// Out-of-order actions are dropped the way a live capture would drop
    /// them. Returns how many were dropped.
    pub fn capture_into<S: SnapshotStore, T: Timer>(
        &self,
        session: &mut DevToolsSession<S, T>,
    ) -> usize {
        let dropped = self
            .actions
            .iter()
            .filter(|action| {
                session
                    .capture(action.payload.clone(), action.timestamp)
                    .is_err()
            })
            .count();
        tracing::info!(
            recording = %self.name,
            captured = self.actions.len() - dropped,
            dropped,
            "recording loaded"
        );
        dropped
    }
}

/// Load an edit script.
pub fn load_script(path: &Path) -> Result<Vec<DevToolsCommand>> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}
