#![forbid(unsafe_code)]

//! Recorded actions and their payloads.
//!
//! An [`ActionRecord`] is one captured state transition. Its [`Payload`] is a
//! closed set of variants covering the canvas editor: block create/update/
//! delete and the viewport transform setters. Edit operations dispatch on the
//! variant with `match`, never on the action type string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a recorded action.
///
/// Assigned by the capture side and never changed by reorders or edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub u64);

impl ActionId {
    /// Create an id from its raw value.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a canvas block created by a [`Payload::Create`] action.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canvas position in unscaled pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Viewport transform: zoom factor plus pan offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

impl Transform {
    /// The pan component of the transform.
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// A text block placed on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Partial update of an existing block. `None` fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockPatch {
    pub id: BlockId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// Semantic effect of a recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Payload {
    #[serde(rename = "create")]
    Create(Block),
    #[serde(rename = "update")]
    Update(BlockPatch),
    #[serde(rename = "delete")]
    Delete { id: BlockId },
    #[serde(rename = "transform/scale/set")]
    SetScale(f64),
    #[serde(rename = "transform/position/set")]
    SetPosition(Position),
    #[serde(rename = "transform/set")]
    SetTransform(Transform),
}

/// Discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Create,
    Update,
    Delete,
    SetScale,
    SetPosition,
    SetTransform,
}

impl PayloadKind {
    /// The action type string the canvas store dispatches.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetScale => "transform/scale/set",
            Self::SetPosition => "transform/position/set",
            Self::SetTransform => "transform/set",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Create(_) => PayloadKind::Create,
            Self::Update(_) => PayloadKind::Update,
            Self::Delete { .. } => PayloadKind::Delete,
            Self::SetScale(_) => PayloadKind::SetScale,
            Self::SetPosition(_) => PayloadKind::SetPosition,
            Self::SetTransform(_) => PayloadKind::SetTransform,
        }
    }

    /// Block referenced by a create/update/delete payload.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Self::Create(block) => Some(&block.id),
            Self::Update(patch) => Some(&patch.id),
            Self::Delete { id } => Some(id),
            Self::SetScale(_) | Self::SetPosition(_) | Self::SetTransform(_) => None,
        }
    }

    #[inline]
    pub fn is_create(&self) -> bool {
        matches!(self, Self::Create(_))
    }

    /// Transform payloads carry a value that can be edited in place.
    #[inline]
    pub fn is_transform(&self) -> bool {
        matches!(
            self,
            Self::SetScale(_) | Self::SetPosition(_) | Self::SetTransform(_)
        )
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: ActionId,
    pub payload: Payload,
    /// Capture-clock value in milliseconds.
    pub timestamp: i64,
}

impl ActionRecord {
    pub fn new(id: ActionId, payload: Payload, timestamp: i64) -> Self {
        Self {
            id,
            payload,
            timestamp,
        }
    }

    #[inline]
    pub fn kind(&self) -> PayloadKind {
        self.payload.kind()
    }
}
