#![forbid(unsafe_code)]

//! Storyline Runtime
//!
//! Drives a [`storyline_core::Timeline`] from user commands and a playback
//! timer.
//!
//! # Key Components
//!
//! - [`DevToolsSession`] - Owns the timeline, replayed states and playback
//! - [`DevToolsCommand`] - Serializable user gestures, used by edit scripts
//! - [`PlaybackController`] - Idle / Playing / Paused over a [`Timer`]
//! - [`VirtualTimer`] / [`ThreadTimer`] - Manual and wall-clock timers
//! - [`SessionConfig`] - TOML or JSON configuration
//!
//! # How it fits together
//!
//! ```text
//!  capture / command ──► DevToolsSession ──► Timeline edit (core)
//!                              │                  │
//!                              │                  ▼
//!                              │           SnapshotStore::replay
//!                              ▼
//!                     PlaybackController ◄──► Timer (one pending handle)
//! ```

pub mod cancellation;
pub mod command;
pub mod config;
pub mod playback;
pub mod session;
pub mod timer;

pub use cancellation::{CancellationSource, CancellationToken};
pub use command::DevToolsCommand;
pub use config::{ConfigError, PlaybackConfig, SessionConfig};
pub use playback::{Advance, PlaybackController, PlaybackState};
pub use session::{CardView, Controls, DevToolsSession, INITIAL_ID, TimelineSnapshot};
pub use timer::{ThreadTimer, Timer, TimerHandle, VirtualTimer};
