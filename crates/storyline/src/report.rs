//! Output of the `inspect` and `play` commands, as text or JSON.

use std::fmt::Write as _;

use serde::Serialize;
use storyline_core::{ActionId, BlockId, CanvasState};
use storyline_runtime::CardView;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub name: String,
    pub dropped: usize,
    pub cards: Vec<CardView>,
    pub time_diffs: Vec<i64>,
    pub dangling: Vec<BlockId>,
    pub final_state: CanvasState,
}

/// One record reached during playback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayStep {
    /// Milliseconds since playback started.
    pub at_ms: u64,
    pub id: ActionId,
    pub kind: &'static str,
    pub skipped: bool,
    pub state: CanvasState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayReport {
    pub name: String,
    pub dropped: usize,
    pub commands: usize,
    pub speed: f64,
    pub steps: Vec<PlayStep>,
    pub final_state: CanvasState,
}

impl InspectReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "recording: {}", display_name(&self.name));
        let _ = writeln!(out, "records:   {}", self.cards.len());
        if self.dropped > 0 {
            let _ = writeln!(out, "dropped:   {} (out of order)", self.dropped);
        }
        for card in &self.cards {
            let diff = card
                .time_diff
                .map_or_else(|| "-".to_string(), |d| format!("+{d}ms"));
            let _ = writeln!(
                out,
                "  {:>5} {:<24} t={:<8} {:>9}{}",
                card.id.to_string(),
                card.kind,
                card.timestamp,
                diff,
                if card.skipped { "  [skipped]" } else { "" },
            );
        }
        if !self.dangling.is_empty() {
            let blocks: Vec<&str> = self.dangling.iter().map(BlockId::as_str).collect();
            let _ = writeln!(out, "dangling:  {}", blocks.join(", "));
        }
        let _ = writeln!(out, "final:     {}", summarize(&self.final_state));
        out
    }
}

impl PlayReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "playing {} ({} records, speed {}x)",
            display_name(&self.name),
            self.steps.len(),
            self.speed
        );
        for step in &self.steps {
            let _ = writeln!(
                out,
                "  {:>7}ms {:>5} {:<24} {}{}",
                step.at_ms,
                step.id.to_string(),
                step.kind,
                summarize(&step.state),
                if step.skipped { "  [skipped]" } else { "" },
            );
        }
        let _ = writeln!(out, "final: {}", summarize(&self.final_state));
        out
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "<unnamed>" } else { name }
}

/// One-line canvas description.
pub fn summarize(state: &CanvasState) -> String {
    let t = &state.transform;
    let blocks: Vec<String> = state
        .blocks
        .iter()
        .map(|b| format!("{}@({}, {})", b.id, b.x, b.y))
        .collect();
    format!(
        "scale={} pan=({}, {}) blocks=[{}]",
        t.scale,
        t.x,
        t.y,
        blocks.join(" ")
    )
}
