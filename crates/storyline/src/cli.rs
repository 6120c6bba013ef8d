use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use storyline_core::{CanvasStore, JumpTarget, dangling_references};
use storyline_runtime::{
    DevToolsSession, SessionConfig, ThreadTimer, Timer, TimerHandle, VirtualTimer,
};
use web_time::Duration;

use crate::error::{CliError, Result};
use crate::logging;
use crate::recording::{Recording, load_script};
use crate::report::{InspectReport, PlayReport, PlayStep};

/// Longest single wait for a wall-clock timer before re-checking state.
const REALTIME_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(
    name = "storyline",
    about = "Inspect, edit and replay recorded canvas action timelines",
    version
)]
pub struct Cli {
    /// More log output on stderr (repeatable). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the staged records, their gaps and dangling block references.
    Inspect(InspectArgs),

    /// Apply an edit script, then play the timeline from the start.
    Play(PlayArgs),
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Recording file (JSON).
    pub recording: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PlayArgs {
    /// Recording file (JSON).
    pub recording: PathBuf,

    /// Edit script: a JSON array of commands applied before playback.
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Session config (TOML, or JSON by extension).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override `playback.speed` from the config.
    #[arg(long)]
    pub speed: Option<f64>,

    /// Wait the real gaps on a wall clock instead of a virtual one.
    #[arg(long)]
    pub realtime: bool,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let output = match cli.command {
        Commands::Inspect(args) => {
            let report = inspect(&args)?;
            if args.json {
                serde_json::to_string_pretty(&report)?
            } else {
                report.render_text()
            }
        }
        Commands::Play(args) => {
            let report = play(&args)?;
            if args.json {
                serde_json::to_string_pretty(&report)?
            } else {
                report.render_text()
            }
        }
    };
    println!("{}", output.trim_end());
    Ok(())
}

// ============================================================================
// inspect
// ============================================================================

pub fn inspect(args: &InspectArgs) -> Result<InspectReport> {
    let recording = Recording::load(&args.recording)?;
    let mut session = DevToolsSession::new(CanvasStore::default(), VirtualTimer::new());
    let dropped = recording.capture_into(&mut session);

    let snapshot = session.snapshot();
    Ok(InspectReport {
        name: recording.name,
        dropped,
        cards: snapshot.cards,
        time_diffs: snapshot.time_diffs,
        dangling: dangling_references(session.timeline()).into_iter().collect(),
        final_state: session.states().last().cloned().unwrap_or_default(),
    })
}

// ============================================================================
// play
// ============================================================================

/// A timer the CLI can block on until something fires.
trait WaitTimer: Timer {
    fn wait_fired(&mut self) -> Vec<TimerHandle>;
}

impl WaitTimer for VirtualTimer {
    fn wait_fired(&mut self) -> Vec<TimerHandle> {
        self.advance_to_next()
    }
}

impl WaitTimer for ThreadTimer {
    fn wait_fired(&mut self) -> Vec<TimerHandle> {
        self.recv_timeout(REALTIME_POLL).into_iter().collect()
    }
}

pub fn play(args: &PlayArgs) -> Result<PlayReport> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(speed) = args.speed {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(CliError::invalid(format!(
                "--speed must be a positive number, got {speed}"
            )));
        }
        config.playback.speed = speed;
    }

    if args.realtime {
        play_on(args, config, ThreadTimer::new())
    } else {
        play_on(args, config, VirtualTimer::new())
    }
}

fn play_on<T: WaitTimer>(args: &PlayArgs, config: SessionConfig, timer: T) -> Result<PlayReport> {
    let recording = Recording::load(&args.recording)?;
    let speed = config.playback.speed;
    let mut session = DevToolsSession::with_config(CanvasStore::default(), timer, config);
    let dropped = recording.capture_into(&mut session);

    let commands = match &args.script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };
    let command_count = commands.len();
    session.apply_all(commands)?;

    session.stop();
    session.jump_to(JumpTarget::Initial);
    let started = session.timer().now();
    let mut steps = Vec::new();
    session.play();
    while session.playback().is_playing() {
        for handle in session.timer_mut().wait_fired() {
            let Some(reached) = session.on_timer(handle) else {
                continue;
            };
            let timeline = session.timeline();
            let kind = timeline
                .get(reached)
                .map_or("initial", |record| record.kind().as_str());
            let step = PlayStep {
                at_ms: millis(session.timer().now().saturating_sub(started)),
                id: reached,
                kind,
                skipped: timeline.is_skipped(reached),
                state: session.current_state().cloned().unwrap_or_default(),
            };
            tracing::debug!(id = reached.get(), at_ms = step.at_ms, "reached");
            steps.push(step);
        }
    }

    Ok(PlayReport {
        name: recording.name,
        dropped,
        commands: command_count,
        speed,
        steps,
        final_state: session.states().last().cloned().unwrap_or_default(),
    })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
