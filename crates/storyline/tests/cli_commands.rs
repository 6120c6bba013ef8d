#![forbid(unsafe_code)]

//! End-to-end runs of the `storyline` binary.
//!
//! Run:
//!   cargo test -p storyline --test cli_commands

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::tempdir;

fn storyline_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_storyline"))
}

fn run(args: &[&str]) -> Output {
    Command::new(storyline_bin())
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn storyline")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "storyline failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

fn write_json(dir: &Path, name: &str, value: &Value) -> String {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path.display().to_string()
}

fn block(id: &str) -> Value {
    json!({"type": "create", "payload": {"id": id, "text": id, "x": 0.0, "y": 0.0}})
}

/// a(0), b(100), move a(250), zoom(300)
fn recording() -> Value {
    json!({
        "name": "two blocks",
        "actions": [
            {"payload": block("a"), "timestamp": 0},
            {"payload": block("b"), "timestamp": 100},
            {"payload": {"type": "update", "payload": {"id": "a", "x": 40.0}}, "timestamp": 250},
            {"payload": {"type": "transform/scale/set", "payload": 2.0}, "timestamp": 300}
        ]
    })
}

fn step_ids(report: &Value) -> Vec<u64> {
    report["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_u64().unwrap())
        .collect()
}

fn step_times(report: &Value) -> Vec<u64> {
    report["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["at_ms"].as_u64().unwrap())
        .collect()
}

#[test]
fn inspect_lists_cards_and_gaps() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let report = stdout_json(&run(&["inspect", &rec, "--json"]));

    assert_eq!(report["name"], "two blocks");
    assert_eq!(report["cards"].as_array().unwrap().len(), 4);
    assert_eq!(report["time_diffs"], json!([100, 150, 50]));
    assert_eq!(report["dangling"], json!([]));
    assert_eq!(report["final_state"]["transform"]["scale"], 2.0);
}

#[test]
fn inspect_text_mentions_dangling_blocks() {
    let dir = tempdir().unwrap();
    let rec = write_json(
        dir.path(),
        "rec.json",
        &json!({"actions": [
            {"payload": {"type": "delete", "payload": {"id": "ghost"}}, "timestamp": 5}
        ]}),
    );
    let output = run(&["inspect", &rec]);
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.contains("recording: <unnamed>"));
    assert!(text.contains("dangling:  ghost"));
}

#[test]
fn play_follows_recorded_gaps() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let report = stdout_json(&run(&["play", &rec, "--json"]));

    assert_eq!(step_ids(&report), vec![1, 2, 3, 4]);
    assert_eq!(step_times(&report), vec![0, 100, 250, 300]);
    assert_eq!(report["final_state"]["blocks"][0]["x"], 40.0);
}

#[test]
fn play_applies_script_before_playback() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let script = write_json(
        dir.path(),
        "edits.json",
        &json!([
            {"op": "delete", "id": 1},
            {"op": "set_time_diff", "id": 2, "diff": 50}
        ]),
    );
    let report = stdout_json(&run(&["play", &rec, "--script", &script, "--json"]));

    assert_eq!(report["commands"], 2);
    assert_eq!(step_ids(&report), vec![2, 4]);
    assert_eq!(step_times(&report), vec![0, 50]);
    let blocks = report["final_state"]["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0]["id"], "b");
}

#[test]
fn play_speed_comes_from_config() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let config = dir.path().join("storyline.toml");
    fs::write(&config, "[playback]\nspeed = 2.0\n").unwrap();
    let config = config.display().to_string();
    let report = stdout_json(&run(&["play", &rec, "--config", &config, "--json"]));

    assert_eq!(report["speed"], 2.0);
    assert_eq!(step_times(&report), vec![0, 50, 125, 150]);
}

#[test]
fn missing_recording_exits_with_io_error() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.json").display().to_string();
    let output = run(&["inspect", &missing]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.json"));
}

#[test]
fn failing_script_exits_with_timeline_code() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let script = write_json(dir.path(), "edits.json", &json!([{"op": "toggle_skip", "id": 99}]));
    let output = run(&["play", &rec, "--script", &script]);
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("#99"));
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let rec = write_json(dir.path(), "rec.json", &recording());
    let config = dir.path().join("bad.toml");
    fs::write(&config, "[playback]\nspeed = 0.0\n").unwrap();
    let config = config.display().to_string();
    let output = run(&["play", &rec, "--config", &config]);
    assert_eq!(output.status.code(), Some(3));
}
