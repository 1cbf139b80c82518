//! Integration tests for polytone-cli.
//!
//! Tests invoke the `polytone` binary and check its printed output.

use std::io::Write;
use std::process::Command;

/// Helper to get the path to the `polytone` binary built by cargo.
fn polytone_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_polytone"))
}

fn stdout_of(args: &[&str]) -> String {
    let output = polytone_bin()
        .args(args)
        .output()
        .expect("failed to run polytone");
    assert!(
        output.status.success(),
        "polytone {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// play
// ---------------------------------------------------------------------------

#[test]
fn cli_play_prints_summary() {
    let stdout = stdout_of(&["play", "60:0-0.5,64:0.1-0.6"]);
    assert!(stdout.contains("Playback summary"));
    assert!(stdout.contains("peak voices        2"));
    assert!(stdout.contains("leaked nodes       0"));
}

#[test]
fn cli_play_reports_steals() {
    let stdout = stdout_of(&["play", "60:0-1,64:0.1-1,67:0.2-1", "--max-voices", "2"]);
    assert!(stdout.contains("voices stolen      1"));
}

#[test]
fn cli_play_accepts_routes_and_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[engine]\ncrossfade = 0.05\n\n[[routes]]\nsource = \"lfo1\"\ntarget = \"unison-detune-cents\"\namount = 0.5"
    )
    .unwrap();

    let path = file.path().to_str().unwrap();
    let stdout = stdout_of(&[
        "play",
        "60:0-0.4",
        "--unison",
        "3",
        "--config",
        path,
        "--route",
        "env1>osc.unison-voices:0.5",
        "--snapshot-every",
        "0.1",
    ]);
    assert!(stdout.contains("midi  60"));
    assert!(stdout.contains("Playback summary"));
}

#[test]
fn cli_play_rejects_bad_script() {
    let output = polytone_bin()
        .args(["play", "sixty:0-1"])
        .output()
        .expect("failed to run polytone");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid note"), "stderr: {stderr}");
}

#[test]
fn cli_play_rejects_missing_config() {
    let output = polytone_bin()
        .args(["play", "60:0-1", "--config", "/nonexistent/polytone.toml"])
        .output()
        .expect("failed to run polytone");
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// envelope / lfo / morphs
// ---------------------------------------------------------------------------

#[test]
fn cli_envelope_prints_table() {
    let stdout = stdout_of(&[
        "envelope", "--attack", "0.1", "--decay", "0.1", "--sustain", "0.5", "--gate", "0.4",
        "--step", "0.05",
    ]);
    assert!(stdout.contains("time"));
    assert!(stdout.contains("0.050   0.500"));
    assert!(stdout.contains("0.100   1.000"));
}

#[test]
fn cli_lfo_envelope_mode_holds() {
    let stdout = stdout_of(&["lfo", "--mode", "envelope", "--rate", "2", "--duration", "1", "--step", "0.25"]);
    assert!(stdout.contains("one shot"));
    assert!(stdout.contains("1.000   1.000"));
}

#[test]
fn cli_morphs_lists_every_preset() {
    let stdout = stdout_of(&["morphs"]);
    for name in [
        "none",
        "low-pass",
        "high-pass",
        "harmonic-stretch",
        "formant-scale",
        "inharmonic-stretch",
        "smear",
    ] {
        assert!(stdout.contains(name), "missing preset '{name}'");
    }
}

#[test]
fn cli_morphs_unknown_mode_fails() {
    let output = polytone_bin()
        .args(["morphs", "wobble"])
        .output()
        .expect("failed to run polytone");
    assert!(!output.status.success());
}
