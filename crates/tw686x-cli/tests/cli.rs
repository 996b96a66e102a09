// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Integration tests for the tw686x CLI
//!
//! These tests run the built binary end-to-end using the assert_cmd crate
//! pattern. Everything runs against the simulated adapter, so no hardware
//! is required.

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::{fs, path::PathBuf};

/// Helper to create a Command for the tw686x binary
fn tw686x_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tw686x"))
}

/// Get the test data directory (target/testdata/tw686x-cli)
/// Creates it if it doesn't exist
fn get_test_data_dir() -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target")
        .join("testdata")
        .join("tw686x-cli");

    fs::create_dir_all(&test_dir).expect("Failed to create test data directory");
    test_dir
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is not JSON")
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

#[test]
fn test_cli_help() {
    tw686x_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("TW686x CLI"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("weave"))
        .stdout(predicate::str::contains("formats"));
}

#[test]
fn test_cli_version() {
    tw686x_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tw686x"));
}

#[test]
fn test_simulate_help() {
    tw686x_cmd()
        .args(["simulate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--channels"))
        .stdout(predicate::str::contains("--fault-rate"))
        .stdout(predicate::str::contains("--seed"));
}

// =============================================================================
// Simulate Command Tests
// =============================================================================

#[test]
#[serial]
fn test_simulate_clean_run() {
    let report = stdout_json(tw686x_cmd().args([
        "simulate",
        "--json",
        "--standard",
        "pal",
        "--frames",
        "10",
        "--seed",
        "1",
    ]));

    assert_eq!(report["standard"], "PAL");
    assert_eq!(report["format"], "720x576 YUYV interlaced");
    assert_eq!(report["faults_injected"], 0);
    let channel = &report["channels"][0];
    assert_eq!(channel["channel"], 0);
    assert_eq!(channel["frames_captured"], 10);
    assert_eq!(channel["bytes_captured"], 10 * 829_440);
    assert_eq!(channel["dropped_frames"], 0);
    assert_eq!(channel["interval_p50_us"], 40_000);
}

#[test]
#[serial]
fn test_simulate_with_faults() {
    let report = stdout_json(tw686x_cmd().args([
        "simulate",
        "--json",
        "--channels",
        "0-2",
        "--frames",
        "30",
        "--fault-rate",
        "0.05",
        "--seed",
        "42",
        "--audio-rate",
        "48000",
    ]));

    assert_eq!(report["seed"], 42);
    assert_eq!(report["channels"].as_array().unwrap().len(), 3);
    assert!(report["faults_injected"].as_u64().unwrap() > 0);
    assert!(report["audio_periods"].as_u64().unwrap() > 0);
}

#[test]
#[serial]
fn test_simulate_stats_table() {
    tw686x_cmd()
        .args(["simulate", "--frames", "5", "--buffers", "1", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Frames captured:   5"))
        .stdout(predicate::str::contains("dma_err"))
        .stdout(predicate::str::contains("no_signal"));
}

#[test]
fn test_simulate_invalid_args() {
    tw686x_cmd()
        .args(["simulate", "--channels", "9"])
        .assert()
        .failure()
        .code(2);

    tw686x_cmd()
        .args(["simulate", "--fault-rate", "1.5"])
        .assert()
        .failure()
        .code(2);

    tw686x_cmd()
        .args(["simulate", "--format", "NV12"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unsupported pixel format"));
}

// =============================================================================
// Weave Command Tests
// =============================================================================

#[test]
fn test_weave_two_fields() {
    let dir = get_test_data_dir();
    let top = dir.join("weave_top.raw");
    let bottom = dir.join("weave_bottom.raw");
    let output = dir.join("weave_frame.raw");
    // 128x60 YUYV: 256 bytes per line, 30 lines per field
    fs::write(&top, vec![0x11u8; 256 * 30]).unwrap();
    fs::write(&bottom, vec![0x22u8; 256 * 30]).unwrap();

    tw686x_cmd()
        .arg("weave")
        .arg(&top)
        .arg(&bottom)
        .arg("--output")
        .arg(&output)
        .args(["--resolution", "128x60"])
        .assert()
        .success();

    let frame = fs::read(&output).unwrap();
    assert_eq!(frame.len(), 256 * 60);
    assert!(frame[..256].iter().all(|&b| b == 0x11));
    assert!(frame[256..512].iter().all(|&b| b == 0x22));
    assert!(frame[256 * 58..256 * 59].iter().all(|&b| b == 0x11));
}

#[test]
fn test_weave_json_single_field() {
    let dir = get_test_data_dir();
    let top = dir.join("single_top.raw");
    let output = dir.join("single_frame.raw");
    fs::write(&top, vec![0x33u8; 704 * 120]).unwrap();

    let summary = stdout_json(
        tw686x_cmd()
            .arg("weave")
            .arg(&top)
            .arg("-o")
            .arg(&output)
            .args(["-r", "352x120", "--json"]),
    );
    assert_eq!(summary["format"], "352x120 YUYV top");
    assert_eq!(summary["frame_bytes"], 704 * 120);
}

#[test]
fn test_weave_errors() {
    let dir = get_test_data_dir();
    let short = dir.join("short_field.raw");
    fs::write(&short, vec![0u8; 100]).unwrap();

    tw686x_cmd()
        .arg("weave")
        .arg(&short)
        .args(["-o", "/dev/null", "-r", "128x60"])
        .assert()
        .failure()
        .code(2);

    tw686x_cmd()
        .args(["weave", "/nonexistent/top.raw", "-o", "/dev/null", "-r", "128x60"])
        .assert()
        .failure()
        .code(4);

    // Not a geometry the scaler produces
    tw686x_cmd()
        .arg("weave")
        .arg(&short)
        .args(["-o", "/dev/null", "-r", "1920x1080"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("nearest is 720x576"));
}

// =============================================================================
// Formats Command Tests
// =============================================================================

#[test]
fn test_formats_text() {
    tw686x_cmd()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("YUYV"))
        .stdout(predicate::str::contains("RGBO"))
        .stdout(predicate::str::contains("not capturable"))
        .stdout(predicate::str::contains("NTSC: 720x480"))
        .stdout(predicate::str::contains("PAL: 720x576"))
        .stdout(predicate::str::contains("brightness"));
}

#[test]
fn test_formats_json_negotiation() {
    let table = stdout_json(tw686x_cmd().args([
        "formats",
        "--json",
        "--standard",
        "ntsc",
        "--resolution",
        "350x240",
    ]));

    assert_eq!(table["pixel_formats"].as_array().unwrap().len(), 4);
    let standards = table["standards"].as_array().unwrap();
    assert_eq!(standards.len(), 1);
    assert_eq!(standards[0]["frame_rates"][0], 30);
    let negotiated = &standards[0]["negotiated"];
    assert_eq!(negotiated["width"], 352);
    assert_eq!(negotiated["field"], "bottom");

    let table = stdout_json(tw686x_cmd().args([
        "formats",
        "--json",
        "-s",
        "ntsc",
        "-r",
        "350x240",
        "--no-single-field",
    ]));
    assert_eq!(table["standards"][0]["negotiated"]["field"], "interlaced");
}
