//! CLI integration tests.
//!
//! Spawns the `rib` binary on scene files written to a temporary directory
//! and checks exit codes, stdout and stderr.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn rib() -> Command {
    cargo_bin_cmd!("rib")
}

/// Write `contents` to `name` inside `dir`.
fn scene(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

const GOOD: &[u8] = b"##RenderMan RIB
Format 640 480 1
WorldBegin
AttributeBegin
Surface \"plastic\" \"Kd\" 0.5
Sphere 1 -1 1 360
AttributeEnd
WorldEnd
";

const BAD: &[u8] = b"Sphere 1 -1 1 360
WorldBegin
Frobnicate 1
WorldEnd
";

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    rib()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RIB scene-description stream checker"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("dump"))
        .stdout(predicate::str::contains("decl"));
}

#[test]
fn version_exits_0() {
    rib()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("rib"));
}

// ──────────────────────────────────────────────
// 2. check
// ──────────────────────────────────────────────

#[test]
fn check_valid_scene() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "good.rib", GOOD);
    rib()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "7 requests, 7 accepted, 0 rejected, 0 errors",
        ));
}

#[test]
fn check_reports_every_error() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "bad.rib", BAD);
    rib()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error [state] line 1"))
        .stderr(predicate::str::contains("error [bad] line 3: unknown request 'Frobnicate'"))
        .stdout(predicate::str::contains("2 errors"));
}

#[test]
fn check_json_output() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "bad.rib", BAD);
    let output = rib()
        .args(["--output", "json", "check"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["errors"], 2);
    assert_eq!(report["summary"]["accepted"], 2);
    let diagnostics = report["diagnostics"].as_array().unwrap();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0]["code"], "state");
    assert_eq!(diagnostics[1]["code"], "bad");
}

#[test]
fn check_quiet_prints_nothing() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "bad.rib", BAD);
    rib()
        .args(["--quiet", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::is_empty());
}

#[test]
fn check_missing_file() {
    rib()
        .args(["check", "does/not/exist.rib"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("i/o error"));
}

#[test]
fn check_binary_scene() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0xcc, 0x01, 0x9a];
    bytes.extend_from_slice(b"WorldBegin");
    bytes.extend([0xcc, 0x02, 0x98]);
    bytes.extend_from_slice(b"WorldEnd");
    bytes.extend([0xa6, 0x01, 0xa6, 0x02]);
    let path = scene(&dir, "scene.ribz", &bytes);
    rib()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 requests, 2 accepted"));
}

// ──────────────────────────────────────────────
// 3. dump
// ──────────────────────────────────────────────

#[test]
fn dump_prints_calls_as_json() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "good.rib", GOOD);
    let output = rib().arg("dump").arg(&path).output().unwrap();
    assert!(output.status.success());
    let calls: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let calls = calls.as_array().unwrap();
    let requests: Vec<&str> = calls
        .iter()
        .map(|c| c["request"].as_str().unwrap())
        .collect();
    assert_eq!(
        requests,
        vec![
            "Begin",
            "ArchiveRecord",
            "Format",
            "WorldBegin",
            "AttributeBegin",
            "Surface",
            "Sphere",
            "AttributeEnd",
            "WorldEnd",
            "End",
        ]
    );
    let surface = &calls[5];
    assert_eq!(surface["shader"], "plastic");
    assert_eq!(surface["line"], 5);
    assert_eq!(surface["params"][0]["name"], "Kd");
    assert_eq!(surface["params"][0]["values"][0], 0.5);
}

#[test]
fn dump_closes_open_scopes() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "open.rib", b"WorldBegin\nAttributeBegin\n");
    let output = rib().arg("dump").arg(&path).output().unwrap();
    assert!(output.status.success());
    let calls: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let last = calls.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["request"], "End");
}

// ──────────────────────────────────────────────
// 4. decl
// ──────────────────────────────────────────────

#[test]
fn decl_text() {
    rib()
        .args(["decl", "varying float[3] foo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("foo: varying float[3]"));
}

#[test]
fn decl_json() {
    let output = rib()
        .args(["--output", "json", "decl", "vertex point", "--name", "Ri:rest:Pref"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let decl: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decl["namespace"], "Ri");
    assert_eq!(decl["table"], "rest");
    assert_eq!(decl["var"], "Pref");
    assert_eq!(decl["class"], "vertex");
    assert_eq!(decl["type"], "point");
    assert_eq!(decl["elem_size"], 3);
}

#[test]
fn decl_follows_color_samples() {
    let output = rib()
        .args(["--output", "json", "--color-samples", "5", "decl", "uniform color tint"])
        .output()
        .unwrap();
    let decl: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(decl["elem_size"], 5);
}

#[test]
fn decl_without_name_fails() {
    rib()
        .args(["decl", "uniform float"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("needs a name"));
}

#[test]
fn decl_invalid_grammar_fails() {
    rib()
        .args(["decl", "sometimes float x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid declaration"));
}

// ──────────────────────────────────────────────
// 5. Options
// ──────────────────────────────────────────────

const SHADED: &[u8] = b"WorldBegin
Surface \"custom\" \"shade\" 0.25
WorldEnd
";

#[test]
fn config_file_adds_declarations() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "shaded.rib", SHADED);

    rib().arg("check").arg(&path).assert().failure();

    let config = scene(
        &dir,
        "rib.toml",
        b"error_handler = \"collect\"\n\n[declarations]\nshade = \"uniform float\"\n",
    );
    rib()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn config_with_unknown_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = scene(&dir, "rib.toml", b"colour_samples = 3\n");
    let path = scene(&dir, "good.rib", GOOD);
    rib()
        .arg("--config")
        .arg(&config)
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error parsing config"));
}

#[test]
fn lenient_skips_count_checks() {
    let dir = TempDir::new().unwrap();
    let path = scene(
        &dir,
        "polygon.rib",
        b"WorldBegin\nPolygon \"P\" [0 0 0 1 0 0 1 1 0] \"Cs\" [1 0 0]\nWorldEnd\n",
    );
    rib()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error [type]"));
    rib()
        .args(["--lenient", "check"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn zero_color_samples_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = scene(&dir, "good.rib", GOOD);
    rib()
        .args(["--color-samples", "0", "check"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--color-samples must be at least 1"));
}
