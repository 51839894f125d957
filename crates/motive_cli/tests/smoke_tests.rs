//! CLI smoke tests — verify basic binary behavior.

use std::io::Write;
use std::process::{Command, Stdio};

const MODEL: &str = r#"
[runtime]
tick_interval_ms = 20
evolution_tick_ms = 20

[[evolutions]]
id = 1
kind = 1
slope = -1.0

[[homeostatic_variables]]
id = 1
name = "energy"
initial_value = 100
ideal_value = 100
upper_limit = 100
lower_limit = 0
evolution = 1

[[effects]]
id = 1
evolution = 1
related_hv = "1"

[[agents]]
id = 1
name = "self"

[[actions]]
id = 1
name = "rest"
agent = 1
effects = "1"

[[motivations]]
id = 1
name = "none"
threshold = 1e9

[[motivations]]
id = 2
name = "tired"
threshold = 1
related_hv = "1"
"#;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_motive"));
    cmd.env_remove("MOTIVE_CONFIG")
        .env_remove("MOTIVE_TICK_MS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_model(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("motive.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Usage"),
        "Expected usage info in --help output"
    );
    assert!(stdout.contains("--ticks"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("motive"),
        "Expected binary name in --version output"
    );
}

#[test]
fn test_missing_config_fails() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_motive_config_12345.toml")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_model_without_fallback_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let body = MODEL.replace("name = \"none\"", "name = \"idle\"");
    let path = write_model(&dir, &body);

    let output = cli_bin()
        .arg("--config")
        .arg(&path)
        .arg("--ticks")
        .arg("1")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("none"));
}

#[test]
fn test_runs_for_requested_ticks() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_model(&dir, MODEL);

    let output = cli_bin()
        .arg("--config")
        .arg(&path)
        .arg("--ticks")
        .arg("3")
        .output()
        .expect("failed to run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("record is JSON"))
        .collect();
    assert!(records.len() >= 3);
    assert_eq!(records[0]["tick"], 1);
    for record in &records {
        assert!(record["dominant"].is_string());
        assert_eq!(record["intensities"].as_array().unwrap().len(), 2);
    }
}

#[test]
fn test_events_from_stdin_are_accepted() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_model(&dir, MODEL);

    let mut child = cli_bin()
        .arg("--config")
        .arg(&path)
        .arg("--ticks")
        .arg("10")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run");
    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, r#"{{"type":"action","action":"rest","status":"started"}}"#).unwrap();
        writeln!(stdin, "not json").unwrap();
        writeln!(stdin, r#"{{"type":"action","action":"rest","status":"stopped"}}"#).unwrap();
    }
    let output = child.wait_with_output().expect("failed to wait");
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Ignoring malformed event"));
    assert!(String::from_utf8_lossy(&output.stdout).lines().count() >= 5);
}
