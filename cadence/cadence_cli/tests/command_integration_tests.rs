use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn cadence() -> Command {
    Command::cargo_bin("cadence").unwrap()
}

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_run_once_probes() {
    cadence()
        .args(["run", "--tasks", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("STOPPED"))
        .stdout(predicate::str::contains("2 results observed"))
        .stdout(predicate::str::contains("success value=1"));
}

#[test]
fn test_run_json_report() {
    let output = cadence()
        .args([
            "run",
            "--tasks",
            "1",
            "--schedule",
            "limited",
            "--runs",
            "3",
            "--period-ms",
            "5",
            "--fail-every",
            "3",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["state"], "STOPPED");
    assert_eq!(report["terminated"], true);
    assert_eq!(report["max_concurrent"], 1);
    assert_eq!(report["observed_results"], 3);

    let task = &report["tasks"][0];
    assert_eq!(task["runs"], 3);
    assert_eq!(task["stopped"], true);
    assert_eq!(task["outcome"], "failure");
    assert_eq!(task["error"], "probe 0 failed on run 3");
}

#[test]
fn test_run_cooperative_interval() {
    let output = cadence()
        .args([
            "run",
            "--tasks",
            "1",
            "--schedule",
            "interval",
            "--period-ms",
            "10",
            "--wait-ms",
            "100",
            "--strategy",
            "cooperative",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["strategy"], "cooperative");
    assert!(report["tasks"][0]["runs"].as_u64().unwrap() >= 2);
    assert_eq!(report["tasks"][0]["stopped"], true);
}

#[test]
fn test_run_per_core_workers() {
    let output = cadence()
        .args(["run", "--tasks", "2", "--per-core", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["max_concurrent"].as_u64().unwrap() >= 1);
    assert_eq!(report["state"], "STOPPED");
}

#[test]
fn test_run_per_core_conflicts_with_workers() {
    cadence()
        .args(["run", "--per-core", "--workers", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_run_rejects_negative_period() {
    cadence()
        .args(["run", "--schedule", "interval", "--period-ms=-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("period_ms"));
}

#[test]
fn test_run_rejects_unknown_strategy() {
    cadence()
        .args(["run", "--strategy", "fibers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown strategy"));
}

#[test]
fn test_run_with_config_file() {
    let file = config_file("max_concurrent = 2\nstrategy = \"thread-pool\"\n");
    cadence()
        .args(["run", "--tasks", "4", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("(thread-pool) STOPPED"));
}

#[test]
fn test_config_command() {
    let file = config_file("max_concurrent = 4\nresolution_ms = 3\n");
    cadence()
        .args(["config", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration OK"))
        .stdout(predicate::str::contains("max_concurrent     = 4"))
        .stdout(predicate::str::contains("resolution_ms      = 3"));
}

#[test]
fn test_config_command_json() {
    let file = config_file("queue_size = 16\n");
    let output = cadence()
        .args(["config", "--json", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["queue_size"], 16);
    assert_eq!(config["max_concurrent"], 1);
    assert_eq!(config["strategy"], "auto");
    assert_eq!(config["resolved_strategy"], "thread-pool");
}

#[test]
fn test_config_command_rejects_invalid_values() {
    let file = config_file("max_concurrent = 0\n");
    cadence()
        .args(["config", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_concurrent"));
}

#[test]
fn test_config_command_missing_file() {
    cadence()
        .args(["config", "--config", "/nonexistent/cadence.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}
