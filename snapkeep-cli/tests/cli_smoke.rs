use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn snapkeep_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("snapkeep"))
}

#[test]
fn version_flag_prints_name_and_version() {
    snapkeep_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("snapkeep").and(contains(env!("CARGO_PKG_VERSION"))));
}

#[test]
fn client_without_daemon_reports_not_running() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("absent.sock");

    snapkeep_cmd()
        .arg("--socket")
        .arg(&socket)
        .args(["lastrun", "db1", "--key", "v1"])
        .assert()
        .failure()
        .stderr(contains("daemon is not running"));
}

#[test]
fn malformed_settings_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("snapkeep.yaml");
    fs::write(&config, "time_template: [not, a, string]\n").expect("write config");

    snapkeep_cmd()
        .arg("--config")
        .arg(&config)
        .args(["rotate", "db1", "--key", "v1"])
        .assert()
        .failure()
        .stderr(contains("failed to load settings"));
}

#[test]
fn daemon_rejects_three_part_template() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("snapkeep.yaml");
    fs::write(&config, "time_template: \"/%Y/%m/%d\"\n").expect("write config");

    snapkeep_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--socket")
        .arg(dir.path().join("s.sock"))
        .arg("daemon")
        .assert()
        .failure();
    assert!(!dir.path().join("s.sock").exists());
}

#[test]
fn rotate_requires_a_key() {
    snapkeep_cmd()
        .args(["rotate", "db1"])
        .assert()
        .failure()
        .stderr(contains("--key"));
}
