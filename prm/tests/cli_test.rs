//! CLI tests for the prm binary
//!
//! Each test points logging and config at a temp dir, and the Docker host at a
//! socket that does not exist so nothing depends on a running engine.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_config(dir: &Path, puppet_version: &str) -> PathBuf {
    let path = dir.join("prm.yml");
    let missing_socket = dir.join("missing.sock");
    let yaml = format!(
        "puppet-version: {}\nbackend: docker\ndocker:\n  host: unix://{}\n  timeout-secs: 2\n",
        puppet_version,
        missing_socket.display()
    );
    fs::write(&path, yaml).expect("Failed to write config");
    path
}

fn prm(temp: &TempDir, config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("prm").expect("prm binary builds");
    cmd.env("PRM_LOG_DIR", temp.path().join("logs"))
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_exec_rejects_malformed_tool() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["exec", "foo-bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Selected tool must be in AUTHOR/ID format"));
}

#[test]
fn test_exec_rejects_unknown_flag() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["exec", "--foo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--foo"));
}

#[test]
fn test_exec_with_unreachable_engine_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["exec", "--codedir"])
        .arg(temp.path())
        .arg("puppetlabs/rubocop")
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "));
}

#[test]
fn test_status_json_reports_config_and_unavailable_engine() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""PuppetVersion":"7.0.0""#))
        .stdout(predicate::str::contains(r#""Backend":"docker""#))
        .stdout(predicate::str::contains(r#""IsAvailable":false"#));
}

#[test]
fn test_status_human_reports_error_state() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "6.21.1");

    prm(&temp, &config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("> Puppet version: 6.21.1"))
        .stdout(predicate::str::contains("> Backend: docker (error)"));
}

#[test]
fn test_status_unknown_format() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["status", "--format", "yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unsupported output format"));
}

#[test]
fn test_set_and_get_puppet_version() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config)
        .args(["set", "puppet", "6.2.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Puppet version set to 6.2.1"));

    prm(&temp, &config)
        .args(["get", "puppet"])
        .assert()
        .success()
        .stdout("6.2.1\n");
}

#[test]
fn test_unsupported_backend_in_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("prm.yml");
    fs::write(&config, "backend: podman\n").unwrap();

    prm(&temp, &config)
        .arg("status")
        .assert()
        .failure();
}

#[test]
fn test_logs_written_to_log_dir() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "7.0.0");

    prm(&temp, &config).args(["get", "backend"]).assert().success().stdout("docker\n");

    assert!(temp.path().join("logs").join("prm.log").is_file());
}

#[test]
fn test_set_creates_fresh_config_file() {
    let temp = TempDir::new().unwrap();
    let fresh = temp.path().join("fresh.yml");

    prm(&temp, &fresh)
        .args(["set", "puppet", "6.2.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Puppet version set to 6.2.1"));

    assert!(fresh.is_file());
    prm(&temp, &fresh).args(["get", "puppet"]).assert().success().stdout("6.2.1\n");
}

#[test]
fn test_malformed_tool_reported_before_broken_config() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("prm.yml");
    fs::write(&config, "backend: podman\n").unwrap();

    prm(&temp, &config)
        .args(["exec", "foo-bar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Selected tool must be in AUTHOR/ID format"));
}
