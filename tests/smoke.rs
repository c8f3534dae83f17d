//! Smoke tests -- verify the binary runs and rejects bad input before any API call.

use assert_cmd::Command;
use predicates::str::contains;
use std::io::Write;

fn otgen() -> Command {
    let mut cmd = Command::cargo_bin("otgen").unwrap();
    cmd.env_remove("OTG_API").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    otgen()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Open Traffic Generator"));
}

#[test]
fn test_cli_version() {
    otgen()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("otgen"));
}

#[test]
fn test_run_subcommand_flags() {
    otgen()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(contains("--xeta"))
        .stdout(contains("--interval"))
        .stdout(contains("[default: 0.5s]"));
}

#[test]
fn test_unsupported_metrics_mode_is_fatal() {
    otgen()
        .args(["run", "--api", "http://127.0.0.1:1", "-m", "lag"])
        .assert()
        .failure()
        .stderr(contains("invalid value 'lag'"));
}

#[test]
fn test_bad_interval_is_fatal() {
    otgen()
        .args(["run", "-i", "10"])
        .assert()
        .failure()
        .stderr(contains("invalid interval"));
}

#[test]
fn test_yaml_and_json_are_exclusive() {
    otgen()
        .args(["run", "--yaml", "--json"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with"));
}

#[test]
fn test_missing_file_is_fatal() {
    otgen()
        .args(["run", "-f", "/nonexistent/otg.yaml"])
        .assert()
        .failure()
        .stderr(contains("failed to load OTG model"));
}

#[test]
fn test_malformed_stdin_is_fatal() {
    otgen()
        .args(["run", "--api", "http://127.0.0.1:1"])
        .write_stdin("flows: [")
        .assert()
        .failure()
        .stderr(contains("malformed YAML"));
}

#[test]
fn test_unreachable_api_is_fatal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"flows": [{{"name": "f1"}}]}}"#).unwrap();
    otgen()
        .args(["run", "--json", "--api", "http://127.0.0.1:1", "-f"])
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains("failed to apply OTG config"));
}
