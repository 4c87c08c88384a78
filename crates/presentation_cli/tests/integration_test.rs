//! Integration tests for CLI
//!
//! Run the built binary against commands that need no running runtime.

use std::process::Command;

fn warden() -> Command {
    Command::new(env!("CARGO_BIN_EXE_warden-cli"))
}

#[test]
fn help_lists_every_command() {
    let output = warden().arg("--help").output().unwrap();
    assert!(output.status.success());

    let help = String::from_utf8_lossy(&output.stdout);
    for command in [
        "status", "health", "install", "start", "models", "pull", "warm", "auto-warm", "watch",
        "shutdown",
    ] {
        assert!(help.contains(command), "missing {command} in help:\n{help}");
    }
}

#[test]
fn pull_without_name_is_a_usage_error() {
    let output = warden().arg("pull").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = warden()
        .args(["--config"])
        .arg(dir.path().join("absent.toml"))
        .arg("status")
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn health_reports_unreachable_runtime() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = warden()
        .current_dir(dir.path())
        .env("WARDEN_RUNTIME__BASE_URL", "http://127.0.0.1:9")
        .env("WARDEN_RUNTIME__LIVENESS_TIMEOUT_MS", "200")
        .arg("health")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"reachable\": false"), "{stdout}");
}
