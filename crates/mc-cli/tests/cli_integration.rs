//! CLI integration tests
//!
//! Tests the mcctl binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn mcctl() -> Command {
    let mut cmd = Command::cargo_bin("mcctl")
        .expect("Failed to locate mcctl binary - ensure it's built before running tests");
    cmd.env_remove("MC_USER")
        .env_remove("MC_PASSWORD")
        .env_remove("MC_GATEWAY_URL");
    cmd
}

#[test]
fn test_cli_help() {
    mcctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mcctl"))
        .stdout(predicate::str::contains("Machine controller gateway client"));
}

#[test]
fn test_cli_version() {
    mcctl()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mcctl"));
}

#[test]
fn test_cli_state_help() {
    mcctl()
        .args(["state", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("machine state"));
}

#[test]
fn test_cli_state_rejects_unknown_state() {
    mcctl()
        .args(["state", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_cli_print_rejects_negative() {
    mcctl().args(["print", "--", "-1"]).assert().failure();
}

#[test]
fn test_hash_password() {
    mcctl()
        .args(["hash-password", "password"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sha256:"))
        .stdout(predicate::str::contains(
            "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8",
        ));
}

#[test]
fn test_call_requires_user() {
    mcctl()
        .args(["on"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No username given"));
}

#[test]
fn test_call_unreachable_gateway() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    mcctl()
        .args(["--url", &format!("ws://{}/ws", addr), "-u", "admin", "-p", "password", "on"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect"));
}

#[test]
fn test_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    let path_arg = path.to_str().unwrap();

    mcctl()
        .args(["config", "init", "--file", path_arg])
        .assert()
        .success();
    assert!(path.exists());

    mcctl()
        .args(["config", "init", "--file", path_arg])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    mcctl()
        .args(["config", "show", "--file", path_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("bind_address = \"0.0.0.0:8080\""))
        .stdout(predicate::str::contains("drain_interval_ms = 100"));
}
