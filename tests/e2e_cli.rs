//! CLI end-to-end tests
//!
//! Tests for the vidforge command-line interface.

mod common;

use assert_cmd::prelude::*;
use common::TestHarness;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the vidforge binary
#[allow(deprecated)]
fn vidforge_cmd() -> Command {
    Command::cargo_bin("vidforge").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = vidforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vidforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidforge"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = vidforge_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidforge"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = vidforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_serve_help() {
    let mut cmd = vidforge_cmd();
    cmd.args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the server"))
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn test_cli_serve_invalid_port() {
    let mut cmd = vidforge_cmd();
    cmd.args(["serve", "--port", "99999"]).assert().failure();
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = vidforge_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")),
    );
}

#[test]
fn test_cli_hash_password() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[auth]\nbcrypt_cost = 4\n").unwrap();

    let output = vidforge_cmd()
        .args(["--config", config_file.to_str().unwrap(), "hash-password", "hunter2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let hash = String::from_utf8(output.stdout).unwrap();
    assert!(bcrypt::verify("hunter2", hash.trim()).unwrap());
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[server]
host = "127.0.0.1"
port = 4000

[pipeline]
workers = 3
"#,
    )
    .unwrap();

    vidforge_cmd()
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"))
        .stdout(predicate::str::contains("127.0.0.1:4000"))
        .stdout(predicate::str::contains("3 workers"));
}

#[test]
fn test_cli_validate_rejects_bad_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[pipeline]\nsegment_duration_secs = -1.0\n").unwrap();

    vidforge_cmd()
        .args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn test_cli_probe_nonexistent_file() {
    vidforge_cmd()
        .args(["probe", "/nonexistent/path/movie.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exist"));
}

#[test]
fn test_cli_upload_nonexistent_file() {
    vidforge_cmd()
        .args(["upload", "/nonexistent/clip.mp4", "-u", "alice", "-p", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exist"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_client_round_trip() {
    let (harness, addr) = TestHarness::with_server().await;
    let server = addr.to_string();

    let mut conn = harness.connect(addr).await;
    conn.register("alice", "pw").await.unwrap();

    let source = harness.source_file("beach.mp4", 4096);
    let config_file = harness.dir.path().join("client.toml");
    fs::write(
        &config_file,
        format!(
            "[client]\nserver = \"{server}\"\ncache_dir = \"{}\"\n",
            harness.dir.path().join("cli-cache").display()
        ),
    )
    .unwrap();
    let config = config_file.to_str().unwrap().to_string();
    let source = source.to_str().unwrap().to_string();

    tokio::task::spawn_blocking(move || {
        vidforge_cmd()
            .args(["--config", &config, "upload", &source, "-t", "Beach day"])
            .args(["-u", "alice", "-p", "pw"])
            .assert()
            .success()
            .stdout(predicate::str::contains("is ready"))
            .stdout(predicate::str::contains("240p"));

        vidforge_cmd()
            .args(["--config", &config, "videos"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Beach day by alice"));

        vidforge_cmd()
            .args(["--config", &config, "users"])
            .assert()
            .success()
            .stdout(predicate::str::contains("alice"));

        vidforge_cmd()
            .args(["--config", &config, "fetch", "1", "--segment", "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1_1_2.mp4"));

        vidforge_cmd()
            .args(["--config", &config, "fetch", "1", "--segment", "9"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Segment not found"));
    })
    .await
    .unwrap();
}
