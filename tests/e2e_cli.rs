//! CLI end-to-end tests
//!
//! Tests for the vidconv command-line interface. None of these need a working
//! ffmpeg; conversions that would reach the encoder are expected to fail.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the vidconv binary
#[allow(deprecated)]
fn vidconv_cmd() -> Command {
    Command::cargo_bin("vidconv").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = vidconv_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = vidconv_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidconv"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = vidconv_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vidconv"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = vidconv_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_convert_help() {
    let mut cmd = vidconv_cmd();
    cmd.args(["convert", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--target-size-mb"))
        .stdout(predicate::str::contains("--concurrency"));
}

#[test]
fn test_cli_convert_requires_files() {
    let mut cmd = vidconv_cmd();
    cmd.arg("convert").assert().failure();
}

#[test]
fn test_cli_two_pass_requires_target_size() {
    let mut cmd = vidconv_cmd();
    cmd.args(["convert", "a.mov", "--two-pass"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--target-size-mb"));
}

#[test]
fn test_cli_width_requires_height() {
    let mut cmd = vidconv_cmd();
    cmd.args(["convert", "a.mov", "--width", "640"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--height"));
}

#[test]
fn test_cli_rejects_unknown_format() {
    let mut cmd = vidconv_cmd();
    cmd.args(["convert", "a.mov", "--format", "flv"])
        .assert()
        .failure();
}

#[test]
fn test_cli_rejects_incompatible_codec() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("a.mov");
    fs::write(&source, b"x").unwrap();

    let mut cmd = vidconv_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--format", "webm", "--video-codec", "h264"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid conversion options"));
}

#[test]
fn test_cli_convert_missing_source_fails() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("nope.mov");

    let mut cmd = vidconv_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--no-date-suffix"])
        .arg(&source)
        .assert()
        .failure();

    assert!(!temp.path().join("nope.mp4").exists());
}

#[test]
fn test_cli_convert_with_missing_configured_ffmpeg() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
[encoder]
ffmpeg_path = "/nonexistent/bin/ffmpeg"
"#,
    )
    .unwrap();

    let source = temp.path().join("a.mov");
    fs::write(&source, b"x").unwrap();

    let mut cmd = vidconv_cmd();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("convert")
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ffmpeg"));
}

#[test]
fn test_cli_convert_refuses_source_as_target() {
    let temp = tempdir().unwrap();
    let source = temp.path().join("clip.mp4");
    fs::write(&source, b"x").unwrap();

    // Same container and no date suffix maps clip.mp4 onto itself.
    let mut cmd = vidconv_cmd();
    cmd.current_dir(temp.path())
        .args(["convert", "--format", "mp4", "--no-date-suffix"])
        .arg(&source)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No files to convert"));

    assert_eq!(fs::read(&source).unwrap(), b"x");
}

#[test]
fn test_cli_check_tools_command() {
    let temp = tempdir().unwrap();
    let mut cmd = vidconv_cmd();
    // Exit status depends on whether ffmpeg is installed.
    cmd.current_dir(temp.path())
        .arg("check-tools")
        .assert()
        .stdout(predicate::str::contains("ffmpeg"))
        .stdout(predicate::str::contains("ffprobe"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = vidconv_cmd();
    cmd.args(["probe", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_config_validation() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.toml");

    fs::write(
        &config_path,
        r#"
[batch]
concurrency = 2
date_suffix = false

[defaults]
container = "webm"
"#,
    )
    .unwrap();

    let mut cmd = vidconv_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Concurrency: 2"));
}

#[test]
fn test_cli_config_validation_rejects_zero_concurrency() {
    let temp = tempdir().unwrap();
    let config_path = temp.path().join("config.toml");
    fs::write(&config_path, "[batch]\nconcurrency = 0\n").unwrap();

    let mut cmd = vidconv_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_cli_validate_without_config_uses_defaults() {
    let temp = tempdir().unwrap();
    let mut cmd = vidconv_cmd();
    cmd.current_dir(temp.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("using defaults"));
}
