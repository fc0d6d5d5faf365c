//! End-to-end tests for the wslkit binary
//!
//! These run the compiled binary with an isolated working directory and
//! config home. Native WSL calls are only exercised on non-Windows hosts,
//! where they fail in a predictable way.

use assert_cmd::assert::OutputAssertExt;
use predicates::prelude::*;
use std::path::Path;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn workspace() -> TempDir {
    let temp = tempfile::tempdir().unwrap();
    std::fs::create_dir(temp.path().join(".git")).unwrap();
    temp
}

fn wslkit(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("wslkit"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("APPDATA", dir.join("appdata"))
        .env_remove("WSLKIT_DISTRO")
        .env_remove("WSLKIT_SETTLE_DELAY_MS")
        .env_remove("WSLKIT_DEADLINE_SECS")
        .env_remove("RUST_LOG")
        .stdin(Stdio::null());
    cmd
}

fn write_project_config(dir: &Path, contents: &str) {
    let config_dir = dir.join(".wslkit");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), contents).unwrap();
}

#[test]
fn help_lists_commands() {
    let temp = workspace();
    wslkit(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("shell"))
        .stdout(predicate::str::contains("set-default"));
}

#[test]
fn version_output() {
    let temp = workspace();
    wslkit(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wslkit"));
}

#[test]
fn run_without_command_is_usage_error() {
    let temp = workspace();
    wslkit(temp.path()).arg("run").assert().code(2);
}

#[test]
fn config_shows_defaults() {
    let temp = workspace();
    wslkit(temp.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("config file: (none)"))
        .stdout(predicate::str::contains("settle_delay_ms = 5  [default]"));
}

#[test]
fn config_attributes_each_layer() {
    let temp = workspace();
    write_project_config(
        temp.path(),
        r#"
        [defaults]
        distro = "Debian"

        [process]
        settle_delay_ms = 20
        "#,
    );

    wslkit(temp.path())
        .env("WSLKIT_DISTRO", "Alpine")
        .args(["--settle-delay-ms", "0", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("distro = Alpine  [env]"))
        .stdout(predicate::str::contains("settle_delay_ms = 0  [cli]"))
        .stdout(predicate::str::contains(".wslkit"));
}

#[test]
fn unknown_config_key_is_rejected() {
    let temp = workspace();
    write_project_config(temp.path(), "[defaults]\ndistor = \"typo\"\n");

    wslkit(temp.path())
        .arg("config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn settle_delay_out_of_range_is_rejected() {
    let temp = workspace();
    wslkit(temp.path())
        .env("WSLKIT_SETTLE_DELAY_MS", "5000")
        .arg("config")
        .assert()
        .code(2);
}

#[test]
fn register_missing_archive_is_precondition_failure() {
    let temp = workspace();
    wslkit(temp.path())
        .args(["register", "Fresh", "does-not-exist.tar.gz"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn missing_wsl_exe_is_internal_failure() {
    let temp = workspace();
    wslkit(temp.path())
        .args(["--wsl-exe"])
        .arg(temp.path().join("no-such-wsl.exe"))
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("wsl.exe failed"));
}

#[cfg(not(windows))]
#[test]
fn native_calls_fail_off_windows() {
    let temp = workspace();
    wslkit(temp.path())
        .args(["--distro", "Alpine", "show"])
        .assert()
        .code(70)
        .stderr(predicate::str::contains("only available on Windows"));
}
