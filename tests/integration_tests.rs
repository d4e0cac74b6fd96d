//! Integration tests for the crackwise CLI.
//!
//! These drive the built binary end to end, standing in a shell script for
//! the external cracking tool via the `CRACKWISE_TOOL` override.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper to create a crackwise Command
fn crackwise() -> Command {
    cargo_bin_cmd!("crackwise")
}

/// Write a temp config that keeps the learner model inside the test dir.
fn write_config(dir: &TempDir) -> PathBuf {
    let model_path = dir.path().join("patterns.json");
    let config_path = dir.path().join("crackwise.toml");
    std::fs::write(
        &config_path,
        format!("model_path = {:?}\n", model_path.to_string_lossy()),
    )
    .unwrap();
    config_path
}

#[cfg(unix)]
fn write_fake_tool(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("fake-tool");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

mod cli_basics {
    use super::*;

    #[test]
    fn help_succeeds() {
        crackwise().arg("--help").assert().success();
    }

    #[test]
    fn version_succeeds() {
        crackwise().arg("--version").assert().success();
    }

    #[test]
    fn crack_requires_a_hash_file_argument() {
        crackwise().arg("crack").assert().failure();
    }
}

mod stats_command {
    use super::*;

    #[test]
    fn stats_on_fresh_model_reports_zero_successes() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        crackwise()
            .arg("--config")
            .arg(&config)
            .arg("stats")
            .assert()
            .success()
            .stdout(predicate::str::contains("0 recorded successes"))
            .stdout(predicate::str::contains("pure_lowercase"));
    }
}

#[cfg(unix)]
mod crack_command {
    use super::*;

    #[test]
    fn recovers_password_from_fake_tool() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let hash_file = dir.path().join("hashes.txt");
        std::fs::write(&hash_file, "deadbeef\n").unwrap();
        let tool = write_fake_tool(
            dir.path(),
            "#!/bin/sh\necho 'Progress.........: 420'\necho 'deadbeef:secret99'\nexit 0\n",
        );

        crackwise()
            .env("CRACKWISE_TOOL", &tool)
            .arg("--config")
            .arg(&config)
            .arg("crack")
            .arg(&hash_file)
            .arg("--file-name")
            .arg("budget_2023.zip")
            .arg("--file-size")
            .arg("4096")
            .arg("--no-ui")
            .assert()
            .success()
            .stdout(predicate::str::contains("password recovered"))
            .stdout(predicate::str::contains("secret99"));

        // The success was persisted for future strategy ranking.
        let model = std::fs::read_to_string(dir.path().join("patterns.json")).unwrap();
        assert!(model.contains("\"total_success\": 1"));
    }

    #[test]
    fn exhausted_session_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let hash_file = dir.path().join("hashes.txt");
        std::fs::write(&hash_file, "deadbeef\n").unwrap();
        let tool = write_fake_tool(dir.path(), "#!/bin/sh\nexit 0\n");

        crackwise()
            .env("CRACKWISE_TOOL", &tool)
            .arg("--config")
            .arg(&config)
            .arg("crack")
            .arg(&hash_file)
            .arg("--no-ui")
            .assert()
            .success()
            .stdout(predicate::str::contains("exhausted"));
    }

    #[test]
    fn unusable_tool_still_exits_cleanly() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);
        let hash_file = dir.path().join("hashes.txt");
        std::fs::write(&hash_file, "deadbeef\n").unwrap();

        crackwise()
            .env("CRACKWISE_TOOL", "/nonexistent/hashcat")
            .arg("--config")
            .arg(&config)
            .arg("crack")
            .arg(&hash_file)
            .arg("--no-ui")
            .assert()
            .success()
            .stdout(predicate::str::contains("exhausted"))
            .stderr(predicate::str::contains("no usable cracking tool"));
    }
}
