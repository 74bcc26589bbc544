//! Integration tests for the cascade CLI binary.
//!
//! These tests exercise the compiled binary using assert_cmd against
//! temporary git repositories.

use std::fs;

use assert_cmd::Command;
use cascade_test_utils::git::GitFixture;
use cascade_test_utils::nodes::ConfigArtifact;
use predicates::prelude::*;
use tempfile::TempDir;

/// A repository with one config artifact and a repository config file.
struct Shop {
    fixture: GitFixture,
    config_home: TempDir,
}

impl Shop {
    fn new() -> Self {
        let mut fixture = GitFixture::new("master");
        let db = ConfigArtifact::new("db").host("db.internal");
        fixture.commit("master", "Add database config", &db.files());
        fs::write(
            fixture.root().join(".git").join("cascade.toml"),
            "project = \"shop\"\n",
        )
        .unwrap();
        Self {
            fixture,
            config_home: TempDir::new().unwrap(),
        }
    }

    /// `cascade` pointed at this repository, isolated from the user's global config.
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cascade").expect("Failed to find cascade binary");
        cmd.env("XDG_CONFIG_HOME", self.config_home.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--repo")
            .arg(self.fixture.root());
        cmd
    }
}

// ============================================================================
// Help
// ============================================================================

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("cascade")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cycle"))
        .stdout(predicate::str::contains("add-environment"))
        .stdout(predicate::str::contains("release-notes"))
        .stdout(predicate::str::contains("committed as plain text"));
}

#[test]
fn test_no_command_prints_hint() {
    Command::cargo_bin("cascade")
        .unwrap()
        .assert()
        .success()
        .stdout(predicate::str::contains("cascade --help"));
}

#[test]
fn test_plain_directory_fails() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("cascade")
        .unwrap()
        .args(["--repo"])
        .arg(dir.path())
        .arg("tree")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

// ============================================================================
// Cycle and environments
// ============================================================================

#[test]
fn test_cycle_then_idle() {
    let shop = Shop::new();
    shop.cmd()
        .arg("cycle")
        .assert()
        .success()
        .stdout(predicate::str::contains("new release r1"))
        .stdout(predicate::str::contains("branch r1.0"));
    assert!(shop.fixture.has_branch("r1.0"));

    shop.cmd()
        .arg("cycle")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to do"));
}

#[test]
fn test_add_environment_and_tree() {
    let shop = Shop::new();
    shop.cmd().arg("cycle").assert().success();
    shop.cmd()
        .args(["add-environment", "dev"])
        .assert()
        .success()
        .stdout(predicate::str::contains("candidate r1.0-dev-RC1"));

    shop.cmd()
        .arg("tree")
        .assert()
        .success()
        .stdout(predicate::str::contains("r1 { p0 { dev: [RC1] } }"));
}

#[test]
fn test_invalid_environment_name() {
    let shop = Shop::new();
    shop.cmd().arg("cycle").assert().success();
    shop.cmd()
        .args(["add-environment", "qa-RC1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("qa-RC1"));
    assert!(!shop.fixture.has_branch("r1.0-qa-RC1"));
}

#[test]
fn test_merge_result_edit_and_submit() {
    let shop = Shop::new();
    shop.cmd().arg("cycle").assert().success();
    shop.cmd().args(["add-environment", "dev"]).assert().success();

    let output = shop
        .cmd()
        .args(["merge-result", "r1.0-dev"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let mut result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["entries"][0]["entry_id"], "shop.db");
    result["entries"][0]["parameters"][0]["current"] = "dev-db.internal".into();

    let edited = TempDir::new().unwrap();
    let file = edited.path().join("result.json");
    fs::write(&file, serde_json::to_string(&result).unwrap()).unwrap();

    shop.cmd()
        .args(["submit", "r1.0-dev"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("r1.0-dev-RC2"));
    assert!(
        shop.fixture
            .read_at("r1.0-dev", "merge-result.json")
            .unwrap()
            .contains("dev-db.internal")
    );
}

#[test]
fn test_submit_rejects_malformed_file() {
    let shop = Shop::new();
    shop.cmd().arg("cycle").assert().success();
    shop.cmd().args(["add-environment", "dev"]).assert().success();

    let edited = TempDir::new().unwrap();
    let file = edited.path().join("result.json");
    fs::write(&file, "not json").unwrap();

    shop.cmd()
        .args(["submit", "r1.0-dev"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid merge result"));
    assert!(!shop.fixture.has_tag("r1.0-dev-RC2"));
}

// ============================================================================
// Read-only commands
// ============================================================================

#[test]
fn test_release_notes_for_unknown_release() {
    let shop = Shop::new();
    shop.cmd()
        .args(["release-notes", "7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("7"));
}

#[test]
fn test_release_notes_list_commits() {
    let shop = Shop::new();
    shop.cmd().arg("cycle").assert().success();
    shop.cmd()
        .args(["release-notes", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Add database config"));
}

#[test]
fn test_config_shows_layers_and_overrides() {
    let shop = Shop::new();
    shop.cmd()
        .args(["config", "--remote", "origin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("project = \"shop\""))
        .stdout(predicate::str::contains("remote = \"origin\""))
        .stdout(predicate::str::contains("main_branch = \"master\""));
}
