use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rompipe_core::db::{ProjectConfig, ProjectLayout, CURRENT_SCHEMA_VERSION};
use serde_json::Value;
use tempfile::tempdir;

/// init-project without --root uses the current directory as the project root.
#[test]
fn init_project_uses_default_root_when_not_provided() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    cargo_bin_cmd!("rompipe")
        .current_dir(root)
        .arg("init-project")
        .arg("--name")
        .arg("TestProject")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized rompipe project:"));

    let layout = ProjectLayout::new(root);
    assert!(layout.project_config_path.is_file());
    assert!(layout.db_path.is_file());
    for (label, dir) in layout.directories() {
        assert!(dir.is_dir(), "{label} missing at {}", dir.display());
    }
}

#[test]
fn init_project_keeps_existing_config() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();

    for name in ["First", "Second"] {
        cargo_bin_cmd!("rompipe")
            .arg("init-project")
            .arg("--root")
            .arg(root)
            .arg("--name")
            .arg(name)
            .assert()
            .success();
    }

    let layout = ProjectLayout::new(root);
    let config: ProjectConfig =
        serde_json::from_str(&fs::read_to_string(&layout.project_config_path).expect("read config"))
            .expect("parse config");
    assert_eq!(config.name, "First");
}

#[test]
fn init_project_derives_name_from_root() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path().join("zelda-port");

    cargo_bin_cmd!("rompipe")
        .arg("init-project")
        .arg("--root")
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: zelda-port"));
}

#[test]
fn project_info_fails_when_config_missing() {
    let dir = tempdir().expect("tempdir");

    cargo_bin_cmd!("rompipe")
        .arg("project-info")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read project config"));
}

#[test]
fn project_info_json_describes_fresh_project() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    cargo_bin_cmd!("rompipe")
        .arg("init-project")
        .arg("--root")
        .arg(root)
        .arg("--name")
        .arg("Demo")
        .assert()
        .success();

    let output = cargo_bin_cmd!("rompipe")
        .arg("project-info")
        .arg("--root")
        .arg(root)
        .arg("--json")
        .output()
        .expect("run project-info");
    assert!(output.status.success());
    let info: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(info["name"], "Demo");
    assert_eq!(info["schema_version"], CURRENT_SCHEMA_VERSION);
    assert_eq!(info["toolchain"], "ca65");
    assert_eq!(info["available_toolchains"], serde_json::json!(["ca65"]));
    assert_eq!(info["oracle"]["command"], Value::Null);
    assert_eq!(info["port_runs"].as_array().map(Vec::len), Some(0));
}

#[test]
fn project_info_text_lists_directories() {
    let dir = tempdir().expect("tempdir");
    let root = dir.path();
    cargo_bin_cmd!("rompipe").arg("init-project").arg("--root").arg(root).assert().success();

    cargo_bin_cmd!("rompipe")
        .arg("project-info")
        .arg("--root")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("rompipe Project Info"))
        .stdout(predicate::str::contains("Oracle: (disabled)"))
        .stdout(predicate::str::contains("Port runs: 0"))
        .stdout(predicate::str::contains("Directories:"));
}

#[test]
fn list_toolchains_reports_probe_result() {
    let dir = tempdir().expect("tempdir");

    let output = cargo_bin_cmd!("rompipe")
        .env("ROMPIPE_FAKE_TOOLCHAIN_VERSION", "ca65 V2.19 - Git 1234567")
        .arg("list-toolchains")
        .arg("--root")
        .arg(dir.path())
        .arg("--json")
        .output()
        .expect("run list-toolchains");
    assert!(output.status.success());
    let entries: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(entries[0]["name"], "ca65");
    assert_eq!(entries[0]["version"], "ca65 V2.19 - Git 1234567");
}

#[test]
fn list_toolchains_marks_missing_tools() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("no-such-ca65");

    cargo_bin_cmd!("rompipe")
        .env_remove("ROMPIPE_FAKE_TOOLCHAIN_VERSION")
        .env("CA65_BIN", &missing)
        .arg("list-toolchains")
        .arg("--root")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("- ca65:"))
        .stdout(predicate::str::contains("unavailable"));
}
