mod common;

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rompipe::commands::{show_log_command, RUN_METADATA_FILE, SPEC_COPY_FILE};
use rompipe_core::db::{ProjectDb, ProjectLayout};
use rompipe_core::report::{Fidelity, RunReport};
use serde_json::Value;
use tempfile::tempdir;

use common::project_with_port;

/// `run` with cc65 pointed at paths that do not exist.
fn run_without_tools(root: &Path, spec: &str, force: bool) -> assert_cmd::assert::Assert {
    let missing = root.join("missing-tools");
    let mut cmd = cargo_bin_cmd!("rompipe");
    cmd.env_remove("ROMPIPE_FAKE_TOOLCHAIN_VERSION")
        .env("CA65_BIN", missing.join("ca65"))
        .env("LD65_BIN", missing.join("ld65"))
        .arg("run")
        .arg("--root")
        .arg(root)
        .arg("--file")
        .arg(spec);
    if force {
        cmd.arg("--force");
    }
    cmd.assert()
}

#[test]
fn run_without_toolchain_records_build_failure() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    let spec = project_with_port(root);

    run_without_tools(root, spec, false)
        .failure()
        .stdout(predicate::str::contains("Ran port: demo (run 1)"))
        .stdout(predicate::str::contains("Fidelity: build_failure"))
        .stderr(predicate::str::contains("Port 'demo' finished with build_failure"));

    let layout = ProjectLayout::new(root);
    let out = layout.run_output_root("demo");
    let report: RunReport =
        serde_json::from_str(&fs::read_to_string(out.join("report.json")).expect("read report"))
            .expect("parse report");
    assert_eq!(report.fidelity, Fidelity::BuildFailure);
    assert!(report.image.is_none());
    // Every deterministic check failed too, so each unit is a trap stub.
    assert_eq!(report.summary.fallback, 5);
    assert!(layout.reports_dir.join("demo.json").is_file());
    assert!(!out.join("demo.sfc").exists());

    let spec_copy = fs::read_to_string(out.join(SPEC_COPY_FILE)).expect("read spec copy");
    assert!(spec_copy.contains("oracle_scope: unresolved"));
    assert!(spec_copy.contains("workers: 2"));
    let metadata: Value =
        serde_json::from_str(&fs::read_to_string(out.join(RUN_METADATA_FILE)).expect("read metadata"))
            .expect("parse metadata");
    assert_eq!(metadata["run_id"], 1);
    assert_eq!(metadata["toolchain"], "ca65");
    assert_eq!(metadata["toolchain_version"], Value::Null);

    let db = ProjectDb::open(&layout.db_path).expect("open db");
    let runs = db.list_port_runs(Some("demo")).expect("list runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].1.fidelity, Fidelity::BuildFailure);
    assert_eq!(db.load_translation_log(runs[0].0, true).expect("failures").len(), 5);
}

#[test]
fn rerun_requires_force() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    let spec = project_with_port(root);

    run_without_tools(root, spec, false).failure();
    run_without_tools(root, spec, false)
        .failure()
        .stderr(predicate::str::contains("rerun with --force"));
    run_without_tools(root, spec, true)
        .failure()
        .stdout(predicate::str::contains("Ran port: demo (run 2)"));
}

#[test]
fn list_runs_and_show_log_read_recorded_run() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    let spec = project_with_port(root);
    run_without_tools(root, spec, false).failure();

    cargo_bin_cmd!("rompipe")
        .arg("list-runs")
        .arg("--root")
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Port runs (1):"))
        .stdout(predicate::str::contains("#1 demo [build_failure] units=0/0/5"));

    let output = cargo_bin_cmd!("rompipe")
        .args(["list-runs", "--name", "other", "--json", "--root"])
        .arg(root)
        .output()
        .expect("run list-runs");
    assert!(output.status.success());
    let runs: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(runs.as_array().map(Vec::len), Some(0));

    cargo_bin_cmd!("rompipe")
        .args(["show-log", "--name", "demo", "--root"])
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Translation log for run 1 (5 entries):"))
        .stdout(predicate::str::contains("bank 01 dispatch [fallback_stub/rejected]"))
        .stdout(predicate::str::contains("indirect jump"));

    let output = cargo_bin_cmd!("rompipe")
        .args(["show-log", "--run-id", "1", "--failures", "--json", "--root"])
        .arg(root)
        .output()
        .expect("run show-log");
    assert!(output.status.success());
    let entries: Value = serde_json::from_slice(&output.stdout).expect("json output");
    let entries = entries.as_array().expect("array");
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["run_id"], 1);
    assert_eq!(entries[0]["function"], "work");
}

#[test]
fn show_log_needs_a_run() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    project_with_port(root);
    let root_str = root.to_str().expect("utf-8 root");

    let err = show_log_command(root_str, None, None, false, false).expect_err("no selector");
    assert!(err.to_string().contains("Pass --name or --run-id"));
    let err = show_log_command(root_str, Some("demo"), None, false, false).expect_err("no runs");
    assert!(err.to_string().contains("No recorded runs named 'demo'"));
}

#[test]
fn run_rejects_invalid_spec() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    project_with_port(root);
    fs::write(root.join("ports/bad.yaml"), "name: bad name\ncatalog: disasm/demo\n").expect("write spec");

    cargo_bin_cmd!("rompipe")
        .args(["run", "--file", "ports/bad.yaml", "--root"])
        .arg(root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load port spec"));
    assert!(!ProjectLayout::new(root).run_output_root("bad name").exists());
}

#[test]
fn run_rejects_unknown_toolchain() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    let spec = project_with_port(root);

    cargo_bin_cmd!("rompipe")
        .args(["run", "--file", spec, "--toolchain", "wla-dx", "--root"])
        .arg(root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toolchain 'wla-dx' not found"));
}

#[cfg(unix)]
mod with_fake_cc65 {
    use super::*;
    use common::{fake_cc65, write_script};

    fn setup(root: &Path, oracle: Option<&Path>) {
        let (ca65, ld65) = fake_cc65(root);
        let mut cmd = cargo_bin_cmd!("rompipe");
        cmd.env("ROMPIPE_FAKE_TOOLCHAIN_VERSION", "ca65 V2.19")
            .arg("setup-toolchain")
            .arg("--root")
            .arg(root)
            .arg("--assembler")
            .arg(&ca65)
            .arg("--linker")
            .arg(&ld65);
        if let Some(oracle) = oracle {
            cmd.arg("--oracle-command").arg(oracle).args(["--oracle-timeout", "10"]);
        }
        cmd.assert().success();
    }

    #[test]
    fn run_builds_image_with_trap_stub_for_unresolved_function() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let spec = project_with_port(root);
        setup(root, None);

        cargo_bin_cmd!("rompipe")
            .env("ROMPIPE_FAKE_TOOLCHAIN_VERSION", "ca65 V2.19")
            .args(["run", "--file", spec, "--root"])
            .arg(root)
            .assert()
            .success()
            .stdout(predicate::str::contains("Fidelity: partial_degradation"))
            .stdout(predicate::str::contains("Units: 5 (4 deterministic, 0 oracle, 1 fallback)"));

        let out = ProjectLayout::new(root).run_output_root("demo");
        let image = fs::read(out.join("demo.sfc")).expect("read image");
        assert_eq!(image.len(), 0x10000);
        assert_eq!(&image[0x7FC0..0x7FCC], b"FIXTURE PORT");
        assert!(rompipe_core::rom::verify_checksum(&image));
        let source = fs::read_to_string(out.join("main.s")).expect("read main.s");
        assert!(source.contains(".proc dispatch_B01"));
        assert!(out.join("rom.cfg").is_file());
    }

    #[test]
    fn run_uses_configured_oracle_program() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path();
        let spec = project_with_port(root);
        let oracle = root.join("oracle.sh");
        write_script(&oracle, "cat > /dev/null\nprintf '    LDA $0300\\n    RTS\\n'\n");
        setup(root, Some(&oracle));

        cargo_bin_cmd!("rompipe")
            .env("ROMPIPE_FAKE_TOOLCHAIN_VERSION", "ca65 V2.19")
            .args(["run", "--file", spec, "--root"])
            .arg(root)
            .assert()
            .success()
            .stdout(predicate::str::contains("Fidelity: full_success"))
            .stdout(predicate::str::contains("1 oracle"));

        let db = ProjectDb::open(&ProjectLayout::new(root).db_path).expect("open db");
        let (_, run) = db.list_port_runs(Some("demo")).expect("list").remove(0);
        assert_eq!(run.oracle.as_deref(), Some("command"));
        assert_eq!(run.oracle_accepted, 1);
        assert!(run.image_sha256.is_some());

        // --no-oracle goes back to the trap stub.
        cargo_bin_cmd!("rompipe")
            .env("ROMPIPE_FAKE_TOOLCHAIN_VERSION", "ca65 V2.19")
            .args(["run", "--file", spec, "--no-oracle", "--force", "--root"])
            .arg(root)
            .assert()
            .success()
            .stdout(predicate::str::contains("Fidelity: partial_degradation"));
    }
}
