mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use rompipe::commands::{plan_mapper_command, resolve_command, PlanSource};
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn resolve_classifies_hardware_and_plain_addresses() {
    cargo_bin_cmd!("rompipe")
        .arg("resolve")
        .arg("$2002")
        .arg("0x0300")
        .arg("4016")
        .assert()
        .success()
        .stdout(predicate::str::contains("$2002 PPUSTATUS [PPU] -> PPU_STATUS_READ"))
        .stdout(predicate::str::contains("$0300 (not hardware)"))
        .stdout(predicate::str::contains("$4016 "));
}

#[test]
fn resolve_rejects_malformed_addresses() {
    cargo_bin_cmd!("rompipe")
        .arg("resolve")
        .arg("0x20000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid address"));
}

#[test]
fn resolve_json_without_addresses_lists_register_table() {
    let output = cargo_bin_cmd!("rompipe")
        .arg("resolve")
        .arg("--json")
        .output()
        .expect("run resolve");
    assert!(output.status.success());
    let entries: Value = serde_json::from_slice(&output.stdout).expect("json output");
    let entries = entries.as_array().expect("array");
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["register"].is_object()));
    assert!(entries.iter().any(|e| e["register"]["name"] == "PPUCTRL"));
}

#[test]
fn plan_mapper_json_packs_uxrom_banks() {
    let output = cargo_bin_cmd!("rompipe")
        .args(["plan-mapper", "--mapper", "2", "--prg-banks", "8", "--json"])
        .output()
        .expect("run plan-mapper");
    assert!(output.status.success());
    let plan: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(plan["name"], "UxROM");
    assert_eq!(plan["supported"], true);
    let slots = plan["slots"].as_array().expect("slots");
    assert_eq!(slots.len(), 4);
    assert_eq!(slots[3]["upper"], 7);
}

#[test]
fn plan_mapper_reports_unsupported_mapper() {
    cargo_bin_cmd!("rompipe")
        .args(["plan-mapper", "--mapper", "9", "--prg-banks", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UNSUPPORTED"));
}

#[test]
fn plan_mapper_reads_catalog_manifest() {
    let dir = tempdir().expect("tempdir");
    let catalog = common::write_catalog(dir.path());

    cargo_bin_cmd!("rompipe")
        .arg("plan-mapper")
        .arg("--catalog")
        .arg(&catalog)
        .arg("--stub")
        .assert()
        .success()
        .stdout(predicate::str::contains("Mapper 2 (UxROM)"))
        .stdout(predicate::str::contains("Slots (1):"));
}

#[test]
fn plan_mapper_needs_a_source() {
    cargo_bin_cmd!("rompipe")
        .arg("plan-mapper")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pass --catalog"));

    cargo_bin_cmd!("rompipe")
        .args(["plan-mapper", "--catalog", "x", "--mapper", "1"])
        .assert()
        .failure();
}

#[test]
fn inspect_commands_run_in_process() {
    resolve_command(&[0x2000, 0x0000], false).expect("resolve");
    plan_mapper_command(PlanSource::Manual { mapper: 1, prg_banks: 8, chr_rom: true }, true, false)
        .expect("plan mmc1");
    let err = plan_mapper_command(PlanSource::Manual { mapper: 1, prg_banks: 0, chr_rom: false }, false, true)
        .expect_err("zero banks");
    assert!(err.to_string().contains("--prg-banks must be at least 1"));
    let err = plan_mapper_command(PlanSource::Catalog("/no/such/catalog".into()), false, false)
        .expect_err("missing catalog");
    assert!(err.to_string().contains("Failed to load catalog"));
}
