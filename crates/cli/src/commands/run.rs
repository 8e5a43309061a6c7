use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::canonicalize_or_current;
use rompipe_core::db::{PortRunRecord, ProjectContext};
use rompipe_core::oracle::OracleAdapter;
use rompipe_core::pipeline::{load_port_spec, PortOptions, PortRunner, DEFAULT_TITLE};
use rompipe_core::report::Fidelity;
use rompipe_core::translate::{TranslateConfig, DEFAULT_WORKERS};

pub const SPEC_COPY_FILE: &str = "spec.yaml";
pub const RUN_METADATA_FILE: &str = "run_metadata.json";

/// Bookkeeping written next to the outputs of every run.
#[derive(Debug, Serialize, Deserialize)]
pub struct PortRunMetadata {
    pub name: String,
    pub run_id: i64,
    pub spec_hash: String,
    pub catalog_hash: Option<String>,
    pub toolchain: String,
    pub toolchain_version: Option<String>,
    pub oracle: Option<String>,
    pub fidelity: Fidelity,
    pub started_at: String,
    pub finished_at: String,
}

/// Flags of `run` that override the spec and project config.
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub toolchain: Option<String>,
    pub no_oracle: bool,
    pub workers: Option<usize>,
    pub force: bool,
}

/// Run a port spec end to end and organize outputs under `output/<name>/`.
pub fn run_port_command(root: &str, file: &str, overrides: RunOverrides) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let ctx = ProjectContext::from_root(&root_path)?;
    let layout = &ctx.layout;

    // Load port spec (supports YAML or JSON based on extension).
    let spec_path = layout.resolve(file);
    let (spec, spec_hash) = load_port_spec(&spec_path)
        .with_context(|| format!("Failed to load port spec at {}", spec_path.display()))?;

    // Prepare output directory.
    let run_output_root = layout.run_output_root(&spec.name);
    if run_output_root.exists() {
        if overrides.force {
            fs::remove_dir_all(&run_output_root).with_context(|| {
                format!("Failed to clean existing run output dir {}", run_output_root.display())
            })?;
        } else {
            return Err(anyhow!(
                "Run output already exists at {} (rerun with --force to overwrite)",
                run_output_root.display()
            ));
        }
    }
    fs::create_dir_all(&run_output_root).with_context(|| {
        format!("Failed to create run output dir {}", run_output_root.display())
    })?;

    // Choose toolchain (CLI override > project default).
    let toolchains = ctx.toolchains();
    let toolchain_name =
        overrides.toolchain.clone().unwrap_or_else(|| ctx.config.toolchain_name().to_string());
    let toolchain = toolchains.get(&toolchain_name).ok_or_else(|| {
        anyhow!("Toolchain '{}' not found (available: {:?})", toolchain_name, toolchains.names())
    })?;
    let toolchain_version = match toolchain.probe() {
        Ok(version) => version.lines().next().map(|l| l.trim().to_string()),
        Err(e) => {
            // The run still goes ahead so the report records the failure.
            warn!(toolchain = %toolchain_name, "toolchain probe failed: {e}");
            None
        }
    };

    let adapter =
        if overrides.no_oracle { OracleAdapter::disabled() } else { ctx.oracle_adapter()? };

    // Resolve defaults, then persist normalized spec copy.
    let mut spec_copy = spec;
    let title = spec_copy
        .title
        .clone()
        .or_else(|| ctx.config.title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let scope = spec_copy.oracle_scope.unwrap_or(ctx.config.oracle.scope);
    let workers = overrides
        .workers
        .or(spec_copy.workers)
        .or(ctx.config.workers)
        .unwrap_or(DEFAULT_WORKERS);
    if workers == 0 {
        return Err(anyhow!("--workers must be at least 1"));
    }
    spec_copy.title = Some(title.clone());
    spec_copy.oracle_scope = Some(scope);
    spec_copy.workers = Some(workers);
    let normalized_spec_path = run_output_root.join(SPEC_COPY_FILE);
    let yaml = serde_yaml::to_string(&spec_copy).context("Failed to serialize port spec")?;
    fs::write(&normalized_spec_path, yaml).with_context(|| {
        format!("Failed to write normalized spec to {}", normalized_spec_path.display())
    })?;

    let options = PortOptions {
        name: spec_copy.name.clone(),
        catalog_dir: spec_copy.catalog_dir(&layout.root),
        output_dir: run_output_root.clone(),
        title,
        translate: TranslateConfig { workers, scope, ram_code: spec_copy.ram_code_ranges()? },
    };
    info!(name = %options.name, catalog = %options.catalog_dir.display(), "starting port");
    let outcome = PortRunner::new(toolchain, &adapter).run(&options);
    let report = &outcome.report;

    // Keep a copy of every report under reports/.
    let report_copy = layout.reports_dir.join(format!("{}.json", report.name));
    report
        .write_json(&report_copy)
        .with_context(|| format!("Failed to write report copy at {}", report_copy.display()))?;

    // Record the run and its translation log.
    let oracle_name = adapter.oracle_name().map(str::to_string);
    let record =
        PortRunRecord::from_report(report, &spec_hash, &toolchain_name, oracle_name.clone());
    let run_id = ctx.db.insert_port_run(&record).context("Failed to record port run")?;
    ctx.db
        .insert_translation_log(run_id, &report.log)
        .context("Failed to record translation log")?;

    let metadata = PortRunMetadata {
        name: report.name.clone(),
        run_id,
        spec_hash,
        catalog_hash: report.catalog_hash.clone(),
        toolchain: toolchain_name,
        toolchain_version,
        oracle: oracle_name,
        fidelity: report.fidelity,
        started_at: report.started_at.clone(),
        finished_at: report.finished_at.clone(),
    };
    let metadata_path = run_output_root.join(RUN_METADATA_FILE);
    fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("Failed to write run metadata at {}", metadata_path.display()))?;

    print_summary(&options, &outcome.report, run_id, &run_output_root);

    if !report.fidelity.has_image() {
        return Err(anyhow!(
            "Port '{}' finished with {}{}",
            report.name,
            report.fidelity,
            report.error.as_deref().map(|e| format!(": {e}")).unwrap_or_default()
        ));
    }
    Ok(())
}

fn print_summary(
    options: &PortOptions,
    report: &rompipe_core::report::RunReport,
    run_id: i64,
    output: &Path,
) {
    println!("Ran port: {} (run {run_id})", report.name);
    if let Some(mapper) = &report.mapper {
        println!("  Mapper: {} ({})", mapper.id, mapper.name);
    }
    let summary = &report.summary;
    println!(
        "  Units: {} ({} deterministic, {} oracle, {} fallback)",
        summary.total(),
        summary.deterministic,
        summary.oracle_accepted,
        summary.fallback
    );
    println!("  Fidelity: {}", report.fidelity);
    for warning in &report.warnings {
        println!("  Warning: {warning}");
    }
    if let Some(image) = &report.image {
        println!("  Image: {} ({} bytes, sha256 {})", options.image_path().display(), image.size, image.sha256);
    }
    println!("  Output: {}", output.display());
}
