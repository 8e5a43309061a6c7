use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::commands::{open_project_db, print_dir_status, print_json};
use crate::{canonicalize_or_current, infer_project_name};
use rompipe_core::backends::{default_toolchain_registry, ToolchainPaths};
use rompipe_core::db::{save_project_config, OracleConfig, PortRunRecord, ProjectConfig, ProjectLayout};

#[derive(Serialize)]
pub struct ProjectInfoSnapshot {
    pub name: String,
    pub root: String,
    pub config_file: String,
    pub config_version: String,
    pub db_path: String,
    pub schema_version: i32,
    pub toolchain: String,
    pub available_toolchains: Vec<String>,
    pub toolchain_paths: ToolchainPaths,
    pub toolchain_version: Option<String>,
    pub oracle: OracleConfig,
    pub layout: ProjectInfoLayout,
    pub port_runs: Vec<PortRunRecord>,
}

#[derive(Serialize)]
pub struct ProjectInfoLayout {
    pub meta_dir: String,
    pub disasm_dir: String,
    pub ports_dir: String,
    pub build_dir: String,
    pub output_dir: String,
    pub reports_dir: String,
}

/// Initialize a new project at `root`.
pub fn init_project_command(root: &str, name: Option<String>) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);

    // Derive project name if not provided.
    let project_name = match name {
        Some(n) => n,
        None => infer_project_name(&root_path),
    };

    for (label, dir) in layout.directories() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}: {}", label.to_lowercase(), dir.display()))?;
    }

    // Keep an existing config (and its settings) when re-initializing.
    let config = if layout.project_config_path.is_file() {
        crate::commands::load_project_config(&layout)?
    } else {
        let config = ProjectConfig::new(&project_name, layout.db_path_relative_string());
        save_project_config(&layout, &config)?;
        config
    };

    // Create the project database immediately so follow-on commands (and tests)
    // can rely on its presence.
    rompipe_core::db::ProjectDb::open(&layout.db_path).with_context(|| {
        format!("Failed to initialize project database at {}", layout.db_path.display())
    })?;

    println!("Initialized rompipe project:");
    println!("  Name: {}", config.name);
    println!("  Root: {}", layout.root.display());
    println!("  Config: {}", layout.project_config_path.display());
    println!("  DB path (relative): {}", config.db.path);
    println!("  Disassembly dir: {}", layout.disasm_dir.display());
    println!("  Ports dir: {}", layout.ports_dir.display());
    println!("  Output dir: {}", layout.output_dir.display());

    Ok(())
}

/// Show basic information about an existing project.
pub fn project_info_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let (config, db_path, db) = open_project_db(&layout)?;
    let runs = db.list_port_runs(None).context("Failed to list port runs")?;

    if json {
        let snapshot = ProjectInfoSnapshot {
            name: config.name.clone(),
            root: layout.root.display().to_string(),
            config_file: layout.project_config_path.display().to_string(),
            config_version: config.config_version.clone(),
            db_path: db_path.display().to_string(),
            schema_version: db.schema_version()?,
            toolchain: config.toolchain_name().to_string(),
            available_toolchains: default_toolchain_registry(&config.toolchain).names(),
            toolchain_paths: config.toolchain.clone(),
            toolchain_version: config.toolchain_version.clone(),
            oracle: config.oracle.clone(),
            layout: ProjectInfoLayout {
                meta_dir: layout.meta_dir.display().to_string(),
                disasm_dir: layout.disasm_dir.display().to_string(),
                ports_dir: layout.ports_dir.display().to_string(),
                build_dir: layout.build_dir.display().to_string(),
                output_dir: layout.output_dir.display().to_string(),
                reports_dir: layout.reports_dir.display().to_string(),
            },
            port_runs: runs.into_iter().map(|(_, run)| run).collect(),
        };
        return print_json(&snapshot);
    }

    println!("rompipe Project Info");
    println!("====================");
    println!("Name: {}", config.name);
    println!("Root: {}", layout.root.display());
    println!("Config file: {}", layout.project_config_path.display());
    println!("Config version: {}", config.config_version);
    println!("DB path: {}", db_path.display());
    println!("Toolchain: {}", config.toolchain_name());
    if let Some(version) = &config.toolchain_version {
        println!("Toolchain version: {version}");
    }
    match &config.oracle.command {
        Some(command) => println!(
            "Oracle: {command} (scope {}, timeout {}s)",
            config.oracle.scope, config.oracle.timeout_secs
        ),
        None => println!("Oracle: (disabled)"),
    }
    println!("Port runs: {}", runs.len());
    println!();

    println!("Directories:");
    for (label, dir) in layout.directories() {
        print_dir_status(label, dir);
    }

    Ok(())
}
