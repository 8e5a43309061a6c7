use anyhow::Result;
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::print_json;
use rompipe_core::backends::{default_toolchain_registry, ToolchainPaths};
use rompipe_core::db::{load_project_config, ProjectLayout};

#[derive(Debug, Serialize)]
pub struct ToolchainInfo {
    pub name: String,
    pub description: String,
    /// Probe result; `None` when the tools could not be run.
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// List known toolchains and whether they can be run. Project paths are used
/// when `root` holds a project.
pub fn list_toolchains_command(root: &str, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let paths = if layout.project_config_path.is_file() {
        load_project_config(&layout)?.toolchain
    } else {
        ToolchainPaths::default()
    };

    let registry = default_toolchain_registry(&paths);
    let entries: Vec<ToolchainInfo> = registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let toolchain = registry.get(&name)?;
            let description = match name.as_str() {
                "ca65" => "cc65 suite: ca65 assembler and ld65 linker (65816 mode)".to_string(),
                other => format!("Toolchain '{other}'"),
            };
            let (version, error) = match toolchain.probe() {
                Ok(version) => (version.lines().next().map(|l| l.trim().to_string()), None),
                Err(e) => (None, Some(e.to_string())),
            };
            Some(ToolchainInfo { name, description, version, error })
        })
        .collect();

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Toolchains: (none)");
        return Ok(());
    }

    println!("Toolchains:");
    for entry in entries {
        let status = match (&entry.version, &entry.error) {
            (Some(version), _) => version.clone(),
            (None, Some(error)) => format!("unavailable: {error}"),
            (None, None) => "unavailable".to_string(),
        };
        println!("- {}: {} [{}]", entry.name, entry.description, status);
    }

    Ok(())
}
