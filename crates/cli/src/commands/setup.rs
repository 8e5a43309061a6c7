use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

use crate::canonicalize_or_current;
use crate::commands::load_project_config;
use rompipe_core::backends::{Ca65Toolchain, Toolchain};
use rompipe_core::db::{save_project_config, ProjectLayout};
use rompipe_core::oracle::OracleScope;

/// Settings accepted by `setup-toolchain`.
#[derive(Debug, Default, Clone)]
pub struct SetupOptions {
    pub assembler: Option<String>,
    pub linker: Option<String>,
    pub set_default: bool,
    pub oracle_command: Option<String>,
    pub oracle_args: Vec<String>,
    pub oracle_timeout: Option<u64>,
    pub oracle_scope: Option<OracleScope>,
    pub workers: Option<usize>,
    pub title: Option<String>,
}

/// Locate and probe the cc65 tools, then record them (and any oracle
/// settings) in the project config.
pub fn setup_toolchain_command(root: &str, options: SetupOptions) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let mut config = load_project_config(&layout)?;

    let assembler = resolve_tool(options.assembler, "CA65_BIN", "ca65")?;
    let linker = resolve_tool(options.linker, "LD65_BIN", "ld65")?;
    println!("Found ca65 at {}", assembler.display());
    println!("Found ld65 at {}", linker.display());

    let toolchain = Ca65Toolchain::new(&assembler, &linker);
    let version = toolchain.probe()?;
    let version = version.lines().next().unwrap_or_default().trim().to_string();
    println!("Toolchain version: {version}");

    config.toolchain.assembler = Some(assembler);
    config.toolchain.linker = Some(linker);
    config.toolchain_version = Some(version);
    if options.set_default {
        config.default_toolchain = Some(toolchain.name().to_string());
        println!("Set default_toolchain to {}", toolchain.name());
    }

    if let Some(command) = options.oracle_command {
        if command.trim().is_empty() {
            config.oracle.command = None;
            config.oracle.args.clear();
            println!("Oracle disabled");
        } else {
            println!("Oracle command: {command}");
            config.oracle.command = Some(command);
            config.oracle.args = options.oracle_args;
        }
    }
    if let Some(timeout) = options.oracle_timeout {
        if timeout == 0 {
            return Err(anyhow!("--oracle-timeout must be at least 1 second"));
        }
        config.oracle.timeout_secs = timeout;
    }
    if let Some(scope) = options.oracle_scope {
        config.oracle.scope = scope;
    }
    if let Some(workers) = options.workers {
        if workers == 0 {
            return Err(anyhow!("--workers must be at least 1"));
        }
        config.workers = Some(workers);
    }
    if let Some(title) = options.title {
        config.title = Some(title);
    }

    save_project_config(&layout, &config)?;
    println!("Updated project config at {}", layout.project_config_path.display());

    Ok(())
}

/// Explicit path, then the environment override, then `PATH`.
fn resolve_tool(explicit: Option<String>, env_var: &str, name: &str) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = PathBuf::from(path);
        validate_executable(&path, name)?;
        return Ok(path);
    }
    if let Some(path) = env::var_os(env_var).map(PathBuf::from) {
        validate_executable(&path, name)?;
        return Ok(path);
    }
    let exe_name = if cfg!(windows) { format!("{name}.exe") } else { name.to_string() };
    find_in_path(&exe_name)
        .ok_or_else(|| anyhow!("Could not find {name}. Install cc65 or set {env_var}"))
}

fn validate_executable(path: &Path, name: &str) -> Result<()> {
    if !path.is_file() {
        return Err(anyhow!("{} not found at {}", name, path.display()));
    }
    Ok(())
}

fn find_in_path(executable: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).map(|p| p.join(executable)).find(|candidate| candidate.is_file())
    })
}
