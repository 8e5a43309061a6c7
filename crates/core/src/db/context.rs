use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::backends::{default_toolchain_registry, CommandOracle, ToolchainRegistry};
use crate::db::{open_project_db, ProjectConfig, ProjectDb, ProjectLayout};
use crate::oracle::OracleAdapter;

/// Convenience wrapper bundling layout, config, db path, and an open ProjectDb.
#[derive(Debug)]
pub struct ProjectContext {
    pub layout: ProjectLayout,
    pub config: ProjectConfig,
    pub db_path: PathBuf,
    pub db: ProjectDb,
}

impl ProjectContext {
    /// Load project config and open the database for a given root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let layout = ProjectLayout::new(root);
        let (config, db_path, db) = open_project_db(&layout)?;
        Ok(Self { layout, config, db_path, db })
    }

    /// Built-in toolchains with the configured tool paths applied.
    pub fn toolchains(&self) -> ToolchainRegistry {
        default_toolchain_registry(&self.config.toolchain)
    }

    /// Oracle adapter from the project settings; disabled when no command is
    /// configured.
    pub fn oracle_adapter(&self) -> Result<OracleAdapter> {
        let oracle = &self.config.oracle;
        let Some(command) = oracle.command.as_deref() else {
            return Ok(OracleAdapter::disabled());
        };
        if command.trim().is_empty() {
            return Err(anyhow!("Oracle command is empty in project config"));
        }
        let program = self.layout.resolve(command);
        // Bare program names are looked up on PATH.
        let program = if program.exists() { program } else { PathBuf::from(command) };
        let backend = CommandOracle::new(program, oracle.args.clone(), oracle.timeout());
        Ok(OracleAdapter::new(Some(Arc::new(backend)), oracle.timeout()))
    }
}
