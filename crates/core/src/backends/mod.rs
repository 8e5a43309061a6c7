//! External tool adapters.
//!
//! The pipeline only sees the [`Toolchain`] and
//! [`TranslationOracle`](crate::oracle::TranslationOracle) traits; the
//! implementations here shell out to real programs.

pub mod ca65;
pub mod command_oracle;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ca65::Ca65Toolchain;
pub use command_oracle::CommandOracle;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Toolchain program not found or not runnable: {0}")]
    MissingTool(String),
    #[error("Assembler rejected source: {0}")]
    Assemble(String),
    #[error("Linker failed: {0}")]
    Link(String),
    #[error("Toolchain I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs for a full assemble-and-link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub name: String,
    pub source: String,
    pub linker_config: String,
}

/// Assemble-and-link toolchain for the target CPU.
pub trait Toolchain: Send + Sync {
    /// Report the tool version, failing when the tools are not usable.
    fn probe(&self) -> Result<String, ToolchainError>;
    /// Assemble `source` without linking.
    fn check(&self, source: &str) -> Result<(), ToolchainError>;
    /// Assemble and link, returning the raw image.
    fn build(&self, job: &BuildJob) -> Result<Vec<u8>, ToolchainError>;
    fn name(&self) -> &'static str;
}

/// Configured tool locations; `None` means look up the default name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainPaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembler: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linker: Option<PathBuf>,
}

/// Registry for toolchains; callers select by name.
#[derive(Default)]
pub struct ToolchainRegistry {
    toolchains: HashMap<String, Box<dyn Toolchain>>,
}

impl ToolchainRegistry {
    pub fn new() -> Self {
        Self { toolchains: HashMap::new() }
    }

    pub fn register<T: Toolchain + 'static>(&mut self, toolchain: T) -> &mut Self {
        self.toolchains.insert(toolchain.name().to_string(), Box::new(toolchain));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Toolchain> {
        self.toolchains.get(name).map(|t| &**t)
    }

    /// Sorted names for error messages and help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.toolchains.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Registry populated with every built-in toolchain, using `paths` where set.
pub fn default_toolchain_registry(paths: &ToolchainPaths) -> ToolchainRegistry {
    let mut registry = ToolchainRegistry::new();
    registry.register(Ca65Toolchain::from_paths(paths));
    registry
}

/// Default toolchain name.
pub const DEFAULT_TOOLCHAIN: &str = "ca65";
