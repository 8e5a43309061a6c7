use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backends::{ToolchainPaths, DEFAULT_TOOLCHAIN};
use crate::oracle::{OracleScope, DEFAULT_ORACLE_TIMEOUT};

/// Location of the project database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Path to the project database file (typically relative to project root).
    pub path: String,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_ORACLE_TIMEOUT.as_secs()
}

/// External translator invoked for functions the rewrite engine cannot finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Program receiving one JSON request on stdin. `None` disables the oracle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub scope: OracleScope,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            scope: OracleScope::default(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Serializable configuration describing a rompipe project.
///
/// Lives at `.rompipe/project.json` in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Human-friendly project name.
    pub name: String,
    /// Optional description / notes.
    pub description: Option<String>,
    /// Schema/config version. This is about the config format, not the ROM.
    pub config_version: String,
    /// Database configuration (path is typically relative to project root).
    pub db: DbConfig,
    /// Toolchain used when a run does not name one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_toolchain: Option<String>,
    #[serde(default)]
    pub toolchain: ToolchainPaths,
    /// Version string reported by the toolchain at setup time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain_version: Option<String>,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Default internal title for built images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ProjectConfig {
    /// Create a new project configuration using the given name and db path.
    pub fn new(name: impl Into<String>, db_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            config_version: "0.1.0".to_string(),
            db: DbConfig::new(db_path),
            default_toolchain: None,
            toolchain: ToolchainPaths::default(),
            toolchain_version: None,
            oracle: OracleConfig::default(),
            workers: None,
            title: None,
        }
    }

    pub fn toolchain_name(&self) -> &str {
        self.default_toolchain.as_deref().unwrap_or(DEFAULT_TOOLCHAIN)
    }
}
