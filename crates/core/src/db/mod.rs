//! Project configuration, on-disk layout, and the SQLite run history.
//!
//! - `ProjectConfig`: serializable project metadata, toolchain and oracle settings.
//! - `ProjectLayout`: computed paths for project directories/files.
//! - `ProjectDb`: a small SQLite wrapper recording port runs and their
//!   translation logs.

pub mod config;
pub mod context;
pub mod layout;
pub mod models;
pub mod project_db;
pub mod util;

pub use config::{DbConfig, OracleConfig, ProjectConfig};
pub use context::ProjectContext;
pub use layout::ProjectLayout;
pub use models::{PortRunRecord, StoredLogEntry};
pub use project_db::{DbError, DbResult, ProjectDb, CURRENT_SCHEMA_VERSION};
pub use util::{load_project_config, open_project_db, save_project_config};
