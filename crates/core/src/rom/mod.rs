//! ROM assembler and validator.
//!
//! Lays out the finalized units into one master assembly, hands it to the
//! toolchain, and applies the post-link header fixups. The stage is strictly
//! sequential and either produces a complete image or nothing.

pub mod header;
pub mod image;
pub mod layout;

use std::path::PathBuf;

use thiserror::Error;

use crate::backends::ToolchainError;

pub use header::HeaderFields;
pub use image::{additive_checksum, finalize, sentinel_checksum, verify_checksum, write_image, RomImage};
pub use layout::{linker_config, master_assembly, physical_banks, MasterAssembly};

#[derive(Debug, Error)]
pub enum RomError {
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error("Linked image is only {len} bytes")]
    TooSmall { len: usize },
    #[error("Header {field} mismatch: expected {expected}, found {found}")]
    HeaderMismatch { field: &'static str, expected: String, found: String },
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type RomResult<T> = Result<T, RomError>;
