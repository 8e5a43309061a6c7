//! rompipe-core
//!
//! Core library for porting NES program code to the SNES.
//!
//! This crate defines the disassembly model and its loader, the register
//! access resolver, the deterministic rewrite engine, the translation oracle
//! adapter, the mapper bank planner, and the ROM assembler/validator, plus the
//! pipeline that strings them together and the project database recording
//! each run.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends.

pub mod model;
pub mod catalog;
pub mod hardware;
pub mod rewrite;
pub mod mapper;
pub mod oracle;
pub mod translate;
pub mod rom;
pub mod report;
pub mod pipeline;
pub mod db;
pub mod backends;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
