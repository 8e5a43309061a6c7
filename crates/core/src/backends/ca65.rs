use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::tempdir;
use tracing::debug;

use super::{BuildJob, Toolchain, ToolchainError, ToolchainPaths};

/// cc65 suite: `ca65` assembles, `ld65` links. Each call works in its own
/// temporary directory.
#[derive(Debug, Clone)]
pub struct Ca65Toolchain {
    assembler: PathBuf,
    linker: PathBuf,
}

impl Default for Ca65Toolchain {
    fn default() -> Self {
        Self::from_paths(&ToolchainPaths::default())
    }
}

impl Ca65Toolchain {
    pub fn new(assembler: impl Into<PathBuf>, linker: impl Into<PathBuf>) -> Self {
        Self { assembler: assembler.into(), linker: linker.into() }
    }

    /// Configured paths first, then `CA65_BIN` / `LD65_BIN`, then `PATH`.
    pub fn from_paths(paths: &ToolchainPaths) -> Self {
        let assembler = paths.assembler.clone().unwrap_or_else(|| env_or("CA65_BIN", "ca65"));
        let linker = paths.linker.clone().unwrap_or_else(|| env_or("LD65_BIN", "ld65"));
        Self { assembler, linker }
    }

    pub fn assembler(&self) -> &Path {
        &self.assembler
    }

    pub fn linker(&self) -> &Path {
        &self.linker
    }

    fn assemble(&self, source: &Path, object: &Path) -> Result<(), ToolchainError> {
        let output = run(
            Command::new(&self.assembler).args(["--cpu", "65816", "-o"]).arg(object).arg(source),
            &self.assembler,
        )?;
        if !output.status.success() {
            return Err(ToolchainError::Assemble(diagnostics(&output)));
        }
        Ok(())
    }
}

impl Toolchain for Ca65Toolchain {
    fn probe(&self) -> Result<String, ToolchainError> {
        // Allow tests to skip the real tools.
        if let Some(fake) = std::env::var_os("ROMPIPE_FAKE_TOOLCHAIN_VERSION") {
            return Ok(fake.to_string_lossy().to_string());
        }
        let output = run(Command::new(&self.assembler).arg("--version"), &self.assembler)?;
        // ca65 prints its version on stderr.
        let text = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let version = text.trim().to_string();
        if !output.status.success() || version.is_empty() {
            return Err(ToolchainError::MissingTool(format!(
                "{} --version exited with {}",
                self.assembler.display(),
                output.status
            )));
        }
        run(Command::new(&self.linker).arg("--version"), &self.linker)?;
        Ok(version)
    }

    fn check(&self, source: &str) -> Result<(), ToolchainError> {
        let dir = tempdir()?;
        let source_path = dir.path().join("check.s");
        fs::write(&source_path, source)?;
        self.assemble(&source_path, &dir.path().join("check.o"))
    }

    fn build(&self, job: &BuildJob) -> Result<Vec<u8>, ToolchainError> {
        let dir = tempdir()?;
        let source_path = dir.path().join(format!("{}.s", job.name));
        let object_path = dir.path().join(format!("{}.o", job.name));
        let config_path = dir.path().join(format!("{}.cfg", job.name));
        let image_path = dir.path().join(format!("{}.sfc", job.name));
        fs::write(&source_path, &job.source)?;
        fs::write(&config_path, &job.linker_config)?;

        debug!(assembler = %self.assembler.display(), "assembling {}", source_path.display());
        self.assemble(&source_path, &object_path)?;

        debug!(linker = %self.linker.display(), "linking {}", image_path.display());
        let output = run(
            Command::new(&self.linker)
                .arg("-C")
                .arg(&config_path)
                .arg("-o")
                .arg(&image_path)
                .arg(&object_path),
            &self.linker,
        )?;
        if !output.status.success() {
            return Err(ToolchainError::Link(diagnostics(&output)));
        }
        if !image_path.is_file() {
            return Err(ToolchainError::Link(format!(
                "{} produced no image",
                self.linker.display()
            )));
        }
        Ok(fs::read(&image_path)?)
    }

    fn name(&self) -> &'static str {
        "ca65"
    }
}

fn env_or(var: &str, default: &str) -> PathBuf {
    std::env::var_os(var).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

fn run(command: &mut Command, program: &Path) -> Result<Output, ToolchainError> {
    command
        .output()
        .map_err(|e| ToolchainError::MissingTool(format!("failed to spawn {}: {e}", program.display())))
}

fn diagnostics(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}
