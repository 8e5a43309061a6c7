use std::path::{Path, PathBuf};

/// Logical layout of a project on disk.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
/// The CLI or other frontends are responsible for actually creating directories
/// and files based on this layout.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Root directory of the project.
    pub root: PathBuf,
    /// Directory for internal metadata (.rompipe).
    pub meta_dir: PathBuf,
    /// Path to the project config file (JSON).
    pub project_config_path: PathBuf,
    /// Path to the project database file.
    pub db_path: PathBuf,
    /// Directory holding disassembly catalogs (disasm).
    pub disasm_dir: PathBuf,
    /// Directory for port specs (ports).
    pub ports_dir: PathBuf,
    /// Scratch directory for toolchain inputs (build).
    pub build_dir: PathBuf,
    /// Directory for per-run outputs (output).
    pub output_dir: PathBuf,
    /// Directory for structured reports (reports).
    pub reports_dir: PathBuf,
}

impl ProjectLayout {
    /// Compute the default layout for a project rooted at `root`.
    ///
    /// This does *not* touch the filesystem.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".rompipe");
        let project_config_path = meta_dir.join("project.json");
        let db_path = meta_dir.join("project.db");
        let disasm_dir = root.join("disasm");
        let ports_dir = root.join("ports");
        let build_dir = root.join("build");
        let output_dir = root.join("output");
        let reports_dir = root.join("reports");

        Self {
            root,
            meta_dir,
            project_config_path,
            db_path,
            disasm_dir,
            ports_dir,
            build_dir,
            output_dir,
            reports_dir,
        }
    }

    /// Directories `init-project` creates, with display labels.
    pub fn directories(&self) -> [(&'static str, &Path); 6] {
        [
            ("Meta dir (.rompipe)", &self.meta_dir),
            ("Disassembly dir", &self.disasm_dir),
            ("Ports dir", &self.ports_dir),
            ("Build dir", &self.build_dir),
            ("Output dir", &self.output_dir),
            ("Reports dir", &self.reports_dir),
        ]
    }

    /// Compute a database path string suitable for storing in `ProjectConfig`,
    /// typically as a path relative to `root`.
    pub fn db_path_relative_string(&self) -> String {
        match self.db_path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => self.db_path.to_string_lossy().to_string(),
        }
    }

    /// Output directory of one named run.
    pub fn run_output_root(&self, run_name: &str) -> PathBuf {
        self.output_dir.join(run_name)
    }

    /// Resolve a path given on the command line or in a spec against the root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
