//! End-to-end port: catalog in, image and report out.
//!
//! Stages run in order and are timed individually. Recoverable failures are
//! collected in the report; fatal ones stop the run, but the report is still
//! produced so the whole failure surface is visible.

pub mod spec;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::backends::{BuildJob, Toolchain};
use crate::catalog::{load_catalog, CatalogError, LoadedCatalog};
use crate::mapper::{self, MapperPlan, PlannerInput};
use crate::oracle::{OracleAdapter, TranslationLog};
use crate::report::{
    classify, Fidelity, ImageSummary, MapperSummary, RunReport, Stage, StageRecord, UnitSummary,
};
use crate::rom::{self, HeaderFields, MasterAssembly, RomError, RomImage};
use crate::translate::{TranslateConfig, TranslationOutput, TranslationPass};

pub use spec::{load_port_spec, PortSpec};

pub const REPORT_FILE: &str = "report.json";
pub const LOG_FILE: &str = "translation_log.json";
pub const SOURCE_FILE: &str = "main.s";
pub const LINKER_CONFIG_FILE: &str = "rom.cfg";
pub const DEFAULT_TITLE: &str = "ROMPIPE PORT";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error("Failed to read port spec {path}: {source}")]
    SpecIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse port spec {path}: {message}")]
    SpecParse { path: PathBuf, message: String },
    #[error("Invalid port spec: {0}")]
    InvalidSpec(String),
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Everything one run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PortOptions {
    pub name: String,
    pub catalog_dir: PathBuf,
    /// Directory receiving the image and its side files.
    pub output_dir: PathBuf,
    pub title: String,
    pub translate: TranslateConfig,
}

impl PortOptions {
    pub fn image_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.sfc", self.name))
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }
}

/// Result of a run. `image` is present only when finalize succeeded.
#[derive(Debug)]
pub struct PortOutcome {
    pub report: RunReport,
    pub image: Option<RomImage>,
    pub assembly: Option<MasterAssembly>,
}

impl PortOutcome {
    pub fn fidelity(&self) -> Fidelity {
        self.report.fidelity
    }
}

/// Runs the stages against a toolchain and oracle.
pub struct PortRunner<'a> {
    pub toolchain: &'a dyn Toolchain,
    pub adapter: &'a OracleAdapter,
}

struct RunState {
    report: RunReport,
    catalog_failed: bool,
    build_failed: bool,
}

impl RunState {
    fn record(&mut self, stage: Stage, started: Instant, success: bool, detail: Option<String>) {
        self.report.stages.push(StageRecord {
            stage,
            success,
            elapsed_ms: started.elapsed().as_millis() as u64,
            detail,
        });
    }

    fn fail(&mut self, stage: Stage, started: Instant, message: String) {
        error!(stage = stage.as_str(), "{message}");
        self.record(stage, started, false, Some(message.clone()));
        self.report.error = Some(message);
    }
}

impl<'a> PortRunner<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, adapter: &'a OracleAdapter) -> Self {
        Self { toolchain, adapter }
    }

    /// Run every stage. Artifacts are written under `options.output_dir`; the
    /// image only when the run got through finalize.
    pub fn run(&self, options: &PortOptions) -> PortOutcome {
        let mut state = RunState {
            report: RunReport {
                name: options.name.clone(),
                started_at: Utc::now().to_rfc3339(),
                finished_at: String::new(),
                catalog_hash: None,
                mapper: None,
                unsupported: None,
                stages: Vec::new(),
                summary: UnitSummary::default(),
                warnings: Vec::new(),
                error: None,
                fidelity: Fidelity::TranslationFailure,
                image: None,
                log: Vec::new(),
            },
            catalog_failed: false,
            build_failed: false,
        };
        let log = TranslationLog::new();
        let (image, assembly) = self.stages(options, &mut state, &log);

        let RunState { mut report, catalog_failed, build_failed } = state;
        report.log = log.entries();
        report.fidelity =
            classify(report.unsupported.is_some(), build_failed, catalog_failed, &report.summary);
        report.finished_at = Utc::now().to_rfc3339();

        if let Err(e) = write_side_files(options, &report, &log, assembly.as_ref(), image.is_some()) {
            warn!("{e}");
            report.warnings.push(e.to_string());
        }
        info!(name = %report.name, fidelity = %report.fidelity, "port finished");
        PortOutcome { report, image, assembly }
    }

    fn stages(
        &self,
        options: &PortOptions,
        state: &mut RunState,
        log: &TranslationLog,
    ) -> (Option<RomImage>, Option<MasterAssembly>) {
        let started = Instant::now();
        let LoadedCatalog { catalog, digest } = match load_catalog(&options.catalog_dir) {
            Ok(loaded) => loaded,
            Err(e) => {
                state.catalog_failed = true;
                state.fail(Stage::LoadCatalog, started, e.to_string());
                return (None, None);
            }
        };
        state.report.catalog_hash = Some(digest.combined());
        state.record(
            Stage::LoadCatalog,
            started,
            true,
            Some(format!(
                "{} functions, {} banks, {} register sites",
                catalog.functions.len(),
                catalog.listings.len(),
                catalog.sites.len()
            )),
        );

        let started = Instant::now();
        let plan = plan_for(&catalog.manifest);
        state.report.mapper = Some(MapperSummary::from(&plan));
        if let Some(unsupported) = &plan.unsupported {
            warn!(mapper = unsupported.id, "{}", unsupported.reason);
            state.report.warnings.push(unsupported.reason.clone());
            state.report.unsupported = Some(unsupported.clone());
        }
        state.record(
            Stage::PlanMapper,
            started,
            true,
            Some(format!("{} into {} slot(s)", plan.name, plan.slots.len())),
        );

        let started = Instant::now();
        let pass =
            TranslationPass::new(&catalog, &plan, self.toolchain, self.adapter, &options.translate);
        let output: TranslationOutput = pass.run(log);
        state.report.summary = UnitSummary::from_output(&output);
        state.report.warnings.extend(output.warnings.iter().cloned());
        let summary = state.report.summary;
        state.record(
            Stage::Translate,
            started,
            true,
            Some(format!(
                "{} units: {} deterministic, {} oracle, {} fallback",
                summary.total(),
                summary.deterministic,
                summary.oracle_accepted,
                summary.fallback
            )),
        );

        let started = Instant::now();
        let linked_len = rom::physical_banks(&plan) * mapper::TARGET_SLOT_SIZE;
        let header = HeaderFields::new(&options.title, catalog.manifest.battery_backed, linked_len);
        let assembly = rom::master_assembly(&plan, &output.units, &catalog.manifest.vectors, &header);
        state.report.warnings.extend(assembly.warnings.iter().cloned());
        let job = BuildJob {
            name: options.name.clone(),
            source: assembly.source.clone(),
            linker_config: assembly.linker_config.clone(),
        };
        let raw = match self.toolchain.build(&job) {
            Ok(raw) => raw,
            Err(e) => {
                state.build_failed = true;
                state.fail(Stage::Assemble, started, e.to_string());
                return (None, Some(assembly));
            }
        };
        state.record(
            Stage::Assemble,
            started,
            true,
            Some(format!("{} bytes linked by {}", raw.len(), self.toolchain.name())),
        );

        let started = Instant::now();
        let image = match rom::finalize(raw, &header) {
            Ok(image) => image,
            Err(e) => {
                state.build_failed = true;
                state.fail(Stage::Finalize, started, e.to_string());
                return (None, Some(assembly));
            }
        };
        let path = options.image_path();
        if let Err(e) = rom::write_image(&path, &image) {
            state.build_failed = true;
            state.fail(Stage::Finalize, started, e.to_string());
            return (None, Some(assembly));
        }
        state.report.image = Some(ImageSummary {
            path: path.display().to_string(),
            size: image.len(),
            sha256: crate::catalog::sha256_hex(image.bytes()),
            checksum: image.checksum(),
            complement: image.complement(),
        });
        state.record(
            Stage::Finalize,
            started,
            true,
            Some(format!("{} bytes, checksum ${:04X}", image.len(), image.checksum())),
        );
        (Some(image), Some(assembly))
    }
}

/// Plan for the manifest's mapper.
pub fn plan_for(manifest: &crate::model::RomManifest) -> MapperPlan {
    mapper::plan(&PlannerInput {
        mapper_id: manifest.mapper_id,
        prg_banks: manifest.prg_banks,
        fixed_last: mapper::lookup(manifest.mapper_id).map_or(true, |spec| spec.fixed_last),
        has_chr_rom: manifest.has_chr_rom(),
    })
}

fn write_side_files(
    options: &PortOptions,
    report: &RunReport,
    log: &TranslationLog,
    assembly: Option<&MasterAssembly>,
    built: bool,
) -> PipelineResult<()> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PipelineError::Io { path, source }
    };
    let report_path = options.report_path();
    report.write_json(&report_path).map_err(io(&report_path))?;
    let log_path = options.output_dir.join(LOG_FILE);
    let json = log.to_json().map_err(|e| PipelineError::Io {
        path: log_path.clone(),
        source: std::io::Error::other(e),
    })?;
    std::fs::write(&log_path, json).map_err(io(&log_path))?;
    if let (Some(assembly), true) = (assembly, built) {
        let source_path = options.output_dir.join(SOURCE_FILE);
        std::fs::write(&source_path, &assembly.source).map_err(io(&source_path))?;
        let cfg_path = options.output_dir.join(LINKER_CONFIG_FILE);
        std::fs::write(&cfg_path, &assembly.linker_config).map_err(io(&cfg_path))?;
    }
    Ok(())
}
