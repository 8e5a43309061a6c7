use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use rompipe::commands::{
    init_project_command, list_runs_command, list_toolchains_command, plan_mapper_command,
    project_info_command, resolve_command, run_port_command, setup_toolchain_command,
    show_log_command, PlanSource, RunOverrides, SetupOptions,
};
use rompipe::parse_address_arg;
use rompipe_core::oracle::OracleScope;

/// NES to SNES port pipeline.
///
/// This CLI is a thin wrapper around `rompipe-core` (exposed in code as
/// `rompipe_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(name = "rompipe", version, about = "Port NES program code to the SNES", long_about = None)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new rompipe project at the given root.
    ///
    /// Creates `.rompipe/` with the config and database, plus the `disasm`,
    /// `ports`, `build`, `output`, and `reports` directories.
    InitProject {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,
    },

    /// Show basic information about an existing project.
    ProjectInfo {
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Locate the cc65 tools and record them, with oracle settings, in the project config.
    SetupToolchain {
        #[arg(long, default_value = ".")]
        root: String,

        /// Path to ca65. Defaults to CA65_BIN, then PATH.
        #[arg(long)]
        assembler: Option<String>,

        /// Path to ld65. Defaults to LD65_BIN, then PATH.
        #[arg(long)]
        linker: Option<String>,

        /// Make this the project's default toolchain.
        #[arg(long, default_value_t = false)]
        set_default: bool,

        /// Translation oracle program (reads a JSON request on stdin). Empty disables it.
        #[arg(long)]
        oracle_command: Option<String>,

        /// Extra argument for the oracle program; repeatable.
        #[arg(long = "oracle-arg", allow_hyphen_values = true)]
        oracle_args: Vec<String>,

        /// Seconds to wait for one oracle answer.
        #[arg(long)]
        oracle_timeout: Option<u64>,

        /// Which functions go to the oracle: unresolved or all.
        #[arg(long)]
        oracle_scope: Option<OracleScope>,

        /// Default number of translation workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Default internal ROM title.
        #[arg(long)]
        title: Option<String>,
    },

    /// List available toolchains and whether they run.
    ListToolchains {
        #[arg(long, default_value = ".")]
        root: String,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show how a mapper's banks are packed into target banks.
    PlanMapper {
        /// Catalog directory to read the mapper and bank count from.
        #[arg(long, conflicts_with_all = ["mapper", "prg_banks"])]
        catalog: Option<String>,

        /// Mapper number.
        #[arg(long, requires = "prg_banks")]
        mapper: Option<u16>,

        /// Number of 16 KiB program banks.
        #[arg(long)]
        prg_banks: Option<u8>,

        /// The cartridge has CHR ROM.
        #[arg(long, default_value_t = false)]
        chr_rom: bool,

        /// Print the generated switch stub.
        #[arg(long, default_value_t = false)]
        stub: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Classify addresses as hardware registers; lists every register when none are given.
    Resolve {
        /// Addresses as $HHHH or 0xHHHH.
        #[arg(value_parser = parse_address_arg)]
        addresses: Vec<u16>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run a port spec: translate, assemble, and finalize an image.
    Run {
        #[arg(long, default_value = ".")]
        root: String,

        /// Port spec file (YAML or JSON).
        #[arg(long)]
        file: String,

        /// Toolchain to use instead of the project default.
        #[arg(long)]
        toolchain: Option<String>,

        /// Skip the translation oracle even when one is configured.
        #[arg(long, default_value_t = false)]
        no_oracle: bool,

        /// Number of translation workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Replace an existing output directory for this run name.
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// List recorded port runs.
    ListRuns {
        #[arg(long, default_value = ".")]
        root: String,

        /// Only runs with this name.
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the translation log of a run.
    ShowLog {
        #[arg(long, default_value = ".")]
        root: String,

        /// Latest run with this name.
        #[arg(long)]
        name: Option<String>,

        /// Explicit run id.
        #[arg(long)]
        run_id: Option<i64>,

        /// Only functions replaced by the trap stub.
        #[arg(long, default_value_t = false)]
        failures: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to install logger: {e}"))?;

    match cli.command {
        Command::InitProject { root, name } => init_project_command(&root, name)?,
        Command::ProjectInfo { root, json } => project_info_command(&root, json)?,
        Command::SetupToolchain {
            root,
            assembler,
            linker,
            set_default,
            oracle_command,
            oracle_args,
            oracle_timeout,
            oracle_scope,
            workers,
            title,
        } => setup_toolchain_command(
            &root,
            SetupOptions {
                assembler,
                linker,
                set_default,
                oracle_command,
                oracle_args,
                oracle_timeout,
                oracle_scope,
                workers,
                title,
            },
        )?,
        Command::ListToolchains { root, json } => list_toolchains_command(&root, json)?,
        Command::PlanMapper { catalog, mapper, prg_banks, chr_rom, stub, json } => {
            let source = match (catalog, mapper, prg_banks) {
                (Some(dir), _, _) => PlanSource::Catalog(dir),
                (None, Some(mapper), Some(prg_banks)) => {
                    PlanSource::Manual { mapper, prg_banks, chr_rom }
                }
                _ => return Err(anyhow!("Pass --catalog, or --mapper with --prg-banks")),
            };
            plan_mapper_command(source, stub, json)?
        }
        Command::Resolve { addresses, json } => resolve_command(&addresses, json)?,
        Command::Run { root, file, toolchain, no_oracle, workers, force } => {
            run_port_command(&root, &file, RunOverrides { toolchain, no_oracle, workers, force })?
        }
        Command::ListRuns { root, name, json } => list_runs_command(&root, name.as_deref(), json)?,
        Command::ShowLog { root, name, run_id, failures, json } => {
            show_log_command(&root, name.as_deref(), run_id, failures, json)?
        }
    }

    Ok(())
}
