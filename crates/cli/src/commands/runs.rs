use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::canonicalize_or_current;
use crate::commands::{open_project_db, print_json};
use rompipe_core::db::{PortRunRecord, ProjectLayout};

#[derive(Debug, Serialize)]
pub struct PortRunInfo {
    pub id: i64,
    #[serde(flatten)]
    pub record: PortRunRecord,
    pub path: String,
}

/// List recorded port runs, optionally only those named `name`.
pub fn list_runs_command(root: &str, name: Option<&str>, json: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let (_config, _db_path, db) = open_project_db(&layout)?;
    let runs: Vec<PortRunInfo> = db
        .list_port_runs(name)
        .context("Failed to list port runs")?
        .into_iter()
        .map(|(id, record)| PortRunInfo {
            id,
            path: layout.run_output_root(&record.name).display().to_string(),
            record,
        })
        .collect();

    if json {
        return print_json(&runs);
    }

    println!("Port runs ({}):", runs.len());
    if runs.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for run in runs {
        let r = &run.record;
        println!(
            "  - #{} {} [{}] units={}/{}/{} toolchain={} finished={}",
            run.id,
            r.name,
            r.fidelity,
            r.deterministic,
            r.oracle_accepted,
            r.fallback,
            r.toolchain,
            r.finished_at
        );
    }
    Ok(())
}

/// Print the translation log of a run: an explicit id, or the latest run
/// recorded under `name`.
pub fn show_log_command(
    root: &str,
    name: Option<&str>,
    run_id: Option<i64>,
    failures_only: bool,
    json: bool,
) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let layout = ProjectLayout::new(&root_path);
    let (_config, _db_path, db) = open_project_db(&layout)?;

    let run_id = match (run_id, name) {
        (Some(id), _) => id,
        (None, Some(name)) => db
            .latest_run_id(name)?
            .ok_or_else(|| anyhow!("No recorded runs named '{}'", name))?,
        (None, None) => return Err(anyhow!("Pass --name or --run-id")),
    };
    let entries = db.load_translation_log(run_id, failures_only)?;

    if json {
        return print_json(&entries);
    }

    println!("Translation log for run {} ({} entries):", run_id, entries.len());
    for stored in entries {
        let e = &stored.entry;
        print!(
            "  - bank {:02} {} [{}/{}] attempts={}",
            e.bank,
            e.function,
            e.origin.as_str(),
            e.validation.as_str(),
            e.attempts
        );
        match &e.annotation {
            Some(note) => println!(" - {note}"),
            None => println!(),
        }
    }
    Ok(())
}
