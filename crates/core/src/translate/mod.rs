//! Translation pass: every (function, bank) pair becomes one finalized
//! [`TranslationUnit`].
//!
//! Jobs run on a bounded pool of scoped workers fed from a channel. Workers
//! share only the read-only inputs and the append-only [`TranslationLog`].

pub mod unit;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::{debug, info, warn};

use crate::backends::Toolchain;
use crate::mapper::MapperPlan;
use crate::model::{BankDescriptor, Catalog, FunctionRecord};
use crate::oracle::{check_source, LogEntry, OracleAdapter, OracleRequest, OracleScope, TranslationLog};
use crate::rewrite::{rewrite_function, unit_symbol, RewriteContext, SiteIndex};

pub use unit::{Origin, PendingUnit, TranslationUnit, ValidationStatus};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateConfig {
    pub workers: usize,
    pub scope: OracleScope,
    /// RAM ranges known to hold code copied there at runtime.
    pub ram_code: Vec<RangeInclusive<u16>>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, scope: OracleScope::Unresolved, ram_code: Vec::new() }
    }
}

/// Result of the pass, ordered by (bank, start).
#[derive(Debug, Clone, Default)]
pub struct TranslationOutput {
    pub units: Vec<TranslationUnit>,
    /// Functions the rewrite engine could not fully resolve.
    pub unresolved_functions: usize,
    pub warnings: Vec<String>,
}

impl TranslationOutput {
    pub fn count(&self, origin: Origin) -> usize {
        self.units.iter().filter(|u| u.origin() == origin).count()
    }
}

#[derive(Clone, Copy)]
struct Job<'a> {
    function: &'a FunctionRecord,
    bank: u8,
}

struct JobResult {
    unit: TranslationUnit,
    unresolved: bool,
}

pub struct TranslationPass<'a> {
    catalog: &'a Catalog,
    plan: &'a MapperPlan,
    toolchain: &'a dyn Toolchain,
    adapter: &'a OracleAdapter,
    config: &'a TranslateConfig,
    sites: SiteIndex,
    descriptors: Vec<BankDescriptor>,
    symbols: BTreeMap<u8, BTreeMap<u16, String>>,
    names: BTreeMap<u16, String>,
}

impl<'a> TranslationPass<'a> {
    pub fn new(
        catalog: &'a Catalog,
        plan: &'a MapperPlan,
        toolchain: &'a dyn Toolchain,
        adapter: &'a OracleAdapter,
        config: &'a TranslateConfig,
    ) -> Self {
        let fixed_last = crate::mapper::lookup(plan.mapper_id).map_or(true, |spec| spec.fixed_last);
        let descriptors = BankDescriptor::layout(catalog.manifest.prg_banks, fixed_last);
        let symbols = symbol_tables(catalog, plan, &descriptors);
        let mut names = BTreeMap::new();
        for function in &catalog.functions {
            names.entry(function.start).or_insert_with(|| function.name.clone());
        }
        Self {
            catalog,
            plan,
            toolchain,
            adapter,
            config,
            sites: SiteIndex::new(&catalog.sites),
            descriptors,
            symbols,
            names,
        }
    }

    /// Translate every function copy that has a place in the plan.
    pub fn run(&self, log: &TranslationLog) -> TranslationOutput {
        let mut warnings = Vec::new();
        let mut jobs = Vec::new();
        for function in &self.catalog.functions {
            for bank in self.catalog.banks_of(function) {
                if self.plan.slot_of(bank).is_none() {
                    warnings.push(format!(
                        "{} in bank {bank:02} has no target slot; not translated",
                        function.name
                    ));
                    continue;
                }
                jobs.push(Job { function, bank });
            }
        }

        let workers = self.config.workers.max(1).min(jobs.len().max(1));
        info!(jobs = jobs.len(), workers, scope = %self.config.scope, "translating functions");

        let (job_tx, job_rx) = unbounded::<Job<'_>>();
        let (result_tx, result_rx) = unbounded::<JobResult>();
        for job in jobs {
            // Receiver is alive until the scope below ends.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let result = self.translate_one(job, log);
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut units = Vec::new();
        let mut unresolved_functions = 0;
        for result in result_rx.iter() {
            if result.unresolved {
                unresolved_functions += 1;
            }
            units.push(result.unit);
        }
        units.sort_by_key(|u| (u.bank(), u.start()));
        TranslationOutput { units, unresolved_functions, warnings }
    }

    fn translate_one(&self, job: Job<'_>, log: &TranslationLog) -> JobResult {
        let Job { function, bank } = job;
        let slice = self
            .catalog
            .listing(bank)
            .map(|listing| listing.slice(function.start, function.end))
            .unwrap_or_default();
        let source_text: String = slice.iter().map(|i| i.source_line() + "\n").collect();
        let pending = PendingUnit::new(function, bank, source_text);

        let empty = BTreeMap::new();
        let descriptor = self.descriptors.get(bank as usize).copied().unwrap_or(BankDescriptor {
            index: bank,
            window: crate::model::BankWindow::Switchable,
            fixed: false,
        });
        let ctx = RewriteContext {
            bank: descriptor,
            reset_entry: descriptor.fixed.then_some(self.catalog.manifest.vectors.reset),
            symbols: self.symbols.get(&bank).unwrap_or(&empty),
            triggers: &self.plan.triggers,
            ram_code: &self.config.ram_code,
        };
        let output = rewrite_function(function, slice, &self.sites, &ctx);
        let mut reasons: Vec<String> = output
            .unresolved
            .iter()
            .map(|site| format!("${:04X}: {}", site.address, site.reason))
            .collect();
        let unresolved = !output.is_resolved();

        let deterministic = if output.is_resolved() {
            let text = pending.render(Origin::Deterministic, &output.text);
            match self.toolchain.check(&check_source(&text)) {
                Ok(()) => Some(output.text),
                Err(e) => {
                    warn!(function = %function.name, bank, error = %e, "deterministic output failed check");
                    reasons.push(format!("deterministic output failed check: {e}"));
                    None
                }
            }
        } else {
            debug!(function = %function.name, bank, sites = output.unresolved.len(), "unresolved sites");
            None
        };

        if self.config.scope == OracleScope::Unresolved {
            if let Some(body) = &deterministic {
                let unit = pending.finalize(Origin::Deterministic, body);
                log.append(entry(&unit, ValidationStatus::Accepted, 0, None));
                return JobResult { unit, unresolved };
            }
        }

        let request = OracleRequest {
            function: function.name.clone(),
            bank,
            start: function.start,
            end: function.end,
            source: pending.source_text().to_string(),
            callers: self.neighbor_names(&function.callers),
            callees: self.neighbor_names(&function.callees),
            mapper_name: self.plan.name.clone(),
            symbol: pending.symbol().to_string(),
            reasons: reasons.clone(),
        };
        let render = |body: &str| pending.render(Origin::OracleAccepted, body);
        let outcome = self.adapter.resolve(&request, self.toolchain, &render);

        let (unit, validation, annotation) = match (outcome.accepted, deterministic) {
            (Some(body), _) => {
                let annotation =
                    (!outcome.annotations.is_empty()).then(|| outcome.annotations.join("; "));
                (pending.finalize(Origin::OracleAccepted, &body), ValidationStatus::Accepted, annotation)
            }
            (None, Some(body)) => {
                let annotation = outcome.failure.map(|f| format!("oracle rejected: {f}"));
                (pending.finalize(Origin::Deterministic, &body), ValidationStatus::Accepted, annotation)
            }
            (None, None) => {
                let mut notes = reasons;
                if let Some(failure) = outcome.failure {
                    notes.push(failure);
                }
                warn!(function = %function.name, bank, "falling back to trap stub");
                (pending.fallback(), ValidationStatus::Rejected, Some(notes.join("; ")))
            }
        };
        log.append(entry(&unit, validation, outcome.attempts, annotation));
        JobResult { unit, unresolved }
    }

    fn neighbor_names(&self, addresses: &std::collections::BTreeSet<u16>) -> Vec<String> {
        addresses
            .iter()
            .map(|a| self.names.get(a).cloned().unwrap_or_else(|| format!("${a:04X}")))
            .collect()
    }
}

fn entry(
    unit: &TranslationUnit,
    validation: ValidationStatus,
    attempts: u32,
    annotation: Option<String>,
) -> LogEntry {
    LogEntry {
        function: unit.function().to_string(),
        bank: unit.bank(),
        origin: unit.origin(),
        validation,
        attempts,
        annotation,
    }
}

/// Entries reachable by plain `JSR`/`JMP` from each legacy bank: the bank's
/// own functions, plus those of the bank sharing its physical bank when that
/// bank occupies the other legacy window.
pub fn symbol_tables(
    catalog: &Catalog,
    plan: &MapperPlan,
    descriptors: &[BankDescriptor],
) -> BTreeMap<u8, BTreeMap<u16, String>> {
    let mut own: BTreeMap<u8, BTreeMap<u16, String>> = BTreeMap::new();
    for function in &catalog.functions {
        for bank in catalog.banks_of(function) {
            own.entry(bank)
                .or_default()
                .entry(function.start)
                .or_insert_with(|| unit_symbol(&function.name, bank));
        }
    }

    let mut tables = own.clone();
    for (bank, table) in tables.iter_mut() {
        let Some(partner) = plan.partner_of(*bank) else { continue };
        let (Some(mine), Some(theirs)) =
            (descriptors.get(*bank as usize), descriptors.get(partner as usize))
        else {
            continue;
        };
        if mine.window == theirs.window {
            continue;
        }
        if let Some(partner_table) = own.get(&partner) {
            for (address, symbol) in partner_table {
                if theirs.window.contains(*address) {
                    table.entry(*address).or_insert_with(|| symbol.clone());
                }
            }
        }
    }
    tables
}
