//! Run report and fidelity classification.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mapper::{MapperPlan, SwitchStrategy, UnsupportedMapper};
use crate::oracle::LogEntry;
use crate::translate::{Origin, TranslationOutput};

/// Fallback share at or below which a run counts as partially degraded.
pub const PARTIAL_DEGRADATION_LIMIT: f64 = 0.25;

/// Overall outcome of a run, from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    FullSuccess,
    PartialDegradation,
    SevereDegradation,
    TranslationFailure,
    BuildFailure,
    UnsupportedMapper,
}

impl Fidelity {
    pub fn as_str(self) -> &'static str {
        match self {
            Fidelity::FullSuccess => "full_success",
            Fidelity::PartialDegradation => "partial_degradation",
            Fidelity::SevereDegradation => "severe_degradation",
            Fidelity::TranslationFailure => "translation_failure",
            Fidelity::BuildFailure => "build_failure",
            Fidelity::UnsupportedMapper => "unsupported_mapper",
        }
    }

    /// Whether the run produced an image worth keeping.
    pub fn has_image(self) -> bool {
        matches!(
            self,
            Fidelity::FullSuccess | Fidelity::PartialDegradation | Fidelity::SevereDegradation
        )
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fidelity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full_success" => Ok(Fidelity::FullSuccess),
            "partial_degradation" => Ok(Fidelity::PartialDegradation),
            "severe_degradation" => Ok(Fidelity::SevereDegradation),
            "translation_failure" => Ok(Fidelity::TranslationFailure),
            "build_failure" => Ok(Fidelity::BuildFailure),
            "unsupported_mapper" => Ok(Fidelity::UnsupportedMapper),
            other => Err(format!("unknown fidelity '{other}'")),
        }
    }
}

/// Counts of finalized units by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub deterministic: usize,
    pub oracle_accepted: usize,
    pub fallback: usize,
    /// Functions the rewrite engine could not resolve on its own.
    pub unresolved: usize,
}

impl UnitSummary {
    pub fn from_output(output: &TranslationOutput) -> Self {
        Self {
            deterministic: output.count(Origin::Deterministic),
            oracle_accepted: output.count(Origin::OracleAccepted),
            fallback: output.count(Origin::FallbackStub),
            unresolved: output.unresolved_functions,
        }
    }

    pub fn total(&self) -> usize {
        self.deterministic + self.oracle_accepted + self.fallback
    }

    pub fn fallback_ratio(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => self.fallback as f64 / total as f64,
        }
    }
}

/// Classify a run. Precedence: unsupported mapper, then fatal build or
/// catalog failures, then the share of units that fell back.
pub fn classify(
    unsupported: bool,
    build_failed: bool,
    catalog_failed: bool,
    summary: &UnitSummary,
) -> Fidelity {
    if unsupported {
        return Fidelity::UnsupportedMapper;
    }
    if build_failed {
        return Fidelity::BuildFailure;
    }
    if catalog_failed || summary.total() == 0 || summary.fallback == summary.total() {
        return Fidelity::TranslationFailure;
    }
    if summary.fallback == 0 {
        Fidelity::FullSuccess
    } else if summary.fallback_ratio() <= PARTIAL_DEGRADATION_LIMIT {
        Fidelity::PartialDegradation
    } else {
        Fidelity::SevereDegradation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadCatalog,
    PlanMapper,
    Translate,
    Assemble,
    Finalize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::LoadCatalog => "load_catalog",
            Stage::PlanMapper => "plan_mapper",
            Stage::Translate => "translate",
            Stage::Assemble => "assemble",
            Stage::Finalize => "finalize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub success: bool,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperSummary {
    pub id: u16,
    pub name: String,
    pub supported: bool,
    pub strategy: SwitchStrategy,
    /// Physical bank -> legacy banks, lower half first.
    pub slots: Vec<(u8, Vec<u8>)>,
}

impl From<&MapperPlan> for MapperSummary {
    fn from(plan: &MapperPlan) -> Self {
        Self {
            id: plan.mapper_id,
            name: plan.name.clone(),
            supported: plan.supported,
            strategy: plan.strategy,
            slots: plan.slots.iter().map(|s| (s.index, s.legacy())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub path: String,
    pub size: usize,
    pub sha256: String,
    pub checksum: u16,
    pub complement: u16,
}

/// Everything a run found out, written even when the run fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub started_at: String,
    pub finished_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapper: Option<MapperSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsupported: Option<UnsupportedMapper>,
    pub stages: Vec<StageRecord>,
    pub summary: UnitSummary,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub fidelity: Fidelity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSummary>,
    pub log: Vec<LogEntry>,
}

impl RunReport {
    pub fn stage(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(deterministic: usize, fallback: usize) -> UnitSummary {
        UnitSummary { deterministic, oracle_accepted: 0, fallback, unresolved: fallback }
    }

    #[test]
    fn classification_thresholds() {
        assert_eq!(classify(false, false, false, &summary(10, 0)), Fidelity::FullSuccess);
        assert_eq!(classify(false, false, false, &summary(3, 1)), Fidelity::PartialDegradation);
        assert_eq!(classify(false, false, false, &summary(2, 1)), Fidelity::SevereDegradation);
        assert_eq!(classify(false, false, false, &summary(0, 4)), Fidelity::TranslationFailure);
        assert_eq!(classify(false, false, false, &summary(0, 0)), Fidelity::TranslationFailure);
        assert_eq!(classify(false, true, false, &summary(10, 0)), Fidelity::BuildFailure);
        assert_eq!(classify(true, true, false, &summary(10, 0)), Fidelity::UnsupportedMapper);
        assert_eq!(classify(false, false, true, &summary(0, 0)), Fidelity::TranslationFailure);
    }

    #[test]
    fn classification_is_monotone_in_fallbacks() {
        let total = 20;
        let mut previous = Fidelity::FullSuccess;
        for fallback in 0..=total {
            let current = classify(false, false, false, &summary(total - fallback, fallback));
            assert!(current >= previous, "{fallback}: {current} < {previous}");
            previous = current;
        }
    }
}
