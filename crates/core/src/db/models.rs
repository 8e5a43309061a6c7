use serde::{Deserialize, Serialize};

use crate::oracle::LogEntry;
use crate::report::{Fidelity, RunReport};
use crate::translate::{Origin, ValidationStatus};

/// Bookkeeping row for one port run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRunRecord {
    pub name: String,
    pub spec_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_hash: Option<String>,
    pub mapper: Option<u16>,
    pub toolchain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle: Option<String>,
    pub fidelity: Fidelity,
    pub deterministic: usize,
    pub oracle_accepted: usize,
    pub fallback: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_sha256: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl PortRunRecord {
    /// Summarize a finished report.
    pub fn from_report(
        report: &RunReport,
        spec_hash: impl Into<String>,
        toolchain: impl Into<String>,
        oracle: Option<String>,
    ) -> Self {
        Self {
            name: report.name.clone(),
            spec_hash: spec_hash.into(),
            catalog_hash: report.catalog_hash.clone(),
            mapper: report.mapper.as_ref().map(|m| m.id),
            toolchain: toolchain.into(),
            oracle,
            fidelity: report.fidelity,
            deterministic: report.summary.deterministic,
            oracle_accepted: report.summary.oracle_accepted,
            fallback: report.summary.fallback,
            image_sha256: report.image.as_ref().map(|i| i.sha256.clone()),
            started_at: report.started_at.clone(),
            finished_at: report.finished_at.clone(),
        }
    }
}

/// Stored translation-log line, keyed by the run it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredLogEntry {
    pub run_id: i64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

pub(crate) fn decode_origin(text: &str) -> Origin {
    Origin::parse(text).unwrap_or(Origin::FallbackStub)
}

pub(crate) fn decode_validation(text: &str) -> ValidationStatus {
    ValidationStatus::parse(text).unwrap_or(ValidationStatus::Rejected)
}
