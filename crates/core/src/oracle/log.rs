use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::translate::unit::{Origin, ValidationStatus};

/// One finalized unit as recorded in the translation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub function: String,
    pub bank: u8,
    pub origin: Origin,
    /// Outcome of the last validation performed for this unit.
    pub validation: ValidationStatus,
    /// Oracle attempts spent on the unit.
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl LogEntry {
    pub fn is_failure(&self) -> bool {
        self.origin == Origin::FallbackStub
    }
}

/// Append-only log shared by translation workers.
#[derive(Debug, Default)]
pub struct TranslationLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl TranslationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries ordered by (bank, function), independent of completion order.
    pub fn entries(&self) -> Vec<LogEntry> {
        let mut entries = self.entries.lock().clone();
        entries.sort_by(|a, b| (a.bank, &a.function).cmp(&(b.bank, &b.function)));
        entries
    }

    pub fn failures(&self) -> Vec<LogEntry> {
        self.entries().into_iter().filter(LogEntry::is_failure).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn entry(function: &str, bank: u8, origin: Origin) -> LogEntry {
        LogEntry {
            function: function.to_string(),
            bank,
            origin,
            validation: ValidationStatus::Accepted,
            attempts: 0,
            annotation: None,
        }
    }

    #[test]
    fn concurrent_appends_are_all_kept_and_export_is_ordered() {
        let log = Arc::new(TranslationLog::new());
        let handles: Vec<_> = (0..8u8)
            .map(|bank| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in (0..25).rev() {
                        log.append(entry(&format!("f{i:02}"), bank, Origin::Deterministic));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 200);
        assert!(entries
            .windows(2)
            .all(|w| (w[0].bank, &w[0].function) <= (w[1].bank, &w[1].function)));
    }

    #[test]
    fn failures_are_fallback_entries() {
        let log = TranslationLog::new();
        log.append(entry("a", 0, Origin::Deterministic));
        log.append(entry("b", 0, Origin::FallbackStub));
        let failures = log.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].function, "b");
    }
}
