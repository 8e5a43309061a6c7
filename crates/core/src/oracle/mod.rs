//! Translation oracle adapter.
//!
//! Functions the rewrite engine cannot fully resolve are sent to an external
//! translator. Every candidate it returns is screened and then checked with
//! the toolchain before it may replace the deterministic output; anything that
//! fails after [`MAX_ORACLE_ATTEMPTS`] is replaced by the trap stub.

pub mod log;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::backends::Toolchain;
use crate::hardware;

pub use log::{LogEntry, TranslationLog};

/// Attempts per function before falling back to the trap stub.
pub const MAX_ORACLE_ATTEMPTS: u32 = 3;

pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Body substituted for code that could not be validated.
pub const TRAP_STUB: &str = "trap:\n    SEI\n    STP\n    BRA trap\n";

/// Encoded size of [`TRAP_STUB`].
pub const TRAP_STUB_SIZE: u32 = 4;

const REVIEW_MARKER: &str = "; REVIEW:";

/// Directives that would move a unit out of its bank segment.
const PLACEMENT_DIRECTIVES: [&str; 4] = [".segment", ".org", ".reloc", ".bank"];

/// Which functions are submitted to the oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleScope {
    /// Only functions the rewrite engine could not resolve.
    #[default]
    Unresolved,
    /// Every function.
    All,
}

impl OracleScope {
    pub fn as_str(self) -> &'static str {
        match self {
            OracleScope::Unresolved => "unresolved",
            OracleScope::All => "all",
        }
    }
}

impl FromStr for OracleScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unresolved" => Ok(OracleScope::Unresolved),
            "all" => Ok(OracleScope::All),
            other => Err(format!("unknown oracle scope '{other}' (expected unresolved|all)")),
        }
    }
}

impl fmt::Display for OracleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the translator gets to see about one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub function: String,
    pub bank: u8,
    pub start: u16,
    pub end: u16,
    /// Legacy listing of the function.
    pub source: String,
    pub callers: Vec<String>,
    pub callees: Vec<String>,
    pub mapper_name: String,
    /// Symbol the candidate is wrapped in.
    pub symbol: String,
    /// Why the rewrite engine gave up, one line per site.
    #[serde(default)]
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponse {
    pub candidate: String,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Oracle timed out after {0:?}")]
    Timeout(Duration),
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
    #[error("Oracle failed: {0}")]
    Failed(String),
    #[error("Oracle worker disconnected")]
    Disconnected,
}

/// External translator for one function at a time.
pub trait TranslationOracle: Send + Sync {
    fn translate(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
    fn name(&self) -> &str;
}

/// Why a candidate was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateRejection {
    #[error("empty candidate")]
    Empty,
    #[error("raw legacy hardware access to {name} (${address:04X})")]
    RawHardwareAccess { address: u16, name: &'static str },
    #[error("placement directive {0} not allowed")]
    Placement(String),
    #[error("check-only assembly failed: {0}")]
    Assembly(String),
}

/// A screened candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedCandidate {
    pub body: String,
    pub annotations: Vec<String>,
}

/// Strip Markdown fences and reject candidates that are empty, move
/// themselves out of their segment, or touch legacy hardware directly.
pub fn sanitize_candidate(text: &str) -> Result<SanitizedCandidate, CandidateRejection> {
    let mut lines = Vec::new();
    let mut annotations = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            continue;
        }
        if let Some(pos) = trimmed.find(REVIEW_MARKER) {
            let note = trimmed[pos + REVIEW_MARKER.len()..].trim();
            if !note.is_empty() {
                annotations.push(note.to_string());
            }
        }
        let code = trimmed.split(';').next().unwrap_or("").trim();
        let lowered = code.to_ascii_lowercase();
        if let Some(directive) = PLACEMENT_DIRECTIVES
            .iter()
            .find(|d| lowered.split_whitespace().next() == Some(**d))
        {
            return Err(CandidateRejection::Placement(directive.to_string()));
        }
        if let Some(address) = hardware_literal(code) {
            if let Some(register) = hardware::resolve(address) {
                return Err(CandidateRejection::RawHardwareAccess { address, name: register.name });
            }
        }
        lines.push(line.trim_end().to_string());
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    let has_code = lines.iter().any(|l| {
        let code = l.split(';').next().unwrap_or("").trim();
        !code.is_empty()
    });
    if !has_code {
        return Err(CandidateRejection::Empty);
    }
    let mut body = lines.join("\n");
    body.push('\n');
    Ok(SanitizedCandidate { body, annotations })
}

/// First non-immediate numeric address literal in a line of code.
fn hardware_literal(code: &str) -> Option<u16> {
    let bytes = code.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let (digits_start, prefix_len) = match bytes[i] {
            b'$' => (i + 1, 1),
            b'0' if matches!(bytes.get(i + 1), Some(b'x' | b'X')) => (i + 2, 2),
            _ => {
                i += 1;
                continue;
            }
        };
        let mut end = digits_start;
        while end < bytes.len() && bytes[end].is_ascii_hexdigit() {
            end += 1;
        }
        let immediate = i > 0 && bytes[i - 1] == b'#';
        let preceded_by_ident =
            i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') && prefix_len == 2;
        let digits = end - digits_start;
        if !immediate && !preceded_by_ident && (3..=4).contains(&digits) {
            if let Ok(value) = u16::from_str_radix(&code[digits_start..end], 16) {
                if hardware::resolve(value).is_some() {
                    return Some(value);
                }
            }
        }
        i = end.max(i + 1);
    }
    None
}

/// Name of the conditional-inclusion guard for a unit symbol.
pub fn guard_symbol(symbol: &str) -> String {
    format!("TU_{symbol}")
}

/// Wrap a unit body in its inclusion guard and `.proc`.
pub fn wrap_unit(symbol: &str, comment: &str, body: &str) -> String {
    let guard = guard_symbol(symbol);
    let mut out = format!("; {comment}\n.ifndef {guard}\n{guard} = 1\n.proc {symbol}\n");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(".endproc\n.endif\n");
    out
}

/// Prelude for check-only assembly of a single unit.
///
/// Every symbol the unit does not define is imported so only syntax and
/// instruction-set conformance are checked.
pub fn check_source(unit_text: &str) -> String {
    let mut out = String::from(".p816\n.a8\n.i8\n.autoimport +\n.segment \"CODE\"\n");
    out.push_str(unit_text);
    out
}

/// Result of running one function through the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleOutcome {
    /// Validated body, if any attempt was accepted.
    pub accepted: Option<String>,
    pub attempts: u32,
    pub annotations: Vec<String>,
    /// Last failure, when nothing was accepted.
    pub failure: Option<String>,
}

/// Drives a [`TranslationOracle`] with timeouts, retries, and validation.
#[derive(Clone)]
pub struct OracleAdapter {
    oracle: Option<Arc<dyn TranslationOracle>>,
    timeout: Duration,
    max_attempts: u32,
}

impl OracleAdapter {
    pub fn new(oracle: Option<Arc<dyn TranslationOracle>>, timeout: Duration) -> Self {
        Self { oracle, timeout, max_attempts: MAX_ORACLE_ATTEMPTS }
    }

    /// Adapter with no translator; every routed function falls back.
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_ORACLE_TIMEOUT)
    }

    pub fn is_enabled(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn oracle_name(&self) -> Option<&str> {
        self.oracle.as_deref().map(|o| o.name())
    }

    /// Submit `request` until a candidate is accepted or attempts run out.
    ///
    /// `render` wraps a body exactly as it will be included, so the check sees
    /// the same text the assembler will.
    pub fn resolve(
        &self,
        request: &OracleRequest,
        toolchain: &dyn Toolchain,
        render: &dyn Fn(&str) -> String,
    ) -> OracleOutcome {
        let Some(oracle) = self.oracle.clone() else {
            return OracleOutcome {
                accepted: None,
                attempts: 0,
                annotations: Vec::new(),
                failure: Some("no oracle configured".to_string()),
            };
        };

        let mut failure = None;
        for attempt in 1..=self.max_attempts {
            let response = match self.call(Arc::clone(&oracle), request) {
                Ok(response) => response,
                Err(e @ OracleError::Timeout(_)) => {
                    // A timed-out call goes straight to the fallback.
                    warn!(function = %request.function, bank = request.bank, attempt, "oracle call timed out");
                    return OracleOutcome {
                        accepted: None,
                        attempts: attempt,
                        annotations: Vec::new(),
                        failure: Some(e.to_string()),
                    };
                }
                Err(e) => {
                    warn!(function = %request.function, bank = request.bank, attempt, reason = %e, "oracle call failed");
                    failure = Some(e.to_string());
                    continue;
                }
            };
            let result = sanitize_candidate(&response.candidate).map_err(|e| e.to_string()).and_then(|candidate| {
                toolchain
                    .check(&check_source(&render(&candidate.body)))
                    .map_err(|e| CandidateRejection::Assembly(e.to_string()).to_string())?;
                Ok(candidate)
            });
            match result {
                Ok(candidate) => {
                    debug!(function = %request.function, bank = request.bank, attempt, "oracle candidate accepted");
                    return OracleOutcome {
                        accepted: Some(candidate.body),
                        attempts: attempt,
                        annotations: candidate.annotations,
                        failure: None,
                    };
                }
                Err(reason) => {
                    warn!(function = %request.function, bank = request.bank, attempt, %reason, "oracle attempt rejected");
                    failure = Some(reason);
                }
            }
        }
        OracleOutcome { accepted: None, attempts: self.max_attempts, annotations: Vec::new(), failure }
    }

    /// One bounded call on a helper thread. A call that outlives the timeout
    /// is abandoned; its late reply is dropped with the channel.
    fn call(
        &self,
        oracle: Arc<dyn TranslationOracle>,
        request: &OracleRequest,
    ) -> Result<OracleResponse, OracleError> {
        let (tx, rx) = bounded(1);
        let request = request.clone();
        thread::Builder::new()
            .name(format!("oracle-{}", request.symbol))
            .spawn(move || {
                let _ = tx.send(oracle.translate(&request));
            })
            .map_err(|e| OracleError::Unavailable(format!("failed to spawn oracle call: {e}")))?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(OracleError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::Disconnected),
        }
    }
}

impl fmt::Debug for OracleAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleAdapter")
            .field("oracle", &self.oracle_name())
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_and_collects_review_notes() {
        let text = "```asm\n    LDA #$01 ; REVIEW: check flag usage\n    RTS\n```\n";
        let candidate = sanitize_candidate(text).unwrap();
        assert_eq!(candidate.body, "    LDA #$01 ; REVIEW: check flag usage\n    RTS\n");
        assert_eq!(candidate.annotations, vec!["check flag usage".to_string()]);
    }

    #[test]
    fn rejects_raw_hardware_but_not_immediates() {
        assert!(matches!(
            sanitize_candidate("STA $2006\nRTS"),
            Err(CandidateRejection::RawHardwareAccess { address: 0x2006, .. })
        ));
        assert!(matches!(
            sanitize_candidate("LDA a:$4016,X"),
            Err(CandidateRejection::RawHardwareAccess { address: 0x4016, .. })
        ));
        assert!(sanitize_candidate("LDX #$2000\nRTS").is_ok());
        assert!(sanitize_candidate("STA $2100\nRTS").is_ok());
    }

    #[test]
    fn rejects_empty_and_placement() {
        assert_eq!(sanitize_candidate("```\n```\n; nothing\n"), Err(CandidateRejection::Empty));
        assert!(matches!(
            sanitize_candidate(".segment \"ZEROPAGE\"\nRTS"),
            Err(CandidateRejection::Placement(_))
        ));
    }

    #[test]
    fn wrap_unit_guards_by_symbol() {
        let text = wrap_unit("reset_B01", "reset", "    RTS\n");
        assert!(text.contains(".ifndef TU_reset_B01\nTU_reset_B01 = 1\n.proc reset_B01\n"));
        assert!(text.ends_with(".endproc\n.endif\n"));
    }

    #[test]
    fn scope_parses_case_insensitively() {
        assert_eq!("ALL".parse::<OracleScope>().unwrap(), OracleScope::All);
        assert!("some".parse::<OracleScope>().is_err());
    }
}
