use serde::{Deserialize, Serialize};

use crate::model::FunctionRecord;
use crate::oracle::{guard_symbol, wrap_unit, TRAP_STUB};
use crate::rewrite::unit_symbol;

/// Where the included text of a unit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Deterministic,
    OracleAccepted,
    FallbackStub,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Deterministic => "deterministic",
            Origin::OracleAccepted => "oracle_accepted",
            Origin::FallbackStub => "fallback_stub",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "deterministic" => Some(Origin::Deterministic),
            "oracle_accepted" => Some(Origin::OracleAccepted),
            "fallback_stub" => Some(Origin::FallbackStub),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationStatus::Pending => "pending",
            ValidationStatus::Accepted => "accepted",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "pending" => Some(ValidationStatus::Pending),
            "accepted" => Some(ValidationStatus::Accepted),
            "rejected" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }
}

/// A unit still being worked on. Only [`PendingUnit::finalize`] and
/// [`PendingUnit::fallback`] produce a [`TranslationUnit`].
#[derive(Debug, Clone)]
pub struct PendingUnit {
    function: String,
    symbol: String,
    bank: u8,
    start: u16,
    end: u16,
    source_text: String,
}

impl PendingUnit {
    pub fn new(function: &FunctionRecord, bank: u8, source_text: String) -> Self {
        Self {
            function: function.name.clone(),
            symbol: unit_symbol(&function.name, bank),
            bank,
            start: function.start,
            end: function.end,
            source_text,
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn validation(&self) -> ValidationStatus {
        ValidationStatus::Pending
    }

    /// Wrap `body` exactly as it would be included in the image.
    pub fn render(&self, origin: Origin, body: &str) -> String {
        let comment = format!(
            "{} ${:04X}-${:04X} bank {:02} ({})",
            self.function,
            self.start,
            self.end,
            self.bank,
            origin.as_str()
        );
        wrap_unit(&self.symbol, &comment, body)
    }

    /// Finalize with validated text.
    pub fn finalize(self, origin: Origin, body: &str) -> TranslationUnit {
        let translated_text = self.render(origin, body);
        TranslationUnit {
            function: self.function,
            symbol: self.symbol,
            bank: self.bank,
            start: self.start,
            source_text: self.source_text,
            translated_text,
            origin,
            validation: ValidationStatus::Accepted,
        }
    }

    /// Finalize with the trap stub. Accepted by construction.
    pub fn fallback(self) -> TranslationUnit {
        self.finalize(Origin::FallbackStub, TRAP_STUB)
    }
}

/// A finalized translation unit. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationUnit {
    function: String,
    symbol: String,
    bank: u8,
    start: u16,
    source_text: String,
    translated_text: String,
    origin: Origin,
    validation: ValidationStatus,
}

impl TranslationUnit {
    pub fn function(&self) -> &str {
        &self.function
    }

    /// Global symbol the unit defines.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn guard(&self) -> String {
        guard_symbol(&self.symbol)
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn translated_text(&self) -> &str {
        &self.translated_text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn validation(&self) -> ValidationStatus {
        self.validation
    }
}
