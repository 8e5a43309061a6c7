//! Core data model (IR) shared by every stage of the port.
//!
//! These types describe what the disassembly collaborator hands us (functions,
//! register access sites, per-bank listings) and the legacy bank geometry.
//! Translation, planning, and packaging types live next to the stage that
//! produces them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Size of one legacy PRG bank (16 KiB).
pub const LEGACY_BANK_SIZE: usize = 0x4000;

/// Load address of the switchable legacy window.
pub const SWITCHABLE_WINDOW: u16 = 0x8000;

/// Load address of the fixed legacy window.
pub const FIXED_WINDOW: u16 = 0xC000;

/// A function discovered by the disassembler.
///
/// `end` is the address of the last byte that belongs to the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub start: u16,
    pub end: u16,
    pub callers: BTreeSet<u16>,
    pub callees: BTreeSet<u16>,
    /// Legacy bank this record is pinned to, when the disassembler knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<u8>,
}

impl FunctionRecord {
    pub fn new(name: impl Into<String>, start: u16, end: u16) -> Self {
        Self {
            name: name.into(),
            start,
            end,
            callers: BTreeSet::new(),
            callees: BTreeSet::new(),
            bank: None,
        }
    }

    pub fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&address)
    }
}

/// Class of memory-mapped device behind a hardware register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Picture processing unit registers (`$2000-$2007`).
    Ppu,
    /// Audio, DMA, and controller registers (`$4000-$4017`).
    ApuIo,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Ppu => "PPU",
            DeviceClass::ApuIo => "APU",
        }
    }
}

/// Direction of a hardware register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessKind::Read => "READ",
            AccessKind::Write => "WRITE",
        }
    }
}

/// One instruction that touches a hardware register, as reported by the disassembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAccessSite {
    pub address: u16,
    pub hw_address: u16,
    pub hw_name: String,
    pub device: DeviceClass,
    pub access: AccessKind,
}

/// A single disassembled legacy instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u16,
    pub len: u8,
    pub mnemonic: String,
    /// Operand text exactly as the disassembler printed it.
    pub operand: String,
    /// Trailing comment, kept when it carries an annotation we act on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl Instruction {
    pub fn new(address: u16, len: u8, mnemonic: &str, operand: &str) -> Self {
        Self {
            address,
            len,
            mnemonic: mnemonic.to_ascii_uppercase(),
            operand: operand.trim().to_string(),
            annotation: None,
        }
    }

    /// Address of the byte following this instruction.
    pub fn next_address(&self) -> u32 {
        self.address as u32 + self.len as u32
    }

    /// Source form, used when handing the original listing to the oracle.
    pub fn source_line(&self) -> String {
        let mut line = format!("{:04X}: {}", self.address, self.mnemonic);
        if !self.operand.is_empty() {
            line.push(' ');
            line.push_str(&self.operand);
        }
        if let Some(note) = &self.annotation {
            line.push_str(" ; ");
            line.push_str(note);
        }
        line
    }
}

/// All instructions of one legacy PRG bank, ordered by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankListing {
    pub index: u8,
    pub instructions: Vec<Instruction>,
}

impl BankListing {
    /// Instructions whose first byte lies in `start..=end`.
    pub fn slice(&self, start: u16, end: u16) -> &[Instruction] {
        let lo = self.instructions.partition_point(|i| i.address < start);
        let hi = self.instructions.partition_point(|i| i.address <= end);
        &self.instructions[lo..hi]
    }

    pub fn has_instruction_at(&self, address: u16) -> bool {
        self.instructions.binary_search_by_key(&address, |i| i.address).is_ok()
    }
}

/// Legacy CPU window a bank is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankWindow {
    /// `$8000-$BFFF`
    Switchable,
    /// `$C000-$FFFF`
    Fixed,
}

impl BankWindow {
    pub fn base(self) -> u16 {
        match self {
            BankWindow::Switchable => SWITCHABLE_WINDOW,
            BankWindow::Fixed => FIXED_WINDOW,
        }
    }

    pub fn contains(self, address: u16) -> bool {
        let base = self.base() as u32;
        (base..base + LEGACY_BANK_SIZE as u32).contains(&(address as u32))
    }
}

/// Geometry of one legacy PRG bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDescriptor {
    pub index: u8,
    pub window: BankWindow,
    pub fixed: bool,
}

impl BankDescriptor {
    /// Describe every bank of a program with `count` banks.
    ///
    /// With a fixed last bank, the last bank sits in the `$C000` window and every
    /// other bank shares the switchable window. Without one, banks alternate
    /// windows the way a 32 KiB program is laid out.
    pub fn layout(count: u8, fixed_last: bool) -> Vec<BankDescriptor> {
        (0..count)
            .map(|index| {
                let is_last = index + 1 == count;
                let fixed = fixed_last && is_last;
                let window = if fixed || (!fixed_last && index % 2 == 1) {
                    BankWindow::Fixed
                } else {
                    BankWindow::Switchable
                };
                BankDescriptor { index, window, fixed }
            })
            .collect()
    }
}

/// Interrupt entry points of the legacy program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptVectors {
    pub nmi: u16,
    pub reset: u16,
    pub irq: u16,
}

/// Summary of the legacy ROM container, produced by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomManifest {
    pub mapper_id: u16,
    pub mapper_name: String,
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub battery_backed: bool,
    pub vectors: InterruptVectors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rom: Option<String>,
}

impl RomManifest {
    pub fn has_chr_rom(&self) -> bool {
        self.chr_banks > 0
    }
}

/// Everything the disassembly collaborator produced for one legacy program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub manifest: RomManifest,
    /// Functions ordered by (bank, start).
    pub functions: Vec<FunctionRecord>,
    pub sites: Vec<RegisterAccessSite>,
    pub listings: Vec<BankListing>,
}

impl Catalog {
    pub fn listing(&self, bank: u8) -> Option<&BankListing> {
        self.listings.iter().find(|l| l.index == bank)
    }

    /// Banks whose listing holds `function`: the pinned bank when set, otherwise
    /// every bank with an instruction at the function's start address.
    pub fn banks_of(&self, function: &FunctionRecord) -> Vec<u8> {
        match function.bank {
            Some(bank) => vec![bank],
            None => self
                .listings
                .iter()
                .filter(|l| l.has_instruction_at(function.start))
                .map(|l| l.index)
                .collect(),
        }
    }
}

/// Format an address the way listings and reports print it.
pub struct Hex16(pub u16);

impl fmt::Display for Hex16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:04X}", self.0)
    }
}

/// Parse a fixed-width hex field (`0xC000`, `$C000`, or `C000`).
///
/// Exactly `width` digits are required so truncated or widened fields are
/// rejected rather than silently reinterpreted.
pub fn parse_fixed_hex(text: &str, width: usize) -> Option<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);
    if digits.len() != width || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Parse a fixed-width 16-bit address field.
pub fn parse_address(text: &str) -> Option<u16> {
    parse_fixed_hex(text, 4).map(|v| v as u16)
}
