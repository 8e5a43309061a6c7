//! Deterministic rewrite engine.
//!
//! Rewrites one legacy function, instruction by instruction, into target
//! assembly. Output depends only on the listing, the register access sites,
//! and the [`RewriteContext`]; identical inputs give byte-identical text.
//!
//! Anything outside the rule set is reported as an [`UnresolvedSite`] and the
//! offending instruction is left unrewritten. Callers must not include the
//! text of a function with unresolved sites.

pub mod operand;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::hardware::{self, Via};
use crate::mapper::{self, TriggerRule};
use crate::model::{AccessKind, BankDescriptor, FunctionRecord, Instruction, RegisterAccessSite};
use operand::{is_legacy_mnemonic, parse_operand, writes_memory, Index, Operand};

const CONDITIONAL_BRANCHES: [(&str, &str); 8] = [
    ("BPL", "BMI"),
    ("BMI", "BPL"),
    ("BVC", "BVS"),
    ("BVS", "BVC"),
    ("BCC", "BCS"),
    ("BCS", "BCC"),
    ("BNE", "BEQ"),
    ("BEQ", "BNE"),
];

pub fn is_conditional_branch(mnemonic: &str) -> bool {
    CONDITIONAL_BRANCHES.iter().any(|(m, _)| *m == mnemonic)
}

/// Branch with the opposite condition.
pub fn inverse_branch(mnemonic: &str) -> Option<&'static str> {
    CONDITIONAL_BRANCHES.iter().find(|(m, _)| *m == mnemonic).map(|(_, inv)| *inv)
}

/// Mode initialization injected at the reset entry: native mode, 8-bit
/// registers, direct page at zero, stack at the top of page one.
pub const RESET_PREAMBLE: [&str; 13] = [
    "SEI",
    "CLC",
    "XCE",
    "REP #$30",
    ".a16",
    ".i16",
    "LDX #$01FF",
    "TXS",
    "LDA #$0000",
    "TCD",
    "SEP #$30",
    ".a8",
    ".i8",
];

/// Encoded size of [`RESET_PREAMBLE`].
pub const RESET_PREAMBLE_SIZE: u32 = 15;

/// `TXS` with 8-bit index registers would clear the stack high byte. This
/// keeps the stack in page one and preserves A and the flags. Each line
/// carries its encoded size.
const STACK_TRANSFER: [(&str, u32); 15] = [
    ("STA a:HW_SCRATCH", 3),
    ("PHP", 1),
    ("PLA", 1),
    ("STA a:HW_SCRATCH+1", 3),
    ("REP #$20", 2),
    (".a16", 0),
    ("TXA", 1),
    ("ORA #$0100", 3),
    ("TCS", 1),
    ("SEP #$20", 2),
    (".a8", 0),
    ("LDA a:HW_SCRATCH+1", 3),
    ("PHA", 1),
    ("LDA a:HW_SCRATCH", 3),
    ("PLP", 1),
];

const JSL_SIZE: u32 = 4;
const JMP_SIZE: u32 = 3;
const SHORT_BRANCH_SIZE: u32 = 2;
const WIDE_BRANCH_SIZE: u32 = SHORT_BRANCH_SIZE + JMP_SIZE;

/// Why an instruction could not be rewritten deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnresolvedReason {
    MisalignedTarget { target: u16 },
    IndirectJump,
    SelfModifyingStore,
    CrossBankCall { target: u16 },
    UnknownTarget { target: u16 },
    IndexedHardwareAccess { register: String },
    UnsupportedHardwareAccess { register: String, mnemonic: String },
    MapperWriteWithoutTrigger { address: u16 },
    UnknownMnemonic { mnemonic: String },
    UnparseableOperand { operand: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::MisalignedTarget { target } => {
                write!(f, "target ${target:04X} lands inside another instruction")
            }
            UnresolvedReason::IndirectJump => f.write_str("indirect jump"),
            UnresolvedReason::SelfModifyingStore => f.write_str("self-modifying store"),
            UnresolvedReason::CrossBankCall { target } => {
                write!(f, "cross-bank transfer to ${target:04X}")
            }
            UnresolvedReason::UnknownTarget { target } => {
                write!(f, "transfer to ${target:04X}, which is not a known entry")
            }
            UnresolvedReason::IndexedHardwareAccess { register } => {
                write!(f, "indexed access to {register}")
            }
            UnresolvedReason::UnsupportedHardwareAccess { register, mnemonic } => {
                write!(f, "{mnemonic} on {register} has no wrapper")
            }
            UnresolvedReason::MapperWriteWithoutTrigger { address } => {
                write!(f, "store to ${address:04X} matches no mapper trigger")
            }
            UnresolvedReason::UnknownMnemonic { mnemonic } => write!(f, "unknown mnemonic {mnemonic}"),
            UnresolvedReason::UnparseableOperand { operand } => {
                write!(f, "unparseable operand `{operand}`")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedSite {
    pub address: u16,
    pub reason: UnresolvedReason,
}

/// Register access sites indexed by instruction address.
#[derive(Debug, Clone, Default)]
pub struct SiteIndex {
    by_address: BTreeMap<u16, Vec<RegisterAccessSite>>,
}

impl SiteIndex {
    pub fn new(sites: &[RegisterAccessSite]) -> Self {
        let mut by_address: BTreeMap<u16, Vec<RegisterAccessSite>> = BTreeMap::new();
        for site in sites {
            by_address.entry(site.address).or_default().push(site.clone());
        }
        Self { by_address }
    }

    /// Site recorded for the instruction at `address` touching `hw_address`.
    ///
    /// Listings of different banks share addresses, so a site only counts when
    /// it names the same register as the operand.
    pub fn lookup(&self, address: u16, hw_address: u16) -> Option<&RegisterAccessSite> {
        self.by_address.get(&address)?.iter().find(|site| site.hw_address == hw_address)
    }
}

/// Per-function environment for the rewrite.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    pub bank: BankDescriptor,
    /// Address of the reset entry when it lives in this bank.
    pub reset_entry: Option<u16>,
    /// Entries reachable by plain `JSR`/`JMP`, keyed by legacy address.
    pub symbols: &'a BTreeMap<u16, String>,
    pub triggers: &'a [TriggerRule],
    /// RAM ranges known to hold code.
    pub ram_code: &'a [RangeInclusive<u16>],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub text: String,
    /// Encoded size of `text` with 8-bit registers.
    pub size: u32,
    pub unresolved: Vec<UnresolvedSite>,
}

impl RewriteOutput {
    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Assembler-safe form of a function name.
pub fn sanitize_symbol(name: &str) -> String {
    let mut out: String =
        name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Global symbol of one function copy in one legacy bank.
pub fn unit_symbol(name: &str, bank: u8) -> String {
    format!("{}_B{bank:02}", sanitize_symbol(name))
}

enum Target {
    Local(u16),
    Symbol(String),
}

enum Item {
    Label(u16),
    Line { text: String, size: u32 },
    Branch { mnemonic: String, from: u16, target: u16 },
}

struct Rewriter<'a> {
    function: &'a FunctionRecord,
    listing: &'a [Instruction],
    sites: &'a SiteIndex,
    ctx: &'a RewriteContext<'a>,
    unresolved: Vec<UnresolvedSite>,
}

/// Rewrite one function. `listing` is the function's own instruction slice.
pub fn rewrite_function(
    function: &FunctionRecord,
    listing: &[Instruction],
    sites: &SiteIndex,
    ctx: &RewriteContext<'_>,
) -> RewriteOutput {
    let mut rewriter = Rewriter { function, listing, sites, ctx, unresolved: Vec::new() };
    let items = rewriter.items();
    let (text, size) = emit(&items);
    RewriteOutput { text, size, unresolved: rewriter.unresolved }
}

impl<'a> Rewriter<'a> {
    fn flag(&mut self, address: u16, reason: UnresolvedReason) {
        self.unresolved.push(UnresolvedSite { address, reason });
    }

    fn aligned(&self, address: u16) -> bool {
        self.listing.binary_search_by_key(&address, |i| i.address).is_ok()
    }

    fn resolve_target(&self, target: u16) -> Result<Target, UnresolvedReason> {
        if self.function.contains(target) {
            return if self.aligned(target) {
                Ok(Target::Local(target))
            } else {
                Err(UnresolvedReason::MisalignedTarget { target })
            };
        }
        if let Some(symbol) = self.ctx.symbols.get(&target) {
            return Ok(Target::Symbol(symbol.clone()));
        }
        if self.ctx.bank.window.contains(target) {
            Err(UnresolvedReason::UnknownTarget { target })
        } else {
            Err(UnresolvedReason::CrossBankCall { target })
        }
    }

    fn local_targets(&self) -> BTreeSet<u16> {
        let mut targets = BTreeSet::new();
        for instr in self.listing {
            let transfers = is_conditional_branch(&instr.mnemonic)
                || instr.mnemonic == "JMP"
                || instr.mnemonic == "JSR";
            if !transfers {
                continue;
            }
            if let Some(Operand::Direct { address, index: None, .. }) =
                parse_operand(&instr.operand, instr.len)
            {
                if self.function.contains(address) && self.aligned(address) {
                    targets.insert(address);
                }
            }
        }
        targets
    }

    fn items(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        if self.ctx.reset_entry == Some(self.function.start) {
            for line in RESET_PREAMBLE {
                items.push(Item::Line { text: line.to_string(), size: 0 });
            }
            if let Some(Item::Line { size, .. }) = items.first_mut() {
                *size = RESET_PREAMBLE_SIZE;
            }
        }
        let targets = self.local_targets();
        for instr in self.listing {
            if targets.contains(&instr.address) {
                items.push(Item::Label(instr.address));
            }
            match self.rewrite(instr) {
                Ok(mut rewritten) => items.append(&mut rewritten),
                Err(reason) => {
                    items.push(Item::Line {
                        text: format!("{} ; UNRESOLVED: {reason}", raw_text(instr)),
                        size: instr.len as u32,
                    });
                    self.flag(instr.address, reason);
                }
            }
        }
        items
    }

    fn rewrite(&self, instr: &Instruction) -> Result<Vec<Item>, UnresolvedReason> {
        let mnemonic = instr.mnemonic.as_str();
        if !is_legacy_mnemonic(mnemonic) {
            return Err(UnresolvedReason::UnknownMnemonic { mnemonic: mnemonic.to_string() });
        }
        let operand = parse_operand(&instr.operand, instr.len)
            .ok_or_else(|| UnresolvedReason::UnparseableOperand { operand: instr.operand.clone() })?;

        if is_conditional_branch(mnemonic) {
            let Operand::Direct { address: target, index: None, .. } = operand else {
                return Err(UnresolvedReason::UnparseableOperand { operand: instr.operand.clone() });
            };
            return match self.resolve_target(target)? {
                Target::Local(target) => {
                    Ok(vec![Item::Branch { mnemonic: mnemonic.to_string(), from: instr.address, target }])
                }
                Target::Symbol(symbol) => Ok(widened(mnemonic, instr.address, &symbol)),
            };
        }

        match mnemonic {
            "JMP" | "JSR" => {
                let target = match operand {
                    Operand::Indirect(_) => return Err(UnresolvedReason::IndirectJump),
                    Operand::Direct { address, index: None, .. } => address,
                    _ => {
                        return Err(UnresolvedReason::UnparseableOperand {
                            operand: instr.operand.clone(),
                        })
                    }
                };
                let label = match self.resolve_target(target)? {
                    Target::Local(target) => local_label(target),
                    Target::Symbol(symbol) => symbol,
                };
                return Ok(vec![line(format!("{mnemonic} {label}"), JMP_SIZE)]);
            }
            "SED" => return Ok(vec![line("NOP ; SED".to_string(), 1)]),
            "TXS" => {
                return Ok(STACK_TRANSFER.iter().map(|(text, size)| line(text.to_string(), *size)).collect())
            }
            _ => {}
        }

        if instr.annotation.is_some() && writes_memory(mnemonic) {
            return Err(UnresolvedReason::SelfModifyingStore);
        }

        if let Some(address) = operand.address() {
            if let Some(register) = hardware::resolve(address) {
                return self.hardware_call(instr, &operand, register).map(|item| vec![item]);
            }
            if writes_memory(mnemonic) {
                if self.ctx.ram_code.iter().any(|range| range.contains(&address)) {
                    return Err(UnresolvedReason::SelfModifyingStore);
                }
                if address >= crate::model::SWITCHABLE_WINDOW {
                    return self.mapper_call(mnemonic, &operand, address);
                }
            }
        }

        let size = if mnemonic == "BRK" { 2 } else { operand.target_size() };
        let rendered = operand.render();
        let text = if rendered.is_empty() { mnemonic.to_string() } else { format!("{mnemonic} {rendered}") };
        Ok(vec![line(text, size)])
    }

    fn hardware_call(
        &self,
        instr: &Instruction,
        operand: &Operand,
        register: hardware::HardwareRegister,
    ) -> Result<Item, UnresolvedReason> {
        let mnemonic = instr.mnemonic.as_str();
        if operand.is_indexed() {
            return Err(UnresolvedReason::IndexedHardwareAccess { register: register.name.to_string() });
        }
        let (access, via) = match mnemonic {
            "LDA" => (AccessKind::Read, Via::A),
            "LDX" => (AccessKind::Read, Via::X),
            "LDY" => (AccessKind::Read, Via::Y),
            "BIT" => (AccessKind::Read, Via::Bit),
            "STA" => (AccessKind::Write, Via::A),
            "STX" => (AccessKind::Write, Via::X),
            "STY" => (AccessKind::Write, Via::Y),
            _ => {
                return Err(UnresolvedReason::UnsupportedHardwareAccess {
                    register: register.name.to_string(),
                    mnemonic: mnemonic.to_string(),
                })
            }
        };
        if let Some(site) = self.sites.lookup(instr.address, register.address) {
            if site.access != access {
                return Err(UnresolvedReason::UnsupportedHardwareAccess {
                    register: register.name.to_string(),
                    mnemonic: mnemonic.to_string(),
                });
            }
        }
        let symbol = hardware::wrapper_symbol(&register, access, via);
        Ok(line(format!("JSL {symbol} ; {mnemonic} ${:04X}", register.address), JSL_SIZE))
    }

    fn mapper_call(
        &self,
        mnemonic: &str,
        operand: &Operand,
        address: u16,
    ) -> Result<Vec<Item>, UnresolvedReason> {
        let rule = match (mnemonic, operand.is_indexed()) {
            ("STA" | "STX" | "STY", false) => mapper::trigger_for(self.ctx.triggers, address),
            _ => None,
        };
        let Some(rule) = rule else {
            return Err(UnresolvedReason::MapperWriteWithoutTrigger { address });
        };
        let call = format!("JSL {} ; {mnemonic} ${address:04X}", rule.entry);
        let transfer = match mnemonic {
            "STX" => Some(Index::X),
            "STY" => Some(Index::Y),
            _ => None,
        };
        Ok(match transfer {
            None => vec![line(call, JSL_SIZE)],
            Some(index) => vec![
                line("PHP".to_string(), 1),
                line("PHA".to_string(), 1),
                line(format!("T{index}A"), 1),
                line(call, JSL_SIZE),
                line("PLA".to_string(), 1),
                line("PLP".to_string(), 1),
            ],
        })
    }
}

fn line(text: String, size: u32) -> Item {
    Item::Line { text, size }
}

fn local_label(address: u16) -> String {
    format!("L_{address:04X}")
}

fn skip_label(address: u16) -> String {
    format!("skip_{address:04X}")
}

fn widened(mnemonic: &str, from: u16, target: &str) -> Vec<Item> {
    let inverse = inverse_branch(mnemonic).unwrap_or("BRA");
    vec![
        line(format!("{inverse} {}", skip_label(from)), SHORT_BRANCH_SIZE),
        line(format!("JMP {target}"), JMP_SIZE),
        line(format!("{}:", skip_label(from)), 0),
    ]
}

fn raw_text(instr: &Instruction) -> String {
    if instr.operand.is_empty() {
        instr.mnemonic.clone()
    } else {
        format!("{} {}", instr.mnemonic, instr.operand)
    }
}

/// Lay out items, widening out-of-range branches until nothing changes.
fn relax(items: &[Item]) -> Vec<bool> {
    let mut wide = vec![false; items.len()];
    loop {
        let mut offsets = Vec::with_capacity(items.len());
        let mut labels = BTreeMap::new();
        let mut offset: i64 = 0;
        for (i, item) in items.iter().enumerate() {
            offsets.push(offset);
            offset += match item {
                Item::Label(address) => {
                    labels.insert(*address, offset);
                    0
                }
                Item::Line { size, .. } => *size as i64,
                Item::Branch { .. } if wide[i] => WIDE_BRANCH_SIZE as i64,
                Item::Branch { .. } => SHORT_BRANCH_SIZE as i64,
            };
        }
        let mut changed = false;
        for (i, item) in items.iter().enumerate() {
            let Item::Branch { target, .. } = item else { continue };
            if wide[i] {
                continue;
            }
            let Some(&dest) = labels.get(target) else { continue };
            let displacement = dest - (offsets[i] + SHORT_BRANCH_SIZE as i64);
            if !(-128..=127).contains(&displacement) {
                wide[i] = true;
                changed = true;
            }
        }
        if !changed {
            return wide;
        }
    }
}

fn emit(items: &[Item]) -> (String, u32) {
    let wide = relax(items);
    let mut out = String::new();
    let mut size = 0u32;
    for (i, item) in items.iter().enumerate() {
        match item {
            Item::Label(address) => {
                out.push_str(&local_label(*address));
                out.push_str(":\n");
            }
            Item::Line { text, size: bytes } => {
                size += bytes;
                if text.ends_with(':') {
                    out.push_str(text);
                } else {
                    out.push_str("    ");
                    out.push_str(text);
                }
                out.push('\n');
            }
            Item::Branch { mnemonic, from, target } if wide[i] => {
                size += WIDE_BRANCH_SIZE;
                let inverse = inverse_branch(mnemonic).unwrap_or("BRA");
                let skip = skip_label(*from);
                out.push_str(&format!(
                    "    {inverse} {skip}\n    JMP {}\n{skip}:\n",
                    local_label(*target)
                ));
            }
            Item::Branch { mnemonic, target, .. } => {
                size += SHORT_BRANCH_SIZE;
                out.push_str(&format!("    {mnemonic} {}\n", local_label(*target)));
            }
        }
    }
    (out, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BankWindow;

    fn ctx<'a>(symbols: &'a BTreeMap<u16, String>) -> RewriteContext<'a> {
        RewriteContext {
            bank: BankDescriptor { index: 0, window: BankWindow::Fixed, fixed: true },
            reset_entry: None,
            symbols,
            triggers: &[],
            ram_code: &[],
        }
    }

    #[test]
    fn hardware_store_becomes_wrapper_call() {
        let function = FunctionRecord::new("init", 0xC000, 0xC005);
        let listing = vec![
            Instruction::new(0xC000, 2, "LDA", "#$80"),
            Instruction::new(0xC002, 3, "STA", "$2000"),
            Instruction::new(0xC005, 1, "RTS", ""),
        ];
        let symbols = BTreeMap::new();
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &ctx(&symbols));
        assert!(out.is_resolved());
        assert!(out.text.contains("JSL PPU_CTRL_WRITE"));
        assert_eq!(out.size, 2 + 4 + 1);
    }

    #[test]
    fn indexed_hardware_access_is_unresolved() {
        let function = FunctionRecord::new("f", 0xC000, 0xC003);
        let listing = vec![
            Instruction::new(0xC000, 3, "STA", "$4000,X"),
            Instruction::new(0xC003, 1, "RTS", ""),
        ];
        let symbols = BTreeMap::new();
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &ctx(&symbols));
        assert!(matches!(
            out.unresolved[0].reason,
            UnresolvedReason::IndexedHardwareAccess { .. }
        ));
    }

    #[test]
    fn relaxation_widens_only_far_branches() {
        let mut items = vec![Item::Branch { mnemonic: "BNE".into(), from: 0, target: 1 }];
        items.push(Item::Line { text: "NOP".into(), size: 126 });
        items.push(Item::Label(1));
        assert_eq!(relax(&items), vec![false, false, false]);
        if let Item::Line { size, .. } = &mut items[1] {
            *size = 128;
        }
        assert_eq!(relax(&items), vec![true, false, false]);
    }

    /// `BNE` over 254 bytes of `NOP`s to an `RTS`.
    fn far_branch() -> (FunctionRecord, Vec<Instruction>) {
        let mut listing = vec![Instruction::new(0xC000, 2, "BNE", "$C100")];
        for address in 0xC002..0xC100u16 {
            listing.push(Instruction::new(address, 1, "NOP", ""));
        }
        listing.push(Instruction::new(0xC100, 1, "RTS", ""));
        (FunctionRecord::new("far", 0xC000, 0xC100), listing)
    }

    #[test]
    fn far_branch_is_inverted_around_a_jump() {
        let (function, listing) = far_branch();
        let symbols = BTreeMap::new();
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &ctx(&symbols));
        assert!(out.is_resolved(), "{:?}", out.unresolved);
        assert!(out.text.starts_with("    BEQ skip_C000\n    JMP L_C100\nskip_C000:\n"), "{}", out.text);
        assert!(out.text.contains("L_C100:\n    RTS\n"));
        assert!(!out.text.contains("BNE"));
        assert_eq!(out.size, WIDE_BRANCH_SIZE + 254 + 1);
    }

    #[test]
    fn rewrite_is_byte_identical_across_runs() {
        let (function, listing) = far_branch();
        let symbols = BTreeMap::from([(0xC100, "done_B00".to_string())]);
        let sites = SiteIndex::default();
        let first = rewrite_function(&function, &listing, &sites, &ctx(&symbols));
        let second = rewrite_function(&function, &listing, &sites, &ctx(&symbols));
        assert_eq!(first, second);
    }

    #[test]
    fn reset_entry_gets_mode_preamble() {
        let function = FunctionRecord::new("reset", 0xC000, 0xC001);
        let listing = vec![Instruction::new(0xC000, 1, "CLD", ""), Instruction::new(0xC001, 1, "RTS", "")];
        let symbols = BTreeMap::new();
        let mut context = ctx(&symbols);
        context.reset_entry = Some(0xC000);
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &context);
        let expected: String = RESET_PREAMBLE.iter().map(|l| format!("    {l}\n")).collect();
        assert!(out.text.starts_with(&expected), "{}", out.text);
        assert_eq!(out.size, RESET_PREAMBLE_SIZE + 2);

        context.reset_entry = Some(0xC001);
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &context);
        assert!(!out.text.contains("XCE"));
    }

    #[test]
    fn jump_into_instruction_middle_is_misaligned() {
        let function = FunctionRecord::new("f", 0xC000, 0xC005);
        let listing = vec![
            Instruction::new(0xC000, 3, "LDA", "$0300"),
            Instruction::new(0xC003, 2, "BNE", "$C001"),
            Instruction::new(0xC005, 1, "RTS", ""),
        ];
        let symbols = BTreeMap::new();
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &ctx(&symbols));
        assert_eq!(
            out.unresolved,
            vec![UnresolvedSite { address: 0xC003, reason: UnresolvedReason::MisalignedTarget { target: 0xC001 } }]
        );
        assert!(out.text.contains("BNE $C001 ; UNRESOLVED"));
    }

    #[test]
    fn stack_transfer_size_matches_its_encoding() {
        let symbols = BTreeMap::new();
        let function = FunctionRecord::new("s", 0xC000, 0xC000);
        let listing = vec![Instruction::new(0xC000, 1, "TXS", "")];
        let out = rewrite_function(&function, &listing, &SiteIndex::default(), &ctx(&symbols));
        assert_eq!(out.size, 25);
        assert!(out.text.contains("TCS"));
    }
}
