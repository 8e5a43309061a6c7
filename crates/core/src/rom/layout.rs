//! Master assembly and linker configuration.

use std::fmt::Write as _;

use super::header::HeaderFields;
use crate::hardware;
use crate::mapper::{MapperPlan, SlotHalf, MAPPER_INIT, TARGET_SLOT_SIZE};
use crate::model::InterruptVectors;
use crate::rewrite::RESET_PREAMBLE;
use crate::translate::TranslationUnit;

/// Physical bank holding the header, wrappers, stubs, and trampolines.
pub const SYSTEM_BANK: u8 = 0;
const SYSTEM_SIZE: usize = 0x7FC0;
const HEADER_SIZE: usize = 0x20;
const VECTORS_SIZE: usize = 0x20;

pub const TRAP_ENTRY: &str = "TRAP_ENTRY";
pub const RESET_ENTRY: &str = "RESET_ENTRY";
pub const NMI_ENTRY: &str = "NMI_ENTRY";
pub const IRQ_ENTRY: &str = "IRQ_ENTRY";

/// Assembler input for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAssembly {
    pub source: String,
    pub linker_config: String,
    /// Number of 32 KiB banks the linker lays out.
    pub banks: usize,
    pub warnings: Vec<String>,
}

impl MasterAssembly {
    /// Image size as linked.
    pub fn linked_len(&self) -> usize {
        self.banks * TARGET_SLOT_SIZE
    }
}

/// Physical banks in the linked image: the system bank plus one per slot,
/// rounded up to a power of two so the final bank is the image's last.
pub fn physical_banks(plan: &MapperPlan) -> usize {
    (1 + plan.slots.len()).next_power_of_two()
}

/// Unit placed at a legacy interrupt entry, looked up in the bank that holds
/// the legacy vector table.
fn entry_unit(units: &[TranslationUnit], bank: Option<u8>, address: u16) -> Option<&TranslationUnit> {
    let bank = bank?;
    units.iter().find(|u| u.bank() == bank && u.start() == address)
}

fn bank_segment(index: u8) -> String {
    format!("BANK{index:02X}")
}

/// Build the master assembly for `units` laid out by `plan`.
///
/// `units` must already be terminal; they are emitted in plan order, lower
/// half first within each physical bank.
pub fn master_assembly(
    plan: &MapperPlan,
    units: &[TranslationUnit],
    vectors: &InterruptVectors,
    header: &HeaderFields,
) -> MasterAssembly {
    let mut warnings = Vec::new();
    // The legacy vector table lives at the top of the last legacy bank.
    let vector_bank = plan.assignment.keys().next_back().copied();

    let mut out = String::from("; rompipe master assembly\n.p816\n.a8\n.i8\n\n");
    out.push_str(".segment \"SYSTEM\"\n");
    out.push_str(&hardware::wrapper_source());
    if let Some(stub) = &plan.switch_stub {
        out.push('\n');
        out.push_str(stub);
    }

    let _ = writeln!(out, "\n{TRAP_ENTRY}:\n    SEI\n    STP\n    BRA {TRAP_ENTRY}");

    let mut trampoline = |label: &str, name: &str, address: u16, out: &mut String| {
        let _ = writeln!(out, "\n{label}:");
        // Native mode must be entered whatever the reset unit turned into.
        if label == RESET_ENTRY {
            for line in RESET_PREAMBLE {
                let _ = writeln!(out, "    {line}");
            }
            if plan.has_init() {
                let _ = writeln!(out, "    JSL {MAPPER_INIT}");
            }
        }
        match entry_unit(units, vector_bank, address) {
            Some(unit) => {
                let target = format!("{label}_TARGET");
                let _ = writeln!(out, "    JML {target}");
                let _ = writeln!(
                    out,
                    "{target} = (.bank({sym}) << 16) | {sym}",
                    sym = unit.symbol()
                );
            }
            None => {
                warnings.push(format!(
                    "no translated function at legacy {name} entry ${address:04X}; vector traps"
                ));
                let _ = writeln!(out, "    JML {TRAP_ENTRY}");
            }
        }
    };
    trampoline(RESET_ENTRY, "RESET", vectors.reset, &mut out);
    trampoline(NMI_ENTRY, "NMI", vectors.nmi, &mut out);
    trampoline(IRQ_ENTRY, "IRQ", vectors.irq, &mut out);

    out.push('\n');
    out.push_str(&header.source());
    out.push('\n');
    out.push_str(&vector_table("SYSVECTORS"));

    for slot in &plan.slots {
        let _ = writeln!(out, "\n.segment \"{}\"", bank_segment(slot.index));
        for (half, legacy) in [(SlotHalf::Lower, slot.lower), (SlotHalf::Upper, slot.upper)] {
            let Some(legacy) = legacy else { continue };
            let _ = writeln!(out, "; legacy bank {legacy:02} (${:04X} half)", half.base());
            for unit in units.iter().filter(|u| u.bank() == legacy) {
                out.push_str(unit.translated_text());
            }
        }
    }
    out.push('\n');
    out.push_str(&vector_table("VECTORS"));

    let banks = physical_banks(plan);
    MasterAssembly { source: out, linker_config: linker_config(plan), banks, warnings }
}

/// Native and emulation vectors, `$FFE0-$FFFF`.
fn vector_table(segment: &str) -> String {
    let mut out = format!(".segment \"{segment}\"\n");
    out.push_str("    .word $0000, $0000\n");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; native COP");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; native BRK");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; native ABORT");
    let _ = writeln!(out, "    .word {NMI_ENTRY} ; native NMI");
    out.push_str("    .word $0000\n");
    let _ = writeln!(out, "    .word {IRQ_ENTRY} ; native IRQ");
    out.push_str("    .word $0000, $0000\n");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; emulation COP");
    out.push_str("    .word $0000\n");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; emulation ABORT");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; emulation NMI");
    let _ = writeln!(out, "    .word {RESET_ENTRY} ; emulation RESET");
    let _ = writeln!(out, "    .word {TRAP_ENTRY} ; emulation IRQ/BRK");
    out
}

/// ld65 configuration: one filled memory area per physical bank, with the
/// header in the system bank and the vector table at the top of both the
/// system bank and the final bank. Banks past the last slot are `$FF` filler.
pub fn linker_config(plan: &MapperPlan) -> String {
    let last = physical_banks(plan) - 1;
    let mut memory = String::from("MEMORY {\n");
    let mut segments = String::from("SEGMENTS {\n");
    let area = |name: &str, start: usize, size: usize, bank: usize| {
        format!(
            "    {name}: start = ${start:04X}, size = ${size:04X}, bank = ${bank:02X}, type = ro, fill = yes, fillval = $FF;\n"
        )
    };
    let bank_size = |bank: usize| if bank == last { TARGET_SLOT_SIZE - VECTORS_SIZE } else { TARGET_SLOT_SIZE };
    let system = SYSTEM_BANK as usize;
    memory.push_str(&area("SYSTEM", 0x8000, SYSTEM_SIZE, system));
    memory.push_str(&area("HEADER", 0x8000 + SYSTEM_SIZE, HEADER_SIZE, system));
    memory.push_str(&area("SYSVECTORS", 0x8000 + SYSTEM_SIZE + HEADER_SIZE, VECTORS_SIZE, system));
    segments.push_str("    SYSTEM: load = SYSTEM, type = ro;\n");
    segments.push_str("    HEADER: load = HEADER, type = ro;\n");
    segments.push_str("    SYSVECTORS: load = SYSVECTORS, type = ro;\n");
    for slot in &plan.slots {
        let bank = slot.index as usize;
        let name = format!("PRG{bank:02X}");
        memory.push_str(&area(&name, 0x8000, bank_size(bank), bank));
        let _ = writeln!(segments, "    {}: load = {name}, type = ro, optional = yes;", bank_segment(slot.index));
    }
    for bank in 1 + plan.slots.len()..=last {
        memory.push_str(&area(&format!("PAD{bank:02X}"), 0x8000, bank_size(bank), bank));
    }
    memory.push_str(&area("VECTORS", 0x8000 + TARGET_SLOT_SIZE - VECTORS_SIZE, VECTORS_SIZE, last));
    segments.push_str("    VECTORS: load = VECTORS, type = ro;\n");
    memory.push_str("}\n");
    segments.push_str("}\n");
    memory + &segments
}
