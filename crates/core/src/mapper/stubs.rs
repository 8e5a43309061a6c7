//! Switch-stub text generation.
//!
//! Every entry point is a long subroutine called in place of the legacy
//! triggering store, with the stored value in A. Entries preserve A, X, and the
//! status flags, matching a plain store.

use std::fmt::Write as _;

use super::{MapperSpec, PlannerInput, TargetBankSlot, MAPPER_INIT, MAPPER_STATE_BASE};

/// BG1/BG2 character base register, the native stand-in for CHR bank selection.
const NATIVE_CHR_BASE: u16 = 0x210B;
/// Interrupt enable register; bit 5 enables the V-count IRQ.
const NATIVE_NMITIMEN: u16 = 0x4200;
/// V-count IRQ compare, low byte.
const NATIVE_VTIME_LO: u16 = 0x4209;
const NATIVE_VTIME_HI: u16 = 0x420A;

fn state_equates(out: &mut String, names: &[&str]) {
    let _ = writeln!(out, "MAPPER_STATE = ${MAPPER_STATE_BASE:04X}");
    for (offset, name) in names.iter().enumerate() {
        let _ = writeln!(out, "{name} = MAPPER_STATE+${offset:02X}");
    }
}

/// Relocation table: every legacy bank selector value -> (physical bank, half).
///
/// The table is padded to a power of two so the selector can be masked instead
/// of range-checked; padded entries wrap around to real banks.
fn relocation_table(out: &mut String, prg_banks: u8, slots: &[TargetBankSlot]) -> u8 {
    let banks = prg_banks.max(1);
    let len = (banks as u16).next_power_of_two();
    let mut physical = Vec::with_capacity(len as usize);
    let mut halves = Vec::with_capacity(len as usize);
    for selector in 0..len {
        let legacy = (selector % banks as u16) as u8;
        let (bank, half) = slots
            .iter()
            .find_map(|slot| slot.half_of(legacy).map(|half| (slot.index, half.base() >> 8)))
            .unwrap_or((0, 0));
        physical.push(format!("${bank:02X}"));
        halves.push(format!("${half:02X}"));
    }
    out.push_str("\n; legacy bank -> physical bank\n");
    let _ = writeln!(out, "MAPPER_RELOC_BANK:\n    .byte {}", physical.join(", "));
    out.push_str("; legacy bank -> window high byte\n");
    let _ = writeln!(out, "MAPPER_RELOC_HALF:\n    .byte {}", halves.join(", "));
    (len - 1) as u8
}

/// Shared tail of every software switch: X holds the legacy bank selector.
fn select_routine(out: &mut String, mask: u8) {
    out.push_str("\nMAPPER_SELECT_PRG:\n");
    let _ = writeln!(out, "    TXA\n    AND #${mask:02X}\n    TAX");
    out.push_str("    STA a:MAPPER_PRG_SELECT\n");
    out.push_str("    LDA a:MAPPER_RELOC_BANK,X\n    STA a:MAPPER_ACTIVE_BANK\n");
    out.push_str("    LDA a:MAPPER_RELOC_HALF,X\n    STA a:MAPPER_ACTIVE_HALF\n    RTS\n");
}

fn entry_open(out: &mut String, name: &str) {
    let _ = writeln!(out, "\n{name}:\n    PHP\n    PHA\n    PHX");
}

fn entry_close(out: &mut String) {
    out.push_str("    PLX\n    PLA\n    PLP\n    RTL\n");
}

/// Stub for schemes with a native equivalent: re-emit the write.
pub(super) fn native_stub(spec: &MapperSpec, has_chr_rom: bool) -> String {
    let mut out = format!("; {} switch stub (native)\n", spec.name);
    state_equates(&mut out, &["MAPPER_CHR_SELECT"]);
    let _ = writeln!(out, "\n{MAPPER_INIT}:\n    STZ a:MAPPER_CHR_SELECT\n    RTL");
    for rule in spec.triggers() {
        entry_open(&mut out, rule.entry);
        out.push_str("    AND #$03\n    STA a:MAPPER_CHR_SELECT\n");
        if has_chr_rom {
            let _ = writeln!(out, "    ASL A\n    STA ${NATIVE_CHR_BASE:04X}");
        }
        entry_close(&mut out);
    }
    out
}

/// Stub for schemes without a native equivalent: software bank-select state
/// plus a relocation table.
pub(super) fn software_stub(
    spec: &MapperSpec,
    input: &PlannerInput,
    slots: &[TargetBankSlot],
) -> String {
    let mut out = format!("; {} switch stub (software state)\n", spec.name);
    let mut state = vec!["MAPPER_PRG_SELECT", "MAPPER_ACTIVE_BANK", "MAPPER_ACTIVE_HALF"];
    match spec.id {
        1 => state.extend(["MMC1_SHIFT", "MMC1_COUNT", "MMC1_REGS"]),
        4 => state.extend(["MMC3_SELECT", "MMC3_MIRRORING", "MMC3_PRG_RAM", "MMC3_IRQ_LATCH", "MMC3_NMITIMEN", "MMC3_REGS"]),
        _ => {}
    }
    state_equates(&mut out, &state);
    let mask = relocation_table(&mut out, input.prg_banks, slots);

    let _ = writeln!(out, "\n{MAPPER_INIT}:\n    PHP\n    PHA\n    PHX\n    LDX #$00\n    JSR MAPPER_SELECT_PRG");
    match spec.id {
        1 => out.push_str("    STZ a:MMC1_SHIFT\n    STZ a:MMC1_COUNT\n    LDA #$0C\n    STA a:MMC1_REGS\n"),
        4 => out.push_str("    STZ a:MMC3_SELECT\n    STZ a:MMC3_IRQ_LATCH\n    LDA #$80\n    STA a:MMC3_NMITIMEN\n"),
        _ => {}
    }
    entry_close(&mut out);
    select_routine(&mut out, mask);

    match spec.id {
        1 => mmc1_entries(&mut out),
        4 => mmc3_entries(&mut out),
        _ => {
            for rule in spec.triggers() {
                entry_open(&mut out, rule.entry);
                out.push_str("    TAX\n    JSR MAPPER_SELECT_PRG\n");
                entry_close(&mut out);
            }
        }
    }
    out
}

fn mmc1_entries(out: &mut String) {
    for (entry, register) in [
        ("MMC1_WRITE_CONTROL", 0u8),
        ("MMC1_WRITE_CHR0", 1),
        ("MMC1_WRITE_CHR1", 2),
        ("MMC1_WRITE_PRG", 3),
    ] {
        entry_open(out, entry);
        let _ = writeln!(out, "    LDX #${register:02X}\n    JSR MMC1_SERIAL");
        entry_close(out);
    }
    // Serial port: five writes shift one bit each into the register selected by X.
    out.push_str(
        "\nMMC1_SERIAL:\n    BIT #$80\n    BNE @reset\n    LSR A\n    ROR a:MMC1_SHIFT\n    \
         INC a:MMC1_COUNT\n    LDA a:MMC1_COUNT\n    CMP #$05\n    BNE @done\n    \
         LDA a:MMC1_SHIFT\n    LSR A\n    LSR A\n    LSR A\n    STA a:MMC1_REGS,X\n    \
         STZ a:MMC1_SHIFT\n    STZ a:MMC1_COUNT\n    CPX #$03\n    BNE @done\n    \
         AND #$0F\n    TAX\n    JSR MAPPER_SELECT_PRG\n@done:\n    RTS\n@reset:\n    \
         STZ a:MMC1_SHIFT\n    STZ a:MMC1_COUNT\n    LDA a:MMC1_REGS\n    ORA #$0C\n    \
         STA a:MMC1_REGS\n    RTS\n",
    );
}

fn mmc3_entries(out: &mut String) {
    entry_open(out, "MMC3_BANK_SELECT");
    out.push_str("    STA a:MMC3_SELECT\n");
    entry_close(out);

    // R6/R7 select 8 KiB PRG banks; legacy banks are 16 KiB.
    entry_open(out, "MMC3_BANK_DATA");
    out.push_str(
        "    PHA\n    LDA a:MMC3_SELECT\n    AND #$07\n    TAX\n    PLA\n    STA a:MMC3_REGS,X\n    \
         CPX #$06\n    BCC @chr\n    LSR A\n    TAX\n    JSR MAPPER_SELECT_PRG\n@chr:\n",
    );
    entry_close(out);

    for (entry, target) in [("MMC3_MIRRORING", "MMC3_MIRRORING"), ("MMC3_PRG_RAM", "MMC3_PRG_RAM")] {
        entry_open(out, entry);
        let _ = writeln!(out, "    STA a:{target}");
        entry_close(out);
    }

    entry_open(out, "MMC3_IRQ_LATCH");
    let _ = writeln!(
        out,
        "    STA a:MMC3_IRQ_LATCH\n    STA ${NATIVE_VTIME_LO:04X}\n    STZ ${NATIVE_VTIME_HI:04X}"
    );
    entry_close(out);

    entry_open(out, "MMC3_IRQ_RELOAD");
    let _ = writeln!(out, "    LDA a:MMC3_IRQ_LATCH\n    STA ${NATIVE_VTIME_LO:04X}");
    entry_close(out);

    entry_open(out, "MMC3_IRQ_DISABLE");
    let _ = writeln!(
        out,
        "    LDA a:MMC3_NMITIMEN\n    AND #$CF\n    STA a:MMC3_NMITIMEN\n    STA ${NATIVE_NMITIMEN:04X}"
    );
    entry_close(out);

    entry_open(out, "MMC3_IRQ_ENABLE");
    let _ = writeln!(
        out,
        "    LDA a:MMC3_NMITIMEN\n    ORA #$20\n    STA a:MMC3_NMITIMEN\n    STA ${NATIVE_NMITIMEN:04X}"
    );
    entry_close(out);
}

/// Minimal layout for an unsupported scheme: initialization traps.
pub(super) fn placeholder_stub(mapper_id: u16) -> String {
    format!("; mapper {mapper_id} is not supported; placeholder layout\n{MAPPER_INIT}:\n    SEI\n    STP\n    BRA {MAPPER_INIT}\n")
}
