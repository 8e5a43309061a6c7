//! Register access resolver: legacy hardware register table and wrapper generation.
//!
//! The table is a closed, static enumeration. `resolve` is pure and total: every
//! address in `$2000-$2007` or `$4000-$4017` maps to an entry, everything else is
//! plain memory.

use std::fmt::Write as _;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::model::{AccessKind, DeviceClass};

/// Picture processing unit register range.
pub const PPU_RANGE: RangeInclusive<u16> = 0x2000..=0x2007;

/// Audio / DMA / controller register range.
pub const APU_IO_RANGE: RangeInclusive<u16> = 0x4000..=0x4017;

/// Addresses at or above this boundary belong to [`DeviceClass::ApuIo`].
pub const DEVICE_CLASS_BOUNDARY: u16 = 0x4000;

/// Absolute address of the shadow register block the wrappers forward to.
pub const SHADOW_BASE: u16 = 0x1800;

/// Offset of the two scratch bytes following the shadow slots.
pub const SCRATCH_OFFSET: u16 = 0x20;

/// Classification of one hardware register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareRegister {
    pub address: u16,
    /// Register name as the disassembler reports it.
    pub name: &'static str,
    /// Base name of the wrapper subroutines.
    pub wrapper: &'static str,
    pub device: DeviceClass,
}

impl HardwareRegister {
    /// Offset of this register's slot inside the shadow block.
    pub fn shadow_offset(&self) -> u16 {
        match self.device {
            DeviceClass::Ppu => self.address - *PPU_RANGE.start(),
            DeviceClass::ApuIo => {
                (self.address - *APU_IO_RANGE.start()) + PPU_RANGE.clone().count() as u16
            }
        }
    }
}

/// Which legacy register carries the value through the wrapper call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Via {
    A,
    X,
    Y,
    /// `BIT abs`: flags only.
    Bit,
}

impl Via {
    const ALL: [Via; 4] = [Via::A, Via::X, Via::Y, Via::Bit];
}

const PPU_TABLE: [(&str, &str); 8] = [
    ("PPUCTRL", "PPU_CTRL"),
    ("PPUMASK", "PPU_MASK"),
    ("PPUSTATUS", "PPU_STATUS"),
    ("OAMADDR", "OAM_ADDR"),
    ("OAMDATA", "OAM_DATA"),
    ("PPUSCROLL", "PPU_SCROLL"),
    ("PPUADDR", "PPU_ADDR"),
    ("PPUDATA", "PPU_DATA"),
];

const APU_IO_TABLE: [(&str, &str); 24] = [
    ("SQ1_VOL", "APU_SQ1_VOL"),
    ("SQ1_SWEEP", "APU_SQ1_SWEEP"),
    ("SQ1_LO", "APU_SQ1_LO"),
    ("SQ1_HI", "APU_SQ1_HI"),
    ("SQ2_VOL", "APU_SQ2_VOL"),
    ("SQ2_SWEEP", "APU_SQ2_SWEEP"),
    ("SQ2_LO", "APU_SQ2_LO"),
    ("SQ2_HI", "APU_SQ2_HI"),
    ("TRI_LINEAR", "APU_TRI_LINEAR"),
    ("TRI_UNUSED", "APU_TRI_UNUSED"),
    ("TRI_LO", "APU_TRI_LO"),
    ("TRI_HI", "APU_TRI_HI"),
    ("NOISE_VOL", "APU_NOISE_VOL"),
    ("NOISE_UNUSED", "APU_NOISE_UNUSED"),
    ("NOISE_LO", "APU_NOISE_LO"),
    ("NOISE_HI", "APU_NOISE_HI"),
    ("DMC_FREQ", "APU_DMC_FREQ"),
    ("DMC_RAW", "APU_DMC_RAW"),
    ("DMC_START", "APU_DMC_START"),
    ("DMC_LEN", "APU_DMC_LEN"),
    ("OAMDMA", "OAM_DMA"),
    ("APU_STATUS", "APU_STATUS"),
    ("JOY1", "JOYPAD1"),
    ("JOY2", "JOYPAD2"),
];

/// Classify an address. `None` means "not hardware".
pub fn resolve(address: u16) -> Option<HardwareRegister> {
    let (table, base, device): (&[(&'static str, &'static str)], u16, DeviceClass) =
        if PPU_RANGE.contains(&address) {
            (&PPU_TABLE, *PPU_RANGE.start(), DeviceClass::Ppu)
        } else if APU_IO_RANGE.contains(&address) {
            (&APU_IO_TABLE, *APU_IO_RANGE.start(), DeviceClass::ApuIo)
        } else {
            return None;
        };
    let (name, wrapper) = table[(address - base) as usize];
    debug_assert_eq!(device == DeviceClass::ApuIo, address >= DEVICE_CLASS_BOUNDARY);
    Some(HardwareRegister { address, name, wrapper, device })
}

/// True when `range` overlaps either hardware range.
pub fn overlaps_hardware(range: &RangeInclusive<u16>) -> bool {
    [PPU_RANGE, APU_IO_RANGE]
        .iter()
        .any(|hw| range.start() <= hw.end() && hw.start() <= range.end())
}

/// Every hardware register, in address order.
pub fn registers() -> impl Iterator<Item = HardwareRegister> {
    PPU_RANGE.chain(APU_IO_RANGE).filter_map(resolve)
}

/// Label of the wrapper subroutine for one register/access/source combination.
///
/// `BIT` always reads, so `access` is ignored for [`Via::Bit`].
pub fn wrapper_symbol(register: &HardwareRegister, access: AccessKind, via: Via) -> String {
    match via {
        Via::Bit => format!("{}_BIT", register.wrapper),
        Via::A => format!("{}_{}", register.wrapper, access.as_str()),
        Via::X => format!("{}_{}_X", register.wrapper, access.as_str()),
        Via::Y => format!("{}_{}_Y", register.wrapper, access.as_str()),
    }
}

fn wrapper_body(access: AccessKind, via: Via) -> &'static str {
    match (access, via) {
        (_, Via::Bit) => "BIT",
        (AccessKind::Read, Via::A) => "LDA",
        (AccessKind::Read, Via::X) => "LDX",
        (AccessKind::Read, Via::Y) => "LDY",
        (AccessKind::Write, Via::A) => "STA",
        (AccessKind::Write, Via::X) => "STX",
        (AccessKind::Write, Via::Y) => "STY",
    }
}

/// Assembly text defining every wrapper subroutine.
///
/// Wrappers are long subroutines (`JSL`/`RTL`) living in the system bank. Each
/// one moves the value between the named CPU register and the register's shadow
/// slot, leaving every other register and flag untouched.
pub fn wrapper_source() -> String {
    let mut out = String::new();
    out.push_str("; hardware register wrappers\n");
    let _ = writeln!(out, "HW_SHADOW = ${SHADOW_BASE:04X}");
    let _ = writeln!(out, "HW_SCRATCH = HW_SHADOW+${SCRATCH_OFFSET:02X}");
    for register in registers() {
        let _ = writeln!(out, "\n; {} ${:04X}", register.name, register.address);
        for via in Via::ALL {
            let kinds: &[AccessKind] = if via == Via::Bit {
                &[AccessKind::Read]
            } else {
                &[AccessKind::Read, AccessKind::Write]
            };
            for &access in kinds {
                let _ = writeln!(out, "{}:", wrapper_symbol(&register, access, via));
                let _ = writeln!(
                    out,
                    "    {} a:HW_SHADOW+${:02X}",
                    wrapper_body(access, via),
                    register.shadow_offset()
                );
                out.push_str("    RTL\n");
            }
        }
    }
    out
}
