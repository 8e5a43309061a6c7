//! Mapper bank planner.
//!
//! Re-derives a legacy bank-switching scheme in terms of the target's fixed
//! 32 KiB bank geometry. The supported schemes form a closed table; anything
//! else gets a diagnostic plan instead of an assignment.
//!
//! The planner is pure: the same input always yields the same plan.

mod stubs;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::hardware;

/// Size of one target bank slot (two legacy banks).
pub const TARGET_SLOT_SIZE: usize = 0x8000;

/// Physical bank holding the first plan slot; bank 0 is the system bank.
pub const FIRST_PROGRAM_BANK: u8 = 1;

/// WRAM address of the software bank-select state block.
pub const MAPPER_STATE_BASE: u16 = 0x1900;

/// Symbol of the mapper initialization routine.
pub const MAPPER_INIT: &str = "MAPPER_INIT";

/// How legacy switch writes are reproduced on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchStrategy {
    /// Nothing ever switches.
    None,
    /// The triggering write is re-emitted as a native register write.
    Native,
    /// Bank-select state is kept in WRAM next to a relocation table.
    SoftwareState,
}

/// One legacy register write pattern that triggers a switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerRule {
    pub region: RangeInclusive<u16>,
    /// Required value of address bit 0, for decoders that split on it.
    pub odd: Option<bool>,
    /// Stub entry the rewritten store calls.
    pub entry: &'static str,
}

impl TriggerRule {
    pub fn matches(&self, address: u16) -> bool {
        self.region.contains(&address) && self.odd.map_or(true, |odd| (address & 1 == 1) == odd)
    }
}

/// First trigger rule matching `address`, if any.
pub fn trigger_for(rules: &[TriggerRule], address: u16) -> Option<&TriggerRule> {
    rules.iter().find(|rule| rule.matches(address))
}

/// Static description of one supported mapper scheme.
#[derive(Debug, Clone, Copy)]
pub struct MapperSpec {
    pub id: u16,
    pub name: &'static str,
    /// Whether every bank but the last is switchable.
    pub switchable_prg: bool,
    pub fixed_last: bool,
    pub strategy: SwitchStrategy,
    triggers: &'static [(u16, u16, Option<bool>, &'static str)],
}

impl MapperSpec {
    pub fn triggers(&self) -> Vec<TriggerRule> {
        self.triggers
            .iter()
            .map(|&(start, end, odd, entry)| TriggerRule { region: start..=end, odd, entry })
            .collect()
    }

    /// Number of switchable legacy banks for a program of `prg_banks` banks.
    pub fn switchable_count(&self, prg_banks: u8) -> u8 {
        if self.switchable_prg {
            prg_banks.saturating_sub(1)
        } else {
            0
        }
    }
}

const MAPPER_TABLE: [MapperSpec; 5] = [
    MapperSpec {
        id: 0,
        name: "NROM",
        switchable_prg: false,
        fixed_last: true,
        strategy: SwitchStrategy::None,
        triggers: &[],
    },
    MapperSpec {
        id: 1,
        name: "MMC1",
        switchable_prg: true,
        fixed_last: true,
        strategy: SwitchStrategy::SoftwareState,
        triggers: &[
            (0x8000, 0x9FFF, None, "MMC1_WRITE_CONTROL"),
            (0xA000, 0xBFFF, None, "MMC1_WRITE_CHR0"),
            (0xC000, 0xDFFF, None, "MMC1_WRITE_CHR1"),
            (0xE000, 0xFFFF, None, "MMC1_WRITE_PRG"),
        ],
    },
    MapperSpec {
        id: 2,
        name: "UxROM",
        switchable_prg: true,
        fixed_last: true,
        strategy: SwitchStrategy::SoftwareState,
        triggers: &[(0x8000, 0xFFFF, None, "UXROM_SELECT")],
    },
    MapperSpec {
        id: 3,
        name: "CNROM",
        switchable_prg: false,
        fixed_last: true,
        strategy: SwitchStrategy::Native,
        triggers: &[(0x8000, 0xFFFF, None, "CNROM_SELECT")],
    },
    MapperSpec {
        id: 4,
        name: "MMC3",
        switchable_prg: true,
        fixed_last: true,
        strategy: SwitchStrategy::SoftwareState,
        triggers: &[
            (0x8000, 0x9FFF, Some(false), "MMC3_BANK_SELECT"),
            (0x8000, 0x9FFF, Some(true), "MMC3_BANK_DATA"),
            (0xA000, 0xBFFF, Some(false), "MMC3_MIRRORING"),
            (0xA000, 0xBFFF, Some(true), "MMC3_PRG_RAM"),
            (0xC000, 0xDFFF, Some(false), "MMC3_IRQ_LATCH"),
            (0xC000, 0xDFFF, Some(true), "MMC3_IRQ_RELOAD"),
            (0xE000, 0xFFFF, Some(false), "MMC3_IRQ_DISABLE"),
            (0xE000, 0xFFFF, Some(true), "MMC3_IRQ_ENABLE"),
        ],
    },
];

/// Look up a supported mapper scheme.
pub fn lookup(id: u16) -> Option<&'static MapperSpec> {
    MAPPER_TABLE.iter().find(|spec| spec.id == id)
}

/// Every supported mapper scheme.
pub fn supported() -> &'static [MapperSpec] {
    &MAPPER_TABLE
}

pub fn mapper_name(id: u16) -> &'static str {
    lookup(id).map_or("Unknown", |spec| spec.name)
}

/// Half of a target slot a legacy bank occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotHalf {
    /// `$8000-$BFFF`
    Lower,
    /// `$C000-$FFFF`
    Upper,
}

impl SlotHalf {
    pub fn base(self) -> u16 {
        match self {
            SlotHalf::Lower => 0x8000,
            SlotHalf::Upper => 0xC000,
        }
    }
}

/// One 32 KiB physical bank of the target image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetBankSlot {
    /// Physical bank number.
    pub index: u8,
    /// Byte offset of the bank in the image.
    pub offset: usize,
    pub size: usize,
    pub lower: Option<u8>,
    pub upper: Option<u8>,
}

impl TargetBankSlot {
    fn new(index: u8, lower: Option<u8>, upper: Option<u8>) -> Self {
        Self { index, offset: index as usize * TARGET_SLOT_SIZE, size: TARGET_SLOT_SIZE, lower, upper }
    }

    /// Legacy banks packed into this slot, lower half first.
    pub fn legacy(&self) -> Vec<u8> {
        self.lower.into_iter().chain(self.upper).collect()
    }

    pub fn half_of(&self, bank: u8) -> Option<SlotHalf> {
        if self.lower == Some(bank) {
            Some(SlotHalf::Lower)
        } else if self.upper == Some(bank) {
            Some(SlotHalf::Upper)
        } else {
            None
        }
    }
}

/// Structured reason attached to the run report for an unsupported mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsupportedMapper {
    pub id: u16,
    pub name: String,
    pub reason: String,
}

/// What the planner needs to know about the legacy program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerInput {
    pub mapper_id: u16,
    pub prg_banks: u8,
    pub fixed_last: bool,
    pub has_chr_rom: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapperPlan {
    pub mapper_id: u16,
    pub name: String,
    pub supported: bool,
    pub strategy: SwitchStrategy,
    /// Legacy bank -> physical bank.
    pub assignment: BTreeMap<u8, u8>,
    pub slots: Vec<TargetBankSlot>,
    pub triggers: Vec<TriggerRule>,
    /// Generated switch logic, absent when the scheme never switches.
    pub switch_stub: Option<String>,
    pub unsupported: Option<UnsupportedMapper>,
}

impl MapperPlan {
    pub fn slot_of(&self, bank: u8) -> Option<&TargetBankSlot> {
        let index = *self.assignment.get(&bank)?;
        self.slots.iter().find(|slot| slot.index == index)
    }

    /// Legacy bank sharing a physical bank with `bank`, if any.
    pub fn partner_of(&self, bank: u8) -> Option<u8> {
        let slot = self.slot_of(bank)?;
        slot.legacy().into_iter().find(|&other| other != bank)
    }

    /// Whether the plan carries an initialization routine to call at reset.
    pub fn has_init(&self) -> bool {
        self.switch_stub.is_some()
    }
}

/// Compute the bank plan for one legacy program.
pub fn plan(input: &PlannerInput) -> MapperPlan {
    let Some(spec) = lookup(input.mapper_id) else {
        return diagnostic_plan(input);
    };

    let slots = pack(input.prg_banks, input.fixed_last);
    let mut assignment = BTreeMap::new();
    for slot in &slots {
        for bank in slot.legacy() {
            assignment.insert(bank, slot.index);
        }
    }

    let triggers = spec.triggers();
    let switch_stub = match spec.strategy {
        SwitchStrategy::None => None,
        SwitchStrategy::Native => Some(stubs::native_stub(spec, input.has_chr_rom)),
        SwitchStrategy::SoftwareState => Some(stubs::software_stub(spec, input, &slots)),
    };

    MapperPlan {
        mapper_id: spec.id,
        name: spec.name.to_string(),
        supported: true,
        strategy: spec.strategy,
        assignment,
        slots,
        triggers,
        switch_stub,
        unsupported: None,
    }
}

/// Pack legacy banks into target slots.
///
/// Switchable banks fill slots two at a time, lower half first. A fixed last
/// bank always sits in the upper half of the final slot so it keeps its
/// `$C000` placement.
fn pack(prg_banks: u8, fixed_last: bool) -> Vec<TargetBankSlot> {
    let mut slots = Vec::new();
    let mut next = FIRST_PROGRAM_BANK;
    let (paired, fixed) = if fixed_last && prg_banks > 0 {
        (prg_banks - 1, Some(prg_banks - 1))
    } else {
        (prg_banks, None)
    };
    let banks: Vec<u8> = (0..paired).collect();
    let mut chunks = banks.chunks(2).peekable();
    while let Some(chunk) = chunks.next() {
        let last = chunks.peek().is_none();
        match (chunk, fixed) {
            ([single], Some(fixed)) if last => {
                slots.push(TargetBankSlot::new(next, Some(*single), Some(fixed)));
                return slots;
            }
            ([lower, upper], _) => slots.push(TargetBankSlot::new(next, Some(*lower), Some(*upper))),
            ([single], None) => slots.push(TargetBankSlot::new(next, Some(*single), None)),
            _ => {}
        }
        next += 1;
    }
    if let Some(fixed) = fixed {
        slots.push(TargetBankSlot::new(next, None, Some(fixed)));
    }
    slots
}

fn diagnostic_plan(input: &PlannerInput) -> MapperPlan {
    let name = format!("Unknown (#{})", input.mapper_id);
    let supported: Vec<String> =
        MAPPER_TABLE.iter().map(|spec| format!("{} ({})", spec.id, spec.name)).collect();
    MapperPlan {
        mapper_id: input.mapper_id,
        name: name.clone(),
        supported: false,
        strategy: SwitchStrategy::None,
        assignment: BTreeMap::new(),
        slots: vec![TargetBankSlot::new(FIRST_PROGRAM_BANK, None, None)],
        triggers: Vec::new(),
        switch_stub: Some(stubs::placeholder_stub(input.mapper_id)),
        unsupported: Some(UnsupportedMapper {
            id: input.mapper_id,
            name,
            reason: format!(
                "mapper {} is outside the supported set: {}",
                input.mapper_id,
                supported.join(", ")
            ),
        }),
    }
}

/// Trigger regions that overlap a hardware register range. Always empty for
/// the built-in table.
pub fn hardware_conflicts() -> Vec<(u16, &'static str)> {
    MAPPER_TABLE
        .iter()
        .flat_map(|spec| spec.triggers())
        .filter(|rule| hardware::overlaps_hardware(&rule.region))
        .map(|rule| (*rule.region.start(), rule.entry))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_fixed_bank_into_upper_half() {
        let slots = pack(4, true);
        assert_eq!(slots.len(), 2);
        assert_eq!((slots[0].lower, slots[0].upper), (Some(0), Some(1)));
        assert_eq!((slots[1].lower, slots[1].upper), (Some(2), Some(3)));

        let slots = pack(3, true);
        assert_eq!(slots.len(), 2);
        assert_eq!((slots[1].lower, slots[1].upper), (None, Some(2)));

        let slots = pack(1, true);
        assert_eq!(slots.len(), 1);
        assert_eq!((slots[0].lower, slots[0].upper), (None, Some(0)));
    }

    #[test]
    fn unfixed_banks_pack_in_pairs() {
        let slots = pack(3, false);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].legacy(), vec![2]);
    }

    #[test]
    fn trigger_parity_selects_entry() {
        let rules = lookup(4).unwrap().triggers();
        assert_eq!(trigger_for(&rules, 0x8000).unwrap().entry, "MMC3_BANK_SELECT");
        assert_eq!(trigger_for(&rules, 0x9FFF).unwrap().entry, "MMC3_BANK_DATA");
        assert_eq!(trigger_for(&rules, 0x7FFF), None);
    }

    #[test]
    fn trigger_tables_avoid_hardware() {
        assert!(hardware_conflicts().is_empty());
    }

    #[test]
    fn plans_are_total_and_collision_free() {
        for spec in MAPPER_TABLE.iter() {
            for fixed_last in [spec.fixed_last, false] {
                for prg_banks in 1..=64u8 {
                    let input = PlannerInput { mapper_id: spec.id, prg_banks, fixed_last, has_chr_rom: true };
                    let plan = plan(&input);
                    assert!(plan.supported);

                    let keys: Vec<u8> = plan.assignment.keys().copied().collect();
                    assert_eq!(keys, (0..prg_banks).collect::<Vec<_>>(), "{} x{prg_banks}", spec.name);

                    let mut halves = std::collections::BTreeSet::new();
                    for (index, slot) in plan.slots.iter().enumerate() {
                        assert_eq!(slot.index as usize, FIRST_PROGRAM_BANK as usize + index);
                        assert_eq!(slot.offset, slot.index as usize * TARGET_SLOT_SIZE);
                        for bank in slot.legacy() {
                            assert_eq!(plan.assignment[&bank], slot.index);
                            let half = slot.half_of(bank).unwrap();
                            assert!(halves.insert((slot.index, half.base())), "{} x{prg_banks}", spec.name);
                        }
                    }
                    assert_eq!(halves.len(), prg_banks as usize);

                    if fixed_last {
                        let last = plan.slots.last().unwrap();
                        assert_eq!(last.upper, Some(prg_banks - 1));
                    }
                }
            }
        }
    }
}
