use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::commands::print_json;
use rompipe_core::catalog::load_catalog;
use rompipe_core::hardware::{self, HardwareRegister, Via};
use rompipe_core::mapper::{self, MapperPlan, PlannerInput};
use rompipe_core::model::{AccessKind, Hex16};
use rompipe_core::pipeline::plan_for;

/// Where `plan-mapper` takes its input from.
#[derive(Debug, Clone)]
pub enum PlanSource {
    Catalog(String),
    Manual { mapper: u16, prg_banks: u8, chr_rom: bool },
}

/// Show the bank plan for a catalog or an explicit mapper/bank count.
pub fn plan_mapper_command(source: PlanSource, show_stub: bool, json: bool) -> Result<()> {
    let plan: MapperPlan = match source {
        PlanSource::Catalog(dir) => {
            let loaded = load_catalog(std::path::Path::new(&dir))
                .with_context(|| format!("Failed to load catalog at {dir}"))?;
            plan_for(&loaded.catalog.manifest)
        }
        PlanSource::Manual { mapper, prg_banks, chr_rom } => {
            if prg_banks == 0 {
                return Err(anyhow!("--prg-banks must be at least 1"));
            }
            mapper::plan(&PlannerInput {
                mapper_id: mapper,
                prg_banks,
                fixed_last: mapper::lookup(mapper).map_or(true, |spec| spec.fixed_last),
                has_chr_rom: chr_rom,
            })
        }
    };

    if json {
        return print_json(&plan);
    }

    println!("Mapper {} ({}): {:?}", plan.mapper_id, plan.name, plan.strategy);
    if let Some(unsupported) = &plan.unsupported {
        println!("  UNSUPPORTED: {}", unsupported.reason);
    }
    println!("Slots ({}):", plan.slots.len());
    for slot in &plan.slots {
        let half = |bank: Option<u8>| bank.map_or("-".to_string(), |b| format!("{b:02}"));
        println!(
            "  - bank ${:02X} @ 0x{:06X}: lower={} upper={}",
            slot.index,
            slot.offset,
            half(slot.lower),
            half(slot.upper)
        );
    }
    if !plan.triggers.is_empty() {
        println!("Switch triggers:");
        for rule in &plan.triggers {
            let parity = match rule.odd {
                Some(true) => " (odd)",
                Some(false) => " (even)",
                None => "",
            };
            println!(
                "  - {}-{}{} -> {}",
                Hex16(*rule.region.start()),
                Hex16(*rule.region.end()),
                parity,
                rule.entry
            );
        }
    }
    if show_stub {
        match &plan.switch_stub {
            Some(stub) => {
                println!();
                print!("{stub}");
            }
            None => println!("(no switch stub)"),
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ResolvedAddress {
    pub address: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register: Option<HardwareRegister>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wrappers: Vec<String>,
}

fn describe(address: u16) -> ResolvedAddress {
    let register = hardware::resolve(address);
    let wrappers = register
        .map(|reg| {
            vec![
                hardware::wrapper_symbol(&reg, AccessKind::Read, Via::A),
                hardware::wrapper_symbol(&reg, AccessKind::Write, Via::A),
            ]
        })
        .unwrap_or_default();
    ResolvedAddress { address, register, wrappers }
}

/// Classify addresses with the register access resolver; with no addresses,
/// print the whole register table.
pub fn resolve_command(addresses: &[u16], json: bool) -> Result<()> {
    let resolved: Vec<ResolvedAddress> = if addresses.is_empty() {
        hardware::registers().map(|reg| describe(reg.address)).collect()
    } else {
        addresses.iter().map(|&a| describe(a)).collect()
    };

    if json {
        return print_json(&resolved);
    }

    for entry in resolved {
        match entry.register {
            Some(reg) => println!(
                "{} {} [{}] -> {}",
                Hex16(entry.address),
                reg.name,
                reg.device.as_str(),
                entry.wrappers.join(", ")
            ),
            None => println!("{} (not hardware)", Hex16(entry.address)),
        }
    }
    Ok(())
}
