//! Loading the disassembly catalog from disk.
//!
//! A catalog directory holds:
//! - `rom_manifest.json` from the extraction stage,
//! - `disasm/functions.json` (address-keyed function records),
//! - `disasm/register_accesses.json` (flat list of hardware access sites),
//! - `disasm/bank_NN.asm` (one instruction listing per legacy PRG bank).
//!
//! Every problem found here is fatal for the run: a port built on a partial
//! catalog would silently drop code.

pub mod listing;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{
    parse_address, AccessKind, BankListing, Catalog, DeviceClass, FunctionRecord,
    InterruptVectors, RegisterAccessSite, RomManifest,
};

pub const MANIFEST_FILE: &str = "rom_manifest.json";
pub const DISASM_DIR: &str = "disasm";
pub const FUNCTIONS_FILE: &str = "functions.json";
pub const REGISTER_ACCESSES_FILE: &str = "register_accesses.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{file}: malformed {field} `{value}`")]
    Field { file: String, field: &'static str, value: String },

    #[error("{file}:{line}: {reason}")]
    Listing { file: String, line: usize, reason: String },

    #[error("manifest declares {expected} PRG banks but {found} listings were found")]
    BankCount { expected: u8, found: usize },

    #[error("function {name} at {start} is not present in any bank listing")]
    OrphanFunction { name: String, start: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// SHA-256 digests of every file consumed while loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDigest {
    /// Relative file name -> hex digest.
    pub files: BTreeMap<String, String>,
}

impl CatalogDigest {
    fn record(&mut self, name: &str, bytes: &[u8]) {
        self.files.insert(name.to_string(), sha256_hex(bytes));
    }

    /// One digest over all file digests, in file-name order.
    pub fn combined(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, digest) in &self.files {
            hasher.update(name.as_bytes());
            hasher.update([0]);
            hasher.update(digest.as_bytes());
            hasher.update([b'\n']);
        }
        hex(&hasher.finalize())
    }
}

/// A loaded catalog plus the digests of its inputs.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub digest: CatalogDigest,
}

#[derive(Deserialize)]
struct RawVectors {
    #[serde(rename = "NMI")]
    nmi: String,
    #[serde(rename = "RESET")]
    reset: String,
    #[serde(rename = "IRQ")]
    irq: String,
}

#[derive(Deserialize)]
struct RawManifest {
    mapper_id: u16,
    #[serde(default)]
    mapper_name: Option<String>,
    prg_rom_banks: u8,
    #[serde(default)]
    chr_rom_banks: u8,
    #[serde(default)]
    battery_backed: bool,
    interrupt_vectors: RawVectors,
    #[serde(default)]
    source_rom: Option<String>,
}

#[derive(Deserialize)]
struct RawFunction {
    name: String,
    start: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    callers: Vec<String>,
    #[serde(default)]
    callees: Vec<String>,
    #[serde(default)]
    bank: Option<u8>,
}

#[derive(Deserialize)]
struct RawSite {
    address: String,
    hw_address: String,
    hw_name: String,
    #[serde(rename = "type")]
    device: String,
    access: String,
}

/// Load and validate a catalog directory.
pub fn load_catalog(dir: &Path) -> CatalogResult<LoadedCatalog> {
    let mut digest = CatalogDigest::default();

    let manifest_bytes = read_file(&dir.join(MANIFEST_FILE))?;
    digest.record(MANIFEST_FILE, &manifest_bytes);
    let raw_manifest: RawManifest = parse_json(&dir.join(MANIFEST_FILE), &manifest_bytes)?;
    let manifest = convert_manifest(raw_manifest)?;

    let disasm = dir.join(DISASM_DIR);
    let listings = load_listings(&disasm, &mut digest)?;
    if listings.len() != manifest.prg_banks as usize {
        return Err(CatalogError::BankCount {
            expected: manifest.prg_banks,
            found: listings.len(),
        });
    }

    let functions_path = disasm.join(FUNCTIONS_FILE);
    let functions_bytes = read_file(&functions_path)?;
    digest.record(&format!("{DISASM_DIR}/{FUNCTIONS_FILE}"), &functions_bytes);
    let raw_functions: BTreeMap<String, RawFunction> =
        parse_json(&functions_path, &functions_bytes)?;

    let sites_path = disasm.join(REGISTER_ACCESSES_FILE);
    let sites_bytes = read_file(&sites_path)?;
    digest.record(&format!("{DISASM_DIR}/{REGISTER_ACCESSES_FILE}"), &sites_bytes);
    let raw_sites: Vec<RawSite> = parse_json(&sites_path, &sites_bytes)?;
    let sites = raw_sites.into_iter().map(convert_site).collect::<CatalogResult<Vec<_>>>()?;

    let mut catalog = Catalog { manifest, functions: Vec::new(), sites, listings };
    let mut functions = Vec::with_capacity(raw_functions.len());
    for (key, raw) in raw_functions {
        functions.push(convert_function(&key, raw)?);
    }
    let starts: BTreeSet<u16> = functions.iter().map(|(f, _)| f.start).collect();

    let mut keyed = Vec::with_capacity(functions.len());
    for (mut function, explicit_end) in functions {
        let banks = catalog.banks_of(&function);
        let Some(&first) = banks.first() else {
            return Err(CatalogError::OrphanFunction {
                name: function.name,
                start: format!("0x{:04X}", function.start),
            });
        };
        if !catalog.listing(first).is_some_and(|l| l.has_instruction_at(function.start)) {
            return Err(CatalogError::OrphanFunction {
                name: function.name,
                start: format!("0x{:04X}", function.start),
            });
        }
        if !explicit_end {
            function.end = infer_end(&catalog.listings, first, function.start, &starts);
        }
        keyed.push(((first, function.start), function));
    }
    keyed.sort_by_key(|(key, _)| *key);
    catalog.functions = keyed.into_iter().map(|(_, f)| f).collect();

    info!(
        mapper = catalog.manifest.mapper_id,
        banks = catalog.listings.len(),
        functions = catalog.functions.len(),
        sites = catalog.sites.len(),
        "loaded catalog from {}",
        dir.display()
    );
    Ok(LoadedCatalog { catalog, digest })
}

fn read_file(path: &Path) -> CatalogResult<Vec<u8>> {
    if !path.is_file() {
        return Err(CatalogError::Missing(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> CatalogResult<T> {
    serde_json::from_slice(bytes)
        .map_err(|source| CatalogError::Json { path: path.to_path_buf(), source })
}

fn field(file: &str, field: &'static str, value: &str) -> CatalogError {
    CatalogError::Field { file: file.to_string(), field, value: value.to_string() }
}

fn address_field(file: &str, name: &'static str, value: &str) -> CatalogResult<u16> {
    parse_address(value).ok_or_else(|| field(file, name, value))
}

fn convert_manifest(raw: RawManifest) -> CatalogResult<RomManifest> {
    let vectors = InterruptVectors {
        nmi: address_field(MANIFEST_FILE, "NMI vector", &raw.interrupt_vectors.nmi)?,
        reset: address_field(MANIFEST_FILE, "RESET vector", &raw.interrupt_vectors.reset)?,
        irq: address_field(MANIFEST_FILE, "IRQ vector", &raw.interrupt_vectors.irq)?,
    };
    if raw.prg_rom_banks == 0 {
        return Err(field(MANIFEST_FILE, "prg_rom_banks", "0"));
    }
    let mapper_name = raw
        .mapper_name
        .unwrap_or_else(|| crate::mapper::mapper_name(raw.mapper_id).to_string());
    Ok(RomManifest {
        mapper_id: raw.mapper_id,
        mapper_name,
        prg_banks: raw.prg_rom_banks,
        chr_banks: raw.chr_rom_banks,
        battery_backed: raw.battery_backed,
        vectors,
        source_rom: raw.source_rom,
    })
}

/// Returns the record and whether its end address was explicit.
fn convert_function(key: &str, raw: RawFunction) -> CatalogResult<(FunctionRecord, bool)> {
    let file = FUNCTIONS_FILE;
    let key_addr = address_field(file, "function key", key)?;
    let start = address_field(file, "start", &raw.start)?;
    if start != key_addr {
        return Err(field(file, "start", &raw.start));
    }
    let end = raw.end.as_deref().map(|end| address_field(file, "end", end)).transpose()?;
    if end.is_some_and(|end| end < start) {
        return Err(field(file, "end", raw.end.as_deref().unwrap_or_default()));
    }
    let mut record = FunctionRecord::new(raw.name, start, end.unwrap_or(start));
    for caller in &raw.callers {
        record.callers.insert(address_field(file, "caller", caller)?);
    }
    for callee in &raw.callees {
        record.callees.insert(address_field(file, "callee", callee)?);
    }
    record.bank = raw.bank;
    Ok((record, end.is_some()))
}

/// End of a function without an explicit end: the last byte before the next
/// known function start in the same listing, or the end of the listing.
fn infer_end(listings: &[BankListing], bank: u8, start: u16, starts: &BTreeSet<u16>) -> u16 {
    let Some(listing) = listings.iter().find(|l| l.index == bank) else {
        return start;
    };
    let limit = starts
        .range((Bound::Excluded(start), Bound::Unbounded))
        .find(|s| listing.has_instruction_at(**s))
        .copied();
    listing
        .instructions
        .iter()
        .filter(|i| i.address >= start && limit.map_or(true, |l| i.address < l))
        .last()
        .map(|i| (i.next_address() - 1).min(u16::MAX as u32) as u16)
        .unwrap_or(start)
}

fn convert_site(raw: RawSite) -> CatalogResult<RegisterAccessSite> {
    let file = REGISTER_ACCESSES_FILE;
    let device = match raw.device.to_ascii_uppercase().as_str() {
        "PPU" => DeviceClass::Ppu,
        "APU" | "APU_IO" | "IO" => DeviceClass::ApuIo,
        _ => return Err(field(file, "type", &raw.device)),
    };
    let access = match raw.access.to_ascii_lowercase().as_str() {
        "read" => AccessKind::Read,
        "write" => AccessKind::Write,
        _ => return Err(field(file, "access", &raw.access)),
    };
    Ok(RegisterAccessSite {
        address: address_field(file, "address", &raw.address)?,
        hw_address: address_field(file, "hw_address", &raw.hw_address)?,
        hw_name: raw.hw_name,
        device,
        access,
    })
}

fn load_listings(disasm: &Path, digest: &mut CatalogDigest) -> CatalogResult<Vec<BankListing>> {
    if !disasm.is_dir() {
        return Err(CatalogError::Missing(disasm.to_path_buf()));
    }
    let entries =
        fs::read_dir(disasm).map_err(|source| CatalogError::Io { path: disasm.into(), source })?;
    let mut found: BTreeMap<u8, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| CatalogError::Io { path: disasm.into(), source })?;
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(index) = name.strip_prefix("bank_").and_then(|s| s.strip_suffix(".asm")) else {
            continue;
        };
        let index = Some(index)
            .filter(|s| s.len() == 2 && s.chars().all(|c| c.is_ascii_digit()))
            .and_then(|s| s.parse::<u8>().ok())
            .ok_or_else(|| field(&name, "bank index", index))?;
        found.insert(index, entry.path());
    }

    let mut listings = Vec::with_capacity(found.len());
    for (position, (index, path)) in found.into_iter().enumerate() {
        let file = format!("bank_{index:02}.asm");
        if position != index as usize {
            return Err(CatalogError::Listing {
                file,
                line: 0,
                reason: format!("bank listings are not contiguous (missing bank {position})"),
            });
        }
        let bytes = read_file(&path)?;
        digest.record(&format!("{DISASM_DIR}/{file}"), &bytes);
        let text = String::from_utf8_lossy(&bytes);
        let instructions = listing::parse_listing(&text).map_err(|e| CatalogError::Listing {
            file: file.clone(),
            line: e.line,
            reason: e.reason,
        })?;
        debug!(bank = index, instructions = instructions.len(), "parsed listing");
        listings.push(BankListing { index, instructions });
    }
    Ok(listings)
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex(&Sha256::digest(bytes))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
