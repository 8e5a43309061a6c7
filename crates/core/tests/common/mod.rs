#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rompipe_core::backends::{BuildJob, Toolchain, ToolchainError};
use rompipe_core::oracle::{
    OracleAdapter, OracleError, OracleRequest, OracleResponse, TranslationOracle,
};
use rompipe_core::pipeline::PortOptions;
use rompipe_core::translate::TranslateConfig;
use serde_json::{json, Value};

/// Marker that makes the fake toolchain reject a check.
pub const BROKEN_MARKER: &str = "BROKEN";

/// Two-bank UxROM program: a fixed bank with reset, a helper, an NMI handler,
/// and an indirect dispatcher, plus one routine in the switchable bank.
pub const FIXED_BANK: &str = "\
RESET:
C000: 78        SEI
C001: A9 00     LDA #$00
C003: 8D 00 20  STA $2000 ; PPUCTRL
C006: 20 10 C0  JSR $C010
C009: 4C 09 C0  JMP $C009
C010: AD 02 20  LDA $2002
C013: 60        RTS
C020: 6C 00 03  JMP ($0300)
C100: 40        RTI
";

pub const SWITCHABLE_BANK: &str = "\
8000: A9 01     LDA #$01
8002: 8D 01 20  STA $2001
8005: 60        RTS
";

/// Builder for catalog directories.
pub struct CatalogFixture {
    pub mapper_id: u16,
    pub prg_banks: u8,
    pub functions: Value,
    pub sites: Value,
    pub banks: Vec<String>,
}

impl CatalogFixture {
    /// The default program; the indirect dispatcher is the only function the
    /// rewrite engine cannot resolve.
    pub fn uxrom() -> Self {
        Self {
            mapper_id: 2,
            prg_banks: 2,
            functions: json!({
                "0x8000": {"name": "work", "start": "0x8000", "end": "0x8005"},
                "0xC000": {"name": "reset", "start": "0xC000", "end": "0xC009", "callees": ["0xC010"]},
                "0xC010": {"name": "helper", "start": "0xC010", "end": "0xC013", "callers": ["0xC000"]},
                "0xC020": {"name": "dispatch", "start": "0xC020", "end": "0xC020"},
                "0xC100": {"name": "nmi", "start": "0xC100", "end": "0xC100"}
            }),
            sites: json!([
                {"address": "0xC003", "hw_address": "0x2000", "hw_name": "PPUCTRL", "type": "PPU", "access": "write"},
                {"address": "0xC010", "hw_address": "0x2002", "hw_name": "PPUSTATUS", "type": "PPU", "access": "read"},
                {"address": "0x8002", "hw_address": "0x2001", "hw_name": "PPUMASK", "type": "PPU", "access": "write"}
            ]),
            banks: vec![SWITCHABLE_BANK.to_string(), FIXED_BANK.to_string()],
        }
    }

    /// Same program without the dispatcher, so every function resolves.
    pub fn resolvable() -> Self {
        let mut fixture = Self::uxrom();
        if let Some(map) = fixture.functions.as_object_mut() {
            map.remove("0xC020");
        }
        fixture
    }

    pub fn mapper(mut self, mapper_id: u16) -> Self {
        self.mapper_id = mapper_id;
        self
    }

    pub fn prg_banks(mut self, prg_banks: u8) -> Self {
        self.prg_banks = prg_banks;
        self
    }

    pub fn write(&self, dir: &Path) -> PathBuf {
        let disasm = dir.join("disasm");
        fs::create_dir_all(&disasm).expect("create disasm dir");
        let manifest = json!({
            "mapper_id": self.mapper_id,
            "prg_rom_banks": self.prg_banks,
            "chr_rom_banks": 1,
            "interrupt_vectors": {"NMI": "0xC100", "RESET": "0xC000", "IRQ": "0xC000"},
            "source_rom": "fixture.nes"
        });
        fs::write(dir.join("rom_manifest.json"), manifest.to_string()).expect("write manifest");
        fs::write(disasm.join("functions.json"), self.functions.to_string())
            .expect("write functions");
        fs::write(disasm.join("register_accesses.json"), self.sites.to_string())
            .expect("write register accesses");
        for (index, text) in self.banks.iter().enumerate() {
            fs::write(disasm.join(format!("bank_{index:02}.asm")), text).expect("write listing");
        }
        dir.to_path_buf()
    }
}

/// Stand-in for ca65/ld65. `build` lays out one 32 KiB block per memory
/// area the linker config declares for program banks, plus the system bank,
/// and copies the title from the header source into place.
#[derive(Default)]
pub struct FakeToolchain {
    pub fail_build: bool,
    pub checks: AtomicUsize,
    pub builds: AtomicUsize,
}

impl FakeToolchain {
    pub fn failing_build() -> Self {
        Self { fail_build: true, ..Self::default() }
    }
}

fn header_title(source: &str) -> Option<&str> {
    source
        .lines()
        .find_map(|line| line.trim().strip_prefix(".byte \""))
        .and_then(|rest| rest.split('"').next())
}

impl Toolchain for FakeToolchain {
    fn probe(&self) -> Result<String, ToolchainError> {
        Ok("fake 1.0".into())
    }

    fn check(&self, source: &str) -> Result<(), ToolchainError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if source.contains(BROKEN_MARKER) {
            return Err(ToolchainError::Assemble("main.s(7): Error: Illegal opcode".into()));
        }
        Ok(())
    }

    fn build(&self, job: &BuildJob) -> Result<Vec<u8>, ToolchainError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build {
            return Err(ToolchainError::Link("Segment `BANK01' overflows memory area".into()));
        }
        let program_areas = job
            .linker_config
            .lines()
            .filter(|line| {
                let line = line.trim_start();
                line.starts_with("PRG") || line.starts_with("PAD")
            })
            .count();
        let mut bytes = vec![0xFF; (program_areas + 1) * 0x8000];
        let title = header_title(&job.source).unwrap_or_default().as_bytes();
        bytes[0x7FC0..0x7FC0 + title.len()].copy_from_slice(title);
        bytes[0x7FD5] = 0x20;
        // Stand-in for assembled code so different sources yield different images.
        let digest = job.source.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        bytes[0] = digest;
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Oracle answering through a closure.
pub struct FnOracle<F> {
    pub answer: F,
    pub calls: AtomicUsize,
}

impl<F> FnOracle<F>
where
    F: Fn(&OracleRequest) -> Result<String, OracleError> + Send + Sync,
{
    pub fn new(answer: F) -> Self {
        Self { answer, calls: AtomicUsize::new(0) }
    }
}

impl<F> TranslationOracle for FnOracle<F>
where
    F: Fn(&OracleRequest) -> Result<String, OracleError> + Send + Sync,
{
    fn translate(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)(request).map(|candidate| OracleResponse { candidate })
    }

    fn name(&self) -> &str {
        "fn-oracle"
    }
}

pub fn adapter_for<O: TranslationOracle + 'static>(oracle: Arc<O>, timeout: Duration) -> OracleAdapter {
    let oracle: Arc<dyn TranslationOracle> = oracle;
    OracleAdapter::new(Some(oracle), timeout)
}

pub fn options(name: &str, catalog_dir: &Path, output_dir: &Path) -> PortOptions {
    fs::create_dir_all(output_dir).expect("create output dir");
    PortOptions {
        name: name.to_string(),
        catalog_dir: catalog_dir.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        title: "Fixture Port".into(),
        translate: TranslateConfig { workers: 2, ..TranslateConfig::default() },
    }
}
