#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

/// Two-bank UxROM catalog with one function (`dispatch`) the rewrite engine
/// cannot resolve.
pub fn write_catalog(dir: &Path) -> PathBuf {
    let disasm = dir.join("disasm");
    fs::create_dir_all(&disasm).expect("create disasm dir");
    let manifest = json!({
        "mapper_id": 2,
        "prg_rom_banks": 2,
        "chr_rom_banks": 1,
        "interrupt_vectors": {"NMI": "0xC100", "RESET": "0xC000", "IRQ": "0xC000"}
    });
    fs::write(dir.join("rom_manifest.json"), manifest.to_string()).expect("write manifest");
    let functions = json!({
        "0x8000": {"name": "work", "start": "0x8000", "end": "0x8005"},
        "0xC000": {"name": "reset", "start": "0xC000", "end": "0xC009"},
        "0xC010": {"name": "helper", "start": "0xC010", "end": "0xC013"},
        "0xC020": {"name": "dispatch", "start": "0xC020", "end": "0xC020"},
        "0xC100": {"name": "nmi", "start": "0xC100", "end": "0xC100"}
    });
    fs::write(disasm.join("functions.json"), functions.to_string()).expect("write functions");
    fs::write(disasm.join("register_accesses.json"), "[]").expect("write register accesses");
    fs::write(
        disasm.join("bank_00.asm"),
        "8000: A9 01     LDA #$01\n8002: 8D 01 20  STA $2001\n8005: 60        RTS\n",
    )
    .expect("write bank 0");
    fs::write(
        disasm.join("bank_01.asm"),
        "C000: 78        SEI\n\
         C001: A9 00     LDA #$00\n\
         C003: 8D 00 20  STA $2000\n\
         C006: 20 10 C0  JSR $C010\n\
         C009: 4C 09 C0  JMP $C009\n\
         C010: AD 02 20  LDA $2002\n\
         C013: 60        RTS\n\
         C020: 6C 00 03  JMP ($0300)\n\
         C100: 40        RTI\n",
    )
    .expect("write bank 1");
    dir.to_path_buf()
}

/// Initialize a project at `root` and add a catalog plus a port spec named
/// `demo`. Returns the spec path relative to the root.
pub fn project_with_port(root: &Path) -> &'static str {
    assert_cmd::cargo::cargo_bin_cmd!("rompipe")
        .arg("init-project")
        .arg("--root")
        .arg(root)
        .arg("--name")
        .arg("Demo")
        .assert()
        .success();
    write_catalog(&root.join("disasm").join("demo"));
    fs::write(
        root.join("ports").join("demo.yaml"),
        "name: demo\ncatalog: disasm/demo\ntitle: Fixture Port\nworkers: 2\n",
    )
    .expect("write port spec");
    "ports/demo.yaml"
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(path, format!("#!/bin/sh\n{body}")).expect("write script");
    let mut perms = fs::metadata(path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod script");
}

/// Stand-in cc65 pair: the assembler touches its object file and the linker
/// emits a 64 KiB image carrying the fixture title and LoROM map mode.
#[cfg(unix)]
pub fn fake_cc65(dir: &Path) -> (PathBuf, PathBuf) {
    let ca65 = dir.join("ca65");
    let ld65 = dir.join("ld65");
    // ca65 --cpu 65816 -o OBJ SRC
    write_script(&ca65, "touch \"$4\"\n");
    // ld65 -C CFG -o IMG OBJ; the title is 21 bytes, then map mode $20 (a space).
    write_script(
        &ld65,
        "head -c 65536 /dev/zero | tr '\\000' '\\377' > \"$4\"\n\
         printf 'FIXTURE PORT          ' | dd of=\"$4\" bs=1 seek=32704 conv=notrunc 2>/dev/null\n",
    );
    (ca65, ld65)
}
