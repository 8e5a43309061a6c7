use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// File offset of the LoROM internal header.
pub const HEADER_OFFSET: usize = 0x7FC0;
pub const TITLE_LEN: usize = 21;
pub const MAP_MODE_OFFSET: usize = HEADER_OFFSET + 0x15;
pub const CARTRIDGE_TYPE_OFFSET: usize = HEADER_OFFSET + 0x16;
pub const ROM_SIZE_OFFSET: usize = HEADER_OFFSET + 0x17;
pub const SRAM_SIZE_OFFSET: usize = HEADER_OFFSET + 0x18;
pub const REGION_OFFSET: usize = HEADER_OFFSET + 0x19;
pub const VERSION_OFFSET: usize = HEADER_OFFSET + 0x1B;
pub const COMPLEMENT_OFFSET: usize = 0x7FDC;
pub const CHECKSUM_OFFSET: usize = 0x7FDE;

/// LoROM, slow ROM.
pub const LOROM_MAP_MODE: u8 = 0x20;
pub const CARTRIDGE_ROM_ONLY: u8 = 0x00;
pub const CARTRIDGE_ROM_RAM_BATTERY: u8 = 0x02;
/// SRAM size code for 8 KiB, the legacy battery RAM size.
pub const SRAM_8K: u8 = 0x03;
pub const REGION_NORTH_AMERICA: u8 = 0x01;

/// Checksum fields while the checksum is computed. Both are zero, so the
/// stored checksum equals the sum of the image with the two fields cleared.
pub const COMPLEMENT_SENTINEL: u16 = 0x0000;
pub const CHECKSUM_SENTINEL: u16 = 0x0000;

/// Header values chosen before linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields {
    /// Already normalized with [`normalize_title`].
    pub title: String,
    pub cartridge_type: u8,
    pub rom_size: u8,
    pub sram_size: u8,
    pub region: u8,
    pub version: u8,
}

impl HeaderFields {
    pub fn new(title: &str, battery_backed: bool, image_len: usize) -> Self {
        Self {
            title: normalize_title(title),
            cartridge_type: if battery_backed { CARTRIDGE_ROM_RAM_BATTERY } else { CARTRIDGE_ROM_ONLY },
            rom_size: rom_size_code(image_len),
            sram_size: if battery_backed { SRAM_8K } else { 0 },
            region: REGION_NORTH_AMERICA,
            version: 0,
        }
    }

    /// Title bytes as stored in the header.
    pub fn title_bytes(&self) -> [u8; TITLE_LEN] {
        let mut out = [b' '; TITLE_LEN];
        for (slot, byte) in out.iter_mut().zip(self.title.bytes()) {
            *slot = byte;
        }
        out
    }

    /// `HEADER` segment text.
    pub fn source(&self) -> String {
        let mut out = String::from(".segment \"HEADER\"\n");
        let _ = writeln!(out, "    .byte \"{}\"", String::from_utf8_lossy(&self.title_bytes()));
        let _ = writeln!(out, "    .byte ${LOROM_MAP_MODE:02X} ; map mode");
        let _ = writeln!(out, "    .byte ${:02X} ; cartridge type", self.cartridge_type);
        let _ = writeln!(out, "    .byte ${:02X} ; rom size", self.rom_size);
        let _ = writeln!(out, "    .byte ${:02X} ; sram size", self.sram_size);
        let _ = writeln!(out, "    .byte ${:02X} ; region", self.region);
        out.push_str("    .byte $00 ; developer\n");
        let _ = writeln!(out, "    .byte ${:02X} ; version", self.version);
        let _ = writeln!(out, "    .word ${COMPLEMENT_SENTINEL:04X} ; checksum complement");
        let _ = writeln!(out, "    .word ${CHECKSUM_SENTINEL:04X} ; checksum");
        out
    }
}

/// Uppercase printable ASCII, at most [`TITLE_LEN`] characters. Characters
/// the header cannot hold become spaces.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .map(|c| if (c.is_ascii_graphic() && c != '"') || c == ' ' { c } else { ' ' })
        .take(TITLE_LEN)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Header size code: image size is `1 KiB << code`.
pub fn rom_size_code(image_len: usize) -> u8 {
    let kib = (image_len / 1024).max(1).next_power_of_two();
    kib.trailing_zeros() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_normalized_and_padded() {
        let fields = HeaderFields::new("super \"port\" of a very long name", false, 0x10000);
        assert_eq!(fields.title, "SUPER  PORT  OF A VER");
        assert_eq!(fields.title_bytes().len(), TITLE_LEN);
        let short = HeaderFields::new("demo", true, 0x10000);
        assert_eq!(&short.title_bytes()[..6], b"DEMO  ");
        assert_eq!(short.cartridge_type, CARTRIDGE_ROM_RAM_BATTERY);
    }

    #[test]
    fn size_codes() {
        assert_eq!(rom_size_code(0x20000), 7);
        assert_eq!(rom_size_code(0x40000), 8);
        assert_eq!(rom_size_code(0x18000), 7);
    }
}
