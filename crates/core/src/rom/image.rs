use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::header::{
    rom_size_code, HeaderFields, CHECKSUM_OFFSET, CHECKSUM_SENTINEL, COMPLEMENT_OFFSET,
    COMPLEMENT_SENTINEL, HEADER_OFFSET, LOROM_MAP_MODE, MAP_MODE_OFFSET, ROM_SIZE_OFFSET, TITLE_LEN,
};
use super::{RomError, RomResult};
use crate::mapper::TARGET_SLOT_SIZE;

pub const PAD_BYTE: u8 = 0xFF;

/// A finalized target image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomImage {
    bytes: Vec<u8>,
}

impl RomImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn checksum(&self) -> u16 {
        read_word(&self.bytes, CHECKSUM_OFFSET)
    }

    pub fn complement(&self) -> u16 {
        read_word(&self.bytes, COMPLEMENT_OFFSET)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Post-link fixups on a linked image.
///
/// Pads to the next power of two, rewrites the size field, checks the header
/// the assembler laid down, and stores the checksum pair. The checksum is
/// computed exactly once, over the padded image with both fields at their
/// sentinels.
pub fn finalize(mut bytes: Vec<u8>, header: &HeaderFields) -> RomResult<RomImage> {
    if bytes.len() < TARGET_SLOT_SIZE {
        return Err(RomError::TooSmall { len: bytes.len() });
    }
    let padded = bytes.len().next_power_of_two();
    bytes.resize(padded, PAD_BYTE);
    bytes[ROM_SIZE_OFFSET] = rom_size_code(padded);

    let title = &bytes[HEADER_OFFSET..HEADER_OFFSET + TITLE_LEN];
    let expected_title = header.title_bytes();
    if title != expected_title {
        return Err(RomError::HeaderMismatch {
            field: "title",
            expected: String::from_utf8_lossy(&expected_title).trim_end().to_string(),
            found: String::from_utf8_lossy(title).trim_end().to_string(),
        });
    }
    if bytes[MAP_MODE_OFFSET] != LOROM_MAP_MODE {
        return Err(RomError::HeaderMismatch {
            field: "map mode",
            expected: format!("${LOROM_MAP_MODE:02X}"),
            found: format!("${:02X}", bytes[MAP_MODE_OFFSET]),
        });
    }

    write_word(&mut bytes, COMPLEMENT_OFFSET, COMPLEMENT_SENTINEL);
    write_word(&mut bytes, CHECKSUM_OFFSET, CHECKSUM_SENTINEL);
    let sum = additive_checksum(&bytes);
    write_word(&mut bytes, COMPLEMENT_OFFSET, sum ^ 0xFFFF);
    write_word(&mut bytes, CHECKSUM_OFFSET, sum);
    Ok(RomImage { bytes })
}

/// 16-bit wrapping sum of every byte.
pub fn additive_checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Checksum of `bytes` with both checksum fields at their sentinels.
pub fn sentinel_checksum(bytes: &[u8]) -> u16 {
    let stored = bytes[COMPLEMENT_OFFSET..CHECKSUM_OFFSET + 2]
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    let sentinels = COMPLEMENT_SENTINEL.to_le_bytes().into_iter().chain(CHECKSUM_SENTINEL.to_le_bytes());
    let sentinels = sentinels.fold(0u16, |acc, b| acc.wrapping_add(b as u16));
    additive_checksum(bytes).wrapping_sub(stored).wrapping_add(sentinels)
}

/// Whether the stored pair is complementary and matches the image contents.
pub fn verify_checksum(bytes: &[u8]) -> bool {
    if bytes.len() < CHECKSUM_OFFSET + 2 {
        return false;
    }
    let checksum = read_word(bytes, CHECKSUM_OFFSET);
    let complement = read_word(bytes, COMPLEMENT_OFFSET);
    checksum ^ complement == 0xFFFF && sentinel_checksum(bytes) == checksum
}

/// Write through a temporary file in the destination directory so a failed
/// write never leaves a partial image behind.
pub fn write_image(path: &Path, image: &RomImage) -> RomResult<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| RomError::Io { path: dir.to_path_buf(), source })?;
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|source| RomError::Io { path: dir.to_path_buf(), source })?;
    tmp.write_all(image.bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|source| RomError::Io { path: tmp.path().to_path_buf(), source })?;
    tmp.persist(path).map_err(|e| RomError::Io { path: path.to_path_buf(), source: e.error })?;
    Ok(())
}

fn read_word(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn write_word(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
