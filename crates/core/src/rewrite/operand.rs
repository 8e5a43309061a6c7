//! Legacy operand parsing, notation normalization, and target encoding sizes.

use std::fmt;

/// Official legacy instruction set.
pub const LEGACY_MNEMONICS: [&str; 56] = [
    "ADC", "AND", "ASL", "BCC", "BCS", "BEQ", "BIT", "BMI", "BNE", "BPL", "BRK", "BVC", "BVS",
    "CLC", "CLD", "CLI", "CLV", "CMP", "CPX", "CPY", "DEC", "DEX", "DEY", "EOR", "INC", "INX",
    "INY", "JMP", "JSR", "LDA", "LDX", "LDY", "LSR", "NOP", "ORA", "PHA", "PHP", "PLA", "PLP",
    "ROL", "ROR", "RTI", "RTS", "SBC", "SEC", "SED", "SEI", "STA", "STX", "STY", "TAX", "TAY",
    "TSX", "TXA", "TXS", "TYA",
];

/// Instructions that write their memory operand.
pub const STORE_MNEMONICS: [&str; 3] = ["STA", "STX", "STY"];

/// Read-modify-write instructions.
pub const RMW_MNEMONICS: [&str; 6] = ["ASL", "LSR", "ROL", "ROR", "INC", "DEC"];

pub fn is_legacy_mnemonic(mnemonic: &str) -> bool {
    LEGACY_MNEMONICS.contains(&mnemonic)
}

pub fn writes_memory(mnemonic: &str) -> bool {
    STORE_MNEMONICS.contains(&mnemonic) || RMW_MNEMONICS.contains(&mnemonic)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    X,
    Y,
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Index::X => f.write_str("X"),
            Index::Y => f.write_str("Y"),
        }
    }
}

/// A parsed legacy operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Implied,
    Accumulator,
    Immediate(u8),
    /// Zero page or absolute. `wide` is set when the legacy encoding used two
    /// address bytes.
    Direct { address: u16, wide: bool, index: Option<Index> },
    /// `($HHHH)`
    Indirect(u16),
    /// `($ZZ,X)`
    IndexedIndirect(u8),
    /// `($ZZ),Y`
    IndirectIndexed(u8),
}

impl Operand {
    /// Memory address this operand names directly, if any.
    pub fn address(&self) -> Option<u16> {
        match self {
            Operand::Direct { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            Operand::Direct { index: Some(_), .. }
                | Operand::IndexedIndirect(_)
                | Operand::IndirectIndexed(_)
        )
    }

    /// Encoded size on the target with 8-bit accumulator and index registers.
    pub fn target_size(&self) -> u32 {
        match self {
            Operand::Implied | Operand::Accumulator => 1,
            Operand::Immediate(_) | Operand::IndexedIndirect(_) | Operand::IndirectIndexed(_) => 2,
            Operand::Direct { wide: false, .. } => 2,
            Operand::Direct { wide: true, .. } | Operand::Indirect(_) => 3,
        }
    }

    /// Operand text in target assembler notation.
    ///
    /// Operands the legacy encoding addressed absolutely keep that width even
    /// when the value fits in a byte, so the assembler cannot shrink them to
    /// direct page.
    pub fn render(&self) -> String {
        match self {
            Operand::Implied => String::new(),
            Operand::Accumulator => "A".to_string(),
            Operand::Immediate(value) => format!("#${value:02X}"),
            Operand::Direct { address, wide, index } => {
                let base = match (wide, *address < 0x100) {
                    (true, true) => format!("a:${address:04X}"),
                    (true, false) => format!("${address:04X}"),
                    (false, _) => format!("${:02X}", address & 0xFF),
                };
                match index {
                    Some(index) => format!("{base},{index}"),
                    None => base,
                }
            }
            Operand::Indirect(address) => format!("(${address:04X})"),
            Operand::IndexedIndirect(zp) => format!("(${zp:02X},X)"),
            Operand::IndirectIndexed(zp) => format!("(${zp:02X}),Y"),
        }
    }
}

/// Parse a numeric literal: `$hex`, `0xhex`, `%binary`, or decimal.
///
/// Returns the value and the number of hex digits written (0 for non-hex).
fn parse_number(text: &str) -> Option<(u32, usize)> {
    let text = text.trim();
    if let Some(hex) = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
    {
        if hex.is_empty() || hex.len() > 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        return u32::from_str_radix(hex, 16).ok().map(|v| (v, hex.len()));
    }
    if let Some(bin) = text.strip_prefix('%') {
        if bin.is_empty() || bin.len() > 8 {
            return None;
        }
        return u32::from_str_radix(bin, 2).ok().map(|v| (v, 0));
    }
    if !text.is_empty() && text.len() <= 5 && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse::<u32>().ok().map(|v| (v, 0));
    }
    None
}

/// Parse operand text. `len` is the legacy encoded length, used to decide
/// between zero page and absolute when the text alone is ambiguous.
pub fn parse_operand(text: &str, len: u8) -> Option<Operand> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Operand::Implied);
    }
    if text.eq_ignore_ascii_case("A") {
        return Some(Operand::Accumulator);
    }
    if let Some(value) = text.strip_prefix('#') {
        let (value, _) = parse_number(value)?;
        return u8::try_from(value).ok().map(Operand::Immediate);
    }
    let upper = text.to_ascii_uppercase();
    if let Some(inner) = upper.strip_prefix('(') {
        if let Some(zp) = inner.strip_suffix(",X)") {
            let (value, _) = parse_number(zp)?;
            return u8::try_from(value).ok().map(Operand::IndexedIndirect);
        }
        if let Some(zp) = inner.strip_suffix("),Y") {
            let (value, _) = parse_number(zp)?;
            return u8::try_from(value).ok().map(Operand::IndirectIndexed);
        }
        let target = inner.strip_suffix(')')?;
        let (value, _) = parse_number(target)?;
        return u16::try_from(value).ok().map(Operand::Indirect);
    }

    let (base, index) = match upper.split_once(',') {
        Some((base, "X")) => (base.trim(), Some(Index::X)),
        Some((base, "Y")) => (base.trim(), Some(Index::Y)),
        Some(_) => return None,
        None => (upper.as_str(), None),
    };
    let (base, forced_abs) = match base.strip_prefix("A:") {
        Some(rest) => (rest, true),
        None => (base, false),
    };
    let (value, digits) = parse_number(base)?;
    let address = u16::try_from(value).ok()?;
    let wide = forced_abs || len == 3 || digits > 2 || address > 0xFF;
    Some(Operand::Direct { address, wide, index })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_notation() {
        let op = parse_operand("0x0a", 2).unwrap();
        assert_eq!(op.render(), "$0A");
        let op = parse_operand("#0xff", 2).unwrap();
        assert_eq!(op.render(), "#$FF");
        let op = parse_operand("$00ff,x", 3).unwrap();
        assert_eq!(op.render(), "a:$00FF,X");
        assert_eq!(op.target_size(), 3);
        let op = parse_operand("($20),y", 2).unwrap();
        assert_eq!(op.render(), "($20),Y");
    }

    #[test]
    fn rejects_symbols_and_wide_immediates() {
        assert_eq!(parse_operand("#$1234", 3), None);
        assert_eq!(parse_operand("table,X", 3), None);
        assert_eq!(parse_operand("$10,Z", 2), None);
    }
}
