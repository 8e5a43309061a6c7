//! Parser for per-bank instruction listings (`bank_NN.asm`).
//!
//! Instruction lines look like:
//!
//! ```text
//! C000: A9 00     LDA #$00
//! C002: 8D 00 20  STA $2000 ; PPUCTRL
//! C005:           INC $0300 ; self-modifying store
//! ```
//!
//! The encoding bytes are optional. When they are missing the length is
//! inferred from the operand form. Label lines (`NAME:`), blank lines, and
//! comment lines are skipped.

use crate::model::{parse_address, Instruction};

/// Comment marker that flags a self-modifying store.
pub const SELF_MODIFYING_MARKER: &str = "self-modif";

/// Why a listing line could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line: usize,
    pub reason: String,
}

/// Parse one listing file into address-ordered instructions.
pub fn parse_listing(text: &str) -> Result<Vec<Instruction>, LineError> {
    let mut out: Vec<Instruction> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let (code, comment) = match raw.split_once(';') {
            Some((code, comment)) => (code.trim(), Some(comment.trim())),
            None => (raw.trim(), None),
        };
        if code.is_empty() {
            continue;
        }
        let Some((head, rest)) = code.split_once(':') else {
            return Err(LineError { line: line_no, reason: format!("unrecognized line `{code}`") });
        };
        if rest.trim().is_empty() {
            // label
            continue;
        }
        let address = parse_address(head).ok_or_else(|| LineError {
            line: line_no,
            reason: format!("malformed address `{head}`"),
        })?;
        let mut instruction = parse_body(address, rest.trim())
            .map_err(|reason| LineError { line: line_no, reason })?;
        if let Some(comment) = comment {
            if comment.to_ascii_lowercase().contains(SELF_MODIFYING_MARKER) {
                instruction.annotation = Some(comment.to_string());
            }
        }
        if let Some(prev) = out.last() {
            if instruction.address as u32 <= prev.address as u32 {
                return Err(LineError {
                    line: line_no,
                    reason: format!("address {:04X} is out of order", instruction.address),
                });
            }
        }
        out.push(instruction);
    }
    Ok(out)
}

fn parse_body(address: u16, body: &str) -> Result<Instruction, String> {
    let mut tokens = body.split_whitespace().peekable();
    let mut bytes = 0u8;
    while bytes < 3 {
        match tokens.peek() {
            Some(tok) if tok.len() == 2 && tok.chars().all(|c| c.is_ascii_hexdigit()) => {
                bytes += 1;
                tokens.next();
            }
            _ => break,
        }
    }
    let mnemonic = tokens.next().ok_or_else(|| "missing mnemonic".to_string())?;
    if mnemonic.len() != 3 || !mnemonic.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("malformed mnemonic `{mnemonic}`"));
    }
    let operand = tokens.collect::<Vec<_>>().join(" ");
    let len = if bytes > 0 {
        bytes
    } else {
        infer_length(mnemonic, &operand)
            .ok_or_else(|| format!("cannot infer length of `{mnemonic} {operand}`"))?
    };
    Ok(Instruction::new(address, len, mnemonic, &operand))
}

/// Encoded length of a legacy instruction, from its textual operand form.
pub fn infer_length(mnemonic: &str, operand: &str) -> Option<u8> {
    let mnemonic = mnemonic.to_ascii_uppercase();
    if crate::rewrite::is_conditional_branch(&mnemonic) {
        return Some(2);
    }
    let operand = operand.trim();
    if operand.is_empty() || operand.eq_ignore_ascii_case("A") {
        return Some(1);
    }
    if operand.starts_with('#') {
        return Some(2);
    }
    if let Some(inner) = operand.strip_prefix('(') {
        let upper = inner.to_ascii_uppercase();
        return if upper.ends_with(",X)") || upper.ends_with("),Y") {
            Some(2)
        } else if upper.ends_with(')') {
            Some(3)
        } else {
            None
        };
    }
    let base = operand.split(',').next().unwrap_or(operand).trim();
    if base.starts_with("a:") || base.starts_with("A:") {
        return Some(3);
    }
    let digits = base
        .strip_prefix('$')
        .or_else(|| base.strip_prefix("0x"))
        .or_else(|| base.strip_prefix("0X"))?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        1 | 2 => Some(2),
        3 | 4 => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bytes_labels_and_annotations() {
        let text = "; NES PRG Bank 00\n\nRESET_HANDLER:\nC000: 78        SEI\n\
                    C001: A9 00     LDA #$00\nC003:           INC $0300 ; self-modifying store\n";
        let instrs = parse_listing(text).unwrap();
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[1].len, 2);
        assert_eq!(instrs[2].len, 3);
        assert!(instrs[2].annotation.is_some());
    }

    #[test]
    fn rejects_out_of_order_addresses() {
        let err = parse_listing("C001: EA NOP\nC000: EA NOP\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn infers_lengths_from_operand_form() {
        assert_eq!(infer_length("LDA", "$10,X"), Some(2));
        assert_eq!(infer_length("LDA", "$0200,Y"), Some(3));
        assert_eq!(infer_length("JMP", "($0200)"), Some(3));
        assert_eq!(infer_length("LDA", "($10),Y"), Some(2));
        assert_eq!(infer_length("ASL", "A"), Some(1));
        assert_eq!(infer_length("BNE", "$C010"), Some(2));
        assert_eq!(infer_length("LDA", "label"), None);
    }
}
