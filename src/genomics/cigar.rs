//! CIGAR helpers shared by the canonicalizer, assembler and realigner.

use std::fmt::Write as _;

use super::{CigarOp, CigarOpKind};

/// Render a CIGAR in SAM text form (`*` when empty).
pub fn format_cigar(cigar: &[CigarOp]) -> String {
    if cigar.is_empty() {
        return "*".to_string();
    }
    let mut out = String::with_capacity(cigar.len() * 3);
    for op in cigar {
        let _ = write!(out, "{}{}", op.len, op.kind.symbol());
    }
    out
}

/// Parse a SAM CIGAR string. Returns `None` on malformed input.
pub fn parse_cigar(text: &str) -> Option<Vec<CigarOp>> {
    if text == "*" {
        return Some(Vec::new());
    }
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut seen_digit = false;
    for ch in text.chars() {
        if let Some(digit) = ch.to_digit(10) {
            len = len.checked_mul(10)?.checked_add(digit)?;
            seen_digit = true;
        } else {
            if !seen_digit {
                return None;
            }
            ops.push(CigarOp::new(CigarOpKind::from_symbol(ch)?, len));
            len = 0;
            seen_digit = false;
        }
    }
    if seen_digit {
        return None;
    }
    Some(ops)
}

/// Number of read bases consumed by the CIGAR.
pub fn read_length(cigar: &[CigarOp]) -> u32 {
    cigar
        .iter()
        .filter(|op| op.kind.consumes_read())
        .map(|op| op.len)
        .sum()
}

/// Number of reference bases consumed by the CIGAR.
pub fn reference_length(cigar: &[CigarOp]) -> u32 {
    cigar
        .iter()
        .filter(|op| op.kind.consumes_reference())
        .map(|op| op.len)
        .sum()
}

/// Drop soft and hard clips.
pub fn unclip(cigar: &[CigarOp]) -> Vec<CigarOp> {
    cigar.iter().copied().filter(|op| !op.kind.is_clip()).collect()
}

/// Index of the first insertion or deletion.
pub fn first_indel_index(cigar: &[CigarOp]) -> Option<usize> {
    cigar.iter().position(|op| op.kind.is_indel())
}

/// Whether any operation has length zero.
pub fn has_zero_length_element(cigar: &[CigarOp]) -> bool {
    cigar.iter().any(|op| op.len == 0)
}

/// Remove zero-length operations and merge adjacent operations of the same kind.
pub fn normalize(cigar: &[CigarOp]) -> Vec<CigarOp> {
    let mut out: Vec<CigarOp> = Vec::with_capacity(cigar.len());
    for op in cigar.iter().filter(|op| op.len > 0) {
        match out.last_mut() {
            Some(last) if last.kind == op.kind => last.len += op.len,
            _ => out.push(*op),
        }
    }
    out
}

/// Shift the indel at `indel_index` one base to the left.
///
/// The preceding alignment-match element shrinks by one and the following
/// element grows by one (a new one-base match is appended when the indel is
/// last). Returns `None` when the preceding element is not a match or is
/// already empty.
pub fn move_indel_left(cigar: &[CigarOp], indel_index: usize) -> Option<Vec<CigarOp>> {
    if indel_index == 0 || indel_index >= cigar.len() {
        return None;
    }
    let previous = cigar[indel_index - 1];
    if !previous.kind.is_alignment_match() || previous.len == 0 {
        return None;
    }

    let mut moved = Vec::with_capacity(cigar.len() + 1);
    moved.extend_from_slice(&cigar[..indel_index - 1]);
    moved.push(CigarOp::new(previous.kind, previous.len - 1));
    moved.push(cigar[indel_index]);
    match cigar.get(indel_index + 1) {
        Some(next) => {
            moved.push(CigarOp::new(next.kind, next.len + 1));
            moved.extend_from_slice(&cigar[indel_index + 2..]);
        }
        None => moved.push(CigarOp::new(CigarOpKind::Match, 1)),
    }
    Some(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_agree() {
        let cigar = parse_cigar("3S10M2D5M1I4M").unwrap();
        assert_eq!(cigar.len(), 6);
        assert_eq!(format_cigar(&cigar), "3S10M2D5M1I4M");
        assert_eq!(read_length(&cigar), 23);
        assert_eq!(reference_length(&cigar), 21);
        assert!(parse_cigar("10").is_none());
        assert!(parse_cigar("M").is_none());
        assert_eq!(format_cigar(&[]), "*");
    }

    #[test]
    fn normalize_merges_and_drops_empty() {
        let cigar = parse_cigar("3M0D2M1I0M1I").unwrap();
        assert_eq!(format_cigar(&normalize(&cigar)), "5M2I");
    }

    #[test]
    fn move_left_shifts_surrounding_matches() {
        let cigar = parse_cigar("5M2D3M").unwrap();
        let moved = move_indel_left(&cigar, 1).unwrap();
        assert_eq!(format_cigar(&moved), "4M2D4M");

        let trailing = parse_cigar("5M2I").unwrap();
        assert_eq!(format_cigar(&move_indel_left(&trailing, 1).unwrap()), "4M2I1M");

        let exhausted = parse_cigar("0M2D3M").unwrap();
        assert!(move_indel_left(&exhausted, 1).is_none());
    }
}
