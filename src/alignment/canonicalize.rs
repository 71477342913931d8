//! Indel left-alignment.
//!
//! An indel inside a repeat can be placed at several equivalent offsets. The
//! canonical placement is the leftmost one that spells the same sequence.

use crate::genomics::{
    first_indel_index, has_zero_length_element, move_indel_left, normalize, unclip, AlignedRead,
    CigarOp, CigarOpKind, ReferenceWindow,
};

/// Left-align the first indel of `cigar`.
///
/// `reference` and `read` are the full sequences; `ref_index` is the offset
/// of the alignment start in `reference` and `read_index` the offset of the
/// first aligned base in `read` (the leading soft clip). Clips are stripped
/// from the result. The indel keeps moving while the sequence it implies is
/// unchanged; an indel that reaches the alignment start is cleaned up.
pub fn left_align_indel(
    cigar: &[CigarOp],
    reference: &[u8],
    read: &[u8],
    ref_index: usize,
    read_index: usize,
) -> Vec<CigarOp> {
    let mut current = unclip(cigar);
    let Some(indel_index) = first_indel_index(&current) else {
        return current;
    };
    if indel_index == 0 {
        return current;
    }
    let indel_len = current[indel_index].len;
    let Some(expected) = indel_string(&current, indel_index, reference, read, ref_index, read_index)
    else {
        return current;
    };

    let mut candidate = current.clone();
    let mut attempts = 0;
    while attempts < indel_len {
        let Some(moved) = move_indel_left(&candidate, indel_index) else {
            break;
        };
        candidate = moved;
        let reached_start = has_zero_length_element(&candidate);
        let spelled = indel_string(&candidate, indel_index, reference, read, ref_index, read_index);
        if spelled.as_deref() == Some(expected.as_slice()) {
            current = candidate.clone();
            attempts = 0;
            if reached_start {
                current = normalize(&current);
            }
        } else {
            attempts += 1;
        }
        if reached_start {
            break;
        }
    }
    current
}

/// The reference with the indel at `indel_index` applied.
///
/// Returns `None` when the alignment runs off either sequence.
fn indel_string(
    cigar: &[CigarOp],
    indel_index: usize,
    reference: &[u8],
    read: &[u8],
    mut ref_index: usize,
    mut read_index: usize,
) -> Option<Vec<u8>> {
    let indel = cigar[indel_index];
    let mut ref_before = 0usize;
    for op in &cigar[..indel_index] {
        let len = op.len as usize;
        match op.kind {
            kind if kind.is_alignment_match() => {
                read_index += len;
                ref_index += len;
                ref_before += len;
            }
            CigarOpKind::SoftClip => read_index += len,
            CigarOpKind::Skip => {
                ref_index += len;
                ref_before += len;
            }
            _ => {}
        }
    }

    let mut indel_len = indel.len as usize;
    if indel.kind == CigarOpKind::Deletion && ref_before + indel_len > reference.len() {
        indel_len = indel_len.saturating_sub(ref_before + indel_len - reference.len());
    }
    if ref_index > reference.len() {
        return None;
    }

    let mut spelled = Vec::with_capacity(reference.len() + indel_len);
    spelled.extend_from_slice(&reference[..ref_index]);
    match indel.kind {
        CigarOpKind::Deletion => ref_index += indel_len,
        _ => spelled.extend_from_slice(read.get(read_index..read_index + indel_len)?),
    }
    spelled.extend_from_slice(reference.get(ref_index..)?);
    Some(spelled)
}

/// Sum of base qualities at aligned positions that disagree with `window`.
pub fn mismatch_quality_sum(read: &AlignedRead, window: &ReferenceWindow) -> u32 {
    let mut total = 0u32;
    let mut ref_pos = read.alignment_start();
    let mut offset = 0usize;
    for op in &read.cigar {
        match op.kind {
            kind if kind.is_alignment_match() => {
                for i in 0..op.len {
                    let off = offset + i as usize;
                    if let (Some(base), Some(ref_base)) = (read.base_at(off), window.base_at(ref_pos + i)) {
                        if base != ref_base {
                            total += u32::from(read.quality_at(off).unwrap_or(0));
                        }
                    }
                }
                ref_pos += op.len;
                offset += op.len as usize;
            }
            kind => {
                if kind.consumes_reference() {
                    ref_pos += op.len;
                }
                if kind.consumes_read() {
                    offset += op.len as usize;
                }
            }
        }
    }
    total
}

/// 1-based reference position of each read offset (`None` for inserted or
/// clipped bases).
pub fn reference_positions(read: &AlignedRead) -> Vec<Option<u32>> {
    let mut positions = Vec::with_capacity(read.len());
    let mut ref_pos = read.alignment_start();
    for op in &read.cigar {
        match op.kind {
            kind if kind.is_alignment_match() => {
                positions.extend((0..op.len).map(|i| Some(ref_pos + i)));
                ref_pos += op.len;
            }
            kind if kind.consumes_read() => positions.extend((0..op.len).map(|_| None)),
            kind if kind.consumes_reference() => ref_pos += op.len,
            _ => {}
        }
    }
    positions
}

/// Left-align the first indel of `read` against `window`.
///
/// Clips are re-attached afterwards. An indel that ends up leading the
/// alignment is dropped (deletion, moving the start) or soft-clipped
/// (insertion). The new alignment is kept only if it does not raise the
/// mismatch-quality sum.
pub fn left_align_read(read: &AlignedRead, window: &ReferenceWindow) -> AlignedRead {
    if first_indel_index(&read.cigar).is_none() || !window.span().contains_position(read.alignment_start()) {
        return read.clone();
    }
    let ref_index = (read.alignment_start() - window.span().start()) as usize;
    let core = left_align_indel(
        &read.cigar,
        window.bases(),
        &read.sequence,
        ref_index,
        read.leading_soft_clip(),
    );

    let leading: Vec<CigarOp> = read.cigar.iter().take_while(|op| op.kind.is_clip()).copied().collect();
    let mut trailing: Vec<CigarOp> = read
        .cigar
        .iter()
        .rev()
        .take_while(|op| op.kind.is_clip())
        .copied()
        .collect();
    trailing.reverse();

    let (pos, core) = clip_dangling_indels(read.pos, core);
    let mut cigar = leading;
    cigar.extend(core);
    cigar.extend(trailing);
    let candidate = read.with_alignment(pos, normalize(&cigar));

    if mismatch_quality_sum(&candidate, window) <= mismatch_quality_sum(read, window) {
        candidate
    } else {
        read.clone()
    }
}

/// Turn leading/trailing indels of an unclipped CIGAR into clips or shifts.
pub(crate) fn clip_dangling_indels(mut pos: u32, mut core: Vec<CigarOp>) -> (u32, Vec<CigarOp>) {
    while let Some(first) = core.first().copied() {
        match first.kind {
            CigarOpKind::Deletion => {
                pos += first.len;
                core.remove(0);
            }
            CigarOpKind::Insertion => {
                core[0].kind = CigarOpKind::SoftClip;
                break;
            }
            _ => break,
        }
    }
    while let Some(last) = core.last().copied() {
        match last.kind {
            CigarOpKind::Deletion => {
                core.pop();
            }
            CigarOpKind::Insertion => {
                if let Some(op) = core.last_mut() {
                    op.kind = CigarOpKind::SoftClip;
                }
                break;
            }
            _ => break,
        }
    }
    (pos, core)
}
