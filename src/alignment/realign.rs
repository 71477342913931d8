//! Read-to-haplotype realignment and projection back onto the reference.

use super::canonicalize::{clip_dangling_indels, left_align_read};
use crate::assembly::Haplotype;
use crate::genomics::{normalize, AlignedRead, CigarOp, CigarOpKind, ReferenceWindow};

/// Affine-gap scores used for read-to-haplotype alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentScores {
    /// Score of a matching base.
    pub match_score: i32,
    /// Score of a mismatching base.
    pub mismatch: i32,
    /// Score of the first base of a gap.
    pub gap_open: i32,
    /// Score of every further gap base.
    pub gap_extend: i32,
}

impl Default for AlignmentScores {
    fn default() -> Self {
        Self {
            match_score: 200,
            mismatch: -150,
            gap_open: -260,
            gap_extend: -11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Aligned,
    ReadGap,
    HapGap,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Match,
    Insert,
    Delete,
}

const NEG: i32 = i32::MIN / 4;

/// Align `read` end to end against `haplotype`, which may overhang on both
/// sides at no cost.
///
/// Returns the haplotype offset of the first aligned column and the columns
/// in order. Gaps are `ReadGap` (read base with no haplotype base) and
/// `HapGap` (haplotype base skipped by the read).
fn semi_global(read: &[u8], haplotype: &[u8], scores: AlignmentScores) -> Option<(usize, Vec<Column>)> {
    let (m, n) = (read.len(), haplotype.len());
    if m == 0 || n == 0 {
        return None;
    }
    let width = n + 1;
    let idx = |i: usize, j: usize| i * width + j;
    let mut mat = vec![NEG; (m + 1) * width];
    let mut ins = vec![NEG; (m + 1) * width];
    let mut del = vec![NEG; (m + 1) * width];
    let mut from_mat = vec![State::Match; (m + 1) * width];
    let mut from_ins = vec![State::Match; (m + 1) * width];
    let mut from_del = vec![State::Match; (m + 1) * width];

    for j in 0..=n {
        mat[idx(0, j)] = 0;
    }

    let best_of = |cells: [(i32, State); 3]| {
        cells
            .into_iter()
            .fold((NEG, State::Match), |best, cell| if cell.0 > best.0 { cell } else { best })
    };

    for i in 1..=m {
        for j in 0..=n {
            if j > 0 {
                let s = if read[i - 1] == haplotype[j - 1] {
                    scores.match_score
                } else {
                    scores.mismatch
                };
                let p = idx(i - 1, j - 1);
                let (score, state) = best_of([
                    (mat[p], State::Match),
                    (ins[p], State::Insert),
                    (del[p], State::Delete),
                ]);
                mat[idx(i, j)] = score + s;
                from_mat[idx(i, j)] = state;

                let l = idx(i, j - 1);
                let (score, state) = best_of([
                    (mat[l] + scores.gap_open, State::Match),
                    (ins[l] + scores.gap_open, State::Insert),
                    (del[l] + scores.gap_extend, State::Delete),
                ]);
                del[idx(i, j)] = score;
                from_del[idx(i, j)] = state;
            }
            let u = idx(i - 1, j);
            let (score, state) = best_of([
                (mat[u] + scores.gap_open, State::Match),
                (ins[u] + scores.gap_extend, State::Insert),
                (del[u] + scores.gap_open, State::Delete),
            ]);
            ins[idx(i, j)] = score;
            from_ins[idx(i, j)] = state;
        }
    }

    let mut end = (NEG, 0usize, State::Match);
    for j in 0..=n {
        for (score, state) in [(mat[idx(m, j)], State::Match), (ins[idx(m, j)], State::Insert)] {
            if score > end.0 {
                end = (score, j, state);
            }
        }
    }
    let (_, mut j, mut state) = end;
    let mut i = m;
    let mut columns = Vec::with_capacity(m + 8);
    while i > 0 {
        let here = idx(i, j);
        match state {
            State::Match => {
                columns.push(Column::Aligned);
                state = from_mat[here];
                i -= 1;
                j -= 1;
            }
            State::Insert => {
                columns.push(Column::ReadGap);
                state = from_ins[here];
                i -= 1;
            }
            State::Delete => {
                columns.push(Column::HapGap);
                state = from_del[here];
                j -= 1;
            }
        }
    }
    columns.reverse();
    Some((j, columns))
}

/// Realign `read` to `haplotype` and express the alignment on the reference.
///
/// Soft-clipped bases are set aside, the remaining bases are aligned to the
/// haplotype and the result is projected through the haplotype's own CIGAR.
/// Bases hanging off either end become soft clips, the original clips are
/// restored and the first indel is left-aligned. Returns `None` when no read
/// base lands on a reference base.
pub fn realign_read_to_haplotype(
    read: &AlignedRead,
    haplotype: &Haplotype,
    window: &ReferenceWindow,
) -> Option<AlignedRead> {
    realign_with_scores(read, haplotype, window, AlignmentScores::default())
}

/// [`realign_read_to_haplotype`] with explicit alignment scores.
pub fn realign_with_scores(
    read: &AlignedRead,
    haplotype: &Haplotype,
    window: &ReferenceWindow,
    scores: AlignmentScores,
) -> Option<AlignedRead> {
    let lead = read.leading_soft_clip();
    let trail = read.trailing_soft_clip();
    let core = read.sequence.get(lead..read.len().checked_sub(trail)?)?;
    let (hap_start, columns) = semi_global(core, haplotype.bases(), scores)?;

    let hap_offsets = haplotype.reference_offsets();
    let mut mapping: Vec<Option<u32>> = Vec::with_capacity(core.len());
    let mut hap_index = hap_start;
    for column in columns {
        match column {
            Column::Aligned => {
                mapping.push(hap_offsets.get(hap_index).copied().flatten());
                hap_index += 1;
            }
            Column::ReadGap => mapping.push(None),
            Column::HapGap => hap_index += 1,
        }
    }

    let first_ref = mapping.iter().flatten().next().copied()?;
    let mut ops: Vec<CigarOp> = Vec::with_capacity(mapping.len());
    let mut last_ref: Option<u32> = None;
    for entry in mapping {
        match entry {
            Some(ref_offset) => {
                if let Some(previous) = last_ref {
                    if ref_offset > previous + 1 {
                        ops.push(CigarOp::new(CigarOpKind::Deletion, ref_offset - previous - 1));
                    }
                }
                ops.push(CigarOp::new(CigarOpKind::Match, 1));
                last_ref = Some(ref_offset);
            }
            None => ops.push(CigarOp::new(CigarOpKind::Insertion, 1)),
        }
    }

    let start = haplotype.span().start() + first_ref;
    let (_, core_cigar) = clip_dangling_indels(start - 1, normalize(&ops));
    let mut cigar = Vec::with_capacity(core_cigar.len() + 2);
    cigar.push(CigarOp::new(CigarOpKind::SoftClip, lead as u32));
    cigar.extend(core_cigar);
    cigar.push(CigarOp::new(CigarOpKind::SoftClip, trail as u32));

    let projected = read.with_alignment(start - 1, normalize(&cigar));
    Some(left_align_read(&projected, window))
}
