use std::collections::BTreeMap;
use std::sync::Arc;

use crate::genomics::{AlignedRead, CigarOpKind, GenomeInterval};

/// Soft-clipped bases above this quality count as high-quality soft clips.
pub const HQ_SOFT_CLIP_QUALITY: u8 = 28;

/// One read's observation at a pileup position.
#[derive(Debug, Clone, PartialEq)]
pub struct PileupElement {
    /// Observed base (`b'-'` for deletions).
    pub base: u8,
    /// Base quality (0 for deletions).
    pub quality: u8,
    /// The read spans this position with a deletion.
    pub is_deletion: bool,
    /// The read aligns to the reverse strand.
    pub is_reverse: bool,
    /// Mapping quality of the read.
    pub mapq: u8,
    /// Index of the read in the slice the pileup was built from.
    pub read_index: usize,
    /// Offset into the read sequence (`None` for deletions).
    pub offset: Option<usize>,
    /// The base sits next to an insertion or deletion in the read.
    pub adjacent_to_indel: bool,
    /// The base sits next to a soft clip in the read.
    pub adjacent_to_soft_clip: bool,
    /// Number of soft-clipped bases in the read with quality above [`HQ_SOFT_CLIP_QUALITY`].
    pub hq_soft_clips: u32,
    /// Sample of the read.
    pub sample: Arc<str>,
}

/// All observations covering one reference position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPileup {
    /// 1-based reference position.
    pub position: u32,
    /// Observations in read order.
    pub elements: Vec<PileupElement>,
}

impl ReadPileup {
    /// Empty pileup at `position`.
    pub fn new(position: u32) -> Self {
        Self {
            position,
            elements: Vec::new(),
        }
    }

    /// Number of observations.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Whether no read covers the position.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Observations grouped by sample, in sample-name order.
    pub fn split_by_sample(&self) -> BTreeMap<Arc<str>, ReadPileup> {
        let mut by_sample: BTreeMap<Arc<str>, ReadPileup> = BTreeMap::new();
        for element in &self.elements {
            by_sample
                .entry(Arc::clone(&element.sample))
                .or_insert_with(|| ReadPileup::new(self.position))
                .elements
                .push(element.clone());
        }
        by_sample
    }
}

/// Count soft-clipped bases with quality above [`HQ_SOFT_CLIP_QUALITY`].
pub fn count_high_quality_soft_clips(read: &AlignedRead) -> u32 {
    let mut offset = 0usize;
    let mut count = 0u32;
    for op in &read.cigar {
        let len = op.len as usize;
        if op.kind == CigarOpKind::SoftClip {
            count += read
                .qualities
                .iter()
                .skip(offset)
                .take(len)
                .filter(|&&q| q > HQ_SOFT_CLIP_QUALITY)
                .count() as u32;
        }
        if op.kind.consumes_read() {
            offset += len;
        }
    }
    count
}

/// Build one pileup per position of `interval` (empty positions included).
pub fn build_pileups(reads: &[AlignedRead], interval: &GenomeInterval) -> Vec<ReadPileup> {
    let mut pileups: Vec<ReadPileup> = (interval.start()..=interval.end())
        .map(ReadPileup::new)
        .collect();

    for (read_index, read) in reads.iter().enumerate() {
        if read.chrom.as_ref() != interval.contig()
            || !read.overlaps(interval.start(), interval.end())
        {
            continue;
        }
        add_read(&mut pileups, interval, read_index, read);
    }
    pileups
}

fn add_read(
    pileups: &mut [ReadPileup],
    interval: &GenomeInterval,
    read_index: usize,
    read: &AlignedRead,
) {
    let hq_soft_clips = count_high_quality_soft_clips(read);
    let mut ref_pos = read.alignment_start();
    let mut read_offset = 0usize;

    let slot = |pos: u32| -> Option<usize> {
        interval
            .contains_position(pos)
            .then(|| (pos - interval.start()) as usize)
    };
    let element = |base, quality, offset, is_deletion| PileupElement {
        base,
        quality,
        is_deletion,
        is_reverse: read.is_reverse,
        mapq: read.mapq,
        read_index,
        offset,
        adjacent_to_indel: false,
        adjacent_to_soft_clip: false,
        hq_soft_clips,
        sample: Arc::clone(&read.sample),
    };

    for (op_index, op) in read.cigar.iter().enumerate() {
        let len = op.len;
        match op.kind {
            kind if kind.is_alignment_match() => {
                let before = op_index.checked_sub(1).map(|i| read.cigar[i].kind);
                let after = read.cigar.get(op_index + 1).map(|next| next.kind);
                for i in 0..len {
                    let Some(idx) = slot(ref_pos + i) else {
                        continue;
                    };
                    let offset = read_offset + i as usize;
                    let (Some(base), Some(quality)) = (read.base_at(offset), read.quality_at(offset))
                    else {
                        continue;
                    };
                    let mut e = element(base, quality, Some(offset), false);
                    let neighbour = (if i == 0 { before } else { None })
                        .into_iter()
                        .chain(if i + 1 == len { after } else { None });
                    for kind in neighbour {
                        e.adjacent_to_indel |= kind.is_indel();
                        e.adjacent_to_soft_clip |= kind == CigarOpKind::SoftClip;
                    }
                    pileups[idx].elements.push(e);
                }
                ref_pos += len;
                read_offset += len as usize;
            }
            CigarOpKind::Deletion => {
                for i in 0..len {
                    if let Some(idx) = slot(ref_pos + i) {
                        let mut e = element(b'-', 0, None, true);
                        e.adjacent_to_indel = true;
                        pileups[idx].elements.push(e);
                    }
                }
                ref_pos += len;
            }
            CigarOpKind::Skip => ref_pos += len,
            CigarOpKind::Insertion | CigarOpKind::SoftClip => read_offset += len as usize,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::parse_cigar;

    fn read(pos: u32, cigar: &str, seq: &[u8]) -> AlignedRead {
        AlignedRead::new(
            "chr1",
            pos,
            60,
            parse_cigar(cigar).unwrap(),
            seq.to_vec(),
            vec![35; seq.len()],
            false,
        )
    }

    #[test]
    fn pileup_tracks_bases_deletions_and_adjacency() {
        let interval = GenomeInterval::new("chr1", 1, 10).unwrap();
        let reads = vec![read(0, "3M2D3M", b"ACGTTA"), read(2, "2S4M", b"NNGTAC")];
        let pileups = build_pileups(&reads, &interval);
        assert_eq!(pileups.len(), 10);

        assert_eq!(pileups[0].depth(), 1);
        assert_eq!(pileups[0].elements[0].base, b'A');
        // Position 3 is the last base before the deletion and the first base after the clip.
        assert!(pileups[2].elements[0].adjacent_to_indel);
        assert!(pileups[2].elements[1].adjacent_to_soft_clip);
        assert_eq!(pileups[2].elements[1].hq_soft_clips, 2);
        // Deleted reference bases 4-5.
        assert!(pileups[3].elements[0].is_deletion);
        assert!(pileups[4].elements[0].is_deletion);
        assert!(pileups[5].elements[0].adjacent_to_indel);
        assert_eq!(pileups[5].elements[0].base, b'T');
        assert!(pileups[9].is_empty());
    }

    #[test]
    fn split_groups_samples() {
        let interval = GenomeInterval::new("chr1", 1, 2).unwrap();
        let reads = vec![
            read(0, "2M", b"AC").with_sample("b"),
            read(0, "2M", b"AC").with_sample("a"),
            read(0, "2M", b"AC").with_sample("b"),
        ];
        let pileups = build_pileups(&reads, &interval);
        let split = pileups[0].split_by_sample();
        let depths: Vec<_> = split.iter().map(|(s, p)| (s.to_string(), p.depth())).collect();
        assert_eq!(depths, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }
}
