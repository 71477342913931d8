use std::sync::Arc;

use tracing::debug;

use super::ref_vs_any::{ref_vs_any_likelihoods, RefVsAnyResult, REF_MODEL_DELETION_QUALITY};
use crate::assembly::{AssemblyRegion, Haplotype};
use crate::config::DEFAULT_GQ_BANDS;
use crate::genomics::{
    build_pileups, AlignedRead, CallRecord, CigarOpKind, ReadPileup, RefConfidenceBlock, VariantCall,
};
use crate::genotyping::math::{genotype_quality_from_pls, phred_scaled_likelihoods};
use crate::CallerError;

/// Indel-free reads counted towards indel confidence are capped here.
pub const MAX_INDEL_INFORMATIVE_READS: u32 = 40;

/// Genotype-quality band boundaries.
///
/// Band `i` holds qualities in `[boundary[i-1], boundary[i])`; qualities
/// below the first boundary form band 0 and those at or above the last
/// boundary the final band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GqBands {
    boundaries: Vec<u8>,
}

impl GqBands {
    /// Bands from strictly increasing boundaries in `1..=100`.
    pub fn new(boundaries: Vec<u8>) -> Result<Self, CallerError> {
        if boundaries.is_empty() {
            return Err(CallerError::Configuration("GQ bands must not be empty".into()));
        }
        if boundaries.iter().any(|&b| b == 0 || b > 100) {
            return Err(CallerError::Configuration(format!(
                "GQ band boundaries must lie in 1..=100 (got {boundaries:?})"
            )));
        }
        if boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CallerError::Configuration(format!(
                "GQ band boundaries must be strictly increasing (got {boundaries:?})"
            )));
        }
        Ok(Self { boundaries })
    }

    /// Boundaries in increasing order.
    pub fn boundaries(&self) -> &[u8] {
        &self.boundaries
    }

    /// Band holding `gq`.
    pub fn band_of(&self, gq: u8) -> usize {
        self.boundaries.partition_point(|&b| b <= gq)
    }
}

impl Default for GqBands {
    fn default() -> Self {
        Self {
            boundaries: DEFAULT_GQ_BANDS.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
struct PositionConfidence {
    position: u32,
    reference_base: u8,
    gq: u8,
    depth: u32,
    pl: [u32; 3],
}

/// Builds banded reference-confidence blocks for one sample.
#[derive(Debug, Clone)]
pub struct ReferenceConfidenceModel {
    sample: Arc<str>,
    ploidy: usize,
    min_base_quality: u8,
    bands: GqBands,
    indel_size: u32,
}

impl ReferenceConfidenceModel {
    /// Model for `sample`; reads must be free of indels within `indel_size`
    /// bases of a position to vouch for it against indels.
    pub fn new(
        sample: Arc<str>,
        ploidy: usize,
        min_base_quality: u8,
        bands: GqBands,
        indel_size: u32,
    ) -> Self {
        Self {
            sample,
            ploidy: ploidy.max(1),
            min_base_quality,
            bands,
            indel_size,
        }
    }

    /// GQ bands in use.
    pub fn bands(&self) -> &GqBands {
        &self.bands
    }

    /// Reference-confidence records over the span of `region`.
    ///
    /// Positions covered by `calls` are replaced by those calls; the remaining
    /// positions merge into blocks while they stay contiguous and in the same
    /// GQ band. Positions inside an indel of a called haplotype that no call
    /// accounts for get GQ 0. Records come out in position order.
    pub fn calculate_ref_confidence(
        &self,
        reference_haplotype: &Haplotype,
        called_haplotypes: &[Arc<Haplotype>],
        region: &AssemblyRegion,
        reads: &[AlignedRead],
        calls: &[VariantCall],
    ) -> Vec<CallRecord> {
        let span = region.span();
        let pileups = build_pileups(reads, span);
        let indels: Vec<Vec<(u32, u32)>> = reads.iter().map(indel_spans).collect();
        let mut calls: Vec<&VariantCall> = calls
            .iter()
            .filter(|c| c.contig.as_ref() == span.contig() && c.start <= span.end() && c.end >= span.start())
            .collect();
        calls.sort_by_key(|c| (c.start, c.end));
        let mut calls = calls.into_iter().peekable();

        let mut records = Vec::new();
        let mut block: Option<RefConfidenceBlock> = None;
        let mut position = span.start();
        while position <= span.end() {
            if let Some(call) = calls.next_if(|c| c.start <= position) {
                records.extend(block.take().map(CallRecord::RefBlock));
                let mut covered = call.end;
                records.push(CallRecord::Variant(call.clone()));
                while let Some(next) = calls.next_if(|c| c.start <= covered) {
                    covered = covered.max(next.end);
                    records.push(CallRecord::Variant(next.clone()));
                }
                position = covered.saturating_add(1);
                continue;
            }

            let Some(state) = self.position_confidence(
                position,
                reference_haplotype,
                called_haplotypes,
                &pileups[(position - span.start()) as usize],
                reads,
                &indels,
            ) else {
                records.extend(block.take().map(CallRecord::RefBlock));
                position += 1;
                continue;
            };

            match block.as_mut() {
                Some(current)
                    if current.end + 1 == position
                        && self.bands.band_of(current.min_gq) == self.bands.band_of(state.gq) =>
                {
                    current.end = position;
                    current.min_depth = current.min_depth.min(state.depth);
                    if state.gq < current.min_gq {
                        current.min_gq = state.gq;
                        current.pl = state.pl;
                    }
                }
                _ => {
                    records.extend(block.take().map(CallRecord::RefBlock));
                    block = Some(self.open_block(span.contig_arc(), &state));
                }
            }
            position += 1;
        }
        records.extend(block.take().map(CallRecord::RefBlock));

        debug!(region = %span, records = records.len(), "reference confidence");
        records
    }

    fn open_block(&self, contig: &Arc<str>, state: &PositionConfidence) -> RefConfidenceBlock {
        RefConfidenceBlock {
            contig: Arc::clone(contig),
            start: state.position,
            end: state.position,
            reference_base: state.reference_base,
            sample: Arc::clone(&self.sample),
            ploidy: self.ploidy,
            min_gq: state.gq,
            min_depth: state.depth,
            pl: state.pl,
        }
    }

    fn position_confidence(
        &self,
        position: u32,
        reference_haplotype: &Haplotype,
        called_haplotypes: &[Arc<Haplotype>],
        pileup: &ReadPileup,
        reads: &[AlignedRead],
        indels: &[Vec<(u32, u32)>],
    ) -> Option<PositionConfidence> {
        let hap_span = reference_haplotype.span();
        if !hap_span.contains_position(position) {
            return None;
        }
        let reference_base = *reference_haplotype
            .bases()
            .get((position - hap_span.start()) as usize)?;

        let snp = ref_vs_any_likelihoods(self.ploidy, pileup, reference_base, self.min_base_quality, None);
        let snp_pls = phred_scaled_likelihoods(&snp.capped_by_hom_ref());
        let snp_gq = genotype_quality_from_pls(&snp_pls);

        let inside_called_indel = called_haplotypes.iter().any(|h| {
            h.events()
                .iter()
                .any(|e| e.is_indel() && e.start() < position && e.end() >= position)
        });
        let (indel_gq, indel_pls) = if inside_called_indel {
            (0, vec![0; self.ploidy + 1])
        } else {
            let informative = self.indel_informative_reads(position, reads, indels);
            let mut indel = RefVsAnyResult {
                genotype_likelihoods: vec![0.0; self.ploidy + 1],
                ref_depth: 0,
                non_ref_depth: 0,
            };
            for _ in 0..informative.min(MAX_INDEL_INFORMATIVE_READS) {
                indel.add_observation(false, REF_MODEL_DELETION_QUALITY);
            }
            let pls = phred_scaled_likelihoods(&indel.genotype_likelihoods);
            (genotype_quality_from_pls(&pls), pls)
        };

        let (gq, pls) = if indel_gq < snp_gq {
            (indel_gq, indel_pls)
        } else {
            (snp_gq, snp_pls)
        };
        let pl_at = |i: usize| pls.get(i).copied().unwrap_or(0);
        Some(PositionConfidence {
            position,
            reference_base,
            gq,
            depth: snp.depth(),
            pl: [pl_at(0), pl_at(1.min(self.ploidy)), pl_at(self.ploidy)],
        })
    }

    fn indel_informative_reads(&self, position: u32, reads: &[AlignedRead], indels: &[Vec<(u32, u32)>]) -> u32 {
        let lo = position.saturating_sub(self.indel_size);
        let hi = position.saturating_add(self.indel_size);
        reads
            .iter()
            .zip(indels)
            .filter(|(read, spans)| {
                read.alignment_start() <= position
                    && read.alignment_end() >= position
                    && spans.iter().all(|&(start, end)| end < lo || start > hi)
            })
            .count() as u32
    }
}

/// Reference spans of a read's indels: deletions cover their deleted bases,
/// insertions the base they follow.
fn indel_spans(read: &AlignedRead) -> Vec<(u32, u32)> {
    let mut spans = Vec::new();
    let mut ref_pos = read.alignment_start();
    for op in &read.cigar {
        match op.kind {
            CigarOpKind::Deletion => {
                spans.push((ref_pos, ref_pos + op.len - 1));
                ref_pos += op.len;
            }
            CigarOpKind::Insertion => {
                let anchor = ref_pos.saturating_sub(1);
                spans.push((anchor, anchor));
            }
            kind if kind.consumes_reference() => ref_pos += op.len,
            _ => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{parse_cigar, GenomeInterval, ReferenceWindow, VariantEvent};
    use test_case::test_case;

    const REFERENCE: &[u8] = b"CTGACCTAGGCATTACGGATCCAAGTCAGTACGTTGCA";

    fn window() -> ReferenceWindow {
        ReferenceWindow::new(GenomeInterval::new("chr1", 1, REFERENCE.len() as u32).unwrap(), REFERENCE).unwrap()
    }

    fn region(start: u32, end: u32) -> AssemblyRegion {
        AssemblyRegion::new(GenomeInterval::new("chr1", start, end).unwrap(), window().span().clone(), true)
    }

    fn model() -> ReferenceConfidenceModel {
        ReferenceConfidenceModel::new(Arc::from("s1"), 2, 10, GqBands::default(), 5)
    }

    fn reads(count: usize) -> Vec<AlignedRead> {
        (0..count)
            .map(|_| {
                AlignedRead::new("chr1", 0, 60, parse_cigar("38M").unwrap(), REFERENCE.to_vec(), vec![30; 38], false)
            })
            .collect()
    }

    fn blocks(records: &[CallRecord]) -> Vec<&RefConfidenceBlock> {
        records
            .iter()
            .filter_map(|r| match r {
                CallRecord::RefBlock(b) => Some(b),
                CallRecord::Variant(_) => None,
            })
            .collect()
    }

    #[test_case(vec![], false ; "empty")]
    #[test_case(vec![0, 10], false ; "zero boundary")]
    #[test_case(vec![10, 10], false ; "not increasing")]
    #[test_case(vec![20, 101], false ; "above 100")]
    #[test_case(vec![1, 10, 20, 30, 40, 50, 60, 99], true ; "default")]
    fn band_validation(boundaries: Vec<u8>, ok: bool) {
        assert_eq!(GqBands::new(boundaries).is_ok(), ok);
    }

    #[test]
    fn band_assignment() {
        let bands = GqBands::default();
        assert_eq!(bands.band_of(0), 0);
        assert_eq!(bands.band_of(1), 1);
        assert_eq!(bands.band_of(9), 1);
        assert_eq!(bands.band_of(10), 2);
        assert_eq!(bands.band_of(99), 8);
    }

    #[test]
    fn no_reads_yield_a_single_zero_block() {
        let reference = Haplotype::reference(&window());
        let records = model().calculate_ref_confidence(&reference, &[], &region(5, 30), &[], &[]);
        assert_eq!(records.len(), 1);
        let block = blocks(&records)[0];
        assert_eq!((block.start, block.end, block.min_gq, block.min_depth), (5, 30, 0, 0));
        assert_eq!(block.reference_base, b'C');
    }

    #[test]
    fn deep_reference_coverage_is_confident() {
        let reference = Haplotype::reference(&window());
        let records = model().calculate_ref_confidence(&reference, &[], &region(10, 20), &reads(30), &[]);
        let blocks = blocks(&records);
        assert_eq!(blocks.len(), 1);
        assert_eq!((blocks[0].start, blocks[0].end), (10, 20));
        assert!(blocks[0].min_gq >= 60);
        assert_eq!(blocks[0].min_depth, 30);
        assert_eq!(blocks[0].pl[0], 0);
    }

    #[test]
    fn calls_replace_the_positions_they_cover() {
        let reference = Haplotype::reference(&window());
        let call = VariantCall {
            contig: Arc::from("chr1"),
            start: 15,
            end: 17,
            reference: Arc::from(&b"ACG"[..]),
            alternates: vec![Arc::from(&b"A"[..])],
            quality: 50.0,
            genotypes: Vec::new(),
            annotations: Default::default(),
        };
        let records = model().calculate_ref_confidence(&reference, &[], &region(10, 20), &reads(20), &[call]);
        let starts: Vec<(u32, u32)> = records.iter().map(|r| (r.start(), r.end())).collect();
        assert_eq!(starts, vec![(10, 14), (15, 17), (18, 20)]);
        assert!(records[1].as_variant().is_some());
    }

    #[test]
    fn uncalled_indel_positions_have_no_confidence() {
        let reference = Haplotype::reference(&window());
        let w = window();
        let deletion = VariantEvent::new("chr1", 15, w.slice(15, 17).unwrap(), &b"A"[..]);
        let called = Arc::new(Haplotype::from_events(&w, vec![deletion]).unwrap());
        let records =
            model().calculate_ref_confidence(&reference, &[called], &region(10, 20), &reads(20), &[]);
        let zero: Vec<(u32, u32)> = blocks(&records)
            .iter()
            .filter(|b| b.min_gq == 0)
            .map(|b| (b.start, b.end))
            .collect();
        assert_eq!(zero, vec![(16, 17)]);
    }

    #[test]
    fn nearby_indels_lower_indel_confidence() {
        let read = AlignedRead::new("chr1", 0, 60, parse_cigar("15M2D21M").unwrap(), vec![b'A'; 36], vec![30; 36], false);
        assert_eq!(indel_spans(&read), vec![(16, 17)]);
        let m = model();
        let indels = vec![indel_spans(&read)];
        assert_eq!(m.indel_informative_reads(12, std::slice::from_ref(&read), &indels), 0);
        assert_eq!(m.indel_informative_reads(30, std::slice::from_ref(&read), &indels), 1);
    }
}
