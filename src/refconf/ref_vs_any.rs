use crate::genomics::{PileupElement, ReadPileup};
use crate::genotyping::math::{log10_qual_to_error_prob, log10_qual_to_prob, log10_sum_log10_pair, RunningAverage};

/// Quality assigned to deletion observations, which carry no base quality.
pub const REF_MODEL_DELETION_QUALITY: u8 = 30;

const LOG10_ONE_THIRD: f64 = -0.477_121_254_719_662_4;

/// Reference-versus-any-alternate genotype likelihoods at one position.
///
/// Entry `i` is the log10 likelihood of a genotype carrying `i` non-reference
/// copies, for `i` in `0..=ploidy`.
#[derive(Debug, Clone, PartialEq)]
pub struct RefVsAnyResult {
    /// Log10 genotype likelihoods by non-reference dosage.
    pub genotype_likelihoods: Vec<f64>,
    /// Observations supporting the reference.
    pub ref_depth: u32,
    /// Observations supporting any alternate.
    pub non_ref_depth: u32,
}

impl RefVsAnyResult {
    fn new(ploidy: usize) -> Self {
        Self {
            genotype_likelihoods: vec![0.0; ploidy + 1],
            ref_depth: 0,
            non_ref_depth: 0,
        }
    }

    /// Observations that contributed.
    pub fn depth(&self) -> u32 {
        self.ref_depth + self.non_ref_depth
    }

    /// Likelihoods with every non-reference entry capped at the hom-ref likelihood.
    pub fn capped_by_hom_ref(&self) -> Vec<f64> {
        let hom_ref = self.genotype_likelihoods[0];
        self.genotype_likelihoods
            .iter()
            .map(|&gl| gl.min(hom_ref))
            .collect()
    }

    /// Add one observation of quality `qual`.
    pub fn add_observation(&mut self, is_alt: bool, qual: u8) {
        let ploidy = self.genotype_likelihoods.len() - 1;
        let log10_ploidy = (ploidy as f64).log10();
        let (ref_likelihood, non_ref_likelihood) = if is_alt {
            self.non_ref_depth += 1;
            (log10_qual_to_error_prob(qual) + LOG10_ONE_THIRD, log10_qual_to_prob(qual))
        } else {
            self.ref_depth += 1;
            (log10_qual_to_prob(qual), log10_qual_to_error_prob(qual) + LOG10_ONE_THIRD)
        };

        self.genotype_likelihoods[0] += ref_likelihood;
        self.genotype_likelihoods[ploidy] += non_ref_likelihood;
        for non_ref_copies in 1..ploidy {
            let ref_copies = ploidy - non_ref_copies;
            self.genotype_likelihoods[non_ref_copies] += log10_sum_log10_pair(
                ref_likelihood + (ref_copies as f64).log10(),
                non_ref_likelihood + (non_ref_copies as f64).log10(),
            ) - log10_ploidy;
        }
    }
}

/// Whether a pileup element is evidence against the reference.
pub fn is_non_ref_observation(element: &PileupElement, ref_base: u8) -> bool {
    element.is_deletion
        || element.base != ref_base
        || element.adjacent_to_indel
        || element.adjacent_to_soft_clip
}

/// Ref-vs-any genotype likelihoods for a pileup.
///
/// Bases below `min_base_quality` are skipped; deletions count with
/// [`REF_MODEL_DELETION_QUALITY`]. When `hq_soft_clips` is supplied, each
/// non-reference observation next to a soft clip adds its read's
/// high-quality soft-clip count to the running average.
pub fn ref_vs_any_likelihoods(
    ploidy: usize,
    pileup: &ReadPileup,
    ref_base: u8,
    min_base_quality: u8,
    mut hq_soft_clips: Option<&mut RunningAverage>,
) -> RefVsAnyResult {
    let mut result = RefVsAnyResult::new(ploidy.max(1));
    for element in &pileup.elements {
        let qual = if element.is_deletion {
            REF_MODEL_DELETION_QUALITY
        } else {
            element.quality
        };
        if qual < min_base_quality {
            continue;
        }
        let is_alt = is_non_ref_observation(element, ref_base);
        result.add_observation(is_alt, qual);
        if is_alt && element.adjacent_to_soft_clip {
            if let Some(average) = hq_soft_clips.as_deref_mut() {
                average.add(f64::from(element.hq_soft_clips));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{build_pileups, parse_cigar, AlignedRead, GenomeInterval};

    fn pileup(bases: &[u8]) -> ReadPileup {
        let reads: Vec<AlignedRead> = bases
            .iter()
            .map(|&b| {
                AlignedRead::new("chr1", 0, 60, parse_cigar("1M").unwrap(), vec![b], vec![30], false)
            })
            .collect();
        let interval = GenomeInterval::locus("chr1", 1).unwrap();
        build_pileups(&reads, &interval).remove(0)
    }

    #[test]
    fn reference_pileup_favours_hom_ref() {
        let result = ref_vs_any_likelihoods(2, &pileup(b"AAAAAAAAAA"), b'A', 10, None);
        let gls = &result.genotype_likelihoods;
        assert_eq!(result.ref_depth, 10);
        assert!(gls[0] > gls[1] && gls[1] > gls[2]);
        assert!((gls[1] - 10.0 * 0.5f64.log10()).abs() < 0.01);
    }

    #[test]
    fn mixed_pileup_favours_het() {
        let result = ref_vs_any_likelihoods(2, &pileup(b"AAAAACCCCC"), b'A', 10, None);
        let gls = &result.genotype_likelihoods;
        assert_eq!(result.non_ref_depth, 5);
        assert!(gls[1] > gls[0] && gls[1] > gls[2]);
        let capped = result.capped_by_hom_ref();
        assert!(capped.iter().all(|&gl| gl <= capped[0]));
    }

    #[test]
    fn low_quality_bases_are_ignored() {
        let result = ref_vs_any_likelihoods(2, &pileup(b"AC"), b'A', 31, None);
        assert_eq!(result.depth(), 0);
        assert_eq!(result.genotype_likelihoods, vec![0.0; 3]);
    }
}
