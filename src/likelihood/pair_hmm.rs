use std::fmt;

use crate::assembly::Haplotype;
use crate::config::MIN_USABLE_BASE_QUALITY;
use crate::genomics::AlignedRead;
use crate::genotyping::math::qual_to_error_prob;

/// Scores one read against one haplotype.
pub trait ReadLikelihoodCalculator: Send + Sync + fmt::Debug {
    /// log10 P(read | haplotype).
    fn log10_likelihood(&self, read: &AlignedRead, haplotype: &Haplotype) -> f64;
}

/// Default gap-open penalty (Phred).
pub const DEFAULT_GAP_OPEN: u8 = 45;
/// Default gap-continuation penalty (Phred).
pub const DEFAULT_GAP_CONTINUATION: u8 = 10;

/// Three-state (match, insertion, deletion) pair hidden Markov model.
///
/// Runs in probability space with each row rescaled to keep values in
/// range; the accumulated scale is folded back into the log10 result. The
/// read may start at any haplotype position with equal probability.
#[derive(Debug, Clone)]
pub struct PairHmm {
    match_to_match: f64,
    match_to_gap: f64,
    gap_to_match: f64,
    gap_to_gap: f64,
    min_base_quality: u8,
}

impl PairHmm {
    /// Model with the given gap penalties. Base qualities are capped at the
    /// read's mapping quality and those below `min_base_quality` are
    /// lowered to the minimum usable quality.
    pub fn new(gap_open: u8, gap_continuation: u8, min_base_quality: u8) -> Self {
        let open = qual_to_error_prob(gap_open);
        let continuation = qual_to_error_prob(gap_continuation);
        Self {
            match_to_match: 1.0 - 2.0 * open,
            match_to_gap: open,
            gap_to_match: 1.0 - continuation,
            gap_to_gap: continuation,
            min_base_quality,
        }
    }

    fn base_quality(&self, quality: u8, mapq: u8) -> u8 {
        let q = quality.min(mapq);
        if q < self.min_base_quality {
            MIN_USABLE_BASE_QUALITY
        } else {
            q
        }
    }

    /// log10 likelihood of `bases` (with `qualities`) given `haplotype`.
    pub fn compute(&self, bases: &[u8], qualities: &[u8], mapq: u8, haplotype: &[u8]) -> f64 {
        let (m, n) = (bases.len(), haplotype.len());
        if m == 0 {
            return 0.0;
        }
        if n == 0 {
            return f64::MIN_POSITIVE.log10() * m as f64;
        }

        let width = n + 1;
        let initial = 1.0 / n as f64;
        let (mut prev_m, mut prev_i, mut prev_d) = (vec![0.0; width], vec![0.0; width], vec![initial; width]);
        let (mut cur_m, mut cur_i, mut cur_d) = (vec![0.0; width], vec![0.0; width], vec![0.0; width]);
        let mut log10_scale = 0.0;

        for i in 0..m {
            let q = self.base_quality(qualities.get(i).copied().unwrap_or(0), mapq);
            let error = qual_to_error_prob(q);
            let (hit, miss) = (1.0 - error, error / 3.0);
            cur_m[0] = 0.0;
            cur_i[0] = 0.0;
            cur_d[0] = 0.0;
            let mut row_max = 0.0f64;
            for j in 1..width {
                let read_base = bases[i];
                let hap_base = haplotype[j - 1];
                let prior = if read_base == hap_base || read_base == b'N' || hap_base == b'N' {
                    hit
                } else {
                    miss
                };
                cur_m[j] = prior
                    * (prev_m[j - 1] * self.match_to_match
                        + (prev_i[j - 1] + prev_d[j - 1]) * self.gap_to_match);
                cur_i[j] = prev_m[j] * self.match_to_gap + prev_i[j] * self.gap_to_gap;
                cur_d[j] = cur_m[j - 1] * self.match_to_gap + cur_d[j - 1] * self.gap_to_gap;
                row_max = row_max.max(cur_m[j]).max(cur_i[j]).max(cur_d[j]);
            }
            if row_max > 0.0 {
                for j in 0..width {
                    cur_m[j] /= row_max;
                    cur_i[j] /= row_max;
                    cur_d[j] /= row_max;
                }
                log10_scale += row_max.log10();
            }
            std::mem::swap(&mut prev_m, &mut cur_m);
            std::mem::swap(&mut prev_i, &mut cur_i);
            std::mem::swap(&mut prev_d, &mut cur_d);
        }

        let total: f64 = (1..width).map(|j| prev_m[j] + prev_i[j]).sum();
        total.max(f64::MIN_POSITIVE).log10() + log10_scale
    }
}

impl Default for PairHmm {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_OPEN, DEFAULT_GAP_CONTINUATION, MIN_USABLE_BASE_QUALITY)
    }
}

impl ReadLikelihoodCalculator for PairHmm {
    fn log10_likelihood(&self, read: &AlignedRead, haplotype: &Haplotype) -> f64 {
        let lead = read.leading_soft_clip();
        let end = read.len().saturating_sub(read.trailing_soft_clip()).max(lead);
        let bases = read.sequence.get(lead..end).unwrap_or_default();
        let qualities = read.qualities.get(lead..end).unwrap_or_default();
        self.compute(bases, qualities, read.mapq, haplotype.bases())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hmm() -> PairHmm {
        PairHmm::new(45, 10, 10)
    }

    #[test]
    fn exact_match_beats_mismatch_and_indel() {
        let hap = b"ACGTACGTTAGCATGCA";
        let q = [30u8; 8];
        let exact = hmm().compute(b"ACGTTAGC", &q, 60, hap);
        let mismatch = hmm().compute(b"ACGTAAGC", &q, 60, hap);
        let gapped = hmm().compute(b"ACGTAGCA", &q, 60, hap);
        assert!(exact > mismatch);
        assert!(exact > gapped);
        assert!(exact.is_finite() && gapped.is_finite());
    }

    #[test]
    fn exact_match_is_near_uniform_start_probability() {
        let hap = b"ACGTACGTTAGCATGCA";
        let q = [40u8; 8];
        let exact = hmm().compute(b"ACGTTAGC", &q, 60, hap);
        let expected = (1.0 / hap.len() as f64).log10();
        assert!((exact - expected).abs() < 0.1, "{exact} vs {expected}");
    }

    #[test]
    fn low_mapping_quality_flattens_mismatch_penalty() {
        let hap = b"TTTTACGTAAAA";
        let q = [40u8; 4];
        let confident = hmm().compute(b"ACCT", &q, 60, hap) - hmm().compute(b"ACGT", &q, 60, hap);
        let flattened = hmm().compute(b"ACCT", &q, 12, hap) - hmm().compute(b"ACGT", &q, 12, hap);
        assert!(flattened > confident);
    }

    #[test]
    fn long_reads_stay_finite() {
        let hap: Vec<u8> = b"ACGT".iter().copied().cycle().take(400).collect();
        let read: Vec<u8> = hap[50..350].to_vec();
        let q = vec![30u8; read.len()];
        assert!(hmm().compute(&read, &q, 60, &hap).is_finite());
    }
}
