//! Site and per-sample statistics attached to variant calls.

use crate::config::CallerConfig;
use crate::genomics::AlignedRead;
use crate::likelihood::ReadLikelihoods;
use crate::stats::{phred_scaled_fisher_strand, ContingencyTable};

/// Which annotations are computed for each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationSelection {
    /// Site depth (DP).
    pub depth: bool,
    /// RMS mapping quality (MQ).
    pub rms_mapping_quality: bool,
    /// QUAL by depth (QD).
    pub quality_by_depth: bool,
    /// Fisher strand bias (FS).
    pub fisher_strand: bool,
    /// Maximum-likelihood allele counts (MLEAC).
    pub mle_allele_count: bool,
    /// Per-sample strand tables (SB).
    pub strand_bias_by_sample: bool,
}

impl AnnotationSelection {
    /// Selection implied by `config`.
    ///
    /// Reference-confidence output drops the count-based annotations (QD, FS,
    /// MLEAC) and always carries per-sample strand tables.
    pub fn for_config(config: &CallerConfig) -> Self {
        let erc = config.emits_reference_confidence();
        Self {
            depth: true,
            rms_mapping_quality: true,
            quality_by_depth: !erc,
            fisher_strand: !erc && config.strand_bias_annotation,
            mle_allele_count: !erc,
            strand_bias_by_sample: erc || config.strand_bias_annotation,
        }
    }
}

/// Root-mean-square mapping quality; 0 for no reads.
pub fn rms_mapping_quality<'a, I>(reads: I) -> f64
where
    I: IntoIterator<Item = &'a AlignedRead>,
{
    let (count, sum_sq) = reads.into_iter().fold((0u64, 0.0), |(n, acc), read| {
        let mq = f64::from(read.mapq);
        (n + 1, acc + mq * mq)
    });
    if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    }
}

/// `[ref fwd, ref rev, alt fwd, alt rev]` over the informative reads of sample `s`.
///
/// Column 0 is the reference; every other allele counts as alternate.
pub fn strand_table<A>(likelihoods: &ReadLikelihoods<A>, s: usize) -> [u32; 4] {
    let mut table = [0u32; 4];
    for (r, read) in likelihoods.reads(s).iter().enumerate() {
        let Some(best) = likelihoods.informative_best_allele(s, r) else {
            continue;
        };
        let row = if best == 0 { 0 } else { 2 };
        let col = usize::from(read.is_reverse);
        table[row + col] += 1;
    }
    table
}

/// Informative reads per allele of sample `s`.
pub fn allele_depths<A>(likelihoods: &ReadLikelihoods<A>, s: usize) -> Vec<u32> {
    let mut depths = vec![0u32; likelihoods.allele_count()];
    for r in 0..likelihoods.read_count(s) {
        if let Some(best) = likelihoods.informative_best_allele(s, r) {
            depths[best] += 1;
        }
    }
    depths
}

/// Phred-scaled Fisher strand score of the summed strand tables.
pub fn fisher_strand(tables: &[[u32; 4]]) -> f64 {
    let total = tables.iter().fold([0u32; 4], |mut acc, t| {
        for (a, v) in acc.iter_mut().zip(t) {
            *a += v;
        }
        acc
    });
    phred_scaled_fisher_strand(ContingencyTable::new(total[0], total[1], total[2], total[3]))
}

/// QUAL normalized by depth; `None` without depth.
pub fn quality_by_depth(quality: f64, depth: u32) -> Option<f64> {
    (depth > 0).then(|| quality / f64::from(depth))
}
