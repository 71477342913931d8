//! Allele-frequency posterior and site QUAL.

use super::genotype_likelihoods::GenotypeLikelihoodCalculator;
use super::math::{argmax, log10_sum_log10, normalize_log10, phred_from_log10};

/// Largest change in effective allele counts at which the iteration stops.
const CONVERGENCE_THRESHOLD: f64 = 0.1;
const MAX_ITERATIONS: usize = 100;
/// Spread of the heterozygosity prior used to derive Dirichlet pseudocounts.
const HETEROZYGOSITY_STDEV: f64 = 0.01;

/// Output of [`AlleleFrequencyCalculator::calculate`].
#[derive(Debug, Clone, PartialEq)]
pub struct AfCalculationResult {
    /// log10 probability that no sample carries an alternate allele.
    pub log10_p_no_variant: f64,
    /// Per alternate allele, log10 probability that its count is zero.
    pub log10_p_absent_by_allele: Vec<f64>,
    /// Per alternate allele, count over the samples' most likely genotypes.
    pub mle_allele_counts: Vec<u32>,
    /// Posterior-mean log10 allele frequencies (reference first).
    pub log10_allele_frequencies: Vec<f64>,
    /// Per sample, normalized log10 genotype posteriors.
    pub log10_genotype_posteriors: Vec<Vec<f64>>,
}

impl AfCalculationResult {
    /// Phred-scaled probability that the site is variant.
    pub fn qual(&self) -> f64 {
        let qual = phred_from_log10(self.log10_p_no_variant);
        if qual.is_nan() {
            0.0
        } else {
            qual.clamp(0.0, f64::MAX)
        }
    }

    /// Phred-scaled confidence that alternate allele `alt` (0-based among alternates) is present.
    pub fn allele_qual(&self, alt: usize) -> f64 {
        self.log10_p_absent_by_allele
            .get(alt)
            .map_or(0.0, |&p| phred_from_log10(p).max(0.0))
    }
}

/// Dirichlet-prior allele-frequency calculator.
///
/// Allele frequencies and genotype posteriors are estimated jointly by
/// iterating effective allele counts to convergence, starting from a flat
/// frequency prior.
#[derive(Debug, Clone)]
pub struct AlleleFrequencyCalculator {
    ref_pseudocount: f64,
    snp_pseudocount: f64,
    indel_pseudocount: f64,
    ploidy: usize,
}

impl AlleleFrequencyCalculator {
    /// Calculator with explicit pseudocounts.
    pub fn new(ref_pseudocount: f64, snp_pseudocount: f64, indel_pseudocount: f64, ploidy: usize) -> Self {
        Self {
            ref_pseudocount,
            snp_pseudocount,
            indel_pseudocount,
            ploidy,
        }
    }

    /// Pseudocounts derived from heterozygosity priors.
    pub fn from_heterozygosity(snp_heterozygosity: f64, indel_heterozygosity: f64, ploidy: usize) -> Self {
        let ref_pseudocount = snp_heterozygosity / (HETEROZYGOSITY_STDEV * HETEROZYGOSITY_STDEV);
        Self::new(
            ref_pseudocount,
            snp_heterozygosity * ref_pseudocount,
            indel_heterozygosity * ref_pseudocount,
            ploidy,
        )
    }

    /// Ploidy assumed for every sample.
    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    fn prior_pseudocounts(&self, alleles: &[&[u8]]) -> Vec<f64> {
        let reference_len = alleles.first().map_or(0, |a| a.len());
        alleles
            .iter()
            .enumerate()
            .map(|(idx, allele)| {
                if idx == 0 {
                    self.ref_pseudocount
                } else if allele.first() == Some(&b'<') || allele.len() == reference_len {
                    self.snp_pseudocount
                } else {
                    self.indel_pseudocount
                }
            })
            .collect()
    }

    /// Compute allele-frequency posteriors for one site.
    ///
    /// `sample_likelihoods` holds one genotype-likelihood vector per sample in
    /// VCF genotype order for `alleles` (reference first).
    pub fn calculate(&self, sample_likelihoods: &[Vec<f64>], alleles: &[&[u8]]) -> AfCalculationResult {
        let allele_count = alleles.len();
        let calc = GenotypeLikelihoodCalculator::new(self.ploidy, allele_count);
        let pseudocounts = self.prior_pseudocounts(alleles);

        let mut log10_frequencies = vec![-(allele_count as f64).log10(); allele_count];
        let mut allele_counts = vec![0.0; allele_count];
        for _ in 0..MAX_ITERATIONS {
            let new_counts = self.effective_allele_counts(&calc, sample_likelihoods, &log10_frequencies);
            let max_difference = allele_counts
                .iter()
                .zip(&new_counts)
                .map(|(old, new): (&f64, &f64)| (old - new).abs())
                .fold(0.0, f64::max);
            allele_counts = new_counts;
            let posterior: Vec<f64> = pseudocounts
                .iter()
                .zip(&allele_counts)
                .map(|(p, c)| p + c)
                .collect();
            let total: f64 = posterior.iter().sum();
            log10_frequencies = posterior.iter().map(|c| (c / total).log10()).collect();
            if max_difference <= CONVERGENCE_THRESHOLD {
                break;
            }
        }

        let mut log10_p_no_variant = 0.0;
        let mut log10_p_absent_by_allele = vec![0.0; allele_count.saturating_sub(1)];
        let mut mle_allele_counts = vec![0u32; allele_count.saturating_sub(1)];
        let mut posteriors_by_sample = Vec::with_capacity(sample_likelihoods.len());
        for gls in sample_likelihoods {
            let posteriors = genotype_posteriors(&calc, gls, &log10_frequencies);
            log10_p_no_variant += posteriors[0];
            for (alt_idx, absent) in log10_p_absent_by_allele.iter_mut().enumerate() {
                let allele = alt_idx + 1;
                let without: Vec<f64> = posteriors
                    .iter()
                    .enumerate()
                    .filter(|(g, _)| calc.allele_copies(*g).iter().all(|&(a, _)| a != allele))
                    .map(|(_, &p)| p)
                    .collect();
                *absent += log10_sum_log10(&without);
            }
            if let Some(best) = argmax(&posteriors) {
                for &(allele, count) in calc.allele_copies(best) {
                    if allele > 0 {
                        mle_allele_counts[allele - 1] += count as u32;
                    }
                }
            }
            posteriors_by_sample.push(posteriors);
        }

        AfCalculationResult {
            log10_p_no_variant,
            log10_p_absent_by_allele,
            mle_allele_counts,
            log10_allele_frequencies: log10_frequencies,
            log10_genotype_posteriors: posteriors_by_sample,
        }
    }

    fn effective_allele_counts(
        &self,
        calc: &GenotypeLikelihoodCalculator,
        sample_likelihoods: &[Vec<f64>],
        log10_frequencies: &[f64],
    ) -> Vec<f64> {
        let mut counts = vec![0.0; calc.allele_count()];
        for gls in sample_likelihoods {
            let posteriors = genotype_posteriors(calc, gls, log10_frequencies);
            for (g, log10_p) in posteriors.iter().enumerate() {
                let p = 10f64.powf(*log10_p);
                for &(allele, copies) in calc.allele_copies(g) {
                    counts[allele] += p * copies as f64;
                }
            }
        }
        counts
    }
}

fn genotype_posteriors(
    calc: &GenotypeLikelihoodCalculator,
    gls: &[f64],
    log10_frequencies: &[f64],
) -> Vec<f64> {
    let priors = calc.log10_genotype_priors(log10_frequencies);
    let unnormalized: Vec<f64> = gls.iter().zip(&priors).map(|(gl, prior)| gl + prior).collect();
    normalize_log10(&unnormalized)
}

/// Posterior probability that a single sample carries a non-reference allele.
///
/// `genotype_likelihoods[i]` is the log10 likelihood of carrying `i`
/// non-reference copies; the prior of `i > 0` copies is `heterozygosity / i`.
pub fn single_sample_non_ref_probability(genotype_likelihoods: &[f64], heterozygosity: f64) -> f64 {
    if genotype_likelihoods.len() < 2 {
        return 0.0;
    }
    let ploidy = genotype_likelihoods.len() - 1;
    let non_ref_priors: Vec<f64> = (1..=ploidy).map(|i| heterozygosity / i as f64).collect();
    let ref_prior = (1.0 - non_ref_priors.iter().sum::<f64>()).max(f64::MIN_POSITIVE);

    let ref_posterior = genotype_likelihoods[0] + ref_prior.log10();
    let non_ref_terms: Vec<f64> = genotype_likelihoods[1..]
        .iter()
        .zip(&non_ref_priors)
        .map(|(gl, prior)| gl + prior.log10())
        .collect();
    let non_ref_posterior = log10_sum_log10(&non_ref_terms);
    let norm = log10_sum_log10(&[ref_posterior, non_ref_posterior]);
    (10f64.powf(non_ref_posterior - norm)).clamp(0.0, 1.0)
}
