//! Per-locus activity scoring.

use std::sync::Arc;

use tracing::trace;

use super::{ActivityProfileState, ActivityStateType};
use crate::config::CallerConfig;
use crate::genomics::{GenomeInterval, ReadPileup, VariantEvent};
use crate::genotyping::af_calculator::{single_sample_non_ref_probability, AlleleFrequencyCalculator};
use crate::genotyping::math::{qual_to_prob, RunningAverage};
use crate::refconf::ref_vs_any_likelihoods;

/// Placeholder reference allele of the two-allele activity model.
pub const FAKE_REF_ALLELE: &[u8] = b"N";
/// Placeholder alternate allele standing for "anything but the reference".
pub const FAKE_ALT_ALLELE: &[u8] = b"<FAKE_ALT>";

/// Mean high-quality soft-clip count above which a locus is tagged as soft-clip driven.
pub const AVERAGE_HQ_SOFTCLIPS_HQ_BASES_THRESHOLD: f64 = 6.0;
/// Upper bound on the QUAL threshold used by the activity mini-genotyper.
pub const MAX_ACTIVITY_CALLING_CONFIDENCE: f64 = 4.0;

/// Parameters of the activity mini-genotyper.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityGenotypingConfig {
    /// Ploidy of the two-allele model (at least 2).
    pub ploidy: usize,
    /// QUAL below which multi-sample loci are inactive.
    pub calling_confidence: f64,
    /// Heterozygosity prior for the single-sample closed form.
    pub heterozygosity: f64,
    /// Indel heterozygosity for the multi-sample prior.
    pub indel_heterozygosity: f64,
}

impl ActivityGenotypingConfig {
    /// Derive the mini-genotyper settings from the caller configuration.
    pub fn from_caller(config: &CallerConfig) -> Self {
        Self {
            ploidy: config.ploidy.max(2),
            calling_confidence: config.calling_confidence.min(MAX_ACTIVITY_CALLING_CONFIDENCE),
            heterozygosity: config.heterozygosity,
            indel_heterozygosity: config.indel_heterozygosity,
        }
    }
}

/// Probability that a locus is variant given per-sample ref-vs-any likelihoods.
///
/// One sample uses the closed-form posterior of a non-reference dosage;
/// several samples run the allele-frequency calculation over the fake
/// two-allele site and map QUAL to a probability, treating QUAL below the
/// configured confidence as inactive.
pub fn activity_probability(sample_likelihoods: &[Vec<f64>], config: &ActivityGenotypingConfig) -> f64 {
    match sample_likelihoods {
        [] => 0.0,
        [single] => single_sample_non_ref_probability(single, config.heterozygosity),
        _ => {
            let calculator = AlleleFrequencyCalculator::from_heterozygosity(
                config.heterozygosity,
                config.indel_heterozygosity,
                config.ploidy,
            );
            let result = calculator.calculate(sample_likelihoods, &[FAKE_REF_ALLELE, FAKE_ALT_ALLELE]);
            let qual = result.qual();
            if qual < config.calling_confidence {
                0.0
            } else {
                qual_to_prob(qual)
            }
        }
    }
}

/// Scores loci for activity.
#[derive(Debug, Clone)]
pub struct ActivityEvaluator {
    genotyping: ActivityGenotypingConfig,
    given_alleles_mode: bool,
    use_alleles_trigger: bool,
    min_base_quality: u8,
    samples: Vec<Arc<str>>,
}

impl ActivityEvaluator {
    /// Evaluator for the given configuration and sample list.
    pub fn new(config: &CallerConfig, samples: Vec<Arc<str>>) -> Self {
        Self {
            genotyping: ActivityGenotypingConfig::from_caller(config),
            given_alleles_mode: config.is_given_alleles(),
            use_alleles_trigger: config.use_alleles_trigger,
            min_base_quality: config.min_base_quality,
            samples,
        }
    }

    /// Mini-genotyper settings in use.
    pub fn genotyping_config(&self) -> &ActivityGenotypingConfig {
        &self.genotyping
    }

    /// Activity state of `locus`.
    ///
    /// `given` holds the given alleles overlapping the locus (empty outside
    /// given-alleles modes).
    pub fn is_active(
        &self,
        locus: &GenomeInterval,
        pileup: &ReadPileup,
        ref_base: u8,
        given: &[VariantEvent],
    ) -> ActivityProfileState {
        if self.given_alleles_mode && given.iter().any(|event| event.start() == locus.start()) {
            return ActivityProfileState::new(locus.clone(), 1.0);
        }
        if self.use_alleles_trigger {
            let hit = given.iter().any(|event| event.overlaps(locus));
            return ActivityProfileState::new(locus.clone(), if hit { 1.0 } else { 0.0 });
        }
        if pileup.is_empty() {
            return ActivityProfileState::new(locus.clone(), 0.0);
        }

        let mut soft_clips = RunningAverage::new();
        let split = pileup.split_by_sample();
        let sample_likelihoods: Vec<Vec<f64>> = split
            .iter()
            .filter(|(sample, _)| self.samples.is_empty() || self.samples.contains(*sample))
            .map(|(_, sample_pileup)| {
                ref_vs_any_likelihoods(
                    self.genotyping.ploidy,
                    sample_pileup,
                    ref_base,
                    self.min_base_quality,
                    Some(&mut soft_clips),
                )
                .genotype_likelihoods
            })
            .collect();

        let probability = activity_probability(&sample_likelihoods, &self.genotyping);
        trace!(locus = %locus, probability, "locus activity");

        let mean_soft_clips = soft_clips.mean();
        if soft_clips.count() > 0 && mean_soft_clips > AVERAGE_HQ_SOFTCLIPS_HQ_BASES_THRESHOLD {
            ActivityProfileState::with_type(
                locus.clone(),
                probability,
                ActivityStateType::HighQualitySoftClips,
                mean_soft_clips,
            )
        } else {
            ActivityProfileState::new(locus.clone(), probability)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenotypingMode;
    use crate::genomics::{build_pileups, parse_cigar, AlignedRead};

    fn locus(pos: u32) -> GenomeInterval {
        GenomeInterval::locus("chr1", pos).unwrap()
    }

    fn evaluator(config: &CallerConfig) -> ActivityEvaluator {
        ActivityEvaluator::new(config, vec![Arc::from("s1")])
    }

    fn pileup_at(pos: u32, bases: &[u8], cigar: &str, sample: &str) -> ReadPileup {
        let cig = parse_cigar(cigar).unwrap();
        let leading = match cig[0].kind {
            crate::genomics::CigarOpKind::SoftClip => cig[0].len as usize,
            _ => 0,
        };
        let reads: Vec<AlignedRead> = bases
            .iter()
            .map(|&b| {
                let mut seq = vec![b'A'; leading];
                seq.push(b);
                AlignedRead::new("chr1", pos - 1, 60, cig.clone(), seq, vec![35; leading + 1], false)
                    .with_sample(sample)
            })
            .collect();
        build_pileups(&reads, &locus(pos)).remove(0)
    }

    #[test]
    fn empty_pileup_is_inactive() {
        let state = evaluator(&CallerConfig::default()).is_active(
            &locus(5),
            &ReadPileup::new(5),
            b'A',
            &[],
        );
        assert_eq!(state.probability(), 0.0);
    }

    #[test]
    fn given_allele_start_is_fully_active() {
        let config = CallerConfig::default().with_genotyping_mode(GenotypingMode::GivenAlleles);
        let given = [VariantEvent::new("chr1", 5, &b"A"[..], &b"T"[..])];
        let state = evaluator(&config).is_active(&locus(5), &ReadPileup::new(5), b'A', &given);
        assert_eq!(state.probability(), 1.0);
    }

    #[test]
    fn alleles_trigger_uses_overlap() {
        let mut config = CallerConfig::default();
        config.use_alleles_trigger = true;
        let given = [VariantEvent::new("chr1", 4, &b"ACG"[..], &b"A"[..])];
        let eval = evaluator(&config);
        assert_eq!(eval.is_active(&locus(6), &ReadPileup::new(6), b'G', &given).probability(), 1.0);
        assert_eq!(eval.is_active(&locus(7), &ReadPileup::new(7), b'T', &given).probability(), 0.0);
    }

    #[test]
    fn reference_pileup_is_quiet_and_het_pileup_is_active() {
        let config = CallerConfig::default();
        let eval = evaluator(&config);
        let quiet = eval.is_active(&locus(5), &pileup_at(5, b"AAAAAAAAAA", "1M", "s1"), b'A', &[]);
        assert!(quiet.probability() < config.active_probability_threshold);
        let active = eval.is_active(&locus(5), &pileup_at(5, b"AAAAACCCCC", "1M", "s1"), b'A', &[]);
        assert!(active.probability() > 0.99);
    }

    #[test]
    fn soft_clipped_reads_tag_the_state() {
        let eval = evaluator(&CallerConfig::default());
        let state = eval.is_active(&locus(5), &pileup_at(5, b"AAAA", "8S1M", "s1"), b'A', &[]);
        assert_eq!(state.state_type(), ActivityStateType::HighQualitySoftClips);
        assert!((state.aux_score() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn multi_sample_uses_qual_threshold() {
        let config = ActivityGenotypingConfig {
            ploidy: 2,
            calling_confidence: 4.0,
            heterozygosity: 1e-3,
            indel_heterozygosity: 1.25e-4,
        };
        let reference = vec![0.0, -6.0, -30.0];
        assert_eq!(activity_probability(&[reference.clone(), reference], &config), 0.0);
        let het = vec![-30.0, 0.0, -30.0];
        assert!(activity_probability(&[het.clone(), het], &config) > 0.99);
    }
}
