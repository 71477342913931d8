//! Per-region calling state machine.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::activity::{ActivityEvaluator, ActivityProfileState};
use crate::assembly::{
    Assembler, AssemblyError, AssemblyRegion, AssemblyRegionTrimmer, Haplotype, PileupEventAssembler,
};
use crate::config::CallerConfig;
use crate::genomics::{
    AlignedRead, CallRecord, GenomeInterval, ReadPileup, ReferenceWindow, VariantCall, VariantEvent,
    DEFAULT_SAMPLE,
};
use crate::genotyping::{GenotypingEngine, GenotypingError};
use crate::likelihood::{LikelihoodEngine, LikelihoodError};
use crate::refconf::{GqBands, ReferenceConfidenceModel};
use crate::CallerError;

/// Failures confined to one region; the region falls back to the reference model.
#[derive(Debug, Error)]
pub enum RegionProcessingError {
    /// Haplotype proposal failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    /// Read scoring failed.
    #[error(transparent)]
    Likelihood(#[from] LikelihoodError),
    /// Genotyping failed.
    #[error(transparent)]
    Genotyping(#[from] GenotypingError),
}

/// Drives one assembly region from activity through genotyping.
///
/// Inactive or read-free regions go straight to the reference model. Active
/// regions are assembled, trimmed to their variation, scored, realigned and
/// genotyped; with reference-confidence output the trimmed-away flanks are
/// covered by reference blocks on either side of the calls.
#[derive(Debug)]
pub struct HaplotypeCallerEngine<A: Assembler = PileupEventAssembler> {
    config: CallerConfig,
    samples: Vec<Arc<str>>,
    assembler: A,
    evaluator: ActivityEvaluator,
    trimmer: AssemblyRegionTrimmer,
    likelihoods: LikelihoodEngine,
    genotyper: GenotypingEngine,
    reference_model: Option<ReferenceConfidenceModel>,
}

impl HaplotypeCallerEngine<PileupEventAssembler> {
    /// Engine using the read-backed assembler.
    pub fn with_default_assembler(config: CallerConfig, samples: Vec<Arc<str>>) -> Result<Self, CallerError> {
        let assembler = PileupEventAssembler::from_config(&config);
        Self::new(config, samples, assembler)
    }
}

impl<A: Assembler> HaplotypeCallerEngine<A> {
    /// Validate `config` against the input `samples` and build the engine.
    ///
    /// An empty sample list means a single unnamed sample. A configured
    /// sample name must be one of the samples; it restricts calling to that
    /// sample unless it is the only one. Reference-confidence output needs a
    /// single sample.
    pub fn new(config: CallerConfig, samples: Vec<Arc<str>>, assembler: A) -> Result<Self, CallerError> {
        let config = config.validated()?;
        let mut samples = samples;
        samples.sort();
        samples.dedup();
        if samples.is_empty() {
            samples.push(Arc::from(DEFAULT_SAMPLE));
        }

        if let Some(name) = config.sample_name.as_deref() {
            let Some(sample) = samples.iter().find(|s| s.as_ref() == name).cloned() else {
                return Err(CallerError::Configuration(format!(
                    "sample '{name}' is not among the input samples {samples:?}"
                )));
            };
            samples = vec![sample];
        }
        if config.emits_reference_confidence() && samples.len() > 1 {
            return Err(CallerError::Configuration(format!(
                "reference-confidence output supports a single sample (got {})",
                samples.len()
            )));
        }

        let bands = GqBands::new(config.gq_bands.clone())?;
        let reference_model = config.emits_reference_confidence().then(|| {
            ReferenceConfidenceModel::new(
                Arc::clone(&samples[0]),
                config.ploidy,
                config.min_base_quality,
                bands,
                config.indel_size_to_eliminate,
            )
        });

        Ok(Self {
            evaluator: ActivityEvaluator::new(&config, samples.clone()),
            trimmer: AssemblyRegionTrimmer::new(config.trim_padding),
            likelihoods: LikelihoodEngine::new(&config),
            genotyper: GenotypingEngine::new(&config),
            reference_model,
            assembler,
            samples,
            config,
        })
    }

    /// Validated configuration.
    pub fn config(&self) -> &CallerConfig {
        &self.config
    }

    /// Samples being called.
    pub fn samples(&self) -> &[Arc<str>] {
        &self.samples
    }

    /// Activity state of one locus.
    pub fn is_active(
        &self,
        locus: &GenomeInterval,
        pileup: &ReadPileup,
        ref_base: u8,
        given: &[VariantEvent],
    ) -> ActivityProfileState {
        self.evaluator.is_active(locus, pileup, ref_base, given)
    }

    /// Whether a read is used for calling: long enough, confidently mapped,
    /// of a called sample and of the kept read group if one is configured.
    pub fn passes_read_filters(&self, read: &AlignedRead) -> bool {
        self.likelihoods.passes_read_filters(read)
            && self.samples.contains(&read.sample)
            && self
                .config
                .keep_read_group
                .as_deref()
                .map_or(true, |group| read.read_group.as_deref() == Some(group))
    }

    /// Split off the reads that fail [`Self::passes_read_filters`].
    pub fn filter_non_passing_reads(&self, region: AssemblyRegion) -> (AssemblyRegion, Vec<AlignedRead>) {
        region.partition_reads(|read| self.passes_read_filters(read))
    }

    /// Records for one region, in position order.
    ///
    /// `window` must cover the region's padded span. Failures inside the
    /// region are logged and replaced by the reference model.
    pub fn call_region(
        &self,
        region: AssemblyRegion,
        window: &ReferenceWindow,
        given: &[VariantEvent],
    ) -> Vec<CallRecord> {
        if self.config.just_determine_active_regions {
            return Vec::new();
        }
        if !region.is_active() || region.is_empty() {
            return self.reference_model_for_no_variation(&region, window);
        }

        let (region, removed) = self.filter_non_passing_reads(region);
        debug!(region = %region.span(), kept = region.read_count(), removed = removed.len(), "filtered reads");
        if region.is_empty() {
            return self.reference_model_for_no_variation(&region, window);
        }
        let window = window.sub_window(region.padded_span()).unwrap_or_else(|| window.clone());

        match self.call_active_region(&region, &window, given) {
            Ok(records) => records,
            Err(err) => {
                warn!(region = %region.span(), error = %err, "region failed, emitting reference model");
                self.reference_model_for_no_variation(&region, &window)
            }
        }
    }

    fn call_active_region(
        &self,
        region: &AssemblyRegion,
        window: &ReferenceWindow,
        given: &[VariantEvent],
    ) -> Result<Vec<CallRecord>, RegionProcessingError> {
        let given: Vec<VariantEvent> = given
            .iter()
            .filter(|event| event.overlaps(region.padded_span()))
            .cloned()
            .collect();
        let assembly = self.assembler.assemble(region, &given, window)?;
        let keep_going = self.config.disable_optimizations;
        if !assembly.is_variation_present() && !keep_going {
            debug!(region = %region.span(), "no variation after assembly");
            return Ok(self.reference_model_for_no_variation(region, window));
        }

        let trimming = self.trimmer.trim(region, assembly.variation_events());
        let (assembly, (left_flank, right_flank)) = match trimming.callable_region(region) {
            Some(callable) => (assembly.trim_to(callable)?, trimming.flank_regions(region)),
            None if keep_going => (assembly, (None, None)),
            None => {
                debug!(region = %region.span(), "no variation inside the active span");
                return Ok(self.reference_model_for_no_variation(region, window));
            }
        };

        let mut table = self.likelihoods.compute_read_likelihoods(
            &self.samples,
            assembly.region().reads(),
            assembly.haplotypes(),
        )?;
        self.likelihoods
            .realign_reads_to_best_haplotype(&mut table, assembly.window());
        if self.config.do_not_genotype {
            return Ok(Vec::new());
        }

        let called = self
            .genotyper
            .assign_genotype_likelihoods(&assembly, &table, &given)?;
        let Some(model) = &self.reference_model else {
            return Ok(called.calls.into_iter().map(CallRecord::Variant).collect());
        };

        let mut records = Vec::new();
        if let Some(left) = &left_flank {
            records.extend(self.reference_model_for_no_variation(left, window));
        }
        if called.calls.iter().any(VariantCall::has_called_genotype) {
            let reads: Vec<AlignedRead> = table.all_reads().cloned().collect();
            records.extend(model.calculate_ref_confidence(
                assembly.reference_haplotype(),
                &called.called_haplotypes,
                assembly.region(),
                &reads,
                &called.calls,
            ));
        } else {
            records.extend(self.reference_model_for_no_variation(assembly.region(), window));
        }
        if let Some(right) = &right_flank {
            records.extend(self.reference_model_for_no_variation(right, window));
        }
        Ok(records)
    }

    /// Reference blocks for a region without variation; empty unless
    /// reference-confidence output is on.
    fn reference_model_for_no_variation(&self, region: &AssemblyRegion, window: &ReferenceWindow) -> Vec<CallRecord> {
        let Some(model) = &self.reference_model else {
            return Vec::new();
        };
        let reference = Haplotype::reference(window);
        let reads: Vec<AlignedRead> = region
            .reads()
            .iter()
            .filter(|read| self.passes_read_filters(read))
            .cloned()
            .collect();
        model.calculate_ref_confidence(&reference, &[], region, &reads, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenotypingMode, ReferenceConfidenceMode};
    use crate::genomics::parse_cigar;

    const REFERENCE: &[u8] = b"CTGACCTAGGCATTACGGATCCAAGTCAGTACGTTGCATTGACCAGTA";

    fn window() -> ReferenceWindow {
        ReferenceWindow::new(GenomeInterval::new("chr1", 1, REFERENCE.len() as u32).unwrap(), REFERENCE).unwrap()
    }

    fn region(active: bool, reads: Vec<AlignedRead>) -> AssemblyRegion {
        AssemblyRegion::new(GenomeInterval::new("chr1", 11, 35).unwrap(), window().span().clone(), active)
            .with_reads(reads)
    }

    fn reads(alt: usize, total: usize) -> Vec<AlignedRead> {
        (0..total)
            .map(|i| {
                let mut seq = REFERENCE[2..42].to_vec();
                if i < alt {
                    seq[20] = b'T';
                }
                AlignedRead::new("chr1", 2, 60, parse_cigar("40M").unwrap(), seq, vec![30; 40], i % 2 == 1)
                    .with_name(format!("r{i}"))
            })
            .collect()
    }

    fn gvcf() -> CallerConfig {
        CallerConfig::default().with_reference_confidence(ReferenceConfidenceMode::Gvcf)
    }

    #[test]
    fn sample_restrictions() {
        let samples = vec![Arc::from("a"), Arc::from("b")];
        let missing = HaplotypeCallerEngine::with_default_assembler(
            CallerConfig::default().with_sample_name("c"),
            samples.clone(),
        );
        assert!(matches!(missing, Err(CallerError::Configuration(_))));

        let restricted =
            HaplotypeCallerEngine::with_default_assembler(CallerConfig::default().with_sample_name("b"), samples.clone())
                .unwrap();
        assert_eq!(restricted.samples(), &[Arc::<str>::from("b")]);

        let multi_gvcf = HaplotypeCallerEngine::with_default_assembler(gvcf(), samples);
        assert!(matches!(multi_gvcf, Err(CallerError::Configuration(_))));

        let default = HaplotypeCallerEngine::with_default_assembler(CallerConfig::default(), Vec::new()).unwrap();
        assert_eq!(default.samples(), &[Arc::<str>::from(DEFAULT_SAMPLE)]);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let gga = gvcf().with_genotyping_mode(GenotypingMode::GivenAlleles);
        assert!(HaplotypeCallerEngine::with_default_assembler(gga, Vec::new()).is_err());
        let bands = CallerConfig::default().with_gq_bands(vec![20, 10]);
        assert!(HaplotypeCallerEngine::with_default_assembler(bands, Vec::new()).is_err());
    }

    #[test]
    fn inactive_region_without_reference_confidence_is_silent() {
        let engine = HaplotypeCallerEngine::with_default_assembler(CallerConfig::default(), Vec::new()).unwrap();
        assert!(engine.call_region(region(false, reads(0, 10)), &window(), &[]).is_empty());
    }

    #[test]
    fn empty_region_yields_one_reference_block() {
        let engine = HaplotypeCallerEngine::with_default_assembler(gvcf(), Vec::new()).unwrap();
        let records = engine.call_region(region(true, Vec::new()), &window(), &[]);
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].start(), records[0].end()), (11, 35));
    }

    #[test]
    fn heterozygous_snv_is_called() {
        let engine = HaplotypeCallerEngine::with_default_assembler(CallerConfig::default(), Vec::new()).unwrap();
        let records = engine.call_region(region(true, reads(8, 16)), &window(), &[]);
        assert_eq!(records.len(), 1);
        let call = records[0].as_variant().unwrap();
        assert_eq!(call.start, 23);
        assert_eq!(call.genotypes[0].alleles, vec![0, 1]);
    }

    #[test]
    fn reference_confidence_surrounds_the_call_in_order() {
        let engine = HaplotypeCallerEngine::with_default_assembler(gvcf(), Vec::new()).unwrap();
        let records = engine.call_region(region(true, reads(8, 16)), &window(), &[]);
        assert!(records.iter().any(|r| r.as_variant().is_some()));
        assert_eq!(records.first().unwrap().start(), 11);
        assert_eq!(records.last().unwrap().end(), 35);
        for pair in records.windows(2) {
            assert_eq!(pair[0].end() + 1, pair[1].start());
        }
    }

    #[test]
    fn just_determining_active_regions_calls_nothing() {
        let mut config = gvcf();
        config.just_determine_active_regions = true;
        let engine = HaplotypeCallerEngine::with_default_assembler(config, Vec::new()).unwrap();
        assert!(engine.call_region(region(true, reads(8, 16)), &window(), &[]).is_empty());
    }

    #[test]
    fn read_group_filter() {
        let mut config = CallerConfig::default();
        config.keep_read_group = Some("rg1".into());
        let engine = HaplotypeCallerEngine::with_default_assembler(config, Vec::new()).unwrap();
        let read = reads(0, 1).remove(0);
        assert!(!engine.passes_read_filters(&read));
        assert!(engine.passes_read_filters(&read.with_read_group("rg1")));
    }
}
