//! Caller configuration.

use crate::CallerError;

/// Lowest usable base quality; `min_base_quality` below this is rejected.
pub const MIN_USABLE_BASE_QUALITY: u8 = 6;

/// Default genotype-quality band boundaries for reference blocks.
pub const DEFAULT_GQ_BANDS: [u8; 8] = [1, 10, 20, 30, 40, 50, 60, 99];

/// Whether non-variant positions are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ReferenceConfidenceMode {
    /// Emit variant records only.
    #[default]
    None,
    /// Emit banded reference-confidence blocks between variant records.
    Gvcf,
}

/// Where candidate alleles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum GenotypingMode {
    /// Discover alleles by assembly.
    #[default]
    Discovery,
    /// Genotype only the supplied alleles.
    GivenAlleles,
}

/// Configuration of the whole calling pipeline.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CallerConfig {
    /// Bases per shard.
    pub shard_size: i64,
    /// Distance between consecutive shard starts.
    pub shard_step: i64,
    /// Bases of context added around each shard.
    pub shard_padding: i64,
    /// Bases of context added around each assembly region.
    pub region_padding: u32,
    /// Smallest active region before a cut is considered.
    pub min_region_size: u32,
    /// Largest assembly region.
    pub max_region_size: u32,
    /// Loci with activity above this are active.
    pub active_probability_threshold: f64,
    /// Furthest distance high-quality soft-clip activity is propagated.
    pub max_prob_propagation_distance: u32,
    /// Standard deviation of the Gaussian smoothing of activity; 0 disables it.
    pub band_pass_sigma: f64,
    /// Bases below this quality are ignored by the reference model.
    pub min_base_quality: u8,
    /// Reads below this mapping quality are excluded.
    pub min_mapping_quality: u8,
    /// Reads shorter than this are excluded.
    pub min_read_length: usize,
    /// Sample ploidy.
    pub ploidy: usize,
    /// Minimum QUAL for a call to be emitted.
    pub calling_confidence: f64,
    /// Prior probability of a heterozygous SNP.
    pub heterozygosity: f64,
    /// Prior probability of a heterozygous indel.
    pub indel_heterozygosity: f64,
    /// Reference-confidence output mode.
    pub reference_confidence: ReferenceConfidenceMode,
    /// Genotyping mode.
    pub genotyping_mode: GenotypingMode,
    /// Mark loci overlapping given alleles active regardless of evidence.
    pub use_alleles_trigger: bool,
    /// Compute per-call strand-bias annotations.
    pub strand_bias_annotation: bool,
    /// Restrict calling to this sample.
    pub sample_name: Option<String>,
    /// Restrict calling to reads of this read group.
    pub keep_read_group: Option<String>,
    /// Genotype-quality band boundaries for reference blocks.
    pub gq_bands: Vec<u8>,
    /// Stop after computing read likelihoods.
    pub do_not_genotype: bool,
    /// Only determine active regions; never call.
    pub just_determine_active_regions: bool,
    /// Keep processing regions that look variation-free.
    pub disable_optimizations: bool,
    /// Reads that must support an event before the assembler keeps it.
    pub min_event_support: usize,
    /// Most haplotypes proposed per region (reference included).
    pub max_haplotypes: usize,
    /// Context kept around the variation when trimming regions.
    pub trim_padding: u32,
    /// Widest allowed gap, in log10 units, between a read's best and worst haplotype likelihood.
    pub max_likelihood_gap: f64,
    /// Window around a position inside which reads must be indel-free to vouch for the reference.
    pub indel_size_to_eliminate: u32,
}

impl Default for CallerConfig {
    fn default() -> Self {
        Self {
            shard_size: 5_000,
            shard_step: 5_000,
            shard_padding: 100,
            region_padding: 100,
            min_region_size: 50,
            max_region_size: 300,
            active_probability_threshold: 0.002,
            max_prob_propagation_distance: 50,
            band_pass_sigma: 17.0,
            min_base_quality: 10,
            min_mapping_quality: 20,
            min_read_length: 10,
            ploidy: 2,
            calling_confidence: 30.0,
            heterozygosity: 1e-3,
            indel_heterozygosity: 1.25e-4,
            reference_confidence: ReferenceConfidenceMode::None,
            genotyping_mode: GenotypingMode::Discovery,
            use_alleles_trigger: false,
            strand_bias_annotation: true,
            sample_name: None,
            keep_read_group: None,
            gq_bands: DEFAULT_GQ_BANDS.to_vec(),
            do_not_genotype: false,
            just_determine_active_regions: false,
            disable_optimizations: false,
            min_event_support: 2,
            max_haplotypes: 128,
            trim_padding: 20,
            max_likelihood_gap: 10.0,
            indel_size_to_eliminate: 10,
        }
    }
}

impl CallerConfig {
    /// Configure shard size and padding (step equals size).
    pub fn with_shards(mut self, size: i64, padding: i64) -> Result<Self, CallerError> {
        if size < 1 || padding < 0 {
            return Err(CallerError::Configuration(format!(
                "shard size must be positive and padding non-negative (got {size}, {padding})"
            )));
        }
        self.shard_size = size;
        self.shard_step = size;
        self.shard_padding = padding;
        Ok(self)
    }

    /// Configure assembly region bounds and padding.
    pub fn with_region_bounds(
        mut self,
        min_size: u32,
        max_size: u32,
        padding: u32,
    ) -> Result<Self, CallerError> {
        if min_size == 0 || min_size > max_size {
            return Err(CallerError::Configuration(format!(
                "invalid region bounds {min_size}..={max_size}"
            )));
        }
        self.min_region_size = min_size;
        self.max_region_size = max_size;
        self.region_padding = padding;
        Ok(self)
    }

    /// Set the sample ploidy.
    pub fn with_ploidy(mut self, ploidy: usize) -> Result<Self, CallerError> {
        if ploidy == 0 {
            return Err(CallerError::Configuration("ploidy must be at least 1".into()));
        }
        self.ploidy = ploidy;
        Ok(self)
    }

    /// Set the minimum QUAL for emission.
    pub fn with_calling_confidence(mut self, confidence: f64) -> Result<Self, CallerError> {
        if !confidence.is_finite() || confidence < 0.0 {
            return Err(CallerError::Configuration(format!(
                "calling confidence must be a non-negative number (got {confidence})"
            )));
        }
        self.calling_confidence = confidence;
        Ok(self)
    }

    /// Set the minimum base quality.
    pub fn with_min_base_quality(mut self, quality: u8) -> Self {
        self.min_base_quality = quality;
        self
    }

    /// Enable or disable reference-confidence output.
    pub fn with_reference_confidence(mut self, mode: ReferenceConfidenceMode) -> Self {
        self.reference_confidence = mode;
        self
    }

    /// Set the genotyping mode.
    pub fn with_genotyping_mode(mut self, mode: GenotypingMode) -> Self {
        self.genotyping_mode = mode;
        self
    }

    /// Restrict calling to one sample.
    pub fn with_sample_name(mut self, sample: impl Into<String>) -> Self {
        self.sample_name = Some(sample.into());
        self
    }

    /// Replace the reference-block GQ bands.
    pub fn with_gq_bands(mut self, bands: Vec<u8>) -> Self {
        self.gq_bands = bands;
        self
    }

    /// Whether reference-confidence records are produced.
    pub fn emits_reference_confidence(&self) -> bool {
        self.reference_confidence == ReferenceConfidenceMode::Gvcf
    }

    /// Whether only supplied alleles are genotyped.
    pub fn is_given_alleles(&self) -> bool {
        self.genotyping_mode == GenotypingMode::GivenAlleles
    }

    /// Check option combinations and apply mode-implied overrides.
    ///
    /// Reference-confidence output forces a calling confidence of zero and
    /// per-sample strand-bias tables.
    pub fn validated(mut self) -> Result<Self, CallerError> {
        if self.min_base_quality < MIN_USABLE_BASE_QUALITY {
            return Err(CallerError::Configuration(format!(
                "min base quality must be at least {MIN_USABLE_BASE_QUALITY} (got {})",
                self.min_base_quality
            )));
        }
        if self.ploidy == 0 {
            return Err(CallerError::Configuration("ploidy must be at least 1".into()));
        }
        if self.min_region_size == 0 || self.min_region_size > self.max_region_size {
            return Err(CallerError::Configuration(format!(
                "invalid region bounds {}..={}",
                self.min_region_size, self.max_region_size
            )));
        }
        if !self.band_pass_sigma.is_finite() || self.band_pass_sigma < 0.0 {
            return Err(CallerError::Configuration(format!(
                "band-pass sigma must be a non-negative number (got {})",
                self.band_pass_sigma
            )));
        }
        if self.max_haplotypes < 2 {
            return Err(CallerError::Configuration(
                "at least two haplotypes per region are required".into(),
            ));
        }
        if self.emits_reference_confidence() {
            if self.is_given_alleles() {
                return Err(CallerError::Configuration(
                    "reference-confidence output cannot be combined with given-alleles genotyping"
                        .into(),
                ));
            }
            if self.do_not_genotype {
                return Err(CallerError::Configuration(
                    "reference-confidence output requires genotyping".into(),
                ));
            }
            self.calling_confidence = 0.0;
            self.strand_bias_annotation = true;
        }
        Ok(self)
    }
}
