//! Genotype likelihoods, allele-frequency posteriors and variant calls.

pub mod af_calculator;
pub mod genotype_likelihoods;
pub mod math;

mod annotations;
mod engine;

use thiserror::Error;

pub use af_calculator::{AfCalculationResult, AlleleFrequencyCalculator};
pub use annotations::{
    allele_depths, fisher_strand, quality_by_depth, rms_mapping_quality, strand_table,
    AnnotationSelection,
};
pub use engine::{CalledHaplotypes, GenotypingEngine};
pub use genotype_likelihoods::GenotypeLikelihoodCalculator;

/// Failures while genotyping a region.
#[derive(Debug, Error)]
pub enum GenotypingError {
    /// Haplotypes could not be mapped onto site alleles.
    #[error("allele mapping failed: {0}")]
    AlleleMapping(String),
    /// A site's alleles reach outside the reference window.
    #[error("site {start}-{end} is outside the reference window")]
    OutsideWindow {
        /// First position of the site.
        start: u32,
        /// Last position of the site.
        end: u32,
    },
    /// Genotype likelihoods were NaN or infinite.
    #[error("non-finite genotype likelihood {value} at {position}")]
    NonFinite {
        /// Site position.
        position: u32,
        /// The value produced.
        value: f64,
    },
}
