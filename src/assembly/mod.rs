//! Assembly regions, haplotypes and the assembler seam.
//!
//! The graph assembler itself is a collaborator behind [`Assembler`]; the
//! crate ships [`PileupEventAssembler`], which proposes haplotypes from the
//! events the reads already carry.

mod assembler;
mod haplotype;
mod region;
mod result;
mod trimmer;

use thiserror::Error;

pub use assembler::{Assembler, PileupEventAssembler};
pub use haplotype::Haplotype;
pub use region::AssemblyRegion;
pub use result::AssemblyResultSet;
pub use trimmer::{AssemblyRegionTrimmer, TrimmingResult};

/// Failures while proposing haplotypes for a region.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// An event's reference allele disagrees with the reference window.
    #[error("event {0} does not match the reference")]
    ReferenceMismatch(String),
    /// Two events of one haplotype cover the same reference base.
    #[error("event {0} overlaps a preceding event")]
    OverlappingEvents(String),
    /// An event lies outside the padded reference window.
    #[error("event {0} lies outside {1}")]
    OutsideWindow(String, String),
    /// A haplotype set must hold exactly one reference haplotype.
    #[error("expected one reference haplotype, found {0}")]
    ReferenceHaplotypeCount(usize),
    /// The region is not covered by the reference window.
    #[error("reference window {window} does not cover region {region}")]
    WindowMismatch {
        /// Padded span of the region.
        region: String,
        /// Span of the supplied window.
        window: String,
    },
}
