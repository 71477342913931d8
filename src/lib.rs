//! # hapcall: assembly-based local-haplotype variant calling
//!
//! Reads aligned to a reference are cut into padded shards; each shard's
//! loci are scored for evidence of variation and segmented into active and
//! inactive assembly regions. Active regions get candidate haplotypes,
//! reads are scored against them with a pair-HMM and realigned to their best
//! haplotype, and the per-site allele likelihoods are genotyped. Optionally,
//! non-variant stretches are summarized as GQ-banded reference-confidence
//! blocks.
//!
//! ## Pipeline
//!
//! 1. **Sharding** ([`sharding`]): fixed-size, stepped, padded work units
//! 2. **Activity** ([`activity`]): per-locus ref-vs-any mini-genotyping,
//!    segmented into [`assembly::AssemblyRegion`]s
//! 3. **Assembly** ([`assembly`]): haplotypes behind the [`assembly::Assembler`] seam
//! 4. **Canonicalization** ([`alignment`]): left-aligned indels, read realignment
//! 5. **Likelihoods** ([`likelihood`]): read × haplotype table
//! 6. **Genotyping** ([`genotyping`], [`refconf`]): calls and reference blocks
//!
//! ## Usage Example
//!
//! ```ignore
//! use hapcall::{CallerConfig, HaplotypeCallerEngine, RegionWalker};
//!
//! let engine = HaplotypeCallerEngine::with_default_assembler(CallerConfig::default(), samples)?;
//! let walker = RegionWalker::new(&engine, &reads, &reference);
//! let mut records = Vec::new();
//! walker.run(&"chr20:1-1,000,000".parse()?, &mut records)?;
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod activity;   // Locus activity and region segmentation
pub mod alignment;  // Indel canonicalization and realignment
pub mod assembly;   // Regions, haplotypes, assembler seam, trimming
pub mod config;     // Caller configuration
pub mod engine;     // Region state machine
pub mod genomics;   // Genomics primitives, collaborators, records
pub mod genotyping; // Genotype likelihoods, AF posterior, calls
pub mod likelihood; // Pair-HMM and likelihood tables
pub mod refconf;    // Reference-confidence blocks
pub mod sharding;   // Interval sharding
pub mod stats;      // Fisher exact test
pub mod walker;     // Shard-parallel driver

// Re-exports for convenience
pub use config::{CallerConfig, GenotypingMode, ReferenceConfidenceMode};
pub use engine::{HaplotypeCallerEngine, RegionProcessingError};
pub use genomics::{CallRecord, GenomeInterval, RefConfidenceBlock, VariantCall, VariantEvent};
pub use sharding::{divide_interval_into_shards, divide_interval_into_stepped_shards, ShardBoundary};
pub use walker::RegionWalker;

use thiserror::Error;

/// Errors that stop a caller run.
#[derive(Error, Debug)]
pub enum CallerError {
    /// Invalid or incompatible settings.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// An argument is out of range for the call it was passed to.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A read, reference or allele source failed.
    #[error("Source error: {0}")]
    Source(String),

    /// htslib failed to open or read a file.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    /// Writing call records failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
