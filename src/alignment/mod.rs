//! Indel canonicalization and read-to-haplotype realignment.

mod canonicalize;
mod realign;

pub use canonicalize::{
    left_align_indel, left_align_read, mismatch_quality_sum, reference_positions,
};
pub use realign::{realign_read_to_haplotype, realign_with_scores, AlignmentScores};
