//! Statistical tests used by call annotations.

mod fisher;

pub use fisher::{fisher_exact_two_sided, phred_scaled_fisher_strand, ContingencyTable};
