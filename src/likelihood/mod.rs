//! Read-versus-haplotype likelihoods.

mod engine;
mod pair_hmm;
mod read_likelihoods;

use thiserror::Error;

pub use engine::LikelihoodEngine;
pub use pair_hmm::{PairHmm, ReadLikelihoodCalculator, DEFAULT_GAP_CONTINUATION, DEFAULT_GAP_OPEN};
pub use read_likelihoods::{ReadLikelihoods, INFORMATIVE_LIKELIHOOD_THRESHOLD};

/// Failures while scoring reads.
#[derive(Debug, Error)]
pub enum LikelihoodError {
    /// Nothing to score reads against.
    #[error("no haplotypes to score reads against")]
    NoHaplotypes,
    /// The model produced NaN or an infinity.
    #[error("non-finite likelihood {value} for read '{read}'")]
    NonFinite {
        /// Name of the offending read.
        read: String,
        /// The value produced.
        value: f64,
    },
}
