//! Reference-confidence (GVCF-style) output for non-variant positions.

mod model;
mod ref_vs_any;

pub use model::{GqBands, ReferenceConfidenceModel, MAX_INDEL_INFORMATIVE_READS};
pub use ref_vs_any::{
    is_non_ref_observation, ref_vs_any_likelihoods, RefVsAnyResult, REF_MODEL_DELETION_QUALITY,
};
