//! Activity profiling: per-locus evidence of variation, segmented into
//! active and inactive assembly regions.

mod evaluator;
mod profile;
mod state;

pub use evaluator::{
    activity_probability, ActivityEvaluator, ActivityGenotypingConfig,
    AVERAGE_HQ_SOFTCLIPS_HQ_BASES_THRESHOLD, FAKE_ALT_ALLELE, FAKE_REF_ALLELE,
    MAX_ACTIVITY_CALLING_CONFIDENCE,
};
pub use profile::{ActivityProfile, ActivityProfileConfig};
pub use state::{ActivityProfileState, ActivityStateType};
