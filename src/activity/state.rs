use crate::genomics::GenomeInterval;

/// Why a locus carries activity beyond its own probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ActivityStateType {
    /// Plain per-locus probability.
    #[default]
    None,
    /// Reads at the locus carry many high-quality soft clips; the activity
    /// spreads to neighbouring loci.
    HighQualitySoftClips,
}

/// Activity of a single locus.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ActivityProfileState {
    interval: GenomeInterval,
    probability: f64,
    state_type: ActivityStateType,
    aux_score: f64,
}

impl ActivityProfileState {
    /// Plain state with probability clamped to `[0, 1]`.
    pub fn new(interval: GenomeInterval, probability: f64) -> Self {
        Self::with_type(interval, probability, ActivityStateType::None, 0.0)
    }

    /// State with an explicit type and auxiliary score.
    pub fn with_type(
        interval: GenomeInterval,
        probability: f64,
        state_type: ActivityStateType,
        aux_score: f64,
    ) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            interval,
            probability,
            state_type,
            aux_score,
        }
    }

    /// Locus the state describes.
    pub fn interval(&self) -> &GenomeInterval {
        &self.interval
    }

    /// 1-based position of the locus.
    pub fn position(&self) -> u32 {
        self.interval.start()
    }

    /// Probability that the locus is active.
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// State type.
    pub fn state_type(&self) -> ActivityStateType {
        self.state_type
    }

    /// Auxiliary score (mean high-quality soft-clip count for soft-clip states).
    pub fn aux_score(&self) -> f64 {
        self.aux_score
    }
}
