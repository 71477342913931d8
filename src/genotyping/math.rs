//! Log10-space probability helpers.

/// Genotype qualities are capped here.
pub const MAX_GENOTYPE_QUALITY: u8 = 99;

/// `log10(10^a + 10^b)` without leaving log space.
pub fn log10_sum_log10_pair(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    hi + (1.0 + 10f64.powf(lo - hi)).log10()
}

/// `log10(sum 10^v)` over `values`; `-inf` for an empty or all-`-inf` slice.
pub fn log10_sum_log10(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum: f64 = values.iter().map(|v| 10f64.powf(v - max)).sum();
    max + sum.log10()
}

/// Shift log10 values so they sum to one in linear space.
pub fn normalize_log10(values: &[f64]) -> Vec<f64> {
    let total = log10_sum_log10(values);
    if total == f64::NEG_INFINITY {
        let uniform = -(values.len().max(1) as f64).log10();
        return vec![uniform; values.len()];
    }
    values.iter().map(|v| v - total).collect()
}

/// Probability that a Phred-scaled quality is correct: `1 - 10^(-q/10)`, clamped to `[0, 1]`.
pub fn qual_to_prob(qual: f64) -> f64 {
    (1.0 - 10f64.powf(-qual / 10.0)).clamp(0.0, 1.0)
}

/// Error probability of a Phred-scaled base quality.
pub fn qual_to_error_prob(qual: u8) -> f64 {
    10f64.powf(-f64::from(qual) / 10.0)
}

/// `log10(1 - 10^(-q/10))`.
pub fn log10_qual_to_prob(qual: u8) -> f64 {
    (1.0 - qual_to_error_prob(qual)).max(f64::MIN_POSITIVE).log10()
}

/// `log10(10^(-q/10))`.
pub fn log10_qual_to_error_prob(qual: u8) -> f64 {
    -f64::from(qual) / 10.0
}

/// Convert a log10 probability to Phred scale.
pub fn phred_from_log10(log10_prob: f64) -> f64 {
    -10.0 * log10_prob
}

/// Phred-scaled likelihoods relative to the best genotype.
pub fn phred_scaled_likelihoods(log10_likelihoods: &[f64]) -> Vec<u32> {
    let best = log10_likelihoods
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    log10_likelihoods
        .iter()
        .map(|&gl| {
            let pl = (-10.0 * (gl - best)).round();
            if pl.is_finite() {
                pl.clamp(0.0, f64::from(u32::MAX)) as u32
            } else {
                u32::MAX
            }
        })
        .collect()
}

/// Genotype quality from PLs: the second-smallest PL, capped at [`MAX_GENOTYPE_QUALITY`].
pub fn genotype_quality_from_pls(pls: &[u32]) -> u8 {
    let mut sorted: Vec<u32> = pls.to_vec();
    sorted.sort_unstable();
    let gq = sorted.get(1).map_or(0, |&second| second - sorted[0]);
    gq.min(u32::from(MAX_GENOTYPE_QUALITY)) as u8
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// `log10(n!)` for small `n`.
pub fn log10_factorial(n: usize) -> f64 {
    (2..=n).map(|i| (i as f64).log10()).sum()
}

/// Streaming arithmetic mean.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    count: u64,
    mean: f64,
}

impl RunningAverage {
    /// Empty average.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one observation.
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }

    /// Current mean (0 with no observations).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sum_matches_linear_space() {
        let values = [-1.0, -2.0, -3.0];
        let expected = (0.1f64 + 0.01 + 0.001).log10();
        assert!((log10_sum_log10(&values) - expected).abs() < 1e-12);
        assert!((log10_sum_log10_pair(-1.0, -2.0) - (0.11f64).log10()).abs() < 1e-12);
        assert_eq!(log10_sum_log10(&[]), f64::NEG_INFINITY);
        assert_eq!(
            log10_sum_log10_pair(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn normalization_and_pls() {
        let normalized = normalize_log10(&[-1.0, -1.0]);
        assert!((normalized[0] - 0.5f64.log10()).abs() < 1e-12);
        let pls = phred_scaled_likelihoods(&[-10.0, -1.0, -4.0]);
        assert_eq!(pls, vec![90, 0, 30]);
        assert_eq!(genotype_quality_from_pls(&pls), 30);
        assert_eq!(genotype_quality_from_pls(&[0, 500, 900]), 99);
    }

    #[test]
    fn quality_conversions() {
        assert!((qual_to_prob(10.0) - 0.9).abs() < 1e-12);
        assert_eq!(qual_to_prob(0.0), 0.0);
        assert!((qual_to_error_prob(20) - 0.01).abs() < 1e-15);
        assert_eq!(argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn running_average() {
        let mut avg = RunningAverage::new();
        for v in [2.0, 4.0, 9.0] {
            avg.add(v);
        }
        assert!((avg.mean() - 5.0).abs() < 1e-12);
        assert_eq!(avg.count(), 3);
    }
}
