use bitvec::vec::BitVec;
use tracing::debug;

use super::{ActivityProfileState, ActivityStateType};
use crate::assembly::AssemblyRegion;
use crate::config::CallerConfig;
use crate::genomics::{AlignedRead, GenomeInterval};
use crate::CallerError;

/// Widest reach of the band-pass kernel on either side of a locus.
const MAX_FILTER_SIZE: usize = 50;
/// Kernel tails below this normalized weight are cut off.
const MIN_PROB_TO_KEEP_IN_FILTER: f64 = 1e-5;

/// Segmentation parameters of an [`ActivityProfile`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityProfileConfig {
    /// Loci with probability above this are active.
    pub active_probability_threshold: f64,
    /// Active runs are not cut before this many bases.
    pub min_region_size: u32,
    /// No region is longer than this.
    pub max_region_size: u32,
    /// Context added around each region.
    pub region_padding: u32,
    /// Furthest distance soft-clip activity spreads.
    pub max_prob_propagation_distance: u32,
    /// Standard deviation of the Gaussian band-pass filter; 0 leaves loci unsmoothed.
    pub band_pass_sigma: f64,
}

impl ActivityProfileConfig {
    /// Take the profile settings from the caller configuration.
    pub fn from_caller(config: &CallerConfig) -> Self {
        Self {
            active_probability_threshold: config.active_probability_threshold,
            min_region_size: config.min_region_size,
            max_region_size: config.max_region_size,
            region_padding: config.region_padding,
            max_prob_propagation_distance: config.max_prob_propagation_distance,
            band_pass_sigma: config.band_pass_sigma,
        }
    }
}

/// Per-locus activity over a span, cut into assembly regions.
#[derive(Debug, Clone)]
pub struct ActivityProfile {
    span: GenomeInterval,
    bounds: GenomeInterval,
    probabilities: Vec<f64>,
    config: ActivityProfileConfig,
}

impl ActivityProfile {
    /// Empty profile over `span`; region padding is clipped to `bounds`.
    pub fn new(span: GenomeInterval, bounds: GenomeInterval, config: ActivityProfileConfig) -> Self {
        let probabilities = vec![0.0; span.len() as usize];
        Self {
            span,
            bounds,
            probabilities,
            config,
        }
    }

    /// Span covered by the profile.
    pub fn span(&self) -> &GenomeInterval {
        &self.span
    }

    /// Probability recorded at each locus.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Locus probabilities after the band-pass filter.
    ///
    /// Each locus spreads its probability over its neighbours with a
    /// normalized Gaussian kernel, so isolated evidence widens into a span
    /// that can hold events assembly moves away from it. Values are capped
    /// at 1.
    pub fn smoothed_probabilities(&self) -> Vec<f64> {
        let kernel = gaussian_kernel(self.config.band_pass_sigma);
        let reach = kernel.len() / 2;
        let n = self.probabilities.len();
        let mut smoothed = vec![0.0; n];
        for (idx, &p) in self.probabilities.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            let lo = idx.saturating_sub(reach);
            let hi = (idx + reach).min(n - 1);
            for (j, slot) in smoothed.iter_mut().enumerate().take(hi + 1).skip(lo) {
                *slot += p * kernel[j + reach - idx];
            }
        }
        for value in &mut smoothed {
            *value = value.min(1.0);
        }
        smoothed
    }

    /// Record a locus state. Soft-clip states also raise their neighbours
    /// within `min(aux score, max propagation distance)` bases.
    pub fn add(&mut self, state: ActivityProfileState) {
        if !self.span.contains_position(state.position()) {
            return;
        }
        let idx = (state.position() - self.span.start()) as usize;
        let probability = state.probability();
        self.raise(idx, probability);

        if state.state_type() == ActivityStateType::HighQualitySoftClips {
            let reach = (state.aux_score().max(0.0) as u32).min(self.config.max_prob_propagation_distance)
                as usize;
            let lo = idx.saturating_sub(reach);
            let hi = (idx + reach).min(self.probabilities.len() - 1);
            for neighbour in lo..=hi {
                self.raise(neighbour, probability);
            }
        }
    }

    fn raise(&mut self, idx: usize, probability: f64) {
        if let Some(slot) = self.probabilities.get_mut(idx) {
            *slot = slot.max(probability);
        }
    }

    /// Active loci (after smoothing) as a bit mask.
    pub fn active_mask(&self) -> BitVec {
        self.mask_of(&self.smoothed_probabilities())
    }

    fn mask_of(&self, probabilities: &[f64]) -> BitVec {
        probabilities
            .iter()
            .map(|&p| p > self.config.active_probability_threshold)
            .collect()
    }

    /// Cut the profile into alternating active/inactive regions and attach the
    /// overlapping reads.
    ///
    /// Runs longer than the maximum region size are cut; active runs are cut
    /// at the least active locus past the minimum region size.
    pub fn into_regions(self, reads: &[AlignedRead]) -> Result<Vec<AssemblyRegion>, CallerError> {
        let smoothed = self.smoothed_probabilities();
        let mask = self.mask_of(&smoothed);
        let n = smoothed.len();
        let max_size = self.config.max_region_size.max(1) as usize;
        let min_size = (self.config.min_region_size.max(1) as usize).min(max_size);

        let mut regions = Vec::new();
        let mut start = 0usize;
        while start < n {
            let active = mask[start];
            let mut end = start + 1;
            while end < n && mask[end] == active && end - start < max_size {
                end += 1;
            }
            if active && end - start == max_size && end < n && mask[end] {
                end = cut_point(&smoothed, start + min_size - 1, end) + 1;
            }

            let span = self.span.with_bounds(
                self.span.start() + start as u32,
                self.span.start() + end as u32 - 1,
            )?;
            let padded = span
                .expand_within(self.config.region_padding, self.bounds.end())
                .intersect(&self.bounds)
                .unwrap_or_else(|| span.clone());
            regions.push(AssemblyRegion::new(span, padded, active).with_reads(reads.iter().cloned()));
            start = end;
        }

        debug!(
            span = %self.span,
            regions = regions.len(),
            active = regions.iter().filter(|r| r.is_active()).count(),
            "segmented activity profile"
        );
        Ok(regions)
    }
}

/// Index in `[from, to)` with the lowest probability, preferring the latest.
fn cut_point(probabilities: &[f64], from: usize, to: usize) -> usize {
    let mut best = from;
    for idx in from..to {
        if probabilities[idx] <= probabilities[best] {
            best = idx;
        }
    }
    best
}

/// Normalized Gaussian kernel of width `2 * size + 1`, where `size` is the
/// furthest offset (at most [`MAX_FILTER_SIZE`]) still carrying
/// [`MIN_PROB_TO_KEEP_IN_FILTER`] of the weight.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let weights: Vec<f64> = (0..=MAX_FILTER_SIZE)
        .map(|offset| (-((offset * offset) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f64>();
    let size = weights
        .iter()
        .rposition(|&w| w / total >= MIN_PROB_TO_KEEP_IN_FILTER)
        .unwrap_or(0);

    let mut kernel: Vec<f64> = (0..=2 * size).map(|j| weights[j.abs_diff(size)]).collect();
    let sum: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}
