use std::collections::BTreeSet;

use tracing::debug;

use super::AssemblyRegion;
use crate::genomics::{GenomeInterval, VariantEvent};

/// Outcome of trimming a region down to its variation.
#[derive(Debug, Clone)]
pub struct TrimmingResult {
    callable: Option<GenomeInterval>,
    left_flank: Option<GenomeInterval>,
    right_flank: Option<GenomeInterval>,
}

impl TrimmingResult {
    /// Whether any event overlaps the region's span.
    pub fn is_variation_present(&self) -> bool {
        self.callable.is_some()
    }

    /// Span worth genotyping.
    pub fn callable_span(&self) -> Option<&GenomeInterval> {
        self.callable.as_ref()
    }

    /// Part of the region before the callable span.
    pub fn left_flank_span(&self) -> Option<&GenomeInterval> {
        self.left_flank.as_ref()
    }

    /// Part of the region after the callable span.
    pub fn right_flank_span(&self) -> Option<&GenomeInterval> {
        self.right_flank.as_ref()
    }

    /// Callable sub-region of `region`.
    pub fn callable_region(&self, region: &AssemblyRegion) -> Option<AssemblyRegion> {
        self.callable.as_ref().and_then(|span| region.trim_to(span))
    }

    /// Non-variant flank sub-regions of `region`, left first.
    pub fn flank_regions(&self, region: &AssemblyRegion) -> (Option<AssemblyRegion>, Option<AssemblyRegion>) {
        (
            self.left_flank.as_ref().and_then(|span| region.trim_to(span)),
            self.right_flank.as_ref().and_then(|span| region.trim_to(span)),
        )
    }
}

/// Shrinks regions to the hull of their variation plus padding.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRegionTrimmer {
    padding: u32,
}

impl AssemblyRegionTrimmer {
    /// Trimmer adding `padding` bases around the variation hull.
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }

    /// Split `region` into the callable span and its flanks.
    pub fn trim(&self, region: &AssemblyRegion, events: &BTreeSet<VariantEvent>) -> TrimmingResult {
        let span = region.span();
        let overlapping: Vec<&VariantEvent> = events.iter().filter(|e| e.overlaps(span)).collect();
        let (Some(first), Some(last)) = (
            overlapping.iter().map(|e| e.start()).min(),
            overlapping.iter().map(|e| e.end()).max(),
        ) else {
            return TrimmingResult {
                callable: None,
                left_flank: None,
                right_flank: None,
            };
        };

        let start = first.saturating_sub(self.padding).max(span.start());
        let end = last.saturating_add(self.padding).min(span.end());
        let callable = span.with_bounds(start, end).ok();
        let left_flank = (start > span.start())
            .then(|| span.with_bounds(span.start(), start - 1).ok())
            .flatten();
        let right_flank = (end < span.end())
            .then(|| span.with_bounds(end + 1, span.end()).ok())
            .flatten();

        debug!(
            region = %span,
            events = overlapping.len(),
            callable = ?callable.as_ref().map(ToString::to_string),
            "trimmed region"
        );
        TrimmingResult {
            callable,
            left_flank,
            right_flank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> AssemblyRegion {
        let span = GenomeInterval::new("chr1", 101, 300).unwrap();
        let padded = GenomeInterval::new("chr1", 1, 400).unwrap();
        AssemblyRegion::new(span, padded, true)
    }

    #[test]
    fn callable_span_is_padded_hull() {
        let events: BTreeSet<VariantEvent> = [
            VariantEvent::new("chr1", 150, &b"A"[..], &b"G"[..]),
            VariantEvent::new("chr1", 170, &b"ACG"[..], &b"A"[..]),
            VariantEvent::new("chr1", 350, &b"A"[..], &b"T"[..]),
        ]
        .into_iter()
        .collect();
        let result = AssemblyRegionTrimmer::new(20).trim(&region(), &events);
        let callable = result.callable_span().unwrap();
        assert_eq!((callable.start(), callable.end()), (130, 192));
        assert_eq!(result.left_flank_span().unwrap().end(), 129);
        assert_eq!(result.right_flank_span().unwrap().start(), 193);

        let (left, right) = result.flank_regions(&region());
        assert_eq!(left.unwrap().span().start(), 101);
        assert_eq!(right.unwrap().span().end(), 300);
    }

    #[test]
    fn hull_is_clipped_to_region() {
        let events: BTreeSet<VariantEvent> =
            [VariantEvent::new("chr1", 105, &b"A"[..], &b"G"[..])].into_iter().collect();
        let result = AssemblyRegionTrimmer::new(20).trim(&region(), &events);
        assert_eq!(result.callable_span().unwrap().start(), 101);
        assert!(result.left_flank_span().is_none());
    }

    #[test]
    fn no_overlapping_events_means_no_variation() {
        let events: BTreeSet<VariantEvent> =
            [VariantEvent::new("chr1", 350, &b"A"[..], &b"G"[..])].into_iter().collect();
        let result = AssemblyRegionTrimmer::new(20).trim(&region(), &events);
        assert!(!result.is_variation_present());
        assert!(result.callable_region(&region()).is_none());
    }
}
