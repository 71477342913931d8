use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use super::{AssemblyError, AssemblyRegion, Haplotype};
use crate::genomics::{ReferenceWindow, VariantEvent};

/// Haplotypes proposed for one region, with the events they carry.
///
/// The reference haplotype is always present and always first; haplotype
/// indices stay stable for the lifetime of the set.
#[derive(Debug, Clone)]
pub struct AssemblyResultSet {
    region: AssemblyRegion,
    window: ReferenceWindow,
    haplotypes: Vec<Arc<Haplotype>>,
    events: BTreeSet<VariantEvent>,
}

impl AssemblyResultSet {
    /// Collect `haplotypes` for `region`.
    ///
    /// A missing reference haplotype is added; more than one is an error.
    /// Haplotypes with identical bases collapse onto the first occurrence.
    pub fn new(
        region: AssemblyRegion,
        window: ReferenceWindow,
        haplotypes: Vec<Haplotype>,
    ) -> Result<Self, AssemblyError> {
        if !window.span().contains(region.padded_span()) {
            return Err(AssemblyError::WindowMismatch {
                region: region.padded_span().to_string(),
                window: window.span().to_string(),
            });
        }
        let references = haplotypes.iter().filter(|h| h.is_reference()).count();
        if references > 1 {
            return Err(AssemblyError::ReferenceHaplotypeCount(references));
        }

        let (mut ordered, others): (Vec<Haplotype>, Vec<Haplotype>) =
            haplotypes.into_iter().partition(|h| h.is_reference());
        if ordered.is_empty() {
            ordered.push(Haplotype::reference(&window));
        }
        ordered.extend(others);

        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let haplotypes: Vec<Arc<Haplotype>> = ordered
            .into_iter()
            .filter(|h| seen.insert(h.bases().to_vec()))
            .map(Arc::new)
            .collect();
        let events = haplotypes
            .iter()
            .flat_map(|h| h.events().iter().cloned())
            .collect();

        Ok(Self {
            region,
            window,
            haplotypes,
            events,
        })
    }

    /// Set holding only the reference haplotype.
    pub fn reference_only(region: AssemblyRegion, window: ReferenceWindow) -> Self {
        let reference = Arc::new(Haplotype::reference(&window));
        Self {
            region,
            window,
            haplotypes: vec![reference],
            events: BTreeSet::new(),
        }
    }

    /// Events carried by any haplotype, ordered by position.
    pub fn variation_events(&self) -> &BTreeSet<VariantEvent> {
        &self.events
    }

    /// Whether any non-reference haplotype carries an event.
    pub fn is_variation_present(&self) -> bool {
        !self.events.is_empty() && self.haplotypes.len() > 1
    }

    /// The reference haplotype.
    pub fn reference_haplotype(&self) -> &Arc<Haplotype> {
        &self.haplotypes[0]
    }

    /// All haplotypes, reference first.
    pub fn haplotypes(&self) -> &[Arc<Haplotype>] {
        &self.haplotypes
    }

    /// Region to genotype.
    pub fn region(&self) -> &AssemblyRegion {
        &self.region
    }

    /// Padded reference span and bases the haplotypes are aligned to.
    pub fn window(&self) -> &ReferenceWindow {
        &self.window
    }

    /// Restrict the set to `callable`.
    ///
    /// Each haplotype is rebuilt from its events lying inside the callable
    /// padded span; haplotypes left without events fold into the reference.
    pub fn trim_to(&self, callable: AssemblyRegion) -> Result<AssemblyResultSet, AssemblyError> {
        let bounds = callable.padded_span().clone();
        let mut haplotypes = vec![self.reference_haplotype().as_ref().clone()];
        for haplotype in self.haplotypes.iter().skip(1) {
            let kept: Vec<VariantEvent> = haplotype
                .events()
                .iter()
                .filter(|e| e.start() >= bounds.start() && e.end() <= bounds.end())
                .cloned()
                .collect();
            if kept.is_empty() {
                continue;
            }
            haplotypes.push(
                Haplotype::from_events(&self.window, kept)?
                    .with_score(haplotype.score())
                    .left_aligned(&self.window),
            );
        }
        AssemblyResultSet::new(callable, self.window.clone(), haplotypes)
    }

    /// Same haplotypes over a different region.
    pub fn with_region(mut self, region: AssemblyRegion) -> Self {
        self.region = region;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::GenomeInterval;

    fn window() -> ReferenceWindow {
        ReferenceWindow::new(GenomeInterval::new("chr1", 1, 30).unwrap(), [b'A', b'C'].repeat(15)).unwrap()
    }

    fn region(start: u32, end: u32) -> AssemblyRegion {
        let span = GenomeInterval::new("chr1", start, end).unwrap();
        AssemblyRegion::new(span.clone(), span, true)
    }

    fn snv(pos: u32) -> VariantEvent {
        let base = if pos % 2 == 1 { b'A' } else { b'C' };
        VariantEvent::new("chr1", pos, vec![base], &b"T"[..])
    }

    #[test]
    fn reference_is_added_and_duplicates_collapse() {
        let w = window();
        let a = Haplotype::from_events(&w, vec![snv(5)]).unwrap();
        let set = AssemblyResultSet::new(region(1, 30), w.clone(), vec![a.clone(), a]).unwrap();
        assert_eq!(set.haplotypes().len(), 2);
        assert!(set.reference_haplotype().is_reference());
        assert!(set.is_variation_present());
        assert_eq!(set.variation_events().len(), 1);

        let two_refs = vec![Haplotype::reference(&w), Haplotype::reference(&w)];
        assert!(matches!(
            AssemblyResultSet::new(region(1, 30), w, two_refs),
            Err(AssemblyError::ReferenceHaplotypeCount(2))
        ));
    }

    #[test]
    fn reference_only_has_no_variation() {
        let set = AssemblyResultSet::reference_only(region(1, 30), window());
        assert!(!set.is_variation_present());
        assert_eq!(set.haplotypes().len(), 1);
    }

    #[test]
    fn trimming_drops_outside_events() {
        let w = window();
        let haps = vec![
            Haplotype::from_events(&w, vec![snv(5), snv(20)]).unwrap(),
            Haplotype::from_events(&w, vec![snv(25)]).unwrap(),
        ];
        let set = AssemblyResultSet::new(region(1, 30), w, haps).unwrap();
        let trimmed = set.trim_to(region(3, 10)).unwrap();
        assert_eq!(trimmed.haplotypes().len(), 2);
        assert_eq!(trimmed.variation_events().iter().map(|e| e.start()).collect::<Vec<_>>(), vec![5]);
        assert_eq!(trimmed.region().span().start(), 3);
    }
}
