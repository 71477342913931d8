use std::collections::BTreeSet;
use std::sync::Arc;

use super::AssemblyError;
use crate::alignment::left_align_indel;
use crate::genomics::{
    normalize, read_length, reference_length, CigarOp, CigarOpKind, GenomeInterval, ReferenceWindow,
    VariantEvent,
};

/// Candidate sequence for a region, aligned against the padded reference.
///
/// The CIGAR starts at the first base of [`Haplotype::span`]. Haplotypes are
/// immutable once built and are shared as `Arc<Haplotype>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Haplotype {
    bases: Arc<[u8]>,
    span: GenomeInterval,
    cigar: Vec<CigarOp>,
    is_reference: bool,
    events: BTreeSet<VariantEvent>,
    score: f64,
}

impl Haplotype {
    /// The reference haplotype of `window`.
    pub fn reference(window: &ReferenceWindow) -> Self {
        Self {
            bases: window.shared_bases(),
            span: window.span().clone(),
            cigar: vec![CigarOp::new(CigarOpKind::Match, window.bases().len() as u32)],
            is_reference: true,
            events: BTreeSet::new(),
            score: f64::MAX,
        }
    }

    /// Apply `events` to the reference of `window`.
    ///
    /// Events must lie inside the window, match its reference bases and not
    /// overlap each other. An empty event set yields a copy of the reference
    /// that is not flagged as reference.
    pub fn from_events<I>(window: &ReferenceWindow, events: I) -> Result<Self, AssemblyError>
    where
        I: IntoIterator<Item = VariantEvent>,
    {
        let events: BTreeSet<VariantEvent> = events.into_iter().collect();
        let span = window.span();
        let mut bases = Vec::with_capacity(window.bases().len());
        let mut cigar = Vec::new();
        let mut next = span.start();

        for event in &events {
            if event.contig() != span.contig() || event.start() < span.start() || event.end() > span.end() {
                return Err(AssemblyError::OutsideWindow(event.to_string(), span.to_string()));
            }
            if event.start() < next {
                return Err(AssemblyError::OverlappingEvents(event.to_string()));
            }
            if window.slice(event.start(), event.end()) != Some(event.reference()) {
                return Err(AssemblyError::ReferenceMismatch(event.to_string()));
            }
            if event.start() > next {
                let gap = window.slice(next, event.start() - 1).unwrap_or_default();
                bases.extend_from_slice(gap);
                cigar.push(CigarOp::new(CigarOpKind::Match, gap.len() as u32));
            }
            bases.extend_from_slice(event.alternate());
            cigar.extend(event_cigar(event));
            next = event.end() + 1;
        }
        if next <= span.end() {
            let tail = window.slice(next, span.end()).unwrap_or_default();
            bases.extend_from_slice(tail);
            cigar.push(CigarOp::new(CigarOpKind::Match, tail.len() as u32));
        }

        Ok(Self {
            bases: bases.into(),
            span: span.clone(),
            cigar: normalize(&cigar),
            is_reference: false,
            events,
            score: 0.0,
        })
    }

    /// Same haplotype with a support score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Same haplotype with its first indel shifted as far left as the
    /// sequence allows.
    pub fn left_aligned(mut self, window: &ReferenceWindow) -> Self {
        let aligned = left_align_indel(&self.cigar, window.bases(), &self.bases, 0, 0);
        if read_length(&aligned) as usize == self.bases.len()
            && reference_length(&aligned) == self.span.len()
        {
            self.cigar = aligned;
        }
        self
    }

    /// Haplotype bases.
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// Whether the haplotype has no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Reference span the haplotype is aligned over.
    pub fn span(&self) -> &GenomeInterval {
        &self.span
    }

    /// Alignment of the haplotype against the reference of its span.
    pub fn cigar(&self) -> &[CigarOp] {
        &self.cigar
    }

    /// Whether this is the reference haplotype.
    pub fn is_reference(&self) -> bool {
        self.is_reference
    }

    /// Variant events carried by the haplotype.
    pub fn events(&self) -> &BTreeSet<VariantEvent> {
        &self.events
    }

    /// Support score assigned by the assembler.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Event starting at `position`, if any.
    pub fn event_starting_at(&self, position: u32) -> Option<&VariantEvent> {
        self.events.iter().find(|event| event.start() == position)
    }

    /// Whether an event starting before `position` still covers it.
    pub fn spans_position(&self, position: u32) -> bool {
        self.events
            .iter()
            .any(|event| event.start() < position && event.end() >= position)
    }

    /// Offset into the haplotype of each base, mapped to its reference
    /// offset; inserted bases map to `None`.
    pub fn reference_offsets(&self) -> Vec<Option<u32>> {
        let mut offsets = Vec::with_capacity(self.bases.len());
        let mut ref_offset = 0u32;
        for op in &self.cigar {
            match op.kind {
                kind if kind.is_alignment_match() => {
                    offsets.extend((0..op.len).map(|i| Some(ref_offset + i)));
                    ref_offset += op.len;
                }
                CigarOpKind::Insertion | CigarOpKind::SoftClip => {
                    offsets.extend((0..op.len).map(|_| None));
                }
                CigarOpKind::Deletion | CigarOpKind::Skip => ref_offset += op.len,
                _ => {}
            }
        }
        offsets
    }
}

fn event_cigar(event: &VariantEvent) -> Vec<CigarOp> {
    let (r, a) = (event.reference().len() as u32, event.alternate().len() as u32);
    let common = r.min(a);
    let mut ops = vec![CigarOp::new(CigarOpKind::Match, common)];
    if a > r {
        ops.push(CigarOp::new(CigarOpKind::Insertion, a - r));
    } else if r > a {
        ops.push(CigarOp::new(CigarOpKind::Deletion, r - a));
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::format_cigar;

    fn window() -> ReferenceWindow {
        ReferenceWindow::new(GenomeInterval::new("chr1", 11, 20).unwrap(), b"ACGTTTACGA").unwrap()
    }

    #[test]
    fn reference_haplotype_mirrors_window() {
        let hap = Haplotype::reference(&window());
        assert!(hap.is_reference());
        assert_eq!(hap.bases(), b"ACGTTTACGA");
        assert_eq!(format_cigar(hap.cigar()), "10M");
    }

    #[test]
    fn events_are_applied_with_anchored_cigars() {
        let events = vec![
            VariantEvent::new("chr1", 12, &b"C"[..], &b"G"[..]),
            VariantEvent::new("chr1", 14, &b"TTT"[..], &b"T"[..]),
            VariantEvent::new("chr1", 18, &b"C"[..], &b"CAA"[..]),
        ];
        let hap = Haplotype::from_events(&window(), events).unwrap();
        assert_eq!(hap.bases(), b"AGGTACAAGA");
        assert_eq!(format_cigar(hap.cigar()), "4M2D2M2I2M");
        assert!(hap.spans_position(15));
        assert!(!hap.spans_position(14));
        assert_eq!(hap.event_starting_at(18).unwrap().alternate(), b"CAA");
    }

    #[test]
    fn invalid_events_are_rejected() {
        let mismatch = VariantEvent::new("chr1", 12, &b"T"[..], &b"G"[..]);
        assert!(matches!(
            Haplotype::from_events(&window(), vec![mismatch]),
            Err(AssemblyError::ReferenceMismatch(_))
        ));
        let overlapping = vec![
            VariantEvent::new("chr1", 13, &b"GTT"[..], &b"G"[..]),
            VariantEvent::new("chr1", 14, &b"T"[..], &b"A"[..]),
        ];
        assert!(matches!(
            Haplotype::from_events(&window(), overlapping),
            Err(AssemblyError::OverlappingEvents(_))
        ));
        let outside = VariantEvent::new("chr1", 25, &b"A"[..], &b"G"[..]);
        assert!(Haplotype::from_events(&window(), vec![outside]).is_err());
    }

    #[test]
    fn deletion_in_repeat_is_left_aligned() {
        let deletion = VariantEvent::new("chr1", 15, &b"TT"[..], &b"T"[..]);
        let hap = Haplotype::from_events(&window(), vec![deletion])
            .unwrap()
            .left_aligned(&window());
        assert_eq!(format_cigar(hap.cigar()), "3M1D6M");
        let offsets = hap.reference_offsets();
        assert_eq!(offsets[3], Some(4));
    }
}
