use std::fmt;
use std::sync::Arc;

use crate::genomics::GenomeInterval;

/// Shape of a variant event relative to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Single-base substitution.
    Snv,
    /// Multi-base substitution of equal length.
    Mnp,
    /// Insertion anchored on a reference base.
    Insertion,
    /// Deletion anchored on a reference base.
    Deletion,
    /// Anything else (length-changing substitution).
    Complex,
}

/// A single reference/alternate difference in VCF-style representation.
///
/// Indels carry the preceding reference base as anchor: an insertion of `T`
/// after `A` at position 10 is `10 A>AT`, a deletion of `CG` after `A` is
/// `10 ACG>A`. Ordering is by contig, position, then alleles, which makes
/// `BTreeSet<VariantEvent>` the ordered, duplicate-free event set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VariantEvent {
    contig: Arc<str>,
    start: u32,
    reference: Arc<[u8]>,
    alternate: Arc<[u8]>,
}

impl VariantEvent {
    /// New event at 1-based `start`.
    pub fn new(
        contig: impl Into<Arc<str>>,
        start: u32,
        reference: impl Into<Arc<[u8]>>,
        alternate: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            contig: contig.into(),
            start,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }

    /// Contig name.
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// First reference position covered (1-based).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last reference position covered (1-based, inclusive).
    pub fn end(&self) -> u32 {
        self.start + (self.reference.len().max(1) as u32) - 1
    }

    /// Reference allele bases.
    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    /// Alternate allele bases.
    pub fn alternate(&self) -> &[u8] {
        &self.alternate
    }

    /// Reference span of the event.
    pub fn span(&self) -> Option<GenomeInterval> {
        GenomeInterval::new(Arc::clone(&self.contig), self.start, self.end()).ok()
    }

    /// Classify the event.
    pub fn kind(&self) -> EventKind {
        let (r, a) = (self.reference.len(), self.alternate.len());
        let anchored = r > 0 && a > 0 && self.reference[0] == self.alternate[0];
        match (r, a) {
            (1, 1) => EventKind::Snv,
            (r, a) if r == a => EventKind::Mnp,
            (1, a) if a > 1 && anchored => EventKind::Insertion,
            (r, 1) if r > 1 && anchored => EventKind::Deletion,
            _ => EventKind::Complex,
        }
    }

    /// Whether the event changes the sequence length.
    pub fn is_indel(&self) -> bool {
        self.reference.len() != self.alternate.len()
    }

    /// Whether the event overlaps `interval`.
    pub fn overlaps(&self, interval: &GenomeInterval) -> bool {
        self.contig.as_ref() == interval.contig() && interval.overlaps_span(self.start, self.end())
    }
}

impl fmt::Display for VariantEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {}>{}",
            self.contig,
            self.start,
            String::from_utf8_lossy(&self.reference),
            String::from_utf8_lossy(&self.alternate)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn classification() {
        assert_eq!(VariantEvent::new("c", 5, &b"A"[..], &b"G"[..]).kind(), EventKind::Snv);
        assert_eq!(VariantEvent::new("c", 5, &b"AC"[..], &b"GT"[..]).kind(), EventKind::Mnp);
        assert_eq!(VariantEvent::new("c", 5, &b"A"[..], &b"AT"[..]).kind(), EventKind::Insertion);
        let deletion = VariantEvent::new("c", 5, &b"ACG"[..], &b"A"[..]);
        assert_eq!(deletion.kind(), EventKind::Deletion);
        assert_eq!(deletion.end(), 7);
        assert_eq!(VariantEvent::new("c", 5, &b"AC"[..], &b"G"[..]).kind(), EventKind::Complex);
    }

    #[test]
    fn ordered_set_deduplicates() {
        let mut events = BTreeSet::new();
        events.insert(VariantEvent::new("c", 9, &b"A"[..], &b"T"[..]));
        events.insert(VariantEvent::new("c", 3, &b"A"[..], &b"T"[..]));
        events.insert(VariantEvent::new("c", 9, &b"A"[..], &b"T"[..]));
        let starts: Vec<_> = events.iter().map(VariantEvent::start).collect();
        assert_eq!(starts, vec![3, 9]);
    }
}
