use crate::genomics::{AlignedRead, GenomeInterval};

/// A stretch of the genome processed as one unit, with the reads overlapping it.
///
/// The region owns its reads. Filtering consumes the region and hands back a
/// reduced region plus the removed reads.
#[derive(Debug, Clone)]
pub struct AssemblyRegion {
    span: GenomeInterval,
    padded_span: GenomeInterval,
    is_active: bool,
    reads: Vec<AlignedRead>,
}

impl AssemblyRegion {
    /// Region without reads. `padded_span` must contain `span`.
    pub fn new(span: GenomeInterval, padded_span: GenomeInterval, is_active: bool) -> Self {
        debug_assert!(padded_span.contains(&span));
        Self {
            span,
            padded_span,
            is_active,
            reads: Vec::new(),
        }
    }

    /// Attach reads overlapping the padded span, sorted by position.
    pub fn with_reads<I>(mut self, reads: I) -> Self
    where
        I: IntoIterator<Item = AlignedRead>,
    {
        let padded = &self.padded_span;
        self.reads.extend(reads.into_iter().filter(|read| {
            read.chrom.as_ref() == padded.contig() && read.overlaps(padded.start(), padded.end())
        }));
        self.reads.sort_by_key(|read| read.pos);
        self
    }

    /// Interval the region is responsible for.
    pub fn span(&self) -> &GenomeInterval {
        &self.span
    }

    /// Span plus context.
    pub fn padded_span(&self) -> &GenomeInterval {
        &self.padded_span
    }

    /// Whether the activity profile marked the region active.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Reads overlapping the padded span.
    pub fn reads(&self) -> &[AlignedRead] {
        &self.reads
    }

    /// Number of reads.
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }

    /// Whether the region carries no reads.
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Context on either side of the span.
    pub fn padding(&self) -> u32 {
        (self.span.start() - self.padded_span.start()).max(self.padded_span.end() - self.span.end())
    }

    /// Give up the reads.
    pub fn into_reads(self) -> Vec<AlignedRead> {
        self.reads
    }

    /// Split the reads by `keep`: the reduced region and the removed reads.
    pub fn partition_reads<F>(self, keep: F) -> (AssemblyRegion, Vec<AlignedRead>)
    where
        F: Fn(&AlignedRead) -> bool,
    {
        let (kept, removed): (Vec<_>, Vec<_>) = self.reads.into_iter().partition(|r| keep(r));
        (
            AssemblyRegion {
                span: self.span,
                padded_span: self.padded_span,
                is_active: self.is_active,
                reads: kept,
            },
            removed,
        )
    }

    /// Sub-region covering the part of `span` inside this region.
    ///
    /// The new padded span keeps this region's padding, clipped to the current
    /// padded span; reads overlapping it are copied over.
    pub fn trim_to(&self, span: &GenomeInterval) -> Option<AssemblyRegion> {
        let new_span = self.span.intersect(span)?;
        let padding = self.padding();
        let padded_start = new_span
            .start()
            .saturating_sub(padding)
            .max(self.padded_span.start());
        let padded_end = new_span
            .end()
            .saturating_add(padding)
            .min(self.padded_span.end());
        let padded_span = new_span.with_bounds(padded_start, padded_end).ok()?;
        Some(
            AssemblyRegion::new(new_span, padded_span, self.is_active)
                .with_reads(self.reads.iter().cloned()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::parse_cigar;

    fn read(pos: u32, mapq: u8) -> AlignedRead {
        AlignedRead::new("chr1", pos, mapq, parse_cigar("10M").unwrap(), vec![b'A'; 10], vec![30; 10], false)
    }

    fn region() -> AssemblyRegion {
        let span = GenomeInterval::new("chr1", 101, 200).unwrap();
        let padded = GenomeInterval::new("chr1", 81, 220).unwrap();
        AssemblyRegion::new(span, padded, true).with_reads(vec![read(150, 60), read(0, 60), read(85, 5)])
    }

    #[test]
    fn reads_outside_padding_are_dropped() {
        let region = region();
        assert_eq!(region.read_count(), 2);
        assert_eq!(region.reads()[0].pos, 85);
        assert_eq!(region.padding(), 20);
    }

    #[test]
    fn partition_moves_reads() {
        let (kept, removed) = region().partition_reads(|r| r.mapq >= 20);
        assert_eq!(kept.read_count(), 1);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].mapq, 5);
    }

    #[test]
    fn trimming_keeps_padding_within_bounds() {
        let region = region();
        let trimmed = region
            .trim_to(&GenomeInterval::new("chr1", 190, 400).unwrap())
            .unwrap();
        assert_eq!((trimmed.span().start(), trimmed.span().end()), (190, 200));
        assert_eq!((trimmed.padded_span().start(), trimmed.padded_span().end()), (170, 220));
        assert_eq!(trimmed.read_count(), 0);
        assert!(region
            .trim_to(&GenomeInterval::new("chr1", 300, 400).unwrap())
            .is_none());
    }
}
