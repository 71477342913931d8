use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::CallerError;

/// 1-based inclusive genomic interval on a single contig.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GenomeInterval {
    contig: Arc<str>,
    start: u32,
    end: u32,
}

impl GenomeInterval {
    /// Create an interval, rejecting `start == 0` and `start > end`.
    pub fn new(contig: impl Into<Arc<str>>, start: u32, end: u32) -> Result<Self, CallerError> {
        let contig = contig.into();
        if start == 0 || start > end {
            return Err(CallerError::InvalidArgument(format!(
                "invalid interval {contig}:{start}-{end}"
            )));
        }
        Ok(Self { contig, start, end })
    }

    /// Single-base interval.
    pub fn locus(contig: impl Into<Arc<str>>, position: u32) -> Result<Self, CallerError> {
        Self::new(contig, position, position)
    }

    /// Contig name.
    pub fn contig(&self) -> &str {
        &self.contig
    }

    /// Shared contig name.
    pub fn contig_arc(&self) -> &Arc<str> {
        &self.contig
    }

    /// First position (1-based).
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Last position (1-based, inclusive).
    pub fn end(&self) -> u32 {
        self.end
    }

    /// Number of bases covered.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Intervals always cover at least one base.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `position` falls inside the interval.
    pub fn contains_position(&self, position: u32) -> bool {
        self.start <= position && position <= self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn contains(&self, other: &GenomeInterval) -> bool {
        self.contig == other.contig && self.start <= other.start && other.end <= self.end
    }

    /// Whether the two intervals share at least one base.
    pub fn overlaps(&self, other: &GenomeInterval) -> bool {
        self.contig == other.contig && self.start <= other.end && other.start <= self.end
    }

    /// Whether the interval overlaps `[start, end]` on the same contig.
    pub fn overlaps_span(&self, start: u32, end: u32) -> bool {
        self.start <= end && start <= self.end
    }

    /// Shared bases of both intervals.
    pub fn intersect(&self, other: &GenomeInterval) -> Option<GenomeInterval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self {
            contig: Arc::clone(&self.contig),
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Copy with new bounds on the same contig.
    pub fn with_bounds(&self, start: u32, end: u32) -> Result<GenomeInterval, CallerError> {
        Self::new(Arc::clone(&self.contig), start, end)
    }

    /// Expand by `padding` on both sides, clipped to `[1, contig_length]`.
    pub fn expand_within(&self, padding: u32, contig_length: u32) -> GenomeInterval {
        let start = self.start.saturating_sub(padding).max(1);
        let end = self.end.saturating_add(padding).min(contig_length).max(self.end);
        Self {
            contig: Arc::clone(&self.contig),
            start,
            end,
        }
    }
}

impl fmt::Display for GenomeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}

impl FromStr for GenomeInterval {
    type Err = CallerError;

    /// Parse `contig:start-end`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || CallerError::InvalidArgument(format!("cannot parse interval '{text}'"));
        let (contig, range) = text.rsplit_once(':').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;
        let start = start.replace(',', "").parse().map_err(|_| invalid())?;
        let end = end.replace(',', "").parse().map_err(|_| invalid())?;
        Self::new(contig, start, end)
    }
}

/// Contig name with its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContigRecord {
    /// Contig name.
    pub name: Arc<str>,
    /// Contig length in bases.
    pub length: u32,
}

/// Ordered contig names and lengths.
#[derive(Debug, Clone, Default)]
pub struct SequenceDictionary {
    contigs: Vec<ContigRecord>,
    index: HashMap<Arc<str>, usize>,
}

impl SequenceDictionary {
    /// Empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a contig. Re-adding a name replaces its length.
    pub fn push(&mut self, name: impl Into<Arc<str>>, length: u32) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&idx) => self.contigs[idx].length = length,
            None => {
                self.index.insert(Arc::clone(&name), self.contigs.len());
                self.contigs.push(ContigRecord { name, length });
            }
        }
    }

    /// Builder form of [`SequenceDictionary::push`].
    pub fn with_contig(mut self, name: impl Into<Arc<str>>, length: u32) -> Self {
        self.push(name, length);
        self
    }

    /// Length of `contig`, if known.
    pub fn contig_length(&self, contig: &str) -> Option<u32> {
        self.index.get(contig).map(|&idx| self.contigs[idx].length)
    }

    /// Whether `interval` lies within a known contig.
    pub fn contains_interval(&self, interval: &GenomeInterval) -> bool {
        self.contig_length(interval.contig())
            .map_or(false, |length| interval.end() <= length)
    }

    /// Interval spanning a whole contig.
    pub fn contig_interval(&self, contig: &str) -> Result<GenomeInterval, CallerError> {
        let length = self.contig_length(contig).ok_or_else(|| {
            CallerError::InvalidArgument(format!("contig '{contig}' not in sequence dictionary"))
        })?;
        GenomeInterval::new(contig, 1, length)
    }

    /// Contigs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ContigRecord> {
        self.contigs.iter()
    }

    /// Number of contigs.
    pub fn len(&self) -> usize {
        self.contigs.len()
    }

    /// Whether no contigs are registered.
    pub fn is_empty(&self) -> bool {
        self.contigs.is_empty()
    }
}

/// Reference bases materialized for an interval.
#[derive(Debug, Clone)]
pub struct ReferenceWindow {
    span: GenomeInterval,
    bases: Arc<[u8]>,
}

impl ReferenceWindow {
    /// Wrap bases covering `span` (upper-cased on construction).
    pub fn new(span: GenomeInterval, bases: impl AsRef<[u8]>) -> Result<Self, CallerError> {
        let bases = bases.as_ref();
        if bases.len() != span.len() as usize {
            return Err(CallerError::Source(format!(
                "reference returned {} bases for {span} ({} expected)",
                bases.len(),
                span.len()
            )));
        }
        Ok(Self {
            span,
            bases: bases.to_ascii_uppercase().into(),
        })
    }

    /// Interval covered by the window.
    pub fn span(&self) -> &GenomeInterval {
        &self.span
    }

    /// All bases of the window.
    pub fn bases(&self) -> &[u8] {
        &self.bases
    }

    /// Shared handle to the bases.
    pub fn shared_bases(&self) -> Arc<[u8]> {
        Arc::clone(&self.bases)
    }

    /// Base at 1-based `position`.
    pub fn base_at(&self, position: u32) -> Option<u8> {
        if !self.span.contains_position(position) {
            return None;
        }
        self.bases.get((position - self.span.start()) as usize).copied()
    }

    /// Bases of `[start, end]` when fully inside the window.
    pub fn slice(&self, start: u32, end: u32) -> Option<&[u8]> {
        if start > end || !self.span.contains_position(start) || !self.span.contains_position(end) {
            return None;
        }
        let offset = (start - self.span.start()) as usize;
        self.bases.get(offset..=offset + (end - start) as usize)
    }

    /// Window restricted to the part of `interval` it covers.
    pub fn sub_window(&self, interval: &GenomeInterval) -> Option<ReferenceWindow> {
        let span = self.span.intersect(interval)?;
        let bases = self.slice(span.start(), span.end())?;
        Some(Self {
            bases: bases.into(),
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_validation_and_parsing() {
        assert!(GenomeInterval::new("chr1", 0, 5).is_err());
        assert!(GenomeInterval::new("chr1", 6, 5).is_err());
        let parsed: GenomeInterval = "chr1:1,000-2,000".parse().unwrap();
        assert_eq!(parsed.start(), 1000);
        assert_eq!(parsed.len(), 1001);
        assert_eq!(parsed.to_string(), "chr1:1000-2000");
        assert!("chr1-5".parse::<GenomeInterval>().is_err());
    }

    #[test]
    fn expansion_clips_to_contig() {
        let interval = GenomeInterval::new("chr1", 5, 10).unwrap();
        let padded = interval.expand_within(10, 12);
        assert_eq!((padded.start(), padded.end()), (1, 12));
    }

    #[test]
    fn window_slicing() {
        let span = GenomeInterval::new("chr1", 11, 20).unwrap();
        let window = ReferenceWindow::new(span, b"acgtacgtac").unwrap();
        assert_eq!(window.base_at(11), Some(b'A'));
        assert_eq!(window.base_at(21), None);
        assert_eq!(window.slice(12, 14), Some(&b"CGT"[..]));
        let sub = window
            .sub_window(&GenomeInterval::new("chr1", 18, 40).unwrap())
            .unwrap();
        assert_eq!(sub.span().end(), 20);
        assert_eq!(sub.bases(), b"TAC");
    }

    #[test]
    fn dictionary_lookup() {
        let dict = SequenceDictionary::new().with_contig("chr1", 100).with_contig("chr2", 50);
        assert_eq!(dict.contig_length("chr2"), Some(50));
        assert!(dict.contains_interval(&GenomeInterval::new("chr1", 90, 100).unwrap()));
        assert!(!dict.contains_interval(&GenomeInterval::new("chr2", 40, 51).unwrap()));
        assert!(dict.contig_interval("chrX").is_err());
    }
}
