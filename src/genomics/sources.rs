//! Collaborator interfaces the caller reads from and writes to, plus
//! in-memory implementations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::genomics::{
    AlignedRead, CallRecord, GenomeInterval, SequenceDictionary, VariantEvent,
};
use crate::CallerError;

/// Supplies aligned reads overlapping an interval.
pub trait ReadSource: Send + Sync {
    /// Reads whose alignment overlaps `interval`, sorted by position.
    fn reads(&self, interval: &GenomeInterval) -> Result<Vec<AlignedRead>, CallerError>;
}

/// Supplies reference bases and the sequence dictionary.
pub trait ReferenceSource: Send + Sync {
    /// Contig names and lengths.
    fn dictionary(&self) -> &SequenceDictionary;

    /// Bases of `interval` (one byte per position).
    fn bases(&self, interval: &GenomeInterval) -> Result<Vec<u8>, CallerError>;
}

/// Supplies known alleles for given-alleles genotyping.
pub trait GivenAllelesSource: Send + Sync {
    /// Passing alleles overlapping `interval`, ordered by position.
    fn alleles_overlapping(&self, interval: &GenomeInterval) -> Vec<VariantEvent>;
}

/// Receives call records in genomic order.
pub trait OutputSink {
    /// Accept one record.
    fn accept(&mut self, record: CallRecord) -> Result<(), CallerError>;
}

impl OutputSink for Vec<CallRecord> {
    fn accept(&mut self, record: CallRecord) -> Result<(), CallerError> {
        self.push(record);
        Ok(())
    }
}

/// Reads held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReads {
    reads: Vec<AlignedRead>,
}

impl InMemoryReads {
    /// Wrap `reads`, sorting them by contig and position.
    pub fn new(mut reads: Vec<AlignedRead>) -> Self {
        reads.sort_by(|a, b| a.chrom.cmp(&b.chrom).then(a.pos.cmp(&b.pos)));
        Self { reads }
    }

    /// Distinct sample names in sorted order.
    pub fn samples(&self) -> Vec<Arc<str>> {
        let mut samples: Vec<Arc<str>> = self.reads.iter().map(|r| Arc::clone(&r.sample)).collect();
        samples.sort();
        samples.dedup();
        samples
    }
}

impl ReadSource for InMemoryReads {
    fn reads(&self, interval: &GenomeInterval) -> Result<Vec<AlignedRead>, CallerError> {
        Ok(self
            .reads
            .iter()
            .filter(|read| {
                read.chrom.as_ref() == interval.contig()
                    && read.overlaps(interval.start(), interval.end())
            })
            .cloned()
            .collect())
    }
}

/// Reference sequences held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReference {
    dictionary: SequenceDictionary,
    sequences: HashMap<Arc<str>, Arc<[u8]>>,
}

impl InMemoryReference {
    /// Empty reference.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contig with its bases.
    pub fn with_contig(mut self, name: impl Into<Arc<str>>, bases: impl AsRef<[u8]>) -> Self {
        let name = name.into();
        let bases: Arc<[u8]> = bases.as_ref().to_ascii_uppercase().into();
        self.dictionary.push(Arc::clone(&name), bases.len() as u32);
        self.sequences.insert(name, bases);
        self
    }
}

impl ReferenceSource for InMemoryReference {
    fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    fn bases(&self, interval: &GenomeInterval) -> Result<Vec<u8>, CallerError> {
        let sequence = self.sequences.get(interval.contig()).ok_or_else(|| {
            CallerError::Source(format!("unknown contig '{}'", interval.contig()))
        })?;
        sequence
            .get(interval.start() as usize - 1..interval.end() as usize)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| CallerError::Source(format!("{interval} is outside the reference")))
    }
}

/// Known alleles held in memory.
#[derive(Debug, Clone, Default)]
pub struct GivenAlleleSet {
    events: Vec<VariantEvent>,
}

impl GivenAlleleSet {
    /// Wrap `events`, sorting them by position.
    pub fn new(mut events: Vec<VariantEvent>) -> Self {
        events.sort();
        events.dedup();
        Self { events }
    }
}

impl GivenAllelesSource for GivenAlleleSet {
    fn alleles_overlapping(&self, interval: &GenomeInterval) -> Vec<VariantEvent> {
        self.events
            .iter()
            .filter(|event| event.overlaps(interval))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{CigarOp, CigarOpKind};

    #[test]
    fn in_memory_reference_slices_one_based() {
        let reference = InMemoryReference::new().with_contig("chr1", b"acgtacgt");
        let interval = GenomeInterval::new("chr1", 2, 4).unwrap();
        assert_eq!(reference.bases(&interval).unwrap(), b"CGT".to_vec());
        assert_eq!(reference.dictionary().contig_length("chr1"), Some(8));
        let outside = GenomeInterval::new("chr1", 7, 9).unwrap();
        assert!(reference.bases(&outside).is_err());
    }

    #[test]
    fn in_memory_reads_filter_by_overlap() {
        let read = |pos| {
            AlignedRead::new(
                "chr1",
                pos,
                60,
                vec![CigarOp::new(CigarOpKind::Match, 4)],
                b"ACGT".to_vec(),
                vec![30; 4],
                false,
            )
        };
        let source = InMemoryReads::new(vec![read(10), read(0), read(20)]);
        let hits = source.reads(&GenomeInterval::new("chr1", 4, 11).unwrap()).unwrap();
        let positions: Vec<_> = hits.iter().map(|r| r.pos).collect();
        assert_eq!(positions, vec![0, 10]);
    }
}
