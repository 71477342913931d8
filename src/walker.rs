//! Shard-parallel driver from reads and reference to ordered call records.

use rayon::prelude::*;
use tracing::info;

use crate::activity::{ActivityProfile, ActivityProfileConfig};
use crate::assembly::{Assembler, PileupEventAssembler};
use crate::engine::HaplotypeCallerEngine;
use crate::genomics::{
    build_pileups, CallRecord, GenomeInterval, GivenAllelesSource, OutputSink, ReadSource,
    ReferenceSource, ReferenceWindow, VariantEvent,
};
use crate::sharding::{divide_interval_into_stepped_shards, ShardBoundary};
use crate::CallerError;

/// Walks shards of an interval, profiles activity, cuts regions and calls them.
///
/// Shards run in parallel; their records reach the sink in shard order.
pub struct RegionWalker<'a, A: Assembler = PileupEventAssembler> {
    engine: &'a HaplotypeCallerEngine<A>,
    reads: &'a dyn ReadSource,
    reference: &'a dyn ReferenceSource,
    given: Option<&'a dyn GivenAllelesSource>,
    profile: ActivityProfileConfig,
}

impl<A: Assembler> std::fmt::Debug for RegionWalker<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionWalker")
            .field("engine", self.engine)
            .field("given_alleles", &self.given.is_some())
            .field("profile", &self.profile)
            .finish()
    }
}

impl<'a, A: Assembler> RegionWalker<'a, A> {
    /// Walker over `reads` and `reference`.
    pub fn new(
        engine: &'a HaplotypeCallerEngine<A>,
        reads: &'a dyn ReadSource,
        reference: &'a dyn ReferenceSource,
    ) -> Self {
        Self {
            profile: ActivityProfileConfig::from_caller(engine.config()),
            engine,
            reads,
            reference,
            given: None,
        }
    }

    /// Supply known alleles.
    pub fn with_given_alleles(mut self, given: &'a dyn GivenAllelesSource) -> Self {
        self.given = Some(given);
        self
    }

    /// Shards of `interval` under the engine's shard settings.
    pub fn shards_for(&self, interval: &GenomeInterval) -> Result<Vec<ShardBoundary>, CallerError> {
        let config = self.engine.config();
        divide_interval_into_stepped_shards(
            interval,
            config.shard_size,
            config.shard_step,
            config.shard_padding,
            self.reference.dictionary(),
        )
    }

    /// Records of one shard in position order.
    pub fn process_shard(&self, shard: &ShardBoundary) -> Result<Vec<CallRecord>, CallerError> {
        let interval = shard.interval();
        let padded = shard.padded_interval();
        let window = ReferenceWindow::new(padded.clone(), self.reference.bases(padded)?)?;
        let reads = self.reads.reads(padded)?;
        let given: Vec<VariantEvent> = self
            .given
            .map(|source| source.alleles_overlapping(padded))
            .unwrap_or_default();

        let mut profile = ActivityProfile::new(interval.clone(), padded.clone(), self.profile.clone());
        for pileup in build_pileups(&reads, interval) {
            let locus = GenomeInterval::locus(interval.contig_arc().clone(), pileup.position)?;
            let ref_base = window.base_at(pileup.position).unwrap_or(b'N');
            let here: Vec<VariantEvent> = given.iter().filter(|e| e.overlaps(&locus)).cloned().collect();
            profile.add(self.engine.is_active(&locus, &pileup, ref_base, &here));
        }

        let regions = profile.into_regions(&reads)?;
        let region_count = regions.len();
        let records: Vec<CallRecord> = regions
            .into_iter()
            .flat_map(|region| self.engine.call_region(region, &window, &given))
            .collect();
        info!(shard = %interval, reads = reads.len(), regions = region_count, records = records.len(), "processed shard");
        Ok(records)
    }

    /// Call `interval`, sending records to `sink` in genomic order.
    ///
    /// Returns the number of records emitted.
    pub fn run(&self, interval: &GenomeInterval, sink: &mut dyn OutputSink) -> Result<usize, CallerError> {
        let shards = self.shards_for(interval)?;
        let results: Vec<Result<Vec<CallRecord>, CallerError>> = (0..shards.len())
            .into_par_iter()
            .map(|i| {
                let owned = owned_interval(&shards, i)?;
                let records = self.process_shard(&shards[i])?;
                Ok(records.into_iter().filter_map(|record| clip_to(record, &owned)).collect())
            })
            .collect();

        let mut emitted = 0;
        for records in results {
            for record in records? {
                sink.accept(record)?;
                emitted += 1;
            }
        }
        info!(interval = %interval, shards = shards.len(), records = emitted, "finished interval");
        Ok(emitted)
    }

    /// Call every contig of the reference dictionary in order.
    pub fn run_all(&self, sink: &mut dyn OutputSink) -> Result<usize, CallerError> {
        let intervals: Vec<GenomeInterval> = self
            .reference
            .dictionary()
            .iter()
            .filter(|contig| contig.length > 0)
            .map(|contig| GenomeInterval::new(contig.name.clone(), 1, contig.length))
            .collect::<Result<_, _>>()?;
        let mut emitted = 0;
        for interval in &intervals {
            emitted += self.run(interval, sink)?;
        }
        Ok(emitted)
    }
}

/// Part of shard `i` no later shard is responsible for: its interval up to
/// the base before the next shard starts.
fn owned_interval(shards: &[ShardBoundary], i: usize) -> Result<GenomeInterval, CallerError> {
    let interval = shards[i].interval();
    let end = shards
        .get(i + 1)
        .map_or(interval.end(), |next| interval.end().min(next.interval().start() - 1));
    interval.with_bounds(interval.start(), end)
}

/// Keep records starting inside `owned`; reference blocks are cut at its end.
fn clip_to(record: CallRecord, owned: &GenomeInterval) -> Option<CallRecord> {
    if !owned.contains_position(record.start()) {
        return None;
    }
    match record {
        CallRecord::RefBlock(mut block) => {
            block.end = block.end.min(owned.end());
            Some(CallRecord::RefBlock(block))
        }
        variant => Some(variant),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CallerConfig, ReferenceConfidenceMode};
    use crate::genomics::{parse_cigar, AlignedRead, InMemoryReads, InMemoryReference};

    fn reference() -> InMemoryReference {
        let bases: Vec<u8> = b"ACGTTGCAAGCTTCAGGTACCATG".iter().copied().cycle().take(600).collect();
        InMemoryReference::new().with_contig("chr1", bases)
    }

    #[test]
    fn records_tile_every_shard_in_order() {
        let config = CallerConfig::default()
            .with_reference_confidence(ReferenceConfidenceMode::Gvcf)
            .with_shards(200, 50)
            .unwrap();
        let engine = HaplotypeCallerEngine::with_default_assembler(config, Vec::new()).unwrap();
        let reads = InMemoryReads::new(Vec::new());
        let reference = reference();
        let walker = RegionWalker::new(&engine, &reads, &reference);
        let mut sink: Vec<CallRecord> = Vec::new();
        let interval = GenomeInterval::new("chr1", 1, 600).unwrap();
        let emitted = walker.run(&interval, &mut sink).unwrap();
        assert_eq!(emitted, sink.len());
        assert_eq!(sink.first().unwrap().start(), 1);
        assert_eq!(sink.last().unwrap().end(), 600);
        for pair in sink.windows(2) {
            assert_eq!(pair[0].end() + 1, pair[1].start());
        }
    }

    #[test]
    fn overlapping_shards_emit_each_position_once() {
        let mut config = CallerConfig::default()
            .with_reference_confidence(ReferenceConfidenceMode::Gvcf)
            .with_shards(200, 20)
            .unwrap();
        config.shard_step = 100;
        let engine = HaplotypeCallerEngine::with_default_assembler(config, Vec::new()).unwrap();
        let reads = InMemoryReads::new(Vec::new());
        let reference = reference();
        let walker = RegionWalker::new(&engine, &reads, &reference);
        let mut sink: Vec<CallRecord> = Vec::new();
        walker.run(&GenomeInterval::new("chr1", 1, 600).unwrap(), &mut sink).unwrap();

        let spans: Vec<(u32, u32)> = sink.iter().map(|r| (r.start(), r.end())).collect();
        assert_eq!(spans.first().unwrap().0, 1);
        assert_eq!(spans.last().unwrap().1, 600);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1 + 1, pair[1].0, "records {spans:?}");
        }
    }

    #[test]
    fn reference_reads_yield_no_variants() {
        let engine = HaplotypeCallerEngine::with_default_assembler(CallerConfig::default(), Vec::new()).unwrap();
        let reference = reference();
        let bases = reference.bases(&GenomeInterval::new("chr1", 1, 600).unwrap()).unwrap();
        let reads: Vec<AlignedRead> = (0..50u32)
            .map(|i| {
                let pos = i * 10;
                let seq = bases[pos as usize..pos as usize + 50].to_vec();
                AlignedRead::new("chr1", pos, 60, parse_cigar("50M").unwrap(), seq, vec![30; 50], i % 2 == 0)
            })
            .collect();
        let reads = InMemoryReads::new(reads);
        let walker = RegionWalker::new(&engine, &reads, &reference);
        let mut sink: Vec<CallRecord> = Vec::new();
        walker.run_all(&mut sink).unwrap();
        assert!(sink.is_empty());
    }
}
