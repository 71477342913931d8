#[path = "common/mod.rs"]
mod common;

use std::collections::HashSet;

use blake3::hash;
use common::{random_bases, reference, tiled_reads};
use hapcall::genomics::render_records;
use hapcall::{CallerConfig, HaplotypeCallerEngine, ReferenceConfidenceMode, RegionWalker};

#[test]
fn parallel_shards_render_identically() {
    let bases = random_bases(900, 42);
    let reads = tiled_reads("chrDeterministic", &bases, 80, 4, |i, mut read| {
        if i % 3 == 0 {
            let mut seq = read.sequence.to_vec();
            seq[40] = if seq[40] == b'T' { b'G' } else { b'T' };
            read.sequence = seq.into();
        }
        read
    });
    let reference = reference("chrDeterministic", &bases);
    let config = CallerConfig::default()
        .with_reference_confidence(ReferenceConfidenceMode::Gvcf)
        .with_shards(128, 32)
        .expect("valid shards");
    let engine = HaplotypeCallerEngine::with_default_assembler(config, reads.samples())
        .expect("engine initialises");

    let mut fingerprints = HashSet::new();
    for threads in [1, 2, 4, 4, 8] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("thread pool");
        let records = pool.install(|| {
            let walker = RegionWalker::new(&engine, &reads, &reference);
            let mut records = Vec::new();
            walker.run_all(&mut records).expect("calling succeeds");
            records
        });
        let rendered = render_records(&records).expect("rendering succeeds");
        fingerprints.insert(hash(rendered.as_bytes()));
    }

    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}
