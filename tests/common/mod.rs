#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use hapcall::genomics::{parse_cigar, AlignedRead, InMemoryReads, InMemoryReference};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("HAPCALL_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set HAPCALL_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Deterministic pseudo-random ACGT sequence without long repeats.
pub fn random_bases(length: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..length)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            b"ACGT"[(state >> 62) as usize]
        })
        .collect()
}

pub fn reference(contig: &str, bases: &[u8]) -> InMemoryReference {
    InMemoryReference::new().with_contig(contig, bases)
}

/// Full-match read copied from `bases` at 0-based `pos`.
pub fn reference_read(contig: &str, bases: &[u8], pos: u32, length: usize, reverse: bool) -> AlignedRead {
    let seq = bases[pos as usize..pos as usize + length].to_vec();
    AlignedRead::new(
        contig,
        pos,
        60,
        parse_cigar(&format!("{length}M")).expect("valid cigar"),
        seq,
        vec![30; length],
        reverse,
    )
}

/// Reads tiling `bases` every `step` bases; `mutate` may edit the `i`-th read.
pub fn tiled_reads<F>(contig: &str, bases: &[u8], length: usize, step: usize, mut mutate: F) -> InMemoryReads
where
    F: FnMut(usize, AlignedRead) -> AlignedRead,
{
    let reads = (0..)
        .map(|i| i * step)
        .take_while(|start| start + length <= bases.len())
        .enumerate()
        .map(|(i, start)| {
            let read = reference_read(contig, bases, start as u32, length, i % 2 == 1)
                .with_name(format!("read{i}"));
            mutate(i, read)
        })
        .collect();
    InMemoryReads::new(reads)
}
