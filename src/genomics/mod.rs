//! Genomics primitives shared by every stage of the caller: reads and CIGARs,
//! intervals and reference windows, pileups, variant events, output records,
//! and the collaborator traits with their in-memory and htslib adapters.

mod cigar;
mod interval;
mod io;
mod pileup;
mod records;
mod sources;
mod types;
mod variant;

pub use cigar::{
    first_indel_index, format_cigar, has_zero_length_element, move_indel_left, normalize,
    parse_cigar, read_length, reference_length, unclip,
};
pub use interval::{ContigRecord, GenomeInterval, ReferenceWindow, SequenceDictionary};
pub use io::{BamReadSource, FastaReferenceSource, VcfGivenAlleles};
pub use pileup::{
    build_pileups, count_high_quality_soft_clips, PileupElement, ReadPileup,
    HQ_SOFT_CLIP_QUALITY,
};
pub use records::{
    render_records, write_records, Annotations, CallRecord, Genotype, RecordWriter,
    RefConfidenceBlock, VariantCall,
};
pub use sources::{
    GivenAlleleSet, GivenAllelesSource, InMemoryReads, InMemoryReference, OutputSink,
    ReadSource, ReferenceSource,
};
pub use types::{AlignedRead, CigarOp, CigarOpKind, DEFAULT_SAMPLE};
pub use variant::{EventKind, VariantEvent};
