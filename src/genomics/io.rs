//! `rust-htslib` adapters for the read, reference and given-alleles collaborators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_htslib::bam::{self, header::Header, record::Aux, record::Cigar, Read as _};
use rust_htslib::bcf::{self, Read as _};
use rust_htslib::faidx;
use tracing::{debug, warn};

use crate::genomics::{
    AlignedRead, CigarOp, CigarOpKind, GenomeInterval, GivenAlleleSet, GivenAllelesSource,
    ReadSource, ReferenceSource, SequenceDictionary, VariantEvent, DEFAULT_SAMPLE,
};
use crate::CallerError;

/// Indexed BAM/CRAM file read on demand.
///
/// A fresh indexed reader is opened per request so the source can be shared
/// across shard workers.
#[derive(Debug, Clone)]
pub struct BamReadSource {
    path: PathBuf,
    dictionary: SequenceDictionary,
    samples_by_read_group: HashMap<String, Arc<str>>,
}

impl BamReadSource {
    /// Open `path` (an index must exist alongside it) and parse its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CallerError> {
        let path = path.as_ref().to_path_buf();
        let reader = bam::IndexedReader::from_path(&path)?;
        let header = reader.header();

        let mut dictionary = SequenceDictionary::new();
        for tid in 0..header.target_count() {
            let name = String::from_utf8_lossy(header.tid2name(tid)).into_owned();
            let length = header.target_len(tid).unwrap_or(0) as u32;
            dictionary.push(name, length);
        }

        let mut samples_by_read_group = HashMap::new();
        let parsed = Header::from_template(header).to_hashmap();
        for record in parsed.get("RG").into_iter().flatten() {
            if let (Some(id), Some(sample)) = (record.get("ID"), record.get("SM")) {
                samples_by_read_group.insert(id.clone(), Arc::from(sample.as_str()));
            }
        }
        debug!(
            path = %path.display(),
            contigs = dictionary.len(),
            read_groups = samples_by_read_group.len(),
            "opened alignment file"
        );

        Ok(Self {
            path,
            dictionary,
            samples_by_read_group,
        })
    }

    /// Contigs declared in the header.
    pub fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    /// Sample names declared by read groups (or the default sample when none are).
    pub fn samples(&self) -> Vec<Arc<str>> {
        let mut samples: Vec<Arc<str>> = self.samples_by_read_group.values().cloned().collect();
        if samples.is_empty() {
            samples.push(Arc::from(DEFAULT_SAMPLE));
        }
        samples.sort();
        samples.dedup();
        samples
    }

    fn convert(&self, record: &bam::Record, contig: &Arc<str>) -> AlignedRead {
        let cigar = record
            .cigar()
            .iter()
            .filter_map(|op| {
                let (kind, len) = match *op {
                    Cigar::Match(len) => (CigarOpKind::Match, len),
                    Cigar::Ins(len) => (CigarOpKind::Insertion, len),
                    Cigar::Del(len) => (CigarOpKind::Deletion, len),
                    Cigar::RefSkip(len) => (CigarOpKind::Skip, len),
                    Cigar::SoftClip(len) => (CigarOpKind::SoftClip, len),
                    Cigar::HardClip(len) => (CigarOpKind::HardClip, len),
                    Cigar::Equal(len) => (CigarOpKind::SequenceMatch, len),
                    Cigar::Diff(len) => (CigarOpKind::SequenceMismatch, len),
                    Cigar::Pad(_) => return None,
                };
                Some(CigarOp::new(kind, len))
            })
            .collect();

        let read_group = match record.aux(b"RG") {
            Ok(Aux::String(rg)) => Some(rg.to_string()),
            _ => None,
        };
        let sample = read_group
            .as_deref()
            .and_then(|rg| self.samples_by_read_group.get(rg))
            .cloned()
            .unwrap_or_else(|| Arc::from(DEFAULT_SAMPLE));

        let mut read = AlignedRead::new(
            Arc::clone(contig),
            record.pos().max(0) as u32,
            record.mapq(),
            cigar,
            record.seq().as_bytes().to_ascii_uppercase(),
            record.qual().to_vec(),
            record.is_reverse(),
        )
        .with_name(String::from_utf8_lossy(record.qname()).into_owned())
        .with_sample(sample);
        if let Some(rg) = read_group {
            read = read.with_read_group(rg);
        }
        read
    }
}

impl ReadSource for BamReadSource {
    fn reads(&self, interval: &GenomeInterval) -> Result<Vec<AlignedRead>, CallerError> {
        let mut reader = bam::IndexedReader::from_path(&self.path)?;
        reader.fetch((
            interval.contig(),
            i64::from(interval.start()) - 1,
            i64::from(interval.end()),
        ))?;

        let contig = Arc::clone(interval.contig_arc());
        let mut reads = Vec::new();
        let mut record = bam::Record::new();
        while let Some(result) = reader.read(&mut record) {
            result?;
            if record.is_unmapped()
                || record.is_secondary()
                || record.is_supplementary()
                || record.is_duplicate()
                || record.is_quality_check_failed()
            {
                continue;
            }
            reads.push(self.convert(&record, &contig));
        }
        Ok(reads)
    }
}

/// Indexed FASTA reference (`.fai` required).
#[derive(Debug, Clone)]
pub struct FastaReferenceSource {
    path: PathBuf,
    dictionary: SequenceDictionary,
}

impl FastaReferenceSource {
    /// Open `path` and load its sequence dictionary from the index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CallerError> {
        let path = path.as_ref().to_path_buf();
        let reader = faidx::Reader::from_path(&path)?;
        let mut dictionary = SequenceDictionary::new();
        for idx in 0..reader.n_seqs() {
            let name = reader.seq_name(idx as i32)?;
            let length = reader.fetch_seq_len(&name) as u32;
            dictionary.push(name, length);
        }
        Ok(Self { path, dictionary })
    }
}

impl ReferenceSource for FastaReferenceSource {
    fn dictionary(&self) -> &SequenceDictionary {
        &self.dictionary
    }

    fn bases(&self, interval: &GenomeInterval) -> Result<Vec<u8>, CallerError> {
        let reader = faidx::Reader::from_path(&self.path)?;
        let bases = reader.fetch_seq(
            interval.contig(),
            interval.start() as usize - 1,
            interval.end() as usize - 1,
        )?;
        Ok(bases.to_ascii_uppercase())
    }
}

/// Known alleles loaded from a VCF or BCF file.
///
/// Only passing records are kept; each alternate allele becomes its own event.
#[derive(Debug, Clone)]
pub struct VcfGivenAlleles {
    alleles: GivenAlleleSet,
}

impl VcfGivenAlleles {
    /// Read every passing record of `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CallerError> {
        let path = path.as_ref();
        let mut reader = bcf::Reader::from_path(path)?;
        let header = reader.header().clone();

        let mut events = Vec::new();
        let mut filtered = 0usize;
        for record in reader.records() {
            let record = record?;
            if !record.has_filter("PASS".as_bytes()) {
                filtered += 1;
                continue;
            }
            let Some(rid) = record.rid() else {
                continue;
            };
            let contig: Arc<str> = Arc::from(String::from_utf8_lossy(header.rid2name(rid)?).as_ref());
            let start = u32::try_from(record.pos() + 1).map_err(|_| {
                CallerError::Source(format!("{}: invalid position {}", path.display(), record.pos()))
            })?;
            events.extend(events_from_alleles(&contig, start, &record.alleles()));
        }
        if filtered > 0 {
            warn!(path = %path.display(), filtered, "skipped non-passing given alleles");
        }
        debug!(path = %path.display(), events = events.len(), "loaded given alleles");

        Ok(Self {
            alleles: GivenAlleleSet::new(events),
        })
    }
}

impl GivenAllelesSource for VcfGivenAlleles {
    fn alleles_overlapping(&self, interval: &GenomeInterval) -> Vec<VariantEvent> {
        self.alleles.alleles_overlapping(interval)
    }
}

/// One event per concrete alternate allele of a record starting at `start`.
///
/// Symbolic (`<DEL>`), breakend, spanning-deletion (`*`) and no-call (`.`)
/// alternates carry no sequence to genotype and are skipped.
fn events_from_alleles(contig: &Arc<str>, start: u32, alleles: &[&[u8]]) -> Vec<VariantEvent> {
    let Some((reference, alternates)) = alleles.split_first() else {
        return Vec::new();
    };
    let reference = reference.to_ascii_uppercase();
    alternates
        .iter()
        .filter(|alt| is_concrete_allele(alt) && !alt.eq_ignore_ascii_case(&reference))
        .map(|alt| {
            VariantEvent::new(
                Arc::clone(contig),
                start,
                reference.clone(),
                alt.to_ascii_uppercase(),
            )
        })
        .collect()
}

fn is_concrete_allele(allele: &[u8]) -> bool {
    !allele.is_empty()
        && allele
            .iter()
            .all(|base| matches!(base.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}
