use anyhow::{anyhow, Result};
use std::io::Write;
use std::sync::Arc;

use crate::genomics::OutputSink;
use crate::CallerError;

const HEADER: &str = "##source=hapcall\n#CONTIG\tSTART\tEND\tREF\tALT\tQUAL\tINFO\tFORMAT\tSAMPLES\n";
const NON_REF: &str = "<NON_REF>";

/// Per-sample genotype of a variant call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Genotype {
    /// Sample name.
    pub sample: Arc<str>,
    /// Allele indices (empty for a no-call).
    pub alleles: Vec<usize>,
    /// Genotype quality.
    pub gq: Option<u8>,
    /// Phred-scaled genotype likelihoods in VCF genotype order.
    pub pl: Vec<u32>,
    /// Reads overlapping the site.
    pub depth: u32,
    /// Informative reads per allele.
    pub allele_depths: Vec<u32>,
    /// Per-sample strand table `[ref fwd, ref rev, alt fwd, alt rev]`.
    pub strand_bias: Option<[u32; 4]>,
}

impl Genotype {
    /// Whether the genotype carries allele assignments.
    pub fn is_called(&self) -> bool {
        !self.alleles.is_empty()
    }

    /// Whether every assigned allele is the reference.
    pub fn is_hom_ref(&self) -> bool {
        self.is_called() && self.alleles.iter().all(|&a| a == 0)
    }
}

/// Site-level statistics attached to a variant call.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Annotations {
    /// Reads overlapping the site across samples.
    pub depth: u32,
    /// Root-mean-square mapping quality of those reads.
    pub rms_mapping_quality: f64,
    /// QUAL normalized by depth.
    pub quality_by_depth: Option<f64>,
    /// Phred-scaled Fisher strand-bias p-value.
    pub fisher_strand: Option<f64>,
    /// Maximum-likelihood allele count per alternate allele.
    pub mle_allele_counts: Option<Vec<u32>>,
}

/// A called variant site.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VariantCall {
    /// Contig name.
    pub contig: Arc<str>,
    /// First reference position (1-based).
    pub start: u32,
    /// Last reference position (1-based, inclusive).
    pub end: u32,
    /// Reference allele.
    pub reference: Arc<[u8]>,
    /// Alternate alleles.
    pub alternates: Vec<Arc<[u8]>>,
    /// Phred-scaled probability that the site is not variant.
    pub quality: f64,
    /// Per-sample genotypes.
    pub genotypes: Vec<Genotype>,
    /// Site statistics.
    pub annotations: Annotations,
}

impl VariantCall {
    /// Whether any sample has a called genotype.
    pub fn has_called_genotype(&self) -> bool {
        self.genotypes.iter().any(Genotype::is_called)
    }
}

/// Run of non-variant positions sharing a genotype-quality band.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RefConfidenceBlock {
    /// Contig name.
    pub contig: Arc<str>,
    /// First position of the block (1-based).
    pub start: u32,
    /// Last position of the block (1-based, inclusive).
    pub end: u32,
    /// Reference base at `start`.
    pub reference_base: u8,
    /// Sample the block describes.
    pub sample: Arc<str>,
    /// Ploidy of the hom-ref genotype.
    pub ploidy: usize,
    /// Lowest genotype quality over the block.
    pub min_gq: u8,
    /// Lowest read depth over the block.
    pub min_depth: u32,
    /// Hom-ref / het / hom-var PLs of the lowest-GQ position.
    pub pl: [u32; 3],
}

/// Terminal output of the caller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum CallRecord {
    /// Called variant site.
    Variant(VariantCall),
    /// Reference-confidence block.
    RefBlock(RefConfidenceBlock),
}

impl CallRecord {
    /// Contig of the record.
    pub fn contig(&self) -> &str {
        match self {
            Self::Variant(call) => &call.contig,
            Self::RefBlock(block) => &block.contig,
        }
    }

    /// First position of the record.
    pub fn start(&self) -> u32 {
        match self {
            Self::Variant(call) => call.start,
            Self::RefBlock(block) => block.start,
        }
    }

    /// Last position of the record.
    pub fn end(&self) -> u32 {
        match self {
            Self::Variant(call) => call.end,
            Self::RefBlock(block) => block.end,
        }
    }

    /// Variant payload, if any.
    pub fn as_variant(&self) -> Option<&VariantCall> {
        match self {
            Self::Variant(call) => Some(call),
            Self::RefBlock(_) => None,
        }
    }
}

/// Streams records as tab-separated text, header first.
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Write the header to `writer` and wait for records.
    pub fn new(mut writer: W) -> Result<Self, CallerError> {
        writer.write_all(HEADER.as_bytes())?;
        Ok(Self { writer, written: 0 })
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, CallerError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> OutputSink for RecordWriter<W> {
    fn accept(&mut self, record: CallRecord) -> Result<(), CallerError> {
        let line = match &record {
            CallRecord::Variant(call) => format_variant(call),
            CallRecord::RefBlock(block) => format_block(block),
        };
        self.writer.write_all(line.as_bytes())?;
        self.written += 1;
        Ok(())
    }
}

/// Write records as tab-separated text.
pub fn write_records<W: Write>(writer: &mut W, records: &[CallRecord]) -> Result<()> {
    let mut sink = RecordWriter::new(writer)?;
    for record in records {
        sink.accept(record.clone())?;
    }
    sink.finish()?;
    Ok(())
}

/// Render records into a string (useful for tests and snapshots).
pub fn render_records(records: &[CallRecord]) -> Result<String> {
    let mut buffer = Vec::new();
    write_records(&mut buffer, records)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered records are not valid UTF-8"))
}

fn format_variant(call: &VariantCall) -> String {
    let alts = call
        .alternates
        .iter()
        .map(|alt| String::from_utf8_lossy(alt).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    let annotations = &call.annotations;
    let mut info = vec![
        format!("DP={}", annotations.depth),
        format!("MQ={:.2}", annotations.rms_mapping_quality),
    ];
    if let Some(qd) = annotations.quality_by_depth {
        info.push(format!("QD={qd:.2}"));
    }
    if let Some(fs) = annotations.fisher_strand {
        info.push(format!("FS={fs:.3}"));
    }
    if let Some(counts) = &annotations.mle_allele_counts {
        info.push(format!("MLEAC={}", join(counts)));
    }

    let samples = call
        .genotypes
        .iter()
        .map(format_genotype)
        .collect::<Vec<_>>()
        .join("\t");

    format!(
        "{contig}\t{start}\t{end}\t{reference}\t{alts}\t{qual:.2}\t{info}\tGT:GQ:DP:AD:PL:SB\t{samples}\n",
        contig = call.contig,
        start = call.start,
        end = call.end,
        reference = String::from_utf8_lossy(&call.reference),
        qual = call.quality,
        info = info.join(";"),
    )
}

fn format_genotype(genotype: &Genotype) -> String {
    let gt = if genotype.is_called() {
        genotype
            .alleles
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("/")
    } else {
        ".".to_string()
    };
    let gq = genotype
        .gq
        .map_or_else(|| ".".to_string(), |gq| gq.to_string());
    let sb = genotype
        .strand_bias
        .map_or_else(|| ".".to_string(), |sb| join(&sb[..]));
    format!(
        "{}={}:{}:{}:{}:{}:{}",
        genotype.sample,
        gt,
        gq,
        genotype.depth,
        join(&genotype.allele_depths),
        join(&genotype.pl),
        sb
    )
}

fn format_block(block: &RefConfidenceBlock) -> String {
    let gt = vec!["0"; block.ploidy.max(1)].join("/");
    format!(
        "{contig}\t{start}\t{end}\t{base}\t{NON_REF}\t.\tEND={end};MIN_DP={dp}\tGT:GQ:PL\t{sample}={gt}:{gq}:{pl}\n",
        contig = block.contig,
        start = block.start,
        end = block.end,
        base = block.reference_base as char,
        dp = block.min_depth,
        sample = block.sample,
        gq = block.min_gq,
        pl = join(&block.pl[..]),
    )
}

fn join<T: ToString>(values: &[T]) -> String {
    if values.is_empty() {
        return ".".to_string();
    }
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
