use std::sync::Arc;

/// Sample name assigned to reads that carry no read-group metadata.
pub const DEFAULT_SAMPLE: &str = "SAMPLE";

/// CIGAR operation kinds describing how a read aligns to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum CigarOpKind {
    /// Consuming match/mismatch (`M`).
    Match,
    /// Insertion relative to the reference (`I`).
    Insertion,
    /// Deletion relative to the reference (`D`).
    Deletion,
    /// Skipped reference region (`N`).
    Skip,
    /// Soft clipping (sequence present in read only).
    SoftClip,
    /// Hard clipping (trimmed sequence not present in read).
    HardClip,
    /// Sequence match (`=`).
    SequenceMatch,
    /// Sequence mismatch (`X`).
    SequenceMismatch,
}

impl CigarOpKind {
    /// Whether the operation consumes read bases.
    pub const fn consumes_read(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Insertion
                | Self::SoftClip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// Whether the operation consumes reference bases.
    pub const fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Deletion
                | Self::Skip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// Whether the operation aligns a read base against a reference base.
    pub const fn is_alignment_match(self) -> bool {
        matches!(self, Self::Match | Self::SequenceMatch | Self::SequenceMismatch)
    }

    /// Soft or hard clip.
    pub const fn is_clip(self) -> bool {
        matches!(self, Self::SoftClip | Self::HardClip)
    }

    /// Insertion or deletion.
    pub const fn is_indel(self) -> bool {
        matches!(self, Self::Insertion | Self::Deletion)
    }

    /// SAM character for the operation.
    pub const fn symbol(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::SequenceMatch => '=',
            Self::SequenceMismatch => 'X',
        }
    }

    /// Parse a SAM CIGAR character.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'M' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'N' => Some(Self::Skip),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            '=' => Some(Self::SequenceMatch),
            'X' => Some(Self::SequenceMismatch),
            _ => None,
        }
    }
}

/// CIGAR operation with length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CigarOp {
    /// Operation kind.
    pub kind: CigarOpKind,
    /// Number of bases affected by the operation.
    pub len: u32,
}

impl CigarOp {
    /// Construct a new CIGAR operation.
    pub fn new(kind: CigarOpKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// Aligned read with sequence, quality and sample information.
#[derive(Debug, Clone)]
pub struct AlignedRead {
    /// Read name.
    pub name: Arc<str>,
    /// Reference contig/chromosome name.
    pub chrom: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: u32,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// CIGAR describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read sequence stored as uppercase ASCII.
    pub sequence: Arc<[u8]>,
    /// Per-base quality scores in Phred space.
    pub qualities: Arc<[u8]>,
    /// Whether the read maps to the reverse complement strand.
    pub is_reverse: bool,
    /// Sample the read was sequenced from.
    pub sample: Arc<str>,
    /// Read group identifier, when present.
    pub read_group: Option<Arc<str>>,
}

impl AlignedRead {
    /// Construct a new aligned read wrapper belonging to [`DEFAULT_SAMPLE`].
    pub fn new(
        chrom: impl Into<Arc<str>>,
        pos: u32,
        mapq: u8,
        cigar: Vec<CigarOp>,
        sequence: impl Into<Arc<[u8]>>,
        qualities: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            name: Arc::from(""),
            chrom: chrom.into(),
            pos,
            mapq,
            cigar,
            sequence: sequence.into(),
            qualities: qualities.into(),
            is_reverse,
            sample: Arc::from(DEFAULT_SAMPLE),
            read_group: None,
        }
    }

    /// Set the read name.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the sample the read belongs to.
    pub fn with_sample(mut self, sample: impl Into<Arc<str>>) -> Self {
        self.sample = sample.into();
        self
    }

    /// Set the read group identifier.
    pub fn with_read_group(mut self, read_group: impl Into<Arc<str>>) -> Self {
        self.read_group = Some(read_group.into());
        self
    }

    /// Copy of this read with a new alignment (leftmost 0-based position and CIGAR).
    pub fn with_alignment(&self, pos: u32, cigar: Vec<CigarOp>) -> Self {
        Self {
            pos,
            cigar,
            ..self.clone()
        }
    }

    /// Read length inferred from the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the read carries no bases.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of reference bases spanned by the alignment.
    pub fn reference_length(&self) -> u32 {
        self.cigar
            .iter()
            .filter(|op| op.kind.consumes_reference())
            .map(|op| op.len)
            .sum()
    }

    /// 1-based position of the first aligned reference base.
    pub fn alignment_start(&self) -> u32 {
        self.pos + 1
    }

    /// 1-based inclusive position of the last aligned reference base.
    pub fn alignment_end(&self) -> u32 {
        (self.pos + self.reference_length()).max(self.alignment_start())
    }

    /// Read length including soft-clipped bases and hard clips.
    pub fn unclipped_length(&self) -> usize {
        self.len()
            + self
                .cigar
                .iter()
                .filter(|op| op.kind == CigarOpKind::HardClip)
                .map(|op| op.len as usize)
                .sum::<usize>()
    }

    /// Length of the leading soft clip.
    pub fn leading_soft_clip(&self) -> usize {
        self.cigar
            .iter()
            .take_while(|op| op.kind.is_clip())
            .filter(|op| op.kind == CigarOpKind::SoftClip)
            .map(|op| op.len as usize)
            .sum()
    }

    /// Length of the trailing soft clip.
    pub fn trailing_soft_clip(&self) -> usize {
        self.cigar
            .iter()
            .rev()
            .take_while(|op| op.kind.is_clip())
            .filter(|op| op.kind == CigarOpKind::SoftClip)
            .map(|op| op.len as usize)
            .sum()
    }

    /// Whether the alignment overlaps the 1-based inclusive span `[start, end]`.
    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        self.alignment_start() <= end && self.alignment_end() >= start
    }

    /// Base at the provided read offset.
    pub fn base_at(&self, offset: usize) -> Option<u8> {
        self.sequence.get(offset).copied()
    }

    /// Quality score at the provided read offset.
    pub fn quality_at(&self, offset: usize) -> Option<u8> {
        self.qualities.get(offset).copied()
    }

    /// Mapping quality associated with the alignment.
    pub fn mapq(&self) -> u8 {
        self.mapq
    }
}
