use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{AssemblyError, AssemblyRegion, AssemblyResultSet, Haplotype};
use crate::alignment::left_align_read;
use crate::config::CallerConfig;
use crate::genomics::{AlignedRead, CigarOpKind, ReferenceWindow, VariantEvent};

/// Proposes candidate haplotypes for an active region.
pub trait Assembler: Send + Sync + fmt::Debug {
    /// Haplotypes for `region` against the padded reference `window`.
    ///
    /// `given` holds known alleles that must be represented. The returned set
    /// always contains exactly one reference haplotype.
    fn assemble(
        &self,
        region: &AssemblyRegion,
        given: &[VariantEvent],
        window: &ReferenceWindow,
    ) -> Result<AssemblyResultSet, AssemblyError>;
}

/// Builds haplotypes from the events already present in read alignments.
///
/// Reads are left-aligned first so equivalent indels collapse onto one
/// representation. Events seen in at least `min_event_support` reads (with
/// base quality at least `min_base_quality`) are kept, together with the
/// given alleles. Candidates are the combinations of kept events observed on
/// single reads, most supported first, followed by every kept event alone.
#[derive(Debug, Clone)]
pub struct PileupEventAssembler {
    min_event_support: usize,
    min_base_quality: u8,
    max_haplotypes: usize,
}

impl PileupEventAssembler {
    /// Assembler with explicit limits.
    pub fn new(min_event_support: usize, min_base_quality: u8, max_haplotypes: usize) -> Self {
        Self {
            min_event_support: min_event_support.max(1),
            min_base_quality,
            max_haplotypes: max_haplotypes.max(2),
        }
    }

    /// Assembler configured from the caller settings.
    pub fn from_config(config: &CallerConfig) -> Self {
        Self::new(config.min_event_support, config.min_base_quality, config.max_haplotypes)
    }

    /// Events a read's alignment carries relative to `window`.
    ///
    /// Mismatches below the base-quality threshold, indels at either end of
    /// the alignment and anything outside the window are ignored.
    pub fn read_events(&self, read: &AlignedRead, window: &ReferenceWindow) -> BTreeSet<VariantEvent> {
        let contig = Arc::clone(window.span().contig_arc());
        let mut events = BTreeSet::new();
        let mut ref_pos = read.alignment_start();
        let mut offset = 0usize;
        let mut aligned_before = false;

        for (index, op) in read.cigar.iter().enumerate() {
            let len = op.len as usize;
            let aligned_after = read.cigar[index + 1..]
                .iter()
                .any(|next| next.kind.is_alignment_match());
            match op.kind {
                kind if kind.is_alignment_match() => {
                    for i in 0..op.len {
                        let pos = ref_pos + i;
                        let off = offset + i as usize;
                        let (Some(base), Some(quality), Some(ref_base)) =
                            (read.base_at(off), read.quality_at(off), window.base_at(pos))
                        else {
                            continue;
                        };
                        if base != ref_base && base != b'N' && ref_base != b'N' && quality >= self.min_base_quality {
                            events.insert(VariantEvent::new(Arc::clone(&contig), pos, vec![ref_base], vec![base]));
                        }
                    }
                    ref_pos += op.len;
                    offset += len;
                    aligned_before = true;
                }
                CigarOpKind::Insertion => {
                    let inserted = read.sequence.get(offset..offset + len);
                    let quality_ok = read
                        .qualities
                        .get(offset..offset + len)
                        .is_some_and(|q| q.iter().all(|&q| q >= self.min_base_quality));
                    if let (true, true, Some(inserted), Some(anchor)) =
                        (aligned_before && aligned_after, quality_ok, inserted, window.base_at(ref_pos - 1))
                    {
                        let mut alternate = vec![anchor];
                        alternate.extend_from_slice(inserted);
                        events.insert(VariantEvent::new(Arc::clone(&contig), ref_pos - 1, vec![anchor], alternate));
                    }
                    offset += len;
                }
                CigarOpKind::Deletion => {
                    if aligned_before && aligned_after {
                        if let Some(reference) = window.slice(ref_pos - 1, ref_pos + op.len - 1) {
                            events.insert(VariantEvent::new(
                                Arc::clone(&contig),
                                ref_pos - 1,
                                reference.to_vec(),
                                vec![reference[0]],
                            ));
                        }
                    }
                    ref_pos += op.len;
                }
                CigarOpKind::Skip => ref_pos += op.len,
                CigarOpKind::SoftClip => offset += len,
                _ => {}
            }
        }
        events
    }
}

impl Assembler for PileupEventAssembler {
    fn assemble(
        &self,
        region: &AssemblyRegion,
        given: &[VariantEvent],
        window: &ReferenceWindow,
    ) -> Result<AssemblyResultSet, AssemblyError> {
        if !window.span().contains(region.padded_span()) {
            return Err(AssemblyError::WindowMismatch {
                region: region.padded_span().to_string(),
                window: window.span().to_string(),
            });
        }

        let mut support: BTreeMap<VariantEvent, usize> = BTreeMap::new();
        let mut per_read = Vec::with_capacity(region.read_count());
        for read in region.reads() {
            let events = self.read_events(&left_align_read(read, window), window);
            for event in &events {
                *support.entry(event.clone()).or_default() += 1;
            }
            per_read.push(events);
        }

        let mut kept: BTreeSet<VariantEvent> = support
            .iter()
            .filter(|(_, &count)| count >= self.min_event_support)
            .map(|(event, _)| event.clone())
            .collect();
        for event in given {
            if event.contig() == window.span().contig()
                && window.slice(event.start(), event.end()) == Some(event.reference())
            {
                kept.insert(event.clone());
            } else {
                debug!(event = %event, "given allele does not match the reference window");
            }
        }

        let mut combinations: BTreeMap<BTreeSet<VariantEvent>, usize> = BTreeMap::new();
        for events in per_read {
            let restricted: BTreeSet<VariantEvent> = events.intersection(&kept).cloned().collect();
            if !restricted.is_empty() {
                *combinations.entry(restricted).or_default() += 1;
            }
        }
        let mut candidates: Vec<(BTreeSet<VariantEvent>, usize)> = combinations.into_iter().collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut singles: Vec<(BTreeSet<VariantEvent>, usize)> = kept
            .iter()
            .map(|event| {
                let count = support.get(event).copied().unwrap_or(0);
                (BTreeSet::from([event.clone()]), count)
            })
            .collect();
        singles.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.extend(singles);

        let mut seen = HashSet::new();
        let mut haplotypes = Vec::new();
        for (events, score) in candidates {
            if haplotypes.len() + 1 >= self.max_haplotypes {
                break;
            }
            if !seen.insert(events.clone()) {
                continue;
            }
            match Haplotype::from_events(window, events) {
                Ok(haplotype) => haplotypes.push(haplotype.with_score(score as f64).left_aligned(window)),
                Err(err) => debug!(error = %err, "skipping candidate haplotype"),
            }
        }

        debug!(
            region = %region.span(),
            reads = region.read_count(),
            events = kept.len(),
            haplotypes = haplotypes.len() + 1,
            "assembled region"
        );
        AssemblyResultSet::new(region.clone(), window.clone(), haplotypes)
    }
}
