use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use super::{LikelihoodError, PairHmm, ReadLikelihoodCalculator, ReadLikelihoods};
use crate::alignment::realign_read_to_haplotype;
use crate::assembly::Haplotype;
use crate::config::CallerConfig;
use crate::genomics::{AlignedRead, ReferenceWindow};

/// Scores reads against haplotypes and realigns them to their best haplotype.
#[derive(Debug, Clone)]
pub struct LikelihoodEngine<C = PairHmm> {
    calculator: C,
    min_read_length: usize,
    min_mapping_quality: u8,
    max_likelihood_gap: f64,
}

impl LikelihoodEngine<PairHmm> {
    /// Engine with the default pair-HMM.
    pub fn new(config: &CallerConfig) -> Self {
        let hmm = PairHmm::new(
            super::DEFAULT_GAP_OPEN,
            super::DEFAULT_GAP_CONTINUATION,
            config.min_base_quality,
        );
        Self::with_calculator(config, hmm)
    }
}

impl<C: ReadLikelihoodCalculator> LikelihoodEngine<C> {
    /// Engine around an arbitrary likelihood model.
    pub fn with_calculator(config: &CallerConfig, calculator: C) -> Self {
        Self {
            calculator,
            min_read_length: config.min_read_length,
            min_mapping_quality: config.min_mapping_quality,
            max_likelihood_gap: config.max_likelihood_gap,
        }
    }

    /// Whether a read is long enough and mapped confidently enough to score.
    pub fn passes_read_filters(&self, read: &AlignedRead) -> bool {
        read.len() >= self.min_read_length && read.mapq >= self.min_mapping_quality
    }

    /// Likelihood table of `reads` (grouped by `samples`) against `haplotypes`.
    ///
    /// Reads of samples not listed are ignored. Reads are scored in parallel
    /// and each row is capped at `best - max_likelihood_gap`.
    pub fn compute_read_likelihoods(
        &self,
        samples: &[Arc<str>],
        reads: &[AlignedRead],
        haplotypes: &[Arc<Haplotype>],
    ) -> Result<ReadLikelihoods<Arc<Haplotype>>, LikelihoodError> {
        if haplotypes.is_empty() {
            return Err(LikelihoodError::NoHaplotypes);
        }
        let by_sample: Vec<Vec<AlignedRead>> = samples
            .iter()
            .map(|sample| {
                reads
                    .iter()
                    .filter(|read| read.sample == *sample && self.passes_read_filters(read))
                    .cloned()
                    .collect()
            })
            .collect();

        let mut table = ReadLikelihoods::new(samples.to_vec(), haplotypes.to_vec(), by_sample);
        for s in 0..samples.len() {
            let rows: Vec<Vec<f64>> = table
                .reads(s)
                .par_iter()
                .map(|read| {
                    haplotypes
                        .iter()
                        .map(|haplotype| self.calculator.log10_likelihood(read, haplotype))
                        .collect()
                })
                .collect();
            for (r, row) in rows.into_iter().enumerate() {
                if let Some(bad) = row.iter().find(|value| !value.is_finite()) {
                    return Err(LikelihoodError::NonFinite {
                        read: table.reads(s)[r].name.to_string(),
                        value: *bad,
                    });
                }
                table.row_mut(s, r).copy_from_slice(&row);
            }
        }
        table.cap_likelihoods(self.max_likelihood_gap);

        debug!(
            samples = samples.len(),
            reads = table.all_reads().count(),
            haplotypes = haplotypes.len(),
            "computed read likelihoods"
        );
        Ok(table)
    }

    /// Replace every read with its realignment to its most likely haplotype.
    ///
    /// Reads that cannot be realigned keep their original alignment.
    pub fn realign_reads_to_best_haplotype(
        &self,
        likelihoods: &mut ReadLikelihoods<Arc<Haplotype>>,
        window: &ReferenceWindow,
    ) {
        for s in 0..likelihoods.samples().len() {
            let realigned: Vec<Option<AlignedRead>> = (0..likelihoods.read_count(s))
                .into_par_iter()
                .map(|r| {
                    let (best, _) = likelihoods.best_allele(s, r)?;
                    realign_read_to_haplotype(&likelihoods.reads(s)[r], &likelihoods.alleles()[best], window)
                })
                .collect();
            for (r, read) in realigned.into_iter().enumerate() {
                if let Some(read) = read {
                    likelihoods.replace_read(s, r, read);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{format_cigar, parse_cigar, GenomeInterval, VariantEvent};

    const REFERENCE: &[u8] = b"CTGACCTAGGCATTACGGATCCAAGTCAGT";

    fn window() -> ReferenceWindow {
        ReferenceWindow::new(GenomeInterval::new("chr1", 1, 30).unwrap(), REFERENCE).unwrap()
    }

    fn haplotypes() -> Vec<Arc<Haplotype>> {
        let alt = Haplotype::from_events(&window(), vec![VariantEvent::new("chr1", 15, &b"A"[..], &b"G"[..])]).unwrap();
        vec![Arc::new(Haplotype::reference(&window())), Arc::new(alt)]
    }

    fn read(seq: &[u8], mapq: u8) -> AlignedRead {
        AlignedRead::new("chr1", 5, mapq, parse_cigar("20M").unwrap(), seq.to_vec(), vec![30; seq.len()], false)
    }

    #[test]
    fn reads_prefer_their_haplotype() {
        let engine = LikelihoodEngine::new(&CallerConfig::default());
        let reference_read = read(&REFERENCE[5..25], 60);
        let mut alt_seq = REFERENCE[5..25].to_vec();
        alt_seq[9] = b'G';
        let alt_read = read(&alt_seq, 60);
        let samples = vec![Arc::from(crate::genomics::DEFAULT_SAMPLE)];
        let table = engine
            .compute_read_likelihoods(&samples, &[reference_read, alt_read], &haplotypes())
            .unwrap();
        assert_eq!(table.read_count(0), 2);
        assert_eq!(table.best_allele(0, 0).unwrap().0, 0);
        assert_eq!(table.best_allele(0, 1).unwrap().0, 1);
    }

    #[test]
    fn filtered_reads_are_excluded() {
        let engine = LikelihoodEngine::new(&CallerConfig::default());
        let samples = vec![Arc::from(crate::genomics::DEFAULT_SAMPLE)];
        let low_mapq = read(&REFERENCE[5..25], 5);
        let short = read(&REFERENCE[5..10], 60);
        let table = engine
            .compute_read_likelihoods(&samples, &[low_mapq, short], &haplotypes())
            .unwrap();
        assert_eq!(table.read_count(0), 0);
        assert!(matches!(
            engine.compute_read_likelihoods(&samples, &[], &[]),
            Err(LikelihoodError::NoHaplotypes)
        ));
    }

    #[test]
    fn realignment_keeps_reference_reads_in_place() {
        let engine = LikelihoodEngine::new(&CallerConfig::default());
        let samples = vec![Arc::from(crate::genomics::DEFAULT_SAMPLE)];
        let mut table = engine
            .compute_read_likelihoods(&samples, &[read(&REFERENCE[5..25], 60)], &haplotypes())
            .unwrap();
        engine.realign_reads_to_best_haplotype(&mut table, &window());
        assert_eq!(table.reads(0)[0].pos, 5);
        assert_eq!(format_cigar(&table.reads(0)[0].cigar), "20M");
    }
}
