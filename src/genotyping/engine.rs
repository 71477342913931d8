use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::af_calculator::AlleleFrequencyCalculator;
use super::annotations::{self, AnnotationSelection};
use super::genotype_likelihoods::GenotypeLikelihoodCalculator;
use super::math::{argmax, genotype_quality_from_pls, phred_scaled_likelihoods};
use super::GenotypingError;
use crate::assembly::{AssemblyResultSet, Haplotype};
use crate::config::CallerConfig;
use crate::genomics::{Annotations, Genotype, ReferenceWindow, VariantCall, VariantEvent};
use crate::likelihood::ReadLikelihoods;

/// Calls made in one region and the haplotypes behind them.
#[derive(Debug, Clone, Default)]
pub struct CalledHaplotypes {
    /// Emitted calls in position order.
    pub calls: Vec<VariantCall>,
    /// Haplotypes carrying an allele of some called genotype.
    pub called_haplotypes: Vec<Arc<Haplotype>>,
}

/// Alleles of one site, reference first, with the haplotypes behind each.
#[derive(Debug)]
struct SiteAlleles {
    start: u32,
    alleles: Vec<Arc<[u8]>>,
    haplotypes: Vec<Vec<usize>>,
}

/// Turns haplotype likelihoods into per-site genotype calls.
#[derive(Debug, Clone)]
pub struct GenotypingEngine {
    ploidy: usize,
    calling_confidence: f64,
    af_calculator: AlleleFrequencyCalculator,
    annotations: AnnotationSelection,
    given_alleles_mode: bool,
    emit_all_sites: bool,
}

impl GenotypingEngine {
    /// Engine for a validated configuration.
    pub fn new(config: &CallerConfig) -> Self {
        Self {
            ploidy: config.ploidy,
            calling_confidence: config.calling_confidence,
            af_calculator: AlleleFrequencyCalculator::from_heterozygosity(
                config.heterozygosity,
                config.indel_heterozygosity,
                config.ploidy,
            ),
            annotations: AnnotationSelection::for_config(config),
            given_alleles_mode: config.is_given_alleles(),
            emit_all_sites: config.emits_reference_confidence(),
        }
    }

    /// Annotations this engine attaches.
    pub fn annotation_selection(&self) -> &AnnotationSelection {
        &self.annotations
    }

    /// Genotype every event start inside the region span.
    ///
    /// In given-alleles mode only the starts and alleles of `given` are
    /// considered. A site is emitted when its QUAL reaches the calling
    /// confidence and, outside reference-confidence output, some alternate
    /// allele has a positive maximum-likelihood count.
    pub fn assign_genotype_likelihoods(
        &self,
        assembly: &AssemblyResultSet,
        likelihoods: &ReadLikelihoods<Arc<Haplotype>>,
        given: &[VariantEvent],
    ) -> Result<CalledHaplotypes, GenotypingError> {
        let span = assembly.region().span();
        let haplotypes = likelihoods.alleles();
        let candidates: Vec<&VariantEvent> = if self.given_alleles_mode {
            given.iter().filter(|e| span.contains_position(e.start())).collect()
        } else {
            assembly
                .variation_events()
                .iter()
                .filter(|e| span.contains_position(e.start()))
                .collect()
        };
        let starts: BTreeSet<u32> = candidates.iter().map(|e| e.start()).collect();

        let mut result = CalledHaplotypes::default();
        let mut called: BTreeSet<usize> = BTreeSet::new();
        for start in starts {
            let events: Vec<&VariantEvent> = candidates.iter().copied().filter(|e| e.start() == start).collect();
            let Some(site) = site_alleles(start, &events, haplotypes, assembly.window())? else {
                continue;
            };
            if let Some((call, haps)) = self.genotype_site(&site, assembly, likelihoods)? {
                called.extend(haps);
                result.calls.push(call);
            }
        }
        result.called_haplotypes = called.into_iter().map(|h| Arc::clone(&haplotypes[h])).collect();
        debug!(
            region = %span,
            calls = result.calls.len(),
            called_haplotypes = result.called_haplotypes.len(),
            "genotyped region"
        );
        Ok(result)
    }

    fn genotype_site(
        &self,
        site: &SiteAlleles,
        assembly: &AssemblyResultSet,
        likelihoods: &ReadLikelihoods<Arc<Haplotype>>,
    ) -> Result<Option<(VariantCall, Vec<usize>)>, GenotypingError> {
        let reference = &site.alleles[0];
        let end = site.start + reference.len() as u32 - 1;
        let marginal = likelihoods.marginalize(site.alleles.clone(), &site.haplotypes, |read| {
            read.overlaps(site.start, end)
        });

        let calc = GenotypeLikelihoodCalculator::new(self.ploidy, site.alleles.len());
        let sample_gls: Vec<Vec<f64>> = (0..marginal.samples().len())
            .map(|s| calc.genotype_likelihoods(marginal.rows(s)))
            .collect();
        if let Some(bad) = sample_gls.iter().flatten().find(|gl| !gl.is_finite()) {
            return Err(GenotypingError::NonFinite { position: site.start, value: *bad });
        }
        let allele_bases: Vec<&[u8]> = site.alleles.iter().map(|a| a.as_ref()).collect();
        let af = self.af_calculator.calculate(&sample_gls, &allele_bases);
        let quality = af.qual();
        let has_alt = af.mle_allele_counts.iter().any(|&count| count > 0);
        if quality < self.calling_confidence || !(self.emit_all_sites || has_alt) {
            debug!(position = site.start, quality, "site below calling threshold");
            return Ok(None);
        }

        let mut genotypes = Vec::with_capacity(marginal.samples().len());
        let mut strand_tables = Vec::new();
        let mut called_alleles: BTreeSet<usize> = BTreeSet::new();
        for (s, gls) in sample_gls.iter().enumerate() {
            let depth = marginal.read_count(s) as u32;
            let strand_bias = (self.annotations.strand_bias_by_sample || self.annotations.fisher_strand)
                .then(|| annotations::strand_table(&marginal, s));
            if let Some(table) = strand_bias {
                strand_tables.push(table);
            }
            let sample = Arc::clone(&marginal.samples()[s]);
            if depth == 0 {
                genotypes.push(Genotype {
                    sample,
                    alleles: Vec::new(),
                    gq: None,
                    pl: Vec::new(),
                    depth,
                    allele_depths: vec![0; site.alleles.len()],
                    strand_bias: strand_bias.filter(|_| self.annotations.strand_bias_by_sample),
                });
                continue;
            }
            let pl = phred_scaled_likelihoods(gls);
            let best = argmax(gls).unwrap_or(0);
            let alleles = calc.genotypes()[best].clone();
            called_alleles.extend(alleles.iter().copied());
            genotypes.push(Genotype {
                sample,
                alleles,
                gq: Some(genotype_quality_from_pls(&pl)),
                pl,
                depth,
                allele_depths: annotations::allele_depths(&marginal, s),
                strand_bias: strand_bias.filter(|_| self.annotations.strand_bias_by_sample),
            });
        }

        let depth: u32 = genotypes.iter().map(|g| g.depth).sum();
        let selection = &self.annotations;
        let call = VariantCall {
            contig: Arc::clone(assembly.window().span().contig_arc()),
            start: site.start,
            end,
            reference: Arc::clone(reference),
            alternates: site.alleles[1..].to_vec(),
            quality,
            genotypes,
            annotations: Annotations {
                depth,
                rms_mapping_quality: if selection.rms_mapping_quality {
                    annotations::rms_mapping_quality(marginal.all_reads())
                } else {
                    0.0
                },
                quality_by_depth: if selection.quality_by_depth {
                    annotations::quality_by_depth(quality, depth)
                } else {
                    None
                },
                fisher_strand: selection
                    .fisher_strand
                    .then(|| annotations::fisher_strand(&strand_tables)),
                mle_allele_counts: selection.mle_allele_count.then(|| af.mle_allele_counts.clone()),
            },
        };

        let haplotypes = called_alleles
            .into_iter()
            .flat_map(|allele| site.haplotypes[allele].iter().copied())
            .collect();
        Ok(Some((call, haplotypes)))
    }
}

/// Merge the events starting at `start` into one allele list.
///
/// Alleles are padded with reference bases to the longest reference allele.
/// Each haplotype maps to the allele of its event at `start`, to the
/// reference when it has none, and to nothing when an earlier event of it
/// covers `start`. Alternates no haplotype carries are dropped; `None` when
/// no alternate is left.
fn site_alleles(
    start: u32,
    events: &[&VariantEvent],
    haplotypes: &[Arc<Haplotype>],
    window: &ReferenceWindow,
) -> Result<Option<SiteAlleles>, GenotypingError> {
    let longest = events.iter().map(|e| e.reference().len()).max().unwrap_or(1).max(1);
    let end = start + longest as u32 - 1;
    let reference: Arc<[u8]> = window
        .slice(start, end)
        .ok_or(GenotypingError::OutsideWindow { start, end })?
        .into();

    let pad = |event: &VariantEvent| -> Arc<[u8]> {
        let mut alt = event.alternate().to_vec();
        alt.extend_from_slice(&reference[event.reference().len().min(reference.len())..]);
        alt.into()
    };
    let mut alleles: Vec<Arc<[u8]>> = vec![Arc::clone(&reference)];
    for event in events {
        let alt = pad(event);
        if alt != reference && !alleles.contains(&alt) {
            alleles.push(alt);
        }
    }

    let mut mapping: Vec<Vec<usize>> = vec![Vec::new(); alleles.len()];
    for (h, haplotype) in haplotypes.iter().enumerate() {
        match haplotype.event_starting_at(start) {
            Some(event) if events.contains(&event) => {
                let alt = pad(event);
                if let Some(a) = alleles.iter().position(|allele| *allele == alt) {
                    mapping[a].push(h);
                }
            }
            Some(_) => {}
            None if haplotype.spans_position(start) => {}
            None => mapping[0].push(h),
        }
    }
    if mapping[0].is_empty() {
        return Err(GenotypingError::AlleleMapping(format!(
            "no haplotype supports the reference allele at {start}"
        )));
    }

    let (alleles, haplotypes): (Vec<_>, Vec<_>) = alleles
        .into_iter()
        .zip(mapping)
        .enumerate()
        .filter(|(a, (_, haps))| *a == 0 || !haps.is_empty())
        .map(|(_, pair)| pair)
        .unzip();
    if alleles.len() < 2 {
        return Ok(None);
    }
    Ok(Some(SiteAlleles {
        start,
        alleles,
        haplotypes,
    }))
}
