//! Genotype enumeration in VCF order and per-genotype log10 likelihoods from
//! per-read allele likelihoods.

use super::math::{log10_factorial, log10_sum_log10};

/// All genotypes of `ploidy` alleles drawn from `allele_count` alleles, in VCF order.
///
/// A genotype is a non-decreasing allele-index sequence; VCF order compares
/// the last allele first (`0/0, 0/1, 1/1, 0/2, 1/2, 2/2` for diploids).
pub fn enumerate_genotypes(ploidy: usize, allele_count: usize) -> Vec<Vec<usize>> {
    fn extend(
        prefix: &mut Vec<usize>,
        from: usize,
        ploidy: usize,
        allele_count: usize,
        out: &mut Vec<Vec<usize>>,
    ) {
        if prefix.len() == ploidy {
            out.push(prefix.clone());
            return;
        }
        for allele in from..allele_count {
            prefix.push(allele);
            extend(prefix, allele, ploidy, allele_count, out);
            prefix.pop();
        }
    }

    let mut genotypes = Vec::new();
    if allele_count == 0 {
        return genotypes;
    }
    extend(&mut Vec::with_capacity(ploidy), 0, ploidy, allele_count, &mut genotypes);
    genotypes.sort_by(|a, b| a.iter().rev().cmp(b.iter().rev()));
    genotypes
}

/// Computes per-genotype log10 likelihoods from per-read allele likelihoods.
#[derive(Debug, Clone)]
pub struct GenotypeLikelihoodCalculator {
    ploidy: usize,
    allele_count: usize,
    genotypes: Vec<Vec<usize>>,
    /// Per genotype, the distinct alleles with their copy numbers.
    allele_copies: Vec<Vec<(usize, usize)>>,
}

impl GenotypeLikelihoodCalculator {
    /// Calculator for `ploidy` and `allele_count` alleles (reference first).
    pub fn new(ploidy: usize, allele_count: usize) -> Self {
        let genotypes = enumerate_genotypes(ploidy, allele_count);
        let allele_copies = genotypes.iter().map(|g| allele_copies(g)).collect();
        Self {
            ploidy,
            allele_count,
            genotypes,
            allele_copies,
        }
    }

    /// Ploidy.
    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    /// Number of alleles.
    pub fn allele_count(&self) -> usize {
        self.allele_count
    }

    /// Genotypes in VCF order.
    pub fn genotypes(&self) -> &[Vec<usize>] {
        &self.genotypes
    }

    /// Number of genotypes.
    pub fn genotype_count(&self) -> usize {
        self.genotypes.len()
    }

    /// Distinct alleles and copy numbers of genotype `index`.
    pub fn allele_copies(&self, index: usize) -> &[(usize, usize)] {
        &self.allele_copies[index]
    }

    /// Log10 multinomial prior of each genotype given log10 allele frequencies.
    pub fn log10_genotype_priors(&self, log10_frequencies: &[f64]) -> Vec<f64> {
        let numerator = log10_factorial(self.ploidy);
        self.allele_copies
            .iter()
            .map(|copies| {
                copies.iter().fold(numerator, |acc, &(allele, count)| {
                    acc - log10_factorial(count) + count as f64 * log10_frequencies[allele]
                })
            })
            .collect()
    }

    /// Genotype log10 likelihoods from read rows of per-allele log10 likelihoods.
    ///
    /// Each read contributes `log10(sum_a count_a * 10^l(read, a) / ploidy)`.
    pub fn genotype_likelihoods<'a, I>(&self, reads: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let log10_ploidy = (self.ploidy as f64).log10();
        let mut likelihoods = vec![0.0; self.genotypes.len()];
        let mut terms = Vec::with_capacity(self.ploidy);
        for row in reads {
            for (gl, copies) in likelihoods.iter_mut().zip(&self.allele_copies) {
                terms.clear();
                terms.extend(
                    copies
                        .iter()
                        .map(|&(allele, count)| row[allele] + (count as f64).log10()),
                );
                *gl += log10_sum_log10(&terms) - log10_ploidy;
            }
        }
        likelihoods
    }
}

fn allele_copies(genotype: &[usize]) -> Vec<(usize, usize)> {
    let mut copies: Vec<(usize, usize)> = Vec::new();
    for &allele in genotype {
        match copies.last_mut() {
            Some((last, count)) if *last == allele => *count += 1,
            _ => copies.push((allele, 1)),
        }
    }
    copies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vcf_genotype_order() {
        let genotypes = enumerate_genotypes(2, 3);
        assert_eq!(
            genotypes,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![1, 1],
                vec![0, 2],
                vec![1, 2],
                vec![2, 2]
            ]
        );
        assert_eq!(enumerate_genotypes(3, 2).len(), 4);
        assert_eq!(enumerate_genotypes(1, 3), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn heterozygous_reads_favour_het() {
        let calc = GenotypeLikelihoodCalculator::new(2, 2);
        let ref_read = [0.0, -3.0];
        let alt_read = [-3.0, 0.0];
        let rows: Vec<&[f64]> = vec![&ref_read, &alt_read, &ref_read, &alt_read];
        let gls = calc.genotype_likelihoods(rows);
        assert!(gls[1] > gls[0] && gls[1] > gls[2]);
        assert!((gls[1] - 4.0 * (0.5f64 * (1.0 + 1e-3)).log10()).abs() < 1e-9);
    }

    #[test]
    fn priors_are_multinomial() {
        let calc = GenotypeLikelihoodCalculator::new(2, 2);
        let freqs = [0.5f64.log10(), 0.5f64.log10()];
        let priors = calc.log10_genotype_priors(&freqs);
        let linear: Vec<f64> = priors.iter().map(|p| 10f64.powf(*p)).collect();
        assert!((linear[0] - 0.25).abs() < 1e-12);
        assert!((linear[1] - 0.5).abs() < 1e-12);
        assert!((linear[2] - 0.25).abs() < 1e-12);
    }
}
