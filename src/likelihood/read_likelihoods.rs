use std::sync::Arc;

use crate::genomics::AlignedRead;

/// Gap in log10 likelihood needed to call a read informative for its best allele.
pub const INFORMATIVE_LIKELIHOOD_THRESHOLD: f64 = 0.2;

/// Dense per-sample table of read × allele log10 likelihoods.
///
/// Alleles are haplotypes during likelihood computation and site alleles
/// after marginalization. Sample, read and allele indices are stable for the
/// lifetime of the table.
#[derive(Debug, Clone)]
pub struct ReadLikelihoods<A> {
    samples: Vec<Arc<str>>,
    alleles: Vec<A>,
    reads: Vec<Vec<AlignedRead>>,
    values: Vec<Vec<f64>>,
}

impl<A> ReadLikelihoods<A> {
    /// Zero-filled table; `reads` holds one read list per sample.
    pub fn new(samples: Vec<Arc<str>>, alleles: Vec<A>, reads: Vec<Vec<AlignedRead>>) -> Self {
        debug_assert_eq!(samples.len(), reads.len());
        let values = reads
            .iter()
            .map(|sample_reads| vec![0.0; sample_reads.len() * alleles.len()])
            .collect();
        Self {
            samples,
            alleles,
            reads,
            values,
        }
    }

    /// Sample names.
    pub fn samples(&self) -> &[Arc<str>] {
        &self.samples
    }

    /// Index of `sample`.
    pub fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s.as_ref() == sample)
    }

    /// Alleles (columns).
    pub fn alleles(&self) -> &[A] {
        &self.alleles
    }

    /// Number of alleles.
    pub fn allele_count(&self) -> usize {
        self.alleles.len()
    }

    /// Reads of sample `s`.
    pub fn reads(&self, s: usize) -> &[AlignedRead] {
        &self.reads[s]
    }

    /// Reads across all samples.
    pub fn all_reads(&self) -> impl Iterator<Item = &AlignedRead> {
        self.reads.iter().flatten()
    }

    /// Number of reads of sample `s`.
    pub fn read_count(&self, s: usize) -> usize {
        self.reads[s].len()
    }

    /// Likelihood of read `r` of sample `s` given allele `a`.
    pub fn get(&self, s: usize, r: usize, a: usize) -> f64 {
        self.values[s][r * self.alleles.len() + a]
    }

    /// Set the likelihood of read `r` of sample `s` given allele `a`.
    pub fn set(&mut self, s: usize, r: usize, a: usize, value: f64) {
        let width = self.alleles.len();
        self.values[s][r * width + a] = value;
    }

    /// All allele likelihoods of one read.
    pub fn row(&self, s: usize, r: usize) -> &[f64] {
        let width = self.alleles.len();
        &self.values[s][r * width..(r + 1) * width]
    }

    /// Mutable row of one read.
    pub fn row_mut(&mut self, s: usize, r: usize) -> &mut [f64] {
        let width = self.alleles.len();
        &mut self.values[s][r * width..(r + 1) * width]
    }

    /// Rows of sample `s` in read order.
    pub fn rows(&self, s: usize) -> impl Iterator<Item = &[f64]> {
        self.values[s].chunks(self.alleles.len().max(1))
    }

    /// Best allele of a read and its likelihood (first on ties).
    pub fn best_allele(&self, s: usize, r: usize) -> Option<(usize, f64)> {
        self.row(s, r)
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (a, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((a, value)),
            })
    }

    /// Best allele of a read when it beats every other allele by at least
    /// [`INFORMATIVE_LIKELIHOOD_THRESHOLD`].
    pub fn informative_best_allele(&self, s: usize, r: usize) -> Option<usize> {
        let (best, top) = self.best_allele(s, r)?;
        let runner_up = self
            .row(s, r)
            .iter()
            .enumerate()
            .filter(|&(a, _)| a != best)
            .map(|(_, &value)| value)
            .fold(f64::NEG_INFINITY, f64::max);
        (top - runner_up >= INFORMATIVE_LIKELIHOOD_THRESHOLD).then_some(best)
    }

    /// Swap in a different representation of read `r` of sample `s`.
    pub fn replace_read(&mut self, s: usize, r: usize, read: AlignedRead) {
        self.reads[s][r] = read;
    }

    /// Raise every likelihood to at least `best - max_gap` within its row.
    pub fn cap_likelihoods(&mut self, max_gap: f64) {
        let width = self.alleles.len().max(1);
        for sample_values in &mut self.values {
            for row in sample_values.chunks_mut(width) {
                let best = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if best.is_finite() {
                    for value in row.iter_mut() {
                        *value = value.max(best - max_gap);
                    }
                }
            }
        }
    }

    /// Collapse the alleles onto `new_alleles`.
    ///
    /// `mapping[b]` lists the old alleles behind new allele `b`; each new
    /// likelihood is the maximum over them. Only reads passing `keep` are
    /// carried over.
    pub fn marginalize<B, F>(&self, new_alleles: Vec<B>, mapping: &[Vec<usize>], keep: F) -> ReadLikelihoods<B>
    where
        F: Fn(&AlignedRead) -> bool,
    {
        debug_assert_eq!(new_alleles.len(), mapping.len());
        let mut reads = Vec::with_capacity(self.samples.len());
        let mut values = Vec::with_capacity(self.samples.len());
        for s in 0..self.samples.len() {
            let mut sample_reads = Vec::new();
            let mut sample_values = Vec::new();
            for (r, read) in self.reads[s].iter().enumerate() {
                if !keep(read) {
                    continue;
                }
                let row = self.row(s, r);
                sample_values.extend(mapping.iter().map(|old| {
                    old.iter()
                        .map(|&a| row[a])
                        .fold(f64::NEG_INFINITY, f64::max)
                }));
                sample_reads.push(read.clone());
            }
            reads.push(sample_reads);
            values.push(sample_values);
        }
        ReadLikelihoods {
            samples: self.samples.clone(),
            alleles: new_alleles,
            reads,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::parse_cigar;

    fn read(pos: u32) -> AlignedRead {
        AlignedRead::new("chr1", pos, 60, parse_cigar("5M").unwrap(), vec![b'A'; 5], vec![30; 5], false)
    }

    fn table() -> ReadLikelihoods<&'static str> {
        let mut t = ReadLikelihoods::new(
            vec![Arc::from("s1")],
            vec!["ref", "alt1", "alt2"],
            vec![vec![read(0), read(100)]],
        );
        for (a, v) in [-1.0, -3.0, -25.0].into_iter().enumerate() {
            t.set(0, 0, a, v);
        }
        for (a, v) in [-4.0, -4.1, -2.0].into_iter().enumerate() {
            t.set(0, 1, a, v);
        }
        t
    }

    #[test]
    fn best_and_informative_alleles() {
        let t = table();
        assert_eq!(t.best_allele(0, 0), Some((0, -1.0)));
        assert_eq!(t.informative_best_allele(0, 1), Some(2));
        let mut close = t.clone();
        close.set(0, 1, 0, -2.1);
        assert_eq!(close.informative_best_allele(0, 1), None);
    }

    #[test]
    fn capping_bounds_the_gap() {
        let mut t = table();
        t.cap_likelihoods(10.0);
        assert_eq!(t.get(0, 0, 2), -11.0);
        assert_eq!(t.get(0, 1, 0), -4.0);
    }

    #[test]
    fn marginalization_takes_the_max_and_filters_reads() {
        let t = table();
        let m = t.marginalize(vec!['R', 'A'], &[vec![0], vec![1, 2]], |r| r.pos < 50);
        assert_eq!(m.read_count(0), 1);
        assert_eq!(m.row(0, 0), &[-1.0, -3.0]);
        assert_eq!(m.alleles(), &['R', 'A']);
    }
}
