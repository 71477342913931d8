//! Two-sided Fisher exact test on 2x2 contingency tables.

/// Probabilities within this relative distance of the observed table's count as "as extreme".
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// A 2x2 table `[[a, b], [c, d]]` of allele (rows) by strand (columns) counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContingencyTable {
    /// Row 1, column 1.
    pub a: u32,
    /// Row 1, column 2.
    pub b: u32,
    /// Row 2, column 1.
    pub c: u32,
    /// Row 2, column 2.
    pub d: u32,
}

impl ContingencyTable {
    /// Build from the four cells in row-major order.
    pub fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
        Self { a, b, c, d }
    }

    /// Total count.
    pub fn total(&self) -> usize {
        self.a as usize + self.b as usize + self.c as usize + self.d as usize
    }

    fn transposed(self) -> Self {
        Self::new(self.a, self.c, self.b, self.d)
    }

    fn rows_swapped(self) -> Self {
        Self::new(self.c, self.d, self.a, self.b)
    }

    /// Equivalent table whose first row carries the smallest margin.
    ///
    /// Transposition and row exchange preserve the hypergeometric distribution
    /// of the table, so the p-value is unchanged while the enumeration shrinks
    /// to `smallest margin + 1` tables.
    fn canonical(self) -> Self {
        let rows = (self.a + self.b, self.c + self.d);
        let cols = (self.a + self.c, self.b + self.d);
        let table = if cols.0.min(cols.1) < rows.0.min(rows.1) {
            self.transposed()
        } else {
            self
        };
        if table.c + table.d < table.a + table.b {
            table.rows_swapped()
        } else {
            table
        }
    }
}

/// Two-sided p-value of Fisher's exact test.
///
/// Sums the probabilities of all tables with the observed margins whose
/// probability does not exceed the observed table's. An empty table yields 1.0.
pub fn fisher_exact_two_sided(table: ContingencyTable) -> f64 {
    let n = table.total();
    if n == 0 {
        return 1.0;
    }
    let log_factorials = log_factorial_table(n);
    let t = table.canonical();

    let r1 = (t.a + t.b) as usize;
    let r2 = (t.c + t.d) as usize;
    let c1 = (t.a + t.c) as usize;
    let c2 = (t.b + t.d) as usize;
    let margins = log_factorials[r1] + log_factorials[r2] + log_factorials[c1]
        + log_factorials[c2]
        - log_factorials[n];
    let log_p = |x: usize| {
        margins
            - log_factorials[x]
            - log_factorials[r1 - x]
            - log_factorials[c1 - x]
            - log_factorials[r2 + x - c1]
    };

    let observed = log_p(t.a as usize);
    let threshold = observed + (1.0 + RELATIVE_TOLERANCE).ln();
    let lo = r1.saturating_sub(c2);
    let hi = r1.min(c1);
    let p: f64 = (lo..=hi)
        .map(log_p)
        .filter(|&lp| lp <= threshold)
        .map(f64::exp)
        .sum();
    p.clamp(0.0, 1.0)
}

/// Natural-log factorials `ln(0!) ..= ln(n!)`.
fn log_factorial_table(n: usize) -> Vec<f64> {
    let mut table = Vec::with_capacity(n + 1);
    table.push(0.0);
    let mut acc = 0.0;
    for i in 1..=n {
        acc += (i as f64).ln();
        table.push(acc);
    }
    table
}

/// Phred-scaled Fisher strand score: `-10 log10(p)`, never negative zero.
pub fn phred_scaled_fisher_strand(table: ContingencyTable) -> f64 {
    let p = fisher_exact_two_sided(table).max(f64::MIN_POSITIVE);
    let phred = -10.0 * p.log10();
    if phred <= 0.0 {
        0.0
    } else {
        phred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_has_smallest_margin_first() {
        let t = ContingencyTable::new(9, 8, 1, 0).canonical();
        assert_eq!(t.a + t.b, 1);
    }

    #[test]
    fn known_value() {
        let p = fisher_exact_two_sided(ContingencyTable::new(5, 1, 1, 5));
        assert!((p - 74.0 / 924.0).abs() < 1e-9, "p = {p}");
    }

    #[test]
    fn empty_table() {
        assert_eq!(fisher_exact_two_sided(ContingencyTable::default()), 1.0);
        assert_eq!(phred_scaled_fisher_strand(ContingencyTable::default()), 0.0);
    }

    #[test]
    fn single_row_table_is_uninformative() {
        let p = fisher_exact_two_sided(ContingencyTable::new(7, 3, 0, 0));
        assert!((p - 1.0).abs() < 1e-12);
    }
}
