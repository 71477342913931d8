use hapcall::alignment::left_align_indel;
use hapcall::genomics::{format_cigar, parse_cigar};
use proptest::prelude::*;

fn bases(range: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T')], range)
}

/// Reference with a fixed distinct prefix so no run reaches the alignment start.
fn with_prefix(tail: Vec<u8>) -> Vec<u8> {
    let mut reference = b"ACGT".to_vec();
    reference.extend(tail);
    reference
}

fn run_start(reference: &[u8], mut index: usize) -> usize {
    let base = reference[index];
    while index > 0 && reference[index - 1] == base {
        index -= 1;
    }
    index
}

fn insertion_cigar(before: usize, after: usize) -> String {
    if after == 0 {
        format!("{before}M1I")
    } else {
        format!("{before}M1I{after}M")
    }
}

proptest! {
    #[test]
    fn deletion_moves_to_start_of_its_run(tail in bases(8..64), offset in 0usize..1000) {
        let reference = with_prefix(tail);
        let n = reference.len();
        let k = 4 + offset % (n - 5);
        let mut read = reference[..k].to_vec();
        read.extend_from_slice(&reference[k + 1..]);
        let cigar = parse_cigar(&format!("{k}M1D{}M", n - k - 1)).unwrap();

        let aligned = left_align_indel(&cigar, &reference, &read, 0, 0);

        let expected = run_start(&reference, k);
        prop_assert_eq!(format_cigar(&aligned), format!("{expected}M1D{}M", n - expected - 1));
        prop_assert_eq!(left_align_indel(&aligned, &reference, &read, 0, 0), aligned);
    }

    #[test]
    fn insertion_moves_to_start_of_matching_run(
        tail in bases(8..64),
        offset in 0usize..1000,
        inserted in prop_oneof![Just(b'G'), Just(b'T')],
    ) {
        let reference = with_prefix(tail);
        let n = reference.len();
        // `k == n` places the insertion after the last aligned base.
        let k = 4 + offset % (n - 3);
        let mut read = reference[..k].to_vec();
        read.push(inserted);
        read.extend_from_slice(&reference[k..]);
        let cigar = parse_cigar(&insertion_cigar(k, n - k)).unwrap();

        let aligned = left_align_indel(&cigar, &reference, &read, 0, 0);

        let expected = if reference[k - 1] == inserted { run_start(&reference, k - 1) } else { k };
        prop_assert_eq!(format_cigar(&aligned), insertion_cigar(expected, n - expected));
    }

    #[test]
    fn alignment_without_indel_is_untouched(reference in bases(4..64)) {
        let cigar = parse_cigar(&format!("{}M", reference.len())).unwrap();
        let aligned = left_align_indel(&cigar, &reference, &reference, 0, 0);
        prop_assert_eq!(aligned, cigar);
    }
}
