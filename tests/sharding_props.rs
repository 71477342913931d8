use hapcall::genomics::SequenceDictionary;
use hapcall::{divide_interval_into_shards, divide_interval_into_stepped_shards, CallerError, GenomeInterval};
use proptest::prelude::*;

proptest! {
    #[test]
    fn shards_tile_the_interval(
        contig_length in 1u32..20_000,
        start_fraction in 0.0f64..1.0,
        end_fraction in 0.0f64..1.0,
        shard_size in 1i64..3_000,
        shard_padding in 0i64..500,
    ) {
        let dictionary = SequenceDictionary::new().with_contig("chr1", contig_length);
        let a = 1 + ((contig_length - 1) as f64 * start_fraction) as u32;
        let b = 1 + ((contig_length - 1) as f64 * end_fraction) as u32;
        let interval = GenomeInterval::new("chr1", a.min(b), a.max(b)).unwrap();

        let shards = divide_interval_into_shards(&interval, shard_size, shard_padding, &dictionary).unwrap();

        prop_assert_eq!(shards.first().unwrap().interval().start(), interval.start());
        prop_assert_eq!(shards.last().unwrap().interval().end(), interval.end());
        for pair in shards.windows(2) {
            prop_assert_eq!(pair[0].interval().end() + 1, pair[1].interval().start());
        }
        for shard in &shards {
            let core = shard.interval();
            let padded = shard.padded_interval();
            prop_assert!(i64::from(core.len()) <= shard_size);
            prop_assert!(padded.contains(core));
            prop_assert_eq!(padded, &core.expand_within(shard_padding as u32, contig_length));
        }
    }

    #[test]
    fn stepped_shards_start_a_step_apart(
        contig_length in 100u32..5_000,
        shard_size in 1i64..400,
        shard_step in 1i64..400,
    ) {
        let dictionary = SequenceDictionary::new().with_contig("chr1", contig_length);
        let interval = GenomeInterval::new("chr1", 1, contig_length).unwrap();

        let shards = divide_interval_into_stepped_shards(&interval, shard_size, shard_step, 0, &dictionary).unwrap();

        let expected = (i64::from(contig_length) + shard_step - 1) / shard_step;
        prop_assert_eq!(shards.len() as i64, expected);
        for (i, shard) in shards.iter().enumerate() {
            prop_assert_eq!(i64::from(shard.interval().start()), 1 + i as i64 * shard_step);
            prop_assert!(shard.interval().end() <= contig_length);
        }
    }
}

#[test]
fn rejects_bad_arguments() {
    let dictionary = SequenceDictionary::new().with_contig("chr1", 100);
    let interval = GenomeInterval::new("chr1", 1, 100).unwrap();
    assert!(matches!(
        divide_interval_into_shards(&interval, 0, 10, &dictionary),
        Err(CallerError::InvalidArgument(_))
    ));
    assert!(matches!(
        divide_interval_into_shards(&interval, 10, -1, &dictionary),
        Err(CallerError::InvalidArgument(_))
    ));
    let outside = GenomeInterval::new("chr1", 90, 120).unwrap();
    assert!(divide_interval_into_shards(&outside, 10, 0, &dictionary).is_err());
    let unknown = GenomeInterval::new("chr9", 1, 10).unwrap();
    assert!(divide_interval_into_shards(&unknown, 10, 0, &dictionary).is_err());
}
