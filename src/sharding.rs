//! Partitioning of genomic intervals into padded, fixed-size shards.

use crate::genomics::{GenomeInterval, SequenceDictionary};
use crate::CallerError;

/// One unit of work: an interval plus the context read around it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ShardBoundary {
    interval: GenomeInterval,
    padded_interval: GenomeInterval,
}

impl ShardBoundary {
    /// Interval the shard is responsible for.
    pub fn interval(&self) -> &GenomeInterval {
        &self.interval
    }

    /// Interval plus padding, clipped to the contig.
    pub fn padded_interval(&self) -> &GenomeInterval {
        &self.padded_interval
    }
}

/// Split `interval` into shards of `shard_size` bases whose starts are `shard_step` apart.
///
/// Each shard's padded interval extends `shard_padding` bases on both sides,
/// clipped to `[1, contig length]`. Fails with [`CallerError::InvalidArgument`]
/// for a non-positive size or step, negative padding, or an interval outside
/// the dictionary.
pub fn divide_interval_into_stepped_shards(
    interval: &GenomeInterval,
    shard_size: i64,
    shard_step: i64,
    shard_padding: i64,
    dictionary: &SequenceDictionary,
) -> Result<Vec<ShardBoundary>, CallerError> {
    if shard_size < 1 {
        return Err(CallerError::InvalidArgument(format!(
            "shard size must be positive (got {shard_size})"
        )));
    }
    if shard_step < 1 {
        return Err(CallerError::InvalidArgument(format!(
            "shard step must be positive (got {shard_step})"
        )));
    }
    if shard_padding < 0 {
        return Err(CallerError::InvalidArgument(format!(
            "shard padding must not be negative (got {shard_padding})"
        )));
    }
    let contig_length = dictionary
        .contig_length(interval.contig())
        .filter(|&length| interval.end() <= length)
        .ok_or_else(|| {
            CallerError::InvalidArgument(format!(
                "{interval} is not within the sequence dictionary"
            ))
        })?;

    let end = i64::from(interval.end());
    let contig_end = i64::from(contig_length);
    let mut shards = Vec::new();
    let mut start = i64::from(interval.start());
    while start <= end {
        let shard_end = (start + shard_size - 1).min(end);
        let padded_start = (start - shard_padding).max(1);
        let padded_end = (shard_end + shard_padding).min(contig_end);
        shards.push(ShardBoundary {
            interval: interval.with_bounds(start as u32, shard_end as u32)?,
            padded_interval: interval.with_bounds(padded_start as u32, padded_end as u32)?,
        });
        start += shard_step;
    }
    Ok(shards)
}

/// Split `interval` into adjacent, non-overlapping shards of `shard_size` bases.
pub fn divide_interval_into_shards(
    interval: &GenomeInterval,
    shard_size: i64,
    shard_padding: i64,
    dictionary: &SequenceDictionary,
) -> Result<Vec<ShardBoundary>, CallerError> {
    divide_interval_into_stepped_shards(interval, shard_size, shard_size, shard_padding, dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary() -> SequenceDictionary {
        SequenceDictionary::new().with_contig("chr1", 1_000)
    }

    #[test]
    fn shards_cover_interval_and_clip_padding() {
        let interval = GenomeInterval::new("chr1", 1, 250).unwrap();
        let shards = divide_interval_into_shards(&interval, 100, 20, &dictionary()).unwrap();
        let bounds: Vec<_> = shards
            .iter()
            .map(|s| (s.interval().start(), s.interval().end()))
            .collect();
        assert_eq!(bounds, vec![(1, 100), (101, 200), (201, 250)]);
        assert_eq!(shards[0].padded_interval().start(), 1);
        assert_eq!(shards[0].padded_interval().end(), 120);
        assert_eq!(shards[2].padded_interval().start(), 181);
        assert_eq!(shards[2].padded_interval().end(), 270);
    }

    #[test]
    fn padding_is_clipped_to_contig_end() {
        let interval = GenomeInterval::new("chr1", 950, 1_000).unwrap();
        let shards = divide_interval_into_shards(&interval, 100, 500, &dictionary()).unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].padded_interval().start(), 450);
        assert_eq!(shards[0].padded_interval().end(), 1_000);
    }

    #[test]
    fn overlapping_steps() {
        let interval = GenomeInterval::new("chr1", 1, 30).unwrap();
        let shards =
            divide_interval_into_stepped_shards(&interval, 20, 10, 0, &dictionary()).unwrap();
        let starts: Vec<_> = shards.iter().map(|s| s.interval().start()).collect();
        assert_eq!(starts, vec![1, 11, 21]);
        assert_eq!(shards[1].interval().end(), 30);
    }

    #[test]
    fn invalid_arguments() {
        let interval = GenomeInterval::new("chr1", 1, 30).unwrap();
        let dict = dictionary();
        for (size, step, padding) in [(0, 10, 0), (10, 0, 0), (10, 10, -1)] {
            let result = divide_interval_into_stepped_shards(&interval, size, step, padding, &dict);
            assert!(matches!(result, Err(CallerError::InvalidArgument(_))));
        }
        let outside = GenomeInterval::new("chr1", 900, 1_001).unwrap();
        assert!(divide_interval_into_shards(&outside, 10, 0, &dict).is_err());
        let unknown = GenomeInterval::new("chrZ", 1, 10).unwrap();
        assert!(divide_interval_into_shards(&unknown, 10, 0, &dict).is_err());
    }
}
