//! Reshape and cleanup job selection.
//!
//! Both operate on runs that have not been through regular compaction yet
//! (streamed, loaded, or about to be rewritten), and both keep the output
//! contiguous in token order: when a bucket has to be split, runs with the
//! lowest first keys go first instead of the smallest ones.

use super::bucket::SizeBucket;
use crate::sstable::{Schema, SstableRun};

/// Lowest count threshold used when reshaping, whatever the schema says.
pub const MIN_OFFSTRATEGY_THRESHOLD: usize = 4;

/// How eagerly freshly ingested runs are reshaped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReshapeMode {
    /// Reshape as soon as a tier holds `offstrategy_threshold` runs.
    #[default]
    Strict,
    /// Only reshape tiers that reach the maximum job size.
    Relaxed,
}

/// Count thresholds of a reshape selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReshapeLimits {
    /// Minimum number of runs in a tier to reshape it.
    pub offstrategy_threshold: usize,
    /// Maximum number of runs in one reshape job.
    pub max_sstables: usize,
}

impl ReshapeLimits {
    pub fn new(schema: &Schema, mode: ReshapeMode) -> Self {
        let offstrategy_threshold = schema
            .min_compaction_threshold
            .max(MIN_OFFSTRATEGY_THRESHOLD);
        let max_sstables = schema.max_compaction_threshold.max(offstrategy_threshold);
        Self {
            offstrategy_threshold: match mode {
                ReshapeMode::Strict => offstrategy_threshold,
                ReshapeMode::Relaxed => max_sstables,
            },
            max_sstables,
        }
    }
}

/// Sorts runs by their first decorated key, ascending.
pub fn sort_run_bucket_by_first_key(bucket: &mut [SstableRun]) {
    bucket.sort_by(|a, b| a.first_key().cmp(b.first_key()));
}

/// Returns the first tier, in bucket order, that reaches the reshape
/// threshold, cut down to the `max_sstables` runs with the lowest first keys.
pub fn find_reshape_bucket(buckets: Vec<SizeBucket>, limits: ReshapeLimits) -> Option<SizeBucket> {
    let mut bucket = buckets
        .into_iter()
        .find(|bucket| bucket.len() >= limits.offstrategy_threshold)?;

    if bucket.len() > limits.max_sstables {
        sort_run_bucket_by_first_key(&mut bucket);
        bucket.truncate(limits.max_sstables);
    }
    Some(bucket)
}

/// Splits every tier into consecutive groups of at most `max_threshold`
/// runs. Tiers that need splitting are ordered by first key beforehand.
pub fn split_cleanup_buckets(buckets: Vec<SizeBucket>, max_threshold: usize) -> Vec<SizeBucket> {
    let max_threshold = max_threshold.max(1);
    let mut groups = Vec::new();

    for mut bucket in buckets {
        if bucket.len() > max_threshold {
            sort_run_bucket_by_first_key(&mut bucket);
        }
        while !bucket.is_empty() {
            let rest = bucket.split_off(bucket.len().min(max_threshold));
            groups.push(std::mem::replace(&mut bucket, rest));
        }
    }

    groups
}
