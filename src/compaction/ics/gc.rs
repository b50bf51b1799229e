//! Garbage-collection selection.
//!
//! Expired tombstones can only be purged once they meet the data they
//! shadow, which tends to sit in the largest tiers. When no tier is
//! size-interesting, a tier holding runs with enough droppable tombstones is
//! merged with its closest-in-size neighbour so tombstones keep moving up
//! the tiers until they can be dropped.

use std::time::{Duration, SystemTime};

use super::bucket::SizeBucket;
use crate::sstable::SstableRun;

/// Inputs of the "worth dropping tombstones" test.
#[derive(Debug, Clone, Copy)]
pub struct GcParams {
    /// Current wall-clock time.
    pub now: SystemTime,
    /// Tombstones deleting data before this instant are droppable.
    pub gc_before: SystemTime,
    /// Minimum droppable ratio for a run to be worth collecting.
    pub tombstone_threshold: f64,
    /// Minimum age of a run before it is considered.
    pub tombstone_compaction_interval: Duration,
}

impl GcParams {
    /// A run is worth collecting when it is older than the compaction
    /// interval and its droppable tombstone ratio reaches the threshold.
    pub fn worth_dropping_tombstones(&self, run: &SstableRun) -> bool {
        let Some(stale_before) = self.now.checked_sub(self.tombstone_compaction_interval) else {
            return false;
        };
        if run.oldest_write_time() > stale_before {
            return false;
        }
        run.estimate_droppable_tombstone_ratio(self.gc_before) >= self.tombstone_threshold
    }

    fn can_garbage_collect(&self, bucket: &[SstableRun]) -> bool {
        bucket.iter().any(|run| self.worth_dropping_tombstones(run))
    }
}

/// Picks the runs of a garbage-collection job, if any tier needs one.
///
/// `buckets` must be in ascending order of average size, as produced by
/// [`get_buckets`](super::bucket::get_buckets). Tiers are scanned from the
/// largest down; the first one with a run worth collecting is merged with
/// the tier below it when it is the largest, or with the tier above it
/// otherwise.
pub fn find_garbage_collection_job(
    mut buckets: Vec<SizeBucket>,
    params: &GcParams,
) -> Option<Vec<SstableRun>> {
    let selected = buckets
        .iter()
        .rposition(|bucket| params.can_garbage_collect(bucket))?;

    let largest = buckets.len() - 1;
    let neighbour = match buckets.len() {
        1 => None,
        _ if selected == largest => Some(selected - 1),
        _ => Some(selected + 1),
    };

    let mut input = std::mem::take(&mut buckets[selected]);
    if let Some(neighbour) = neighbour {
        input.append(&mut buckets[neighbour]);
    }
    Some(input)
}
