//! Size-tier bucketing and same-tier bucket selection.

use tracing::trace;

use crate::compaction::options::BucketOptions;
use crate::sstable::SstableRun;

/// A group of runs considered similar enough in size to be merged together.
pub type SizeBucket = Vec<SstableRun>;

/// Groups runs into size tiers.
///
/// Runs are visited in ascending size order, so buckets come out in
/// ascending order of average size and each bucket's members are sorted
/// ascending by size. Runs of equal size are ordered by run id so the
/// partition does not depend on input order. A run joins the last bucket when its size lies
/// strictly inside `(avg × bucket_low, avg × bucket_high)`, or when both it
/// and the bucket average are below `min_sstable_size`. A run of at least
/// `min_sstable_size` is still refused if the resulting average would push
/// the bucket's smallest member below `new_avg × bucket_low`.
pub fn get_buckets(mut runs: Vec<SstableRun>, options: &BucketOptions) -> Vec<SizeBucket> {
    runs.sort_by(|a, b| {
        a.data_size()
            .cmp(&b.data_size())
            .then_with(|| a.run_id().cmp(&b.run_id()))
    });

    let min_sstable_size = options.min_sstable_size as f64;
    let mut buckets: Vec<SizeBucket> = Vec::new();
    let mut averages: Vec<f64> = Vec::new();

    for run in runs {
        let size = run.data_size() as f64;

        if let (Some(bucket), Some(avg)) = (buckets.last_mut(), averages.last_mut()) {
            let in_band = size > *avg * options.bucket_low && size < *avg * options.bucket_high;
            let both_small = size < min_sstable_size && *avg < min_sstable_size;

            if in_band || both_small {
                let new_avg = (bucket.len() as f64 * *avg + size) / (bucket.len() + 1) as f64;
                let smallest = bucket[0].data_size() as f64;

                // The average drifts upwards as larger runs join; stop before
                // the smallest member falls out of the band.
                if size < min_sstable_size || smallest >= new_avg * options.bucket_low {
                    bucket.push(run);
                    *avg = new_avg;
                    continue;
                }
            }
        }

        trace!(run_id = %run.run_id(), size = run.data_size(), "bucketing: starting new bucket");
        averages.push(size);
        buckets.push(vec![run]);
    }

    buckets
}

/// A bucket is interesting once it holds at least `min_threshold` runs.
pub fn is_bucket_interesting(bucket: &[SstableRun], min_threshold: usize) -> bool {
    bucket.len() >= min_threshold
}

pub fn is_any_bucket_interesting(buckets: &[SizeBucket], min_threshold: usize) -> bool {
    buckets
        .iter()
        .any(|bucket| is_bucket_interesting(bucket, min_threshold))
}

/// Sum of the sizes of all runs in `bucket`.
pub fn total_size(bucket: &[SstableRun]) -> u64 {
    bucket.iter().map(SstableRun::data_size).sum()
}

/// Integer average run size of `bucket`; 0 for an empty bucket.
pub fn avg_size(bucket: &[SstableRun]) -> u64 {
    if bucket.is_empty() {
        return 0;
    }
    total_size(bucket) / bucket.len() as u64
}

/// Selects the bucket to compact among those holding at least
/// `min_threshold` runs.
///
/// Interesting buckets are cut down to their `max_threshold` smallest runs;
/// the one with the lowest average size then wins, the first one on ties.
/// Returns an empty bucket when none is interesting.
pub fn most_interesting_bucket(
    buckets: &[SizeBucket],
    min_threshold: usize,
    max_threshold: usize,
) -> SizeBucket {
    let mut best: Option<(SizeBucket, u64)> = None;

    for bucket in buckets {
        if !is_bucket_interesting(bucket, min_threshold) {
            continue;
        }
        let mut bucket = bucket.clone();
        if bucket.len() > max_threshold {
            bucket.sort_by_key(SstableRun::data_size);
            bucket.truncate(max_threshold);
        }

        let avg = avg_size(&bucket);
        match &best {
            Some((_, best_avg)) if avg >= *best_avg => {}
            _ => best = Some((bucket, avg)),
        }
    }

    best.map(|(bucket, _)| bucket).unwrap_or_default()
}

/// Jobs needed to bring every interesting bucket below `max_threshold`.
pub fn estimated_pending_compactions(
    buckets: &[SizeBucket],
    min_threshold: usize,
    max_threshold: usize,
) -> i64 {
    let max_threshold = max_threshold.max(1);
    buckets
        .iter()
        .filter(|bucket| is_bucket_interesting(bucket, min_threshold))
        .map(|bucket| bucket.len().div_ceil(max_threshold) as i64)
        .sum()
}
