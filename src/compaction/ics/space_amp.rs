//! Space-amplification control.
//!
//! With tiers `S0` (largest) and `S1` (second largest), space amplification
//! is estimated as `(S0 + S1) / S0`. Above the configured goal, the two
//! largest tiers are merged together, pulling live data into a single tier
//! and dropping the bytes duplicated between them.

use super::bucket::{SizeBucket, avg_size, total_size};
use crate::sstable::SstableRun;

/// Space amplification of two tiers with total sizes `s0 >= s1`.
pub fn space_amplification(s0: u64, s1: u64) -> f64 {
    (s0 as f64 + s1 as f64) / s0 as f64
}

/// Returns the union of the two largest tiers when their space
/// amplification exceeds `goal`, or `None` when fewer than two tiers exist
/// or the goal is met.
///
/// Tiers are ranked by average run size, largest first.
pub fn find_cross_tier_job(mut buckets: Vec<SizeBucket>, goal: f64) -> Option<Vec<SstableRun>> {
    if buckets.len() < 2 {
        return None;
    }

    buckets.sort_by_key(|bucket| std::cmp::Reverse(avg_size(bucket)));
    let mut largest = buckets.swap_remove(0);
    let mut second = buckets.swap_remove(0);

    let sa = space_amplification(total_size(&largest), total_size(&second));
    if sa <= goal {
        return None;
    }

    largest.append(&mut second);
    Some(largest)
}
