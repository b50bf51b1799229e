//! Garbage-collection selection tests.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    use crate::compaction::ics::bucket::get_buckets;
    use crate::compaction::ics::gc::{GcParams, find_garbage_collection_job};
    use crate::compaction::{
        BucketOptions, CompactionStrategy, IncrementalCompactionOptions,
        IncrementalCompactionStrategy,
    };
    use crate::sstable::{RunId, SharedSstable, SstableRun, sstables_to_runs};
    use crate::test_utils::{
        FakeControl, FakeTable, FixedClock, MIB, init_tracing, make_run_sstable,
        make_tombstoned_sstable, test_now,
    };

    const HOUR: Duration = Duration::from_secs(3600);

    fn params() -> GcParams {
        let now = test_now();
        GcParams {
            now,
            gc_before: now - Duration::from_secs(864_000),
            tombstone_threshold: 0.2,
            tombstone_compaction_interval: Duration::from_secs(86_400),
        }
    }

    fn single_run(sst: &SharedSstable) -> SstableRun {
        SstableRun::new(vec![sst.clone()]).unwrap()
    }

    fn ids(runs: &[SstableRun]) -> HashSet<RunId> {
        runs.iter().map(|r| r.run_id()).collect()
    }

    /// Three tiers of 1, 200 and 1000 MiB; the tier at `gc_tier` is the one
    /// carrying droppable tombstones.
    fn three_tiers(gc_tier: usize) -> Vec<SharedSstable> {
        [1, 200, 1000]
            .into_iter()
            .enumerate()
            .map(|(i, mib)| {
                if i == gc_tier {
                    make_tombstoned_sstable(mib * MIB, UNIX_EPOCH, 500)
                } else {
                    make_run_sstable(mib * MIB)
                }
            })
            .collect()
    }

    fn gc_job(sstables: &[SharedSstable]) -> Option<HashSet<RunId>> {
        let runs = sstables_to_runs(sstables.iter().cloned()).unwrap();
        let buckets = get_buckets(runs, &BucketOptions::default());
        assert_eq!(buckets.len(), sstables.len());
        find_garbage_collection_job(buckets, &params()).map(|runs| ids(&runs))
    }

    /// # Scenario
    /// Staleness guard: a run with plenty of droppable tombstones is not
    /// collected while it is younger than the compaction interval.
    ///
    /// # Starting environment
    /// Ratio 0.5 against a threshold of 0.2, interval 1 day.
    ///
    /// # Actions
    /// 1. Check a run written 1 hour ago.
    /// 2. Check a run written 2 days ago.
    ///
    /// # Expected behavior
    /// Only the older run is worth collecting.
    #[test]
    fn fresh_runs_are_not_collected() {
        init_tracing();
        let p = params();
        let fresh = make_tombstoned_sstable(MIB, p.now - HOUR, 500);
        let stale = make_tombstoned_sstable(MIB, p.now - 48 * HOUR, 500);

        assert!(!p.worth_dropping_tombstones(&single_run(&fresh)));
        assert!(p.worth_dropping_tombstones(&single_run(&stale)));

        let fresh_runs = sstables_to_runs(vec![fresh]).unwrap();
        let buckets = get_buckets(fresh_runs, &BucketOptions::default());
        assert!(find_garbage_collection_job(buckets, &p).is_none());
    }

    /// # Scenario
    /// The tombstone threshold is inclusive.
    #[test]
    fn threshold_is_inclusive() {
        let p = params();
        let at = make_tombstoned_sstable(MIB, UNIX_EPOCH, 200);
        let below = make_tombstoned_sstable(MIB, UNIX_EPOCH, 199);

        assert!(p.worth_dropping_tombstones(&single_run(&at)));
        assert!(!p.worth_dropping_tombstones(&single_run(&below)));
    }

    /// # Scenario
    /// Tombstones that only become droppable after `gc_before` do not count.
    #[test]
    fn tombstones_within_grace_are_not_droppable() {
        let mut p = params();
        p.gc_before = UNIX_EPOCH + HOUR;
        let sst = make_tombstoned_sstable(MIB, UNIX_EPOCH, 1000);

        assert!(!p.worth_dropping_tombstones(&single_run(&sst)));
    }

    /// # Scenario
    /// The largest tier needing GC is merged with the tier below it.
    ///
    /// # Expected behavior
    /// Job = 1000 MiB tier + 200 MiB tier.
    #[test]
    fn largest_tier_merges_with_tier_below() {
        init_tracing();
        let sstables = three_tiers(2);
        let expected: HashSet<RunId> = [&sstables[1], &sstables[2]]
            .into_iter()
            .map(|s| s.run_id())
            .collect();

        assert_eq!(gc_job(&sstables), Some(expected));
    }

    /// # Scenario
    /// A smaller tier needing GC is merged with the tier above it.
    ///
    /// # Expected behavior
    /// - Middle tier: 200 MiB + 1000 MiB.
    /// - Smallest tier: 1 MiB + 200 MiB.
    #[test]
    fn smaller_tier_merges_with_tier_above() {
        init_tracing();
        let middle = three_tiers(1);
        let expected: HashSet<RunId> = [&middle[1], &middle[2]]
            .into_iter()
            .map(|s| s.run_id())
            .collect();
        assert_eq!(gc_job(&middle), Some(expected));

        let smallest = three_tiers(0);
        let expected: HashSet<RunId> = [&smallest[0], &smallest[1]]
            .into_iter()
            .map(|s| s.run_id())
            .collect();
        assert_eq!(gc_job(&smallest), Some(expected));
    }

    /// # Scenario
    /// With a single tier there is no neighbour to merge with.
    #[test]
    fn single_tier_is_collected_alone() {
        let sst = make_tombstoned_sstable(MIB, UNIX_EPOCH, 500);
        let expected: HashSet<RunId> = [sst.run_id()].into_iter().collect();

        assert_eq!(gc_job(&[sst]), Some(expected));
    }

    /// # Scenario
    /// Nothing is selected when no run has enough droppable tombstones.
    #[test]
    fn nothing_to_collect() {
        let sstables = vec![make_run_sstable(MIB), make_run_sstable(200 * MIB)];
        assert_eq!(gc_job(&sstables), None);
    }

    /// # Scenario
    /// End to end through the strategy: GC runs only when no same-tier job
    /// exists and no compaction is in flight.
    ///
    /// # Starting environment
    /// Tiers of 1, 200 and 1000 MiB; the 1000 MiB run has ratio 0.5 and was
    /// written at the epoch; clock fixed far in the future.
    ///
    /// # Actions
    /// 1. Select with a compaction in flight.
    /// 2. Select with the table idle.
    ///
    /// # Expected behavior
    /// - Empty descriptor while a compaction runs.
    /// - Otherwise a job over the two largest tiers, with garbage
    ///   collection enabled and the fragment size cap applied.
    #[test]
    fn strategy_gates_gc_on_ongoing_compaction() {
        init_tracing();
        let strategy = IncrementalCompactionStrategy::new(IncrementalCompactionOptions::default())
            .unwrap()
            .with_clock(Arc::new(FixedClock(test_now())));
        let sstables = three_tiers(2);
        let table = FakeTable::new(sstables.clone());

        let busy = strategy
            .get_sstables_for_compaction(&table, &FakeControl { ongoing: true }, sstables.clone())
            .unwrap();
        assert!(busy.is_empty());

        let desc = strategy
            .get_sstables_for_compaction(&table, &FakeControl::default(), sstables.clone())
            .unwrap();
        let selected: HashSet<RunId> = desc.sstables.iter().map(|s| s.run_id()).collect();
        let expected: HashSet<RunId> = [sstables[1].run_id(), sstables[2].run_id()]
            .into_iter()
            .collect();
        assert_eq!(selected, expected);
        assert!(desc.all_sstables_snapshot.is_some());
        assert_eq!(desc.max_sstable_bytes, 1000 * MIB);
    }

    /// # Scenario
    /// With the real clock, runs written "now" are never stale.
    #[test]
    fn strategy_with_fresh_runs_selects_nothing() {
        init_tracing();
        let strategy = IncrementalCompactionStrategy::new(IncrementalCompactionOptions::default())
            .unwrap();
        let sstables = vec![make_tombstoned_sstable(
            MIB,
            std::time::SystemTime::now(),
            1000,
        )];
        let table = FakeTable::new(sstables.clone());

        let desc = strategy
            .get_sstables_for_compaction(&table, &FakeControl::default(), sstables)
            .unwrap();
        assert!(desc.is_empty());
    }
}
