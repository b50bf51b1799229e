//! Run construction and run grouping tests.

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::sstable::{
        DecoratedKey, RunId, SharedSstable, SstableError, SstableMetadata, SstableRun,
        runs_to_sstables, sstables_to_runs,
    };
    use crate::test_utils::{
        init_tracing, make_keyed_sstable, make_sstable, next_generation, test_schema,
    };

    fn fragment_at(run_id: RunId, size: u64, secs: u64) -> SharedSstable {
        SstableMetadata::new(next_generation(), run_id, size, test_schema())
            .with_write_time(UNIX_EPOCH + Duration::from_secs(secs))
            .into_shared()
    }

    /// # Scenario
    /// A run built from several fragments exposes their combined statistics.
    ///
    /// # Starting environment
    /// Three fragments of one run, out of key order, sizes 10/20/30.
    ///
    /// # Actions
    /// 1. `SstableRun::new` on the fragments.
    ///
    /// # Expected behavior
    /// - `data_size` is the sum of the fragment sizes.
    /// - Fragments are ordered by first key.
    /// - `first_key` is the lowest first key.
    #[test]
    fn run_aggregates_fragments() {
        init_tracing();
        let run_id = RunId::generate();
        let fragments = vec![
            make_keyed_sstable(run_id, 30, 200, 299),
            make_keyed_sstable(run_id, 10, 0, 99),
            make_keyed_sstable(run_id, 20, 100, 199),
        ];

        let run = SstableRun::new(fragments).unwrap();

        assert_eq!(run.run_id(), run_id);
        assert_eq!(run.data_size(), 60);
        assert_eq!(run.len(), 3);
        let tokens: Vec<i64> = run.fragments().iter().map(|f| f.first_key().token).collect();
        assert_eq!(tokens, vec![0, 100, 200]);
        assert_eq!(run.first_key(), &DecoratedKey::new(0, 0i64.to_be_bytes()));
    }

    /// # Scenario
    /// Invalid fragment groups are rejected instead of producing a run.
    ///
    /// # Actions
    /// 1. Build a run from no fragments.
    /// 2. Build a run whose fragments hold no data.
    /// 3. Build a run from fragments of two different runs.
    ///
    /// # Expected behavior
    /// `EmptyRun`, `ZeroSizedRun` and `MixedRun` respectively.
    #[test]
    fn invalid_runs_are_rejected() {
        init_tracing();
        assert!(matches!(
            SstableRun::new(Vec::new()),
            Err(SstableError::EmptyRun)
        ));

        let empty = RunId::generate();
        let err =
            SstableRun::new(vec![make_sstable(empty, 0), make_sstable(empty, 0)]).unwrap_err();
        assert!(matches!(err, SstableError::ZeroSizedRun(id) if id == empty));

        let a = RunId::generate();
        let b = RunId::generate();
        let err = SstableRun::new(vec![make_sstable(a, 1), make_sstable(b, 1)]).unwrap_err();
        assert!(matches!(
            err,
            SstableError::MixedRun { expected, found } if expected == a && found == b
        ));
    }

    /// # Scenario
    /// A run containing a zero-sized fragment is valid as long as the run
    /// as a whole holds data.
    #[test]
    fn zero_sized_fragment_in_non_empty_run_is_accepted() {
        let run_id = RunId::generate();
        let run = SstableRun::new(vec![make_sstable(run_id, 0), make_sstable(run_id, 5)]).unwrap();
        assert_eq!(run.data_size(), 5);
        assert_eq!(run.len(), 2);
    }

    /// # Scenario
    /// The oldest fragment determines the run's write time.
    #[test]
    fn oldest_write_time_is_minimum() {
        let run_id = RunId::generate();
        let run = SstableRun::new(vec![
            fragment_at(run_id, 1, 500),
            fragment_at(run_id, 1, 100),
            fragment_at(run_id, 1, 300),
        ])
        .unwrap();

        assert_eq!(run.oldest_write_time(), UNIX_EPOCH + Duration::from_secs(100));
    }

    /// # Scenario
    /// Grouping fragments into runs and flattening them back is lossless,
    /// and the grouping does not depend on input order.
    ///
    /// # Starting environment
    /// Two runs: one with three fragments, one with a single fragment.
    ///
    /// # Actions
    /// 1. `sstables_to_runs` on the fragments, then on the reversed fragments.
    /// 2. `runs_to_sstables` on the result.
    ///
    /// # Expected behavior
    /// - Two runs with sizes 6 and 10, in the same order both times.
    /// - Flattening returns all four fragments.
    #[test]
    fn sstables_to_runs_groups_by_run_id() {
        init_tracing();
        let a = RunId::new(1);
        let b = RunId::new(2);
        let fragments = vec![
            make_sstable(a, 1),
            make_sstable(b, 10),
            make_sstable(a, 2),
            make_sstable(a, 3),
        ];

        let runs = sstables_to_runs(fragments.clone()).unwrap();
        let sizes: Vec<(RunId, u64)> = runs.iter().map(|r| (r.run_id(), r.data_size())).collect();
        assert_eq!(sizes, vec![(a, 6), (b, 10)]);

        let reversed = sstables_to_runs(fragments.iter().rev().cloned()).unwrap();
        let reversed_sizes: Vec<(RunId, u64)> =
            reversed.iter().map(|r| (r.run_id(), r.data_size())).collect();
        assert_eq!(sizes, reversed_sizes);

        let mut generations: Vec<u64> = runs_to_sstables(runs)
            .iter()
            .map(|s| s.generation())
            .collect();
        generations.sort_unstable();
        let mut expected: Vec<u64> = fragments.iter().map(|s| s.generation()).collect();
        expected.sort_unstable();
        assert_eq!(generations, expected);
    }

    /// # Scenario
    /// Grouping propagates the zero-size rejection.
    #[test]
    fn sstables_to_runs_rejects_zero_sized_run() {
        let run_id = RunId::generate();
        let err = sstables_to_runs(vec![make_sstable(run_id, 0)]).unwrap_err();
        assert!(matches!(err, SstableError::ZeroSizedRun(_)));
    }

    /// # Scenario
    /// Generated run ids never collide with each other.
    #[test]
    fn generated_run_ids_are_unique() {
        let ids: std::collections::HashSet<RunId> = (0..1000).map(|_| RunId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
