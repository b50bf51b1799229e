//! SSTable runs.
//!
//! A run is the unit of compaction input: every fragment sharing one
//! [`RunId`], together forming a single sorted, non-overlapping data set.
//! [`SstableRun::new`] only accepts a non-empty group of fragments with a
//! positive total size, so downstream size-ratio math never sees zero.

use std::collections::BTreeMap;
use std::time::SystemTime;

use super::{DecoratedKey, RunId, SharedSstable, SstableError};

/// A validated, non-empty SSTable run.
#[derive(Debug, Clone)]
pub struct SstableRun {
    run_id: RunId,
    /// Fragments ordered by first key.
    fragments: Vec<SharedSstable>,
    data_size: u64,
}

impl SstableRun {
    /// Groups `fragments` into a run.
    ///
    /// # Errors
    ///
    /// - [`SstableError::EmptyRun`] if `fragments` is empty.
    /// - [`SstableError::MixedRun`] if the fragments carry different run ids.
    /// - [`SstableError::ZeroSizedRun`] if the fragments hold no data.
    pub fn new(mut fragments: Vec<SharedSstable>) -> Result<Self, SstableError> {
        let run_id = fragments.first().ok_or(SstableError::EmptyRun)?.run_id();

        if let Some(stray) = fragments.iter().find(|f| f.run_id() != run_id) {
            return Err(SstableError::MixedRun {
                expected: run_id,
                found: stray.run_id(),
            });
        }

        let data_size = fragments.iter().map(|f| f.data_size()).sum();
        if data_size == 0 {
            return Err(SstableError::ZeroSizedRun(run_id));
        }

        fragments.sort_by(|a, b| {
            a.first_key()
                .cmp(b.first_key())
                .then_with(|| a.generation().cmp(&b.generation()))
        });

        Ok(Self {
            run_id,
            fragments,
            data_size,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Sum of all fragment sizes. Always positive.
    pub fn data_size(&self) -> u64 {
        self.data_size
    }

    pub fn fragments(&self) -> &[SharedSstable] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Smallest first key across the run's fragments.
    pub fn first_key(&self) -> &DecoratedKey {
        // Non-empty and sorted by first key.
        self.fragments[0].first_key()
    }

    /// Write time of the oldest fragment.
    pub fn oldest_write_time(&self) -> SystemTime {
        self.fragments
            .iter()
            .map(|f| f.data_file_write_time())
            .min()
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    /// Size-weighted droppable tombstone ratio over all fragments.
    pub fn estimate_droppable_tombstone_ratio(&self, gc_before: SystemTime) -> f64 {
        let weighted: f64 = self
            .fragments
            .iter()
            .map(|f| f.estimate_droppable_tombstone_ratio(gc_before) * f.data_size() as f64)
            .sum();
        weighted / self.data_size as f64
    }

    pub fn into_fragments(self) -> Vec<SharedSstable> {
        self.fragments
    }
}

/// Groups fragments into runs by run identifier.
///
/// Runs are returned in run-id order so the result does not depend on the
/// order of `sstables`.
pub fn sstables_to_runs(
    sstables: impl IntoIterator<Item = SharedSstable>,
) -> Result<Vec<SstableRun>, SstableError> {
    let mut grouped: BTreeMap<RunId, Vec<SharedSstable>> = BTreeMap::new();
    for sst in sstables {
        grouped.entry(sst.run_id()).or_default().push(sst);
    }
    grouped.into_values().map(SstableRun::new).collect()
}

/// Flattens runs back into their fragments, run by run.
pub fn runs_to_sstables(runs: impl IntoIterator<Item = SstableRun>) -> Vec<SharedSstable> {
    runs.into_iter().flat_map(SstableRun::into_fragments).collect()
}
