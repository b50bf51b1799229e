//! Immutable snapshot of a table's SSTables.

use std::collections::HashSet;
use std::sync::Arc;

use super::{RunId, SharedSstable, SstableError, SstableRun, sstables_to_runs};

/// Cheaply clonable, immutable view of the fragments a table holds at
/// some point in time.
///
/// A compaction descriptor carries one of these so the executor can tell
/// whether a tombstone still shadows data outside the job's input.
#[derive(Debug, Clone, Default)]
pub struct SstableSet {
    sstables: Arc<Vec<SharedSstable>>,
}

impl SstableSet {
    pub fn new(sstables: Vec<SharedSstable>) -> Self {
        Self {
            sstables: Arc::new(sstables),
        }
    }

    pub fn all(&self) -> &[SharedSstable] {
        &self.sstables
    }

    pub fn len(&self) -> usize {
        self.sstables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sstables.is_empty()
    }

    /// Returns a new snapshot with `old` removed and `new` added.
    ///
    /// Fragments are matched by generation.
    pub fn replace(&self, old: &[SharedSstable], new: &[SharedSstable]) -> Self {
        let removed: HashSet<u64> = old.iter().map(|s| s.generation()).collect();
        let sstables = self
            .sstables
            .iter()
            .filter(|s| !removed.contains(&s.generation()))
            .chain(new.iter())
            .cloned()
            .collect();
        Self::new(sstables)
    }

    /// Returns the complete runs of this set that contain any of `sstables`.
    ///
    /// Fragments of those runs that are in the set but not in `sstables`
    /// are included as well.
    pub fn select_sstable_runs(
        &self,
        sstables: &[SharedSstable],
    ) -> Result<Vec<SstableRun>, SstableError> {
        let wanted: HashSet<RunId> = sstables.iter().map(|s| s.run_id()).collect();
        sstables_to_runs(
            self.sstables
                .iter()
                .filter(|s| wanted.contains(&s.run_id()))
                .cloned(),
        )
    }
}
