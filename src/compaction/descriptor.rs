//! Compaction job descriptor, the output of every selection.

use std::collections::HashSet;

use crate::sstable::{RunId, SharedSstable, SstableSet};

/// I/O class the executor should run the job under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IoPriority {
    /// Regular strategy-driven compaction.
    #[default]
    Compaction,
    /// Operator-triggered work (cleanup, major, scrub).
    Maintenance,
    /// Consolidation of data arriving through streaming or load.
    Streaming,
}

/// What the executor is asked to do with the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompactionKind {
    #[default]
    Regular,
    /// Rewrite dropping data the node no longer owns.
    Cleanup,
    /// Consolidate ingested fragments before they join regular compaction.
    Reshape,
}

/// A compaction job: which fragments to merge and how to write the output.
///
/// A descriptor without fragments means "nothing to do".
#[derive(Debug, Clone)]
pub struct CompactionDescriptor {
    /// Fragments to merge, flattened from the selected runs.
    pub sstables: Vec<SharedSstable>,

    /// Snapshot of the table's fragments, used to decide whether expired
    /// tombstones may be purged. Without it, purging is disabled.
    pub all_sstables_snapshot: Option<SstableSet>,

    /// Level (generation offset) assigned to the output.
    pub level: u32,

    /// Size cap of each output fragment.
    pub max_sstable_bytes: u64,

    /// Run identifier of the output fragments.
    pub run_identifier: RunId,

    pub kind: CompactionKind,

    pub priority: IoPriority,
}

impl CompactionDescriptor {
    pub const DEFAULT_LEVEL: u32 = 0;
    pub const DEFAULT_MAX_SSTABLE_BYTES: u64 = u64::MAX;

    pub fn new(sstables: Vec<SharedSstable>, priority: IoPriority) -> Self {
        Self {
            sstables,
            all_sstables_snapshot: None,
            level: Self::DEFAULT_LEVEL,
            max_sstable_bytes: Self::DEFAULT_MAX_SSTABLE_BYTES,
            run_identifier: RunId::generate(),
            kind: CompactionKind::Regular,
            priority,
        }
    }

    /// The canonical "nothing to do" result.
    pub fn empty() -> Self {
        Self::new(Vec::new(), IoPriority::Compaction)
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_max_sstable_bytes(mut self, max_sstable_bytes: u64) -> Self {
        self.max_sstable_bytes = max_sstable_bytes;
        self
    }

    pub fn with_kind(mut self, kind: CompactionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sstables.is_empty()
    }

    pub fn is_reshape(&self) -> bool {
        self.kind == CompactionKind::Reshape
    }

    /// Fan-in of the job: the number of distinct input runs.
    pub fn fan_in(&self) -> usize {
        self.sstables
            .iter()
            .map(|s| s.run_id())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Total data size of all input fragments.
    pub fn sstables_size(&self) -> u64 {
        self.sstables.iter().map(|s| s.data_size()).sum()
    }

    /// Lets the executor purge expired data, checking `snapshot` for
    /// shadowed data outside the input.
    pub fn enable_garbage_collection(&mut self, snapshot: SstableSet) {
        self.all_sstables_snapshot = Some(snapshot);
    }
}

impl Default for CompactionDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}
