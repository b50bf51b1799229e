//! Backlog tracking interface.
//!
//! A backlog tracker keeps per-table statistics about the runs a table holds
//! and turns them into a single scalar: an estimate of the write
//! amplification still owed by compaction. An external scheduler compares
//! the backlog of every table to split compaction capacity between them.
//!
//! Trackers are single-writer: the owner must serialize
//! [`replace_sstables`](BacklogTracker::replace_sstables) against itself and
//! against [`backlog`](BacklogTracker::backlog). Trackers of different tables
//! share nothing.

use crate::sstable::{RunId, SharedSstable};

/// Progress of a compaction currently reading `sstable`.
#[derive(Debug, Clone)]
pub struct OngoingCompaction {
    pub sstable: SharedSstable,
    /// Bytes of `sstable` already consumed by the compaction.
    pub compacted: u64,
}

/// Progress of a write (flush or compaction output) currently producing a
/// fragment of run `run_id`.
#[derive(Debug, Clone, Copy)]
pub struct OngoingWrite {
    pub run_id: RunId,
    pub written: u64,
}

pub trait BacklogTracker: Send {
    /// Current backlog of the table, never negative.
    fn backlog(
        &self,
        ongoing_writes: &[OngoingWrite],
        ongoing_compactions: &[OngoingCompaction],
    ) -> f64;

    /// Records that `old` fragments left the table and `new` ones joined it.
    fn replace_sstables(&mut self, old: &[SharedSstable], new: &[SharedSstable]);
}
