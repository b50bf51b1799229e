//! Incremental backlog tracking.
//!
//! Each run `i` of size `Sᵢ` with `Cᵢ` bytes already compacted contributes
//! `(Sᵢ - Cᵢ) · log₄(T / Sᵢ)` to the backlog, where `T` is the total size of
//! every tracked fragment. Only runs sitting in size-interesting tiers
//! contribute. Rewriting the sum as
//!
//! ```text
//! effective    = Σ Sᵢ - Σ Cᵢ
//! contribution = Σ Sᵢ·log₄(Sᵢ) - Σ Cᵢ·log₄(Sᵢ)
//! backlog      = effective · log₄(T) - contribution
//! ```
//!
//! lets `Σ Sᵢ` and `Σ Sᵢ·log₄(Sᵢ)` be cached. The cache is rebuilt only when
//! a mutation removes the last fragment of a run, since that is when the set
//! of contributing runs may change.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::f64::consts::LN_2;
use std::sync::Arc;

use tracing::{trace, warn};

use super::bucket::{get_buckets, is_bucket_interesting};
use crate::compaction::backlog::{BacklogTracker, OngoingCompaction, OngoingWrite};
use crate::compaction::options::BucketOptions;
use crate::sstable::{DEFAULT_MIN_COMPACTION_THRESHOLD, RunId, SharedSstable, SstableRun};

/// `1 / ln(4)`.
const INV_LOG_4: f64 = 1.0 / (2.0 * LN_2);

pub fn log4(x: f64) -> f64 {
    x.ln() * INV_LOG_4
}

/// Whether the cached backlog aggregates must be rebuilt after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeDecision {
    Keep,
    Refresh,
}

// ------------------------------------------------------------------------------------------------
// BacklogState
// ------------------------------------------------------------------------------------------------

/// Mutable per-table aggregate behind [`IncrementalBacklogTracker`].
#[derive(Debug)]
pub struct BacklogState {
    /// Bytes of every tracked fragment.
    total_bytes: u64,
    /// `Σ Sᵢ` over contributing runs, as of the last refresh.
    total_backlog_bytes: u64,
    /// `Σ Sᵢ·log₄(Sᵢ)` over contributing runs, as of the last refresh.
    contribution: f64,
    /// Minimum compaction threshold of the most recently added fragment.
    threshold: usize,
    contributing_runs: HashSet<RunId>,
    /// Tracked fragments, grouped by run and keyed by generation.
    all: HashMap<RunId, BTreeMap<u64, SharedSstable>>,
}

impl Default for BacklogState {
    fn default() -> Self {
        Self {
            total_bytes: 0,
            total_backlog_bytes: 0,
            contribution: 0.0,
            threshold: DEFAULT_MIN_COMPACTION_THRESHOLD,
            contributing_runs: HashSet::new(),
            all: HashMap::new(),
        }
    }
}

impl BacklogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `added` and drops `removed` from the tracked set.
    ///
    /// Byte totals are updated right away. Fragments without data are
    /// ignored, as are removals of fragments that are not tracked. Returns
    /// [`RecomputeDecision::Refresh`] iff some run lost its last fragment.
    pub fn apply_mutation(
        &mut self,
        added: &[SharedSstable],
        removed: &[SharedSstable],
    ) -> RecomputeDecision {
        for sst in added.iter().filter(|sst| sst.data_size() > 0) {
            let previous = self
                .all
                .entry(sst.run_id())
                .or_default()
                .insert(sst.generation(), Arc::clone(sst));
            if previous.is_none() {
                self.total_bytes += sst.data_size();
            }
            self.threshold = sst.schema().min_compaction_threshold;
        }

        let mut exhausted_input_run = false;
        for sst in removed.iter().filter(|sst| sst.data_size() > 0) {
            let run_id = sst.run_id();
            let Some(fragments) = self.all.get_mut(&run_id) else {
                continue;
            };
            if fragments.remove(&sst.generation()).is_none() {
                continue;
            }
            self.total_bytes = self.total_bytes.saturating_sub(sst.data_size());
            if fragments.is_empty() {
                self.all.remove(&run_id);
                exhausted_input_run = true;
            }
        }

        if exhausted_input_run {
            RecomputeDecision::Refresh
        } else {
            RecomputeDecision::Keep
        }
    }

    /// Rebuilds the contributing-run aggregates from the tracked fragments.
    pub fn refresh(&mut self, options: &BucketOptions) {
        self.total_backlog_bytes = 0;
        self.contribution = 0.0;
        self.contributing_runs.clear();
        if self.all.is_empty() {
            return;
        }

        let mut runs = Vec::with_capacity(self.all.len());
        for fragments in self.all.values() {
            match SstableRun::new(fragments.values().cloned().collect()) {
                Ok(run) => runs.push(run),
                Err(e) => warn!(error = %e, "backlog: skipping invalid run"),
            }
        }

        for bucket in get_buckets(runs, options) {
            if !is_bucket_interesting(&bucket, self.threshold) {
                continue;
            }
            for run in &bucket {
                let data_size = run.data_size();
                self.total_backlog_bytes += data_size;
                self.contribution += data_size as f64 * log4(data_size as f64);
                self.contributing_runs.insert(run.run_id());
            }
        }

        trace!(
            tracked_runs = self.all.len(),
            contributing_runs = self.contributing_runs.len(),
            total_backlog_bytes = self.total_backlog_bytes,
            "backlog: refreshed contribution"
        );
    }

    /// Backlog given the progress of ongoing compactions. Never negative.
    ///
    /// Only compactions reading contributing runs reduce the backlog.
    pub fn backlog(&self, ongoing_compactions: &[OngoingCompaction]) -> f64 {
        let mut compacted_bytes = 0u64;
        let mut compacted_contribution = 0.0;
        for ongoing in ongoing_compactions {
            let size = ongoing.sstable.data_size();
            if size == 0 || !self.contributing_runs.contains(&ongoing.sstable.run_id()) {
                continue;
            }
            compacted_bytes = compacted_bytes.saturating_add(ongoing.compacted);
            compacted_contribution += ongoing.compacted as f64 * log4(size as f64);
        }

        if self.total_backlog_bytes <= compacted_bytes {
            return 0.0;
        }

        let effective = (self.total_backlog_bytes - compacted_bytes) as f64;
        let contribution = self.contribution - compacted_contribution;
        let backlog = effective * log4(self.total_bytes as f64) - contribution;
        // `max` also maps NaN to zero.
        backlog.max(0.0)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_backlog_bytes(&self) -> u64 {
        self.total_backlog_bytes
    }

    pub fn contribution(&self) -> f64 {
        self.contribution
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn is_contributing(&self, run_id: RunId) -> bool {
        self.contributing_runs.contains(&run_id)
    }

    /// Number of runs currently tracked.
    pub fn run_count(&self) -> usize {
        self.all.len()
    }
}

// ------------------------------------------------------------------------------------------------
// IncrementalBacklogTracker
// ------------------------------------------------------------------------------------------------

/// Backlog tracker of the incremental strategy.
///
/// Ongoing writes are not accounted for: freshly written runs only start
/// contributing once they are tracked and land in an interesting tier.
#[derive(Debug)]
pub struct IncrementalBacklogTracker {
    options: BucketOptions,
    state: BacklogState,
}

impl IncrementalBacklogTracker {
    pub fn new(options: BucketOptions) -> Self {
        Self {
            options,
            state: BacklogState::new(),
        }
    }

    pub fn state(&self) -> &BacklogState {
        &self.state
    }

    pub fn total_bytes(&self) -> u64 {
        self.state.total_bytes()
    }

    pub fn refresh_sstables_backlog_contribution(&mut self) {
        self.state.refresh(&self.options);
    }
}

impl BacklogTracker for IncrementalBacklogTracker {
    fn backlog(
        &self,
        _ongoing_writes: &[OngoingWrite],
        ongoing_compactions: &[OngoingCompaction],
    ) -> f64 {
        self.state.backlog(ongoing_compactions)
    }

    fn replace_sstables(&mut self, old: &[SharedSstable], new: &[SharedSstable]) {
        if self.state.apply_mutation(new, old) == RecomputeDecision::Refresh {
            self.refresh_sstables_backlog_contribution();
        }
    }
}
