//! # Incremental Compaction Strategy (ICS)
//!
//! Size-tiered compaction over **runs** of bounded-size fragments. Output is
//! written as a new run of fragments capped at `sstable_size_in_mb`, so a
//! job can release input fragments as soon as their data has been rewritten
//! instead of holding the whole input until the end.
//!
//! Selection buckets the candidate runs into size tiers and tries, in order:
//!
//! - **Same tier** at the table's minimum threshold ([`bucket`]).
//! - **Same tier, pairwise**, unless the table enforces its minimum threshold.
//! - **Garbage collection** of a tier holding runs with enough droppable
//!   tombstones, merged with its closest-in-size neighbour ([`gc`]).
//! - **Space amplification**: the two largest tiers, when their combined size
//!   over the largest one exceeds the configured goal ([`space_amp`]).
//!
//! The two cross-tier steps only run when no compaction is in flight for the
//! table. [`reshape`] handles freshly ingested data and cleanup, and
//! [`backlog`] tracks the write amplification still owed.

pub mod backlog;
pub mod bucket;
pub mod gc;
pub mod reshape;
pub mod space_amp;

#[cfg(test)]
mod tests;

pub use backlog::{BacklogState, IncrementalBacklogTracker, RecomputeDecision};
pub use reshape::ReshapeMode;

use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};

use self::bucket::{SizeBucket, get_buckets, is_any_bucket_interesting, most_interesting_bucket};
use self::gc::{GcParams, find_garbage_collection_job};
use self::reshape::{ReshapeLimits, find_reshape_bucket, split_cleanup_buckets};
use self::space_amp::find_cross_tier_job;
use crate::clock::{Clock, SystemClock};
use crate::compaction::options::{
    IncrementalCompactionOptions, OptionMap, SMALL_FRAGMENT_SIZE_IN_MB,
};
use crate::compaction::{
    BacklogTracker, CompactionDescriptor, CompactionError, CompactionKind, CompactionStrategy,
    CompactionStrategyType, IoPriority, StrategyControl, TableState,
};
use crate::sstable::{Schema, SharedSstable, SstableRun, runs_to_sstables, sstables_to_runs};

/// Runs in a tier needed for a pairwise same-tier job.
const PAIRWISE_THRESHOLD: usize = 2;

/// The incremental compaction strategy of one table.
#[derive(Debug, Clone)]
pub struct IncrementalCompactionStrategy {
    options: IncrementalCompactionOptions,
    clock: Arc<dyn Clock>,
}

impl IncrementalCompactionStrategy {
    /// Creates a strategy from typed options.
    ///
    /// # Errors
    ///
    /// Returns [`CompactionError::InvalidConfig`] if `options` do not validate.
    pub fn new(options: IncrementalCompactionOptions) -> Result<Self, CompactionError> {
        options.validate()?;
        if options.fragment_size_in_mb < SMALL_FRAGMENT_SIZE_IN_MB {
            warn!(
                fragment_size_in_mb = options.fragment_size_in_mb,
                "Fragment size below {} MB leads to runs with a high number of fragments",
                SMALL_FRAGMENT_SIZE_IN_MB
            );
        }
        Ok(Self {
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Creates a strategy from a raw schema option map.
    pub fn from_options(options: &OptionMap) -> Result<Self, CompactionError> {
        Self::new(IncrementalCompactionOptions::from_map(options)?)
    }

    /// Replaces the wall clock used by garbage-collection selection.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validated options this strategy was built with.
    pub fn options(&self) -> &IncrementalCompactionOptions {
        &self.options
    }

    /// Output fragment size cap in bytes.
    pub fn fragment_size(&self) -> u64 {
        self.options.fragment_size()
    }

    /// Configured space-amplification goal, `None` when disabled.
    pub fn space_amplification_goal(&self) -> Option<f64> {
        self.options.space_amplification_goal
    }

    /// Buckets `runs` with this strategy's bucketing options.
    pub fn get_buckets(&self, runs: Vec<SstableRun>) -> Vec<SizeBucket> {
        get_buckets(runs, &self.options.bucket)
    }

    fn make_descriptor(&self, runs: Vec<SstableRun>, priority: IoPriority) -> CompactionDescriptor {
        CompactionDescriptor::new(runs_to_sstables(runs), priority)
            .with_level(CompactionDescriptor::DEFAULT_LEVEL)
            .with_max_sstable_bytes(self.fragment_size())
    }

    fn gc_params(&self, schema: &Schema) -> GcParams {
        let now = self.clock.now();
        GcParams {
            now,
            gc_before: now.checked_sub(schema.gc_grace()).unwrap_or(UNIX_EPOCH),
            tombstone_threshold: self.options.common.tombstone_threshold,
            tombstone_compaction_interval: self.options.common.tombstone_compaction_interval,
        }
    }

    /// Same-tier job at `min_threshold`, if any tier is interesting.
    fn same_tier_job(
        &self,
        buckets: &[SizeBucket],
        min_threshold: usize,
        max_threshold: usize,
    ) -> Option<CompactionDescriptor> {
        if !is_any_bucket_interesting(buckets, min_threshold) {
            return None;
        }
        let bucket = most_interesting_bucket(buckets, min_threshold, max_threshold);
        if bucket.is_empty() {
            return None;
        }
        Some(self.make_descriptor(bucket, IoPriority::Compaction))
    }
}

impl CompactionStrategy for IncrementalCompactionStrategy {
    fn strategy_type(&self) -> CompactionStrategyType {
        CompactionStrategyType::Incremental
    }

    fn get_sstables_for_compaction(
        &self,
        table: &dyn TableState,
        control: &dyn StrategyControl,
        candidates: Vec<SharedSstable>,
    ) -> Result<CompactionDescriptor, CompactionError> {
        let schema = table.schema();
        let min_threshold = table.min_compaction_threshold();
        let max_threshold = schema.max_compaction_threshold;

        let buckets = self.get_buckets(sstables_to_runs(candidates)?);

        if let Some(desc) = self.same_tier_job(&buckets, min_threshold, max_threshold) {
            debug!(
                keyspace = %schema.keyspace,
                table = %schema.table,
                min_threshold,
                run_count = desc.fan_in(),
                "ICS: same-tier compaction"
            );
            return Ok(desc);
        }

        if !table.compaction_enforce_min_threshold() {
            if let Some(desc) = self.same_tier_job(&buckets, PAIRWISE_THRESHOLD, max_threshold) {
                debug!(
                    keyspace = %schema.keyspace,
                    table = %schema.table,
                    run_count = desc.fan_in(),
                    "ICS: pairwise same-tier compaction"
                );
                return Ok(desc);
            }
        }

        // Cross-tier work waits until pending same-tier work has drained.
        if control.has_ongoing_compaction(table) {
            debug!(
                keyspace = %schema.keyspace,
                table = %schema.table,
                "ICS: compaction in flight, skipping cross-tier selection"
            );
            return Ok(CompactionDescriptor::empty());
        }

        let bucket_count = buckets.len();
        match find_garbage_collection_job(buckets.clone(), &self.gc_params(schema)) {
            Some(runs) => {
                info!(
                    keyspace = %schema.keyspace,
                    table = %schema.table,
                    run_count = runs.len(),
                    "ICS: starting garbage collection"
                );
                let mut desc = self.make_descriptor(runs, IoPriority::Compaction);
                desc.enable_garbage_collection(table.main_sstable_set());
                return Ok(desc);
            }
            None => debug!(
                keyspace = %schema.keyspace,
                table = %schema.table,
                bucket_count,
                "ICS: nothing to garbage collect"
            ),
        }

        let Some(goal) = self.options.space_amplification_goal else {
            return Ok(CompactionDescriptor::empty());
        };
        match find_cross_tier_job(buckets, goal) {
            Some(runs) => {
                info!(
                    keyspace = %schema.keyspace,
                    table = %schema.table,
                    run_count = runs.len(),
                    space_amplification_goal = goal,
                    "ICS: cross-tier compaction of the two largest tiers"
                );
                Ok(self.make_descriptor(runs, IoPriority::Compaction))
            }
            None => {
                debug!(
                    keyspace = %schema.keyspace,
                    table = %schema.table,
                    bucket_count,
                    "ICS: space amplification within goal"
                );
                Ok(CompactionDescriptor::empty())
            }
        }
    }

    fn get_major_compaction_job(
        &self,
        _table: &dyn TableState,
        candidates: Vec<SharedSstable>,
    ) -> CompactionDescriptor {
        if candidates.is_empty() {
            return CompactionDescriptor::empty();
        }
        CompactionDescriptor::new(candidates, IoPriority::Compaction)
            .with_max_sstable_bytes(self.fragment_size())
    }

    fn estimated_pending_compactions(
        &self,
        table: &dyn TableState,
    ) -> Result<i64, CompactionError> {
        let schema = table.schema();
        let set = table.main_sstable_set();
        let runs = set.select_sstable_runs(set.all())?;
        Ok(bucket::estimated_pending_compactions(
            &self.get_buckets(runs),
            schema.min_compaction_threshold,
            schema.max_compaction_threshold,
        ))
    }

    fn get_reshaping_job(
        &self,
        input: Vec<SharedSstable>,
        schema: &Schema,
        priority: IoPriority,
        mode: ReshapeMode,
    ) -> Result<CompactionDescriptor, CompactionError> {
        let limits = ReshapeLimits::new(schema, mode);
        let buckets = self.get_buckets(sstables_to_runs(input)?);

        let Some(bucket) = find_reshape_bucket(buckets, limits) else {
            return Ok(CompactionDescriptor::empty());
        };

        info!(
            keyspace = %schema.keyspace,
            table = %schema.table,
            ?mode,
            run_count = bucket.len(),
            "ICS: reshaping ingested runs"
        );
        Ok(self
            .make_descriptor(bucket, priority)
            .with_kind(CompactionKind::Reshape))
    }

    fn get_cleanup_compaction_jobs(
        &self,
        table: &dyn TableState,
        candidates: Vec<SharedSstable>,
    ) -> Result<Vec<CompactionDescriptor>, CompactionError> {
        let max_threshold = table.schema().max_compaction_threshold;
        let buckets = self.get_buckets(sstables_to_runs(candidates)?);

        Ok(split_cleanup_buckets(buckets, max_threshold)
            .into_iter()
            .map(|runs| {
                self.make_descriptor(runs, IoPriority::Compaction)
                    .with_kind(CompactionKind::Cleanup)
            })
            .collect())
    }

    fn make_backlog_tracker(&self) -> Box<dyn BacklogTracker> {
        Box::new(IncrementalBacklogTracker::new(self.options.bucket))
    }
}
