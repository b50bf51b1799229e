//! In-memory compaction strategy.
//!
//! Meant for small tables whose data is kept in memory: every compaction
//! merges all candidates into a single run, so reads never touch more than
//! one fragment set.

use tracing::debug;

use super::backlog::{BacklogTracker, OngoingCompaction, OngoingWrite};
use super::options::{CommonOptions, OptionMap};
use super::{
    CompactionDescriptor, CompactionError, CompactionStrategy, CompactionStrategyType, IoPriority,
    StrategyControl, TableState,
};
use crate::sstable::SharedSstable;

/// Constant backlog reported for in-memory tables.
pub const IN_MEMORY_BACKLOG: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct InMemoryCompactionStrategy {
    options: CommonOptions,
}

impl InMemoryCompactionStrategy {
    pub fn new(options: CommonOptions) -> Result<Self, CompactionError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn from_options(options: &OptionMap) -> Result<Self, CompactionError> {
        Self::new(CommonOptions::from_map(options)?)
    }

    pub fn options(&self) -> &CommonOptions {
        &self.options
    }
}

impl CompactionStrategy for InMemoryCompactionStrategy {
    fn strategy_type(&self) -> CompactionStrategyType {
        CompactionStrategyType::InMemory
    }

    fn get_sstables_for_compaction(
        &self,
        table: &dyn TableState,
        _control: &dyn StrategyControl,
        candidates: Vec<SharedSstable>,
    ) -> Result<CompactionDescriptor, CompactionError> {
        if candidates.len() <= 1 {
            return Ok(CompactionDescriptor::empty());
        }

        debug!(
            keyspace = %table.schema().keyspace,
            table = %table.schema().table,
            sstable_count = candidates.len(),
            "in-memory: merging all candidates"
        );
        let mut desc = CompactionDescriptor::new(candidates, IoPriority::Compaction);
        desc.enable_garbage_collection(table.main_sstable_set());
        Ok(desc)
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
    }

    fn estimated_pending_compactions(
        &self,
        table: &dyn TableState,
    ) -> Result<i64, CompactionError> {
        Ok(if table.main_sstable_set().len() > 1 { 1 } else { 0 })
    }

    fn make_backlog_tracker(&self) -> Box<dyn BacklogTracker> {
        Box::new(InMemoryBacklogTracker)
    }
}

/// Backlog tracker that keeps no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryBacklogTracker;

impl BacklogTracker for InMemoryBacklogTracker {
    fn backlog(
        &self,
        _ongoing_writes: &[OngoingWrite],
        _ongoing_compactions: &[OngoingCompaction],
    ) -> f64 {
        IN_MEMORY_BACKLOG
    }

    fn replace_sstables(&mut self, _old: &[SharedSstable], _new: &[SharedSstable]) {}
}
