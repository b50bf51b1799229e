//! # Compaction Module
//!
//! Decides **which** runs of a table should be merged next and **how
//! urgent** that merge is. Nothing here reads or writes data: the output of
//! every selection is a [`CompactionDescriptor`] that an external executor
//! carries out, and the output of every backlog computation is a scalar an
//! external scheduler uses to share compaction capacity between tables.
//!
//! ## Incremental Compaction (ICS)
//!
//! Groups runs into size tiers and, in order, tries:
//!
//! 1. a same-tier job at the table's minimum threshold,
//! 2. a same-tier job between any two runs of a tier, unless the table
//!    enforces its minimum threshold,
//! 3. a cross-tier garbage-collection job for tiers holding runs with
//!    enough droppable tombstones,
//! 4. a cross-tier merge of the two largest tiers when space amplification
//!    exceeds the configured goal.
//!
//! ## In-Memory
//!
//! Merges every candidate into one whenever there is more than one.
//!
//! ## Code organization
//!
//! Strategy-specific logic lives in [`ics`] and [`in_memory`]; the job
//! description ([`descriptor`]), option parsing ([`options`]) and the
//! backlog interface ([`backlog`]) are shared by both.

pub mod backlog;
pub mod descriptor;
pub mod ics;
pub mod in_memory;
pub mod options;


pub use backlog::{BacklogTracker, OngoingCompaction, OngoingWrite};
pub use descriptor::{CompactionDescriptor, CompactionKind, IoPriority};
pub use ics::{IncrementalBacklogTracker, IncrementalCompactionStrategy, ReshapeMode};
pub use in_memory::InMemoryCompactionStrategy;
pub use options::{BucketOptions, CommonOptions, IncrementalCompactionOptions, OptionMap};

use std::fmt;

use crate::sstable::{Schema, SharedSstable, SstableError, SstableSet};

// ------------------------------------------------------------------------------------------------
// Collaborator contracts
// ------------------------------------------------------------------------------------------------

/// The table a strategy selects work for.
pub trait TableState {
    fn schema(&self) -> &Schema;

    /// Effective minimum compaction threshold. May differ from the schema
    /// value when the table overrides it at runtime.
    fn min_compaction_threshold(&self) -> usize {
        self.schema().min_compaction_threshold
    }

    /// When `true`, tiers smaller than the minimum threshold are never
    /// compacted pairwise.
    fn compaction_enforce_min_threshold(&self) -> bool {
        false
    }

    /// Current snapshot of every fragment the table holds.
    fn main_sstable_set(&self) -> SstableSet;
}

/// State owned by the compaction manager that a strategy may consult.
pub trait StrategyControl {
    /// Whether a compaction is already running for `table`.
    fn has_ongoing_compaction(&self, table: &dyn TableState) -> bool;
}

// ------------------------------------------------------------------------------------------------
// CompactionStrategy trait
// ------------------------------------------------------------------------------------------------

/// A uniform interface for compaction strategies.
///
/// Every method is a pure computation over its arguments. Returning an
/// empty [`CompactionDescriptor`] means there is nothing to do; it is the
/// common outcome in steady state, not an error.
pub trait CompactionStrategy: fmt::Debug + Send + Sync {
    fn strategy_type(&self) -> CompactionStrategyType;

    /// Picks the next job among `candidates`.
    fn get_sstables_for_compaction(
        &self,
        table: &dyn TableState,
        control: &dyn StrategyControl,
        candidates: Vec<SharedSstable>,
    ) -> Result<CompactionDescriptor, CompactionError>;

    /// Builds a job merging all of `candidates` into one run.
    fn get_major_compaction_job(
        &self,
        table: &dyn TableState,
        candidates: Vec<SharedSstable>,
    ) -> CompactionDescriptor;

    /// Number of jobs still needed to bring the table into shape.
    fn estimated_pending_compactions(
        &self,
        table: &dyn TableState,
    ) -> Result<i64, CompactionError>;

    /// Picks a job consolidating freshly ingested fragments.
    fn get_reshaping_job(
        &self,
        _input: Vec<SharedSstable>,
        _schema: &Schema,
        _priority: IoPriority,
        _mode: ReshapeMode,
    ) -> Result<CompactionDescriptor, CompactionError> {
        Ok(CompactionDescriptor::empty())
    }

    /// Splits `candidates` into cleanup jobs, one fragment per job by default.
    fn get_cleanup_compaction_jobs(
        &self,
        _table: &dyn TableState,
        candidates: Vec<SharedSstable>,
    ) -> Result<Vec<CompactionDescriptor>, CompactionError> {
        Ok(candidates
            .into_iter()
            .map(|sst| {
                CompactionDescriptor::new(vec![sst], IoPriority::Compaction)
                    .with_kind(CompactionKind::Cleanup)
            })
            .collect())
    }

    /// Creates a fresh backlog tracker for one table using this strategy.
    fn make_backlog_tracker(&self) -> Box<dyn BacklogTracker>;
}

// ------------------------------------------------------------------------------------------------
// CompactionStrategyType
// ------------------------------------------------------------------------------------------------

/// The closed set of strategies a table can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyType {
    /// Incremental Compaction Strategy (ICS).
    ///
    /// Size-tiered over runs of bounded fragments, with tombstone-driven
    /// and space-amplification-driven cross-tier merges.
    Incremental,

    /// Everything into one run; meant for small tables kept in memory.
    InMemory,
}

impl CompactionStrategyType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Incremental => "IncrementalCompactionStrategy",
            Self::InMemory => "InMemoryCompactionStrategy",
        }
    }

    /// Resolves a strategy class name, with or without a package prefix.
    pub fn from_name(name: &str) -> Result<Self, CompactionError> {
        let short = name.rsplit('.').next().unwrap_or(name);
        match short {
            "IncrementalCompactionStrategy" | "incremental" => Ok(Self::Incremental),
            "InMemoryCompactionStrategy" | "in_memory" => Ok(Self::InMemory),
            other => Err(CompactionError::InvalidConfig(format!(
                "unknown compaction strategy '{other}'"
            ))),
        }
    }

    /// Builds the strategy from a string option map.
    pub fn make_strategy(
        &self,
        options: &OptionMap,
    ) -> Result<Box<dyn CompactionStrategy>, CompactionError> {
        Ok(match self {
            Self::Incremental => Box::new(IncrementalCompactionStrategy::from_options(options)?),
            Self::InMemory => Box::new(InMemoryCompactionStrategy::from_options(options)?),
        })
    }
}

impl fmt::Display for CompactionStrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ------------------------------------------------------------------------------------------------
// Shared error type
// ------------------------------------------------------------------------------------------------

/// Unified error type for all compaction strategies.
#[derive(Debug, thiserror::Error)]
pub enum CompactionError {
    /// Option missing its constraints or not parseable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Candidate fragments could not be grouped into valid runs.
    #[error("invalid run: {0}")]
    InvalidRun(#[from] SstableError),
}
