//! SSTable Metadata Model
//!
//! This module describes the **inputs** of compaction selection: immutable
//! on-disk fragments (SSTables), the runs they belong to, and the table
//! schema parameters that shape selection.
//!
//! ## Design Overview
//!
//! A physical SSTable is owned by the storage engine, never by the
//! compaction strategy. The strategy only needs a narrow read-only view of
//! it, captured by the [`Sstable`] trait:
//!
//! - **size**: bytes of data in the fragment,
//! - **key range**: first and last [`DecoratedKey`],
//! - **write time**: when the data file was written,
//! - **tombstone estimator**: fraction of data covered by droppable
//!   tombstones for a given `gc_before` bound,
//! - **run identifier**: opaque [`RunId`] shared by all fragments of one
//!   logical sorted run.
//!
//! Fragments are handled as [`SharedSstable`] (`Arc<dyn Sstable>`), so the
//! strategy can group and ungroup them without copying or owning the data.
//!
//! [`SstableMetadata`] is a plain in-memory implementation of the trait,
//! useful for embedders that keep fragment statistics in their own manifest
//! and for tests.
//!
//! # Sub-modules
//!
//! - [`run`]: [`SstableRun`], a validated non-empty group of fragments.
//! - [`set`]: [`SstableSet`], an immutable snapshot of a table's fragments.

// ------------------------------------------------------------------------------------------------
// Sub-modules
// ------------------------------------------------------------------------------------------------

pub mod run;
pub mod set;

#[cfg(test)]
mod tests;

// ------------------------------------------------------------------------------------------------
// Re-exports
// ------------------------------------------------------------------------------------------------

pub use run::{SstableRun, runs_to_sstables, sstables_to_runs};
pub use set::SstableSet;

// ------------------------------------------------------------------------------------------------
// Includes
// ------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Default `gc_grace_seconds` of a table schema (10 days).
pub const DEFAULT_GC_GRACE_SECONDS: u64 = 864_000;

/// Default minimum number of runs in a tier before it is compacted.
pub const DEFAULT_MIN_COMPACTION_THRESHOLD: usize = 4;

/// Default maximum number of runs merged by one job.
pub const DEFAULT_MAX_COMPACTION_THRESHOLD: usize = 32;

/// Run identifiers handed out by [`RunId::generate`] start here, leaving the
/// lower half of the space to embedder-assigned identifiers.
const GENERATED_RUN_ID_BASE: u64 = 1 << 63;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(GENERATED_RUN_ID_BASE);

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors raised while grouping fragments into runs.
#[derive(Debug, Error)]
pub enum SstableError {
    /// A run was built from zero fragments.
    #[error("run has no fragments")]
    EmptyRun,

    /// All fragments of a run together hold no data.
    #[error("run {0} has zero data size")]
    ZeroSizedRun(RunId),

    /// Fragments with different run identifiers were grouped together.
    #[error("fragment of run {found} does not belong to run {expected}")]
    MixedRun { expected: RunId, found: RunId },
}

// ------------------------------------------------------------------------------------------------
// Identifiers and keys
// ------------------------------------------------------------------------------------------------

/// Opaque identifier shared by every fragment of one SSTable run.
///
/// Only equality, hashing and ordering are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

impl RunId {
    /// Wraps an identifier assigned by the embedder (e.g. read back from
    /// its manifest).
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates a fresh identifier, unique within this process.
    pub fn generate() -> Self {
        Self(NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A partition key together with its token.
///
/// Ordered by token first, then by raw key bytes, which is the order in
/// which partitions appear on the token ring.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecoratedKey {
    pub token: i64,
    pub key: Vec<u8>,
}

impl DecoratedKey {
    pub fn new(token: i64, key: impl Into<Vec<u8>>) -> Self {
        Self {
            token,
            key: key.into(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Schema
// ------------------------------------------------------------------------------------------------

/// Table-level parameters consumed by compaction selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Keyspace name, used in log fields only.
    pub keyspace: String,

    /// Table name, used in log fields only.
    pub table: String,

    /// Minimum number of runs in a tier before it is worth compacting.
    pub min_compaction_threshold: usize,

    /// Maximum number of runs merged by a single job.
    pub max_compaction_threshold: usize,

    /// Time a tombstone must outlive before it can be purged.
    pub gc_grace_seconds: u64,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            keyspace: "ks".into(),
            table: "cf".into(),
            min_compaction_threshold: DEFAULT_MIN_COMPACTION_THRESHOLD,
            max_compaction_threshold: DEFAULT_MAX_COMPACTION_THRESHOLD,
            gc_grace_seconds: DEFAULT_GC_GRACE_SECONDS,
        }
    }
}

impl Schema {
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn gc_grace(&self) -> Duration {
        Duration::from_secs(self.gc_grace_seconds)
    }
}

// ------------------------------------------------------------------------------------------------
// Fragment contract
// ------------------------------------------------------------------------------------------------

/// Read-only view of one immutable on-disk SSTable fragment.
///
/// Implementations must return stable values for the lifetime of the
/// object: fragments never change once written.
pub trait Sstable: fmt::Debug + Send + Sync {
    /// Unique generation number of this fragment within its table.
    fn generation(&self) -> u64;

    /// Identifier of the run this fragment belongs to.
    fn run_id(&self) -> RunId;

    /// Bytes of data held by this fragment.
    fn data_size(&self) -> u64;

    /// Smallest partition key stored in the fragment.
    fn first_key(&self) -> &DecoratedKey;

    /// Largest partition key stored in the fragment.
    fn last_key(&self) -> &DecoratedKey;

    /// Time the data file was written.
    fn data_file_write_time(&self) -> SystemTime;

    /// Estimated fraction (`0.0..=1.0`) of the fragment's data covered by
    /// tombstones that may be purged when everything deleted before
    /// `gc_before` is eligible for collection.
    fn estimate_droppable_tombstone_ratio(&self, gc_before: SystemTime) -> f64;

    /// Schema the fragment was written with.
    fn schema(&self) -> &Schema;
}

/// Shared handle to an externally-owned fragment.
pub type SharedSstable = Arc<dyn Sstable>;

// ------------------------------------------------------------------------------------------------
// Droppable tombstone estimation
// ------------------------------------------------------------------------------------------------

/// Histogram of tombstone drop times, in whole seconds since the Unix epoch.
///
/// A tombstone whose drop time is before `gc_before` is droppable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropTimeHistogram {
    bins: BTreeMap<u64, u64>,
}

impl DropTimeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `count` tombstones that become droppable at `drop_time`.
    pub fn record(&mut self, drop_time: SystemTime, count: u64) {
        *self.bins.entry(epoch_secs(drop_time)).or_default() += count;
    }

    /// Number of tombstones whose drop time is strictly before `gc_before`.
    pub fn droppable_before(&self, gc_before: SystemTime) -> u64 {
        self.bins.range(..epoch_secs(gc_before)).map(|(_, n)| *n).sum()
    }

    pub fn total(&self) -> u64 {
        self.bins.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

// ------------------------------------------------------------------------------------------------
// In-memory fragment description
// ------------------------------------------------------------------------------------------------

/// Plain in-memory [`Sstable`] implementation.
///
/// The write time defaults to the Unix epoch, i.e. old enough for any
/// tombstone compaction interval, and the fragment carries no tombstones
/// until [`with_tombstones`](Self::with_tombstones) is called.
#[derive(Debug, Clone)]
pub struct SstableMetadata {
    generation: u64,
    run_id: RunId,
    data_size: u64,
    first_key: DecoratedKey,
    last_key: DecoratedKey,
    write_time: SystemTime,
    estimated_cells: u64,
    drop_times: DropTimeHistogram,
    schema: Arc<Schema>,
}

impl SstableMetadata {
    pub fn new(generation: u64, run_id: RunId, data_size: u64, schema: Arc<Schema>) -> Self {
        Self {
            generation,
            run_id,
            data_size,
            first_key: DecoratedKey::default(),
            last_key: DecoratedKey::default(),
            write_time: UNIX_EPOCH,
            estimated_cells: 0,
            drop_times: DropTimeHistogram::default(),
            schema,
        }
    }

    pub fn with_keys(mut self, first: DecoratedKey, last: DecoratedKey) -> Self {
        self.first_key = first;
        self.last_key = last;
        self
    }

    pub fn with_write_time(mut self, write_time: SystemTime) -> Self {
        self.write_time = write_time;
        self
    }

    /// Attaches tombstone statistics: the estimated number of cells in the
    /// fragment and the drop-time histogram of its tombstones.
    pub fn with_tombstones(mut self, estimated_cells: u64, drop_times: DropTimeHistogram) -> Self {
        self.estimated_cells = estimated_cells;
        self.drop_times = drop_times;
        self
    }

    pub fn into_shared(self) -> SharedSstable {
        Arc::new(self)
    }
}

impl Sstable for SstableMetadata {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn run_id(&self) -> RunId {
        self.run_id
    }

    fn data_size(&self) -> u64 {
        self.data_size
    }

    fn first_key(&self) -> &DecoratedKey {
        &self.first_key
    }

    fn last_key(&self) -> &DecoratedKey {
        &self.last_key
    }

    fn data_file_write_time(&self) -> SystemTime {
        self.write_time
    }

    fn estimate_droppable_tombstone_ratio(&self, gc_before: SystemTime) -> f64 {
        if self.estimated_cells == 0 {
            return 0.0;
        }
        let droppable = self.drop_times.droppable_before(gc_before) as f64;
        (droppable / self.estimated_cells as f64).clamp(0.0, 1.0)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
