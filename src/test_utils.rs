//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

use crate::clock::Clock;
use crate::compaction::{StrategyControl, TableState};
use crate::sstable::{
    DecoratedKey, DropTimeHistogram, RunId, Schema, SharedSstable, SstableMetadata, SstableSet,
};

pub const MIB: u64 = 1024 * 1024;

/// Cells recorded by [`make_tombstoned_sstable`]; ratios are expressed
/// against this.
pub const TOMBSTONED_CELLS: u64 = 1000;

const DAY: Duration = Duration::from_secs(86_400);

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

pub fn test_schema() -> Arc<Schema> {
    Arc::new(Schema::new("ks", "cf"))
}

/// A point in time far enough from the epoch for every default interval.
pub fn test_now() -> SystemTime {
    UNIX_EPOCH + DAY * 1000
}

/// One fragment of `size` bytes belonging to `run_id`.
pub fn make_sstable(run_id: RunId, size: u64) -> SharedSstable {
    SstableMetadata::new(next_generation(), run_id, size, test_schema()).into_shared()
}

/// A single-fragment run of `size` bytes with a fresh run id.
pub fn make_run_sstable(size: u64) -> SharedSstable {
    make_sstable(RunId::generate(), size)
}

/// A fragment covering tokens `first..=last`.
pub fn make_keyed_sstable(run_id: RunId, size: u64, first: i64, last: i64) -> SharedSstable {
    SstableMetadata::new(next_generation(), run_id, size, test_schema())
        .with_keys(
            DecoratedKey::new(first, first.to_be_bytes()),
            DecoratedKey::new(last, last.to_be_bytes()),
        )
        .into_shared()
}

/// A single-fragment run written at `write_time` whose droppable tombstone
/// ratio is `droppable / TOMBSTONED_CELLS` for any `gc_before` after the
/// first day past the epoch.
pub fn make_tombstoned_sstable(size: u64, write_time: SystemTime, droppable: u64) -> SharedSstable {
    let mut histogram = DropTimeHistogram::new();
    histogram.record(UNIX_EPOCH + DAY, droppable);
    SstableMetadata::new(next_generation(), RunId::generate(), size, test_schema())
        .with_write_time(write_time)
        .with_tombstones(TOMBSTONED_CELLS, histogram)
        .into_shared()
}

/// Single-fragment runs of the given sizes, in MiB.
pub fn runs_of_mib(sizes: &[u64]) -> Vec<SharedSstable> {
    sizes.iter().map(|s| make_run_sstable(s * MIB)).collect()
}

// ------------------------------------------------------------------------------------------------
// Collaborators
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub SystemTime);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct FakeTable {
    pub schema: Schema,
    pub set: SstableSet,
    pub min_threshold: Option<usize>,
    pub enforce_min_threshold: bool,
}

impl FakeTable {
    pub fn new(sstables: Vec<SharedSstable>) -> Self {
        Self {
            schema: (*test_schema()).clone(),
            set: SstableSet::new(sstables),
            min_threshold: None,
            enforce_min_threshold: false,
        }
    }
}

impl TableState for FakeTable {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn min_compaction_threshold(&self) -> usize {
        self.min_threshold
            .unwrap_or(self.schema.min_compaction_threshold)
    }

    fn compaction_enforce_min_threshold(&self) -> bool {
        self.enforce_min_threshold
    }

    fn main_sstable_set(&self) -> SstableSet {
        self.set.clone()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FakeControl {
    pub ongoing: bool,
}

impl StrategyControl for FakeControl {
    fn has_ongoing_compaction(&self, _table: &dyn TableState) -> bool {
        self.ongoing
    }
}
