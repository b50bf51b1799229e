//! # AeternusDB ICS
//!
//! Job selection and backlog scoring of the **Incremental Compaction
//! Strategy** for LSM-tree storage engines. The crate decides which sorted
//! runs of a table should be merged next and how urgent that work is
//! compared to other tables; it never reads or writes data itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use aeternusdb_ics::compaction::{
//!     CompactionStrategy, CompactionStrategyType, OptionMap, StrategyControl, TableState,
//! };
//! use aeternusdb_ics::sstable::{RunId, Schema, SharedSstable, SstableMetadata, SstableSet};
//!
//! struct Table {
//!     schema: Schema,
//!     set: SstableSet,
//! }
//!
//! impl TableState for Table {
//!     fn schema(&self) -> &Schema {
//!         &self.schema
//!     }
//!     fn main_sstable_set(&self) -> SstableSet {
//!         self.set.clone()
//!     }
//! }
//!
//! struct Idle;
//!
//! impl StrategyControl for Idle {
//!     fn has_ongoing_compaction(&self, _table: &dyn TableState) -> bool {
//!         false
//!     }
//! }
//!
//! let schema = Arc::new(Schema::new("ks", "events"));
//! let sstables: Vec<SharedSstable> = (0..4)
//!     .map(|i| SstableMetadata::new(i, RunId::new(i), 1 << 20, schema.clone()).into_shared())
//!     .collect();
//! let table = Table {
//!     schema: (*schema).clone(),
//!     set: SstableSet::new(sstables.clone()),
//! };
//!
//! let strategy = CompactionStrategyType::from_name("IncrementalCompactionStrategy")
//!     .unwrap()
//!     .make_strategy(&OptionMap::new())
//!     .unwrap();
//!
//! let job = strategy
//!     .get_sstables_for_compaction(&table, &Idle, sstables)
//!     .unwrap();
//! assert_eq!(job.fan_in(), 4);
//! ```
//!
//! ## Features
//!
//! - **Size-tiered selection over runs**: similarly sized runs are merged
//!   together, cheapest tier first.
//! - **Tombstone garbage collection**: tiers with enough droppable tombstones
//!   are pushed towards the largest tier so their tombstones can be purged.
//! - **Space-amplification control**: the two largest tiers are merged when
//!   they hold too much duplicated data.
//! - **Reshape and cleanup**: ingested data is consolidated in key order.
//! - **Backlog scoring**: a per-table estimate of the write amplification
//!   still owed, for cross-table scheduling.

pub mod clock;
pub mod compaction;
pub mod sstable;

#[cfg(test)]
pub(crate) mod test_utils;

pub use clock::{Clock, SystemClock};
pub use compaction::{
    BacklogTracker, CompactionDescriptor, CompactionError, CompactionStrategy,
    CompactionStrategyType, IncrementalCompactionStrategy,
};
pub use sstable::{RunId, Schema, SharedSstable, Sstable, SstableRun, SstableSet};
