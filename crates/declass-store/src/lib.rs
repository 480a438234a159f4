//! Declass Scene Store
//!
//! Durable record of every scene ever observed, keyed by [`SceneId`].
//!
//! # Core Concepts
//!
//! - [`SceneStore`]: persistence contract used by the sync engine and the export
//! - [`MemoryStore`]: in-memory implementation for tests and dry runs
//! - [`JournalStore`]: on-disk implementation (snapshot + append-only journal)
//! - [`SceneScan`]: lazy, restartable scan over stored records
//!
//! Every `upsert_batch` is atomic: after a crash the store holds either all
//! of a batch or none of it.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod journal;
mod memory;
mod state;

pub use error::{StoreError, StoreResult};
pub use journal::{JournalOptions, JournalStore};
pub use memory::MemoryStore;
pub use state::{ScanFilter, SceneScan};

use declass_scene::{Dataset, SceneId, SceneRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Persistence contract for scene records
///
/// Implementations must make each `upsert_batch` and `mark_seeded` call
/// atomic and must never drop a record on their own.
pub trait SceneStore: Send + Sync {
    /// Point lookup
    fn get(&self, scene_id: &SceneId) -> StoreResult<Option<SceneRecord>>;

    /// Insert new records and replace records whose fingerprint differs
    ///
    /// Records whose fingerprint matches the stored one are not written.
    /// Duplicate ids within a batch resolve to the later record.
    fn upsert_batch(&self, records: Vec<SceneRecord>) -> StoreResult<UpsertSummary>;

    /// Lazy scan over records currently marked available
    fn scan_available(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan>;

    /// Lazy scan over every record
    fn scan_all(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan>;

    /// Ids of records of `dataset` currently marked available
    fn available_ids(&self, dataset: Dataset) -> StoreResult<BTreeSet<SceneId>>;

    /// Whether a full catalog scan of `dataset` has completed before
    fn is_seeded(&self, dataset: Dataset) -> StoreResult<bool>;

    /// Record that a full catalog scan of `dataset` completed
    fn mark_seeded(&self, dataset: Dataset) -> StoreResult<()>;

    /// Per-dataset record counts
    fn stats(&self) -> StoreResult<StoreStats>;
}

/// Outcome of one `upsert_batch` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertSummary {
    /// Number of records actually written
    #[inline]
    #[must_use]
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }

    /// Accumulate another batch's counts
    pub fn absorb(&mut self, other: UpsertSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// Record counts for one dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStats {
    pub total: usize,
    pub available: usize,
    /// Available records with no footprint
    pub degraded: usize,
}

/// Store-wide counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub datasets: BTreeMap<Dataset, DatasetStats>,
    pub seeded: BTreeSet<Dataset>,
}

impl StoreStats {
    /// Total records across datasets
    #[must_use]
    pub fn total(&self) -> usize {
        self.datasets.values().map(|d| d.total).sum()
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
