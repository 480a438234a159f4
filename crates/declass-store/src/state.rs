//! In-memory store state shared by every store implementation
//!
//! Implementations differ only in how a batch becomes durable; planning,
//! applying and scanning live here.

use crate::error::{StoreError, StoreResult};
use crate::{DatasetStats, StoreStats, UpsertSummary};
use declass_scene::{Dataset, SceneId, SceneRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

/// Records handed out per read-lock acquisition while scanning
const SCAN_CHUNK: usize = 256;

/// One durable mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum StoreOp {
    Upsert { record: SceneRecord },
    MarkSeeded { dataset: Dataset },
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoreState {
    pub(crate) scenes: BTreeMap<SceneId, SceneRecord>,
    #[serde(default)]
    pub(crate) seeded: BTreeSet<Dataset>,
}

impl StoreState {
    /// Work out which records of a batch actually need writing
    ///
    /// Duplicate ids inside the batch resolve to the later record. Records
    /// whose fingerprint matches the stored one are dropped.
    pub(crate) fn plan_upsert(
        &self,
        records: Vec<SceneRecord>,
    ) -> StoreResult<(Vec<StoreOp>, UpsertSummary)> {
        let mut latest: BTreeMap<SceneId, SceneRecord> = BTreeMap::new();
        for record in records {
            latest.insert(record.scene_id.clone(), record);
        }

        let mut summary = UpsertSummary::default();
        let mut ops = Vec::new();
        for (id, record) in latest {
            match self.scenes.get(&id) {
                None => {
                    summary.inserted += 1;
                    ops.push(StoreOp::Upsert { record });
                }
                Some(stored) if stored.dataset != record.dataset => {
                    return Err(StoreError::DatasetConflict {
                        scene_id: id,
                        stored: stored.dataset,
                        incoming: record.dataset,
                    });
                }
                Some(stored) if stored.fingerprint == record.fingerprint => {
                    summary.unchanged += 1;
                }
                Some(_) => {
                    summary.updated += 1;
                    ops.push(StoreOp::Upsert { record });
                }
            }
        }
        Ok((ops, summary))
    }

    pub(crate) fn apply(&mut self, ops: Vec<StoreOp>) {
        for op in ops {
            match op {
                StoreOp::Upsert { record } => {
                    self.scenes.insert(record.scene_id.clone(), record);
                }
                StoreOp::MarkSeeded { dataset } => {
                    self.seeded.insert(dataset);
                }
            }
        }
    }

    pub(crate) fn available_ids(&self, dataset: Dataset) -> BTreeSet<SceneId> {
        self.scenes
            .values()
            .filter(|r| r.available && r.dataset == dataset)
            .map(|r| r.scene_id.clone())
            .collect()
    }

    pub(crate) fn stats(&self) -> StoreStats {
        let mut datasets: BTreeMap<Dataset, DatasetStats> = Dataset::ALL
            .into_iter()
            .map(|d| (d, DatasetStats::default()))
            .collect();
        for record in self.scenes.values() {
            let entry = datasets.entry(record.dataset).or_default();
            entry.total += 1;
            if record.available {
                entry.available += 1;
            }
            if record.is_degraded() {
                entry.degraded += 1;
            }
        }
        StoreStats {
            datasets,
            seeded: self.seeded.clone(),
        }
    }
}

/// Which records a [`SceneScan`] yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFilter {
    /// Every stored record
    All,
    /// Only records currently marked available
    Available,
}

/// Lazy, finite scan over stored records in `scene_id` order
///
/// Reads the shared state in small chunks, releasing the read lock between
/// chunks. Calling the store's scan method again starts a fresh scan.
#[derive(Debug)]
pub struct SceneScan {
    state: Arc<RwLock<StoreState>>,
    dataset: Option<Dataset>,
    filter: ScanFilter,
    cursor: Option<SceneId>,
    buffer: std::vec::IntoIter<SceneRecord>,
    exhausted: bool,
}

impl SceneScan {
    pub(crate) fn new(
        state: Arc<RwLock<StoreState>>,
        dataset: Option<Dataset>,
        filter: ScanFilter,
    ) -> Self {
        Self {
            state,
            dataset,
            filter,
            cursor: None,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    fn matches(&self, record: &SceneRecord) -> bool {
        let dataset_ok = self.dataset.map_or(true, |d| d == record.dataset);
        let filter_ok = match self.filter {
            ScanFilter::All => true,
            ScanFilter::Available => record.available,
        };
        dataset_ok && filter_ok
    }

    fn refill(&mut self) {
        let state = Arc::clone(&self.state);
        let guard = state.read();
        let range = match &self.cursor {
            Some(cursor) => guard
                .scenes
                .range::<SceneId, _>((Bound::Excluded(cursor), Bound::Unbounded)),
            None => guard.scenes.range::<SceneId, _>(..),
        };

        let mut chunk = Vec::with_capacity(SCAN_CHUNK);
        let mut last_visited = None;
        let mut full = false;
        for (id, record) in range {
            last_visited = Some(id.clone());
            if self.matches(record) {
                chunk.push(record.clone());
                if chunk.len() == SCAN_CHUNK {
                    full = true;
                    break;
                }
            }
        }

        if !full {
            self.exhausted = true;
        }
        if last_visited.is_some() {
            self.cursor = last_visited;
        }
        self.buffer = chunk.into_iter();
    }
}

impl Iterator for SceneScan {
    type Item = SceneRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(record);
            }
            if self.exhausted {
                return None;
            }
            self.refill();
        }
    }
}
