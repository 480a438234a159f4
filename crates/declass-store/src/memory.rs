//! In-memory scene store

use crate::error::StoreResult;
use crate::state::{ScanFilter, SceneScan, StoreOp, StoreState};
use crate::{SceneStore, StoreStats, UpsertSummary};
use declass_scene::{Dataset, SceneId, SceneRecord};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scene store held entirely in memory
///
/// Same semantics as [`crate::JournalStore`] without durability. Counts
/// committed write batches so tests can assert that a run wrote nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
    commits: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches that changed state
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Copy of every stored record, in id order
    #[must_use]
    pub fn records(&self) -> Vec<SceneRecord> {
        self.state.read().scenes.values().cloned().collect()
    }

    fn commit(&self, state: &mut StoreState, ops: Vec<StoreOp>) {
        if ops.is_empty() {
            return;
        }
        state.apply(ops);
        self.commits.fetch_add(1, Ordering::SeqCst);
    }
}

impl SceneStore for MemoryStore {
    fn get(&self, scene_id: &SceneId) -> StoreResult<Option<SceneRecord>> {
        Ok(self.state.read().scenes.get(scene_id).cloned())
    }

    fn upsert_batch(&self, records: Vec<SceneRecord>) -> StoreResult<UpsertSummary> {
        let mut state = self.state.write();
        let (ops, summary) = state.plan_upsert(records)?;
        self.commit(&mut state, ops);
        Ok(summary)
    }

    fn scan_available(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        Ok(SceneScan::new(
            Arc::clone(&self.state),
            dataset,
            ScanFilter::Available,
        ))
    }

    fn scan_all(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        Ok(SceneScan::new(Arc::clone(&self.state), dataset, ScanFilter::All))
    }

    fn available_ids(&self, dataset: Dataset) -> StoreResult<BTreeSet<SceneId>> {
        Ok(self.state.read().available_ids(dataset))
    }

    fn is_seeded(&self, dataset: Dataset) -> StoreResult<bool> {
        Ok(self.state.read().seeded.contains(&dataset))
    }

    fn mark_seeded(&self, dataset: Dataset) -> StoreResult<()> {
        let mut state = self.state.write();
        if !state.seeded.contains(&dataset) {
            self.commit(&mut state, vec![StoreOp::MarkSeeded { dataset }]);
        }
        Ok(())
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        Ok(self.state.read().stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use declass_scene::CatalogScene;

    fn record(id: &str, available: bool) -> SceneRecord {
        SceneRecord::observe(
            Dataset::DeclassII,
            CatalogScene::new(id, id).with_available(available),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn unchanged_batch_is_not_committed() {
        let store = MemoryStore::new();
        let batch = vec![record("A", true), record("B", false)];

        let first = store.upsert_batch(batch.clone()).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(store.commit_count(), 1);

        let second = store.upsert_batch(batch).unwrap();
        assert_eq!(second.writes(), 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn scan_available_is_restartable() {
        let store = MemoryStore::new();
        store
            .upsert_batch(vec![record("A", true), record("B", false), record("C", true)])
            .unwrap();

        let first: Vec<_> = store.scan_available(None).unwrap().map(|r| r.scene_id).collect();
        let second: Vec<_> = store.scan_available(None).unwrap().map(|r| r.scene_id).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn mark_seeded_is_idempotent() {
        let store = MemoryStore::new();
        assert!(!store.is_seeded(Dataset::DeclassI).unwrap());
        store.mark_seeded(Dataset::DeclassI).unwrap();
        store.mark_seeded(Dataset::DeclassI).unwrap();
        assert!(store.is_seeded(Dataset::DeclassI).unwrap());
        assert_eq!(store.commit_count(), 1);
    }
}
