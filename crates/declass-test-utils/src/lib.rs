//! Testing utilities for the declass workspace
//!
//! Shared test doubles, fixtures, and assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::Utc;
use declass_scene::{CatalogScene, ChangeEvent, Dataset, Fingerprint, Footprint, SceneId, SceneRecord};
use declass_store::{
    MemoryStore, SceneScan, SceneStore, StoreError, StoreResult, StoreStats, UpsertSummary,
};
use declass_sync::{
    AdapterError, CatalogAdapter, EventSink, PageToken, RetryPolicy, ScenePage, SearchScope,
    SinkError, SyncConfig,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn square_footprint(lon: f64, lat: f64) -> Footprint {
    Footprint::new(vec![
        [lon, lat],
        [lon + 1.0, lat],
        [lon + 1.0, lat + 1.0],
        [lon, lat + 1.0],
    ])
    .unwrap()
}

/// Scene with geometry and a thumbnail
pub fn scene(id: &str, available: bool) -> CatalogScene {
    CatalogScene::new(id, format!("{id}-D"))
        .with_available(available)
        .with_footprint(Some(square_footprint(10.0, 20.0)))
        .with_thumbnail(format!("https://ims.example/browse/{id}.jpg"))
}

/// Scene with neither geometry nor thumbnail
pub fn bare_scene(id: &str, available: bool) -> CatalogScene {
    CatalogScene::new(id, format!("{id}-D")).with_available(available)
}

pub fn record(dataset: Dataset, id: &str, available: bool) -> SceneRecord {
    SceneRecord::observe(dataset, scene(id, available), None, Utc::now())
}

/// Engine config that never sleeps between retries
pub fn test_config(page_size: usize) -> SyncConfig {
    SyncConfig::new()
        .with_page_size(page_size)
        .with_max_pages(1_000)
        .with_retry(RetryPolicy::default().with_max_attempts(3).with_backoff(0, 0))
}

/// Comparable store content, ignoring timestamps
pub fn store_content(store: &dyn SceneStore) -> Vec<(String, Dataset, bool, Fingerprint)> {
    store
        .scan_all(None)
        .unwrap()
        .map(|r| (r.scene_id.to_string(), r.dataset, r.available, r.fingerprint))
        .collect()
}

#[derive(Debug, Default)]
struct CatalogState {
    scenes: BTreeMap<Dataset, Vec<CatalogScene>>,
    dataset_failures: BTreeMap<Dataset, AdapterError>,
    fail_after_pages: Option<(usize, AdapterError)>,
    transient_failures: usize,
    status_overrides: HashMap<SceneId, Result<bool, AdapterError>>,
    pages_served: usize,
    search_calls: usize,
    status_calls: usize,
    scopes: Vec<(Dataset, SearchScope)>,
}

/// Scripted catalog
///
/// Serves each dataset's scene list in order, sliced into pages by offset.
/// The `Available` scope filters to downloadable scenes. Duplicate ids in a
/// list are served as-is.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    state: Mutex<CatalogState>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_scenes(self, dataset: Dataset, scenes: Vec<CatalogScene>) -> Self {
        self.set_scenes(dataset, scenes);
        self
    }

    /// Replace what the catalog holds for `dataset`
    pub fn set_scenes(&self, dataset: Dataset, scenes: Vec<CatalogScene>) {
        self.state.lock().scenes.insert(dataset, scenes);
    }

    /// Every search of `dataset` fails with `error`
    pub fn fail_dataset(&self, dataset: Dataset, error: AdapterError) {
        self.state.lock().dataset_failures.insert(dataset, error);
    }

    /// Searches fail with `error` once `pages` pages have been served in total
    pub fn fail_after_pages(&self, pages: usize, error: AdapterError) {
        self.state.lock().fail_after_pages = Some((pages, error));
    }

    /// The next `times` searches fail transiently
    pub fn fail_transiently(&self, times: usize) {
        self.state.lock().transient_failures = times;
    }

    /// Fix the download status answer for one scene
    pub fn set_status(&self, scene_id: &str, answer: Result<bool, AdapterError>) {
        self.state
            .lock()
            .status_overrides
            .insert(SceneId::new(scene_id), answer);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.dataset_failures.clear();
        state.fail_after_pages = None;
        state.transient_failures = 0;
        state.status_overrides.clear();
    }

    pub fn search_calls(&self) -> usize {
        self.state.lock().search_calls
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().status_calls
    }

    pub fn pages_served(&self) -> usize {
        self.state.lock().pages_served
    }

    /// `(dataset, scope)` of every search call, in order
    pub fn scopes_requested(&self) -> Vec<(Dataset, SearchScope)> {
        self.state.lock().scopes.clone()
    }
}

#[async_trait]
impl CatalogAdapter for FakeCatalog {
    async fn search(
        &self,
        dataset: Dataset,
        scope: SearchScope,
        page_size: usize,
        token: Option<&PageToken>,
    ) -> Result<ScenePage, AdapterError> {
        let mut state = self.state.lock();
        state.search_calls += 1;
        state.scopes.push((dataset, scope));

        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(AdapterError::transient("scripted transient failure"));
        }
        if let Some(error) = state.dataset_failures.get(&dataset) {
            return Err(error.clone());
        }
        if let Some((limit, error)) = &state.fail_after_pages {
            if state.pages_served >= *limit {
                return Err(error.clone());
            }
        }

        let offset = match token {
            None => 0,
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .map_err(|_| AdapterError::fatal(format!("bad page token {}", token.as_str())))?,
        };
        let (page, total) = {
            let matching: Vec<&CatalogScene> = state
                .scenes
                .get(&dataset)
                .map(|scenes| {
                    scenes
                        .iter()
                        .filter(|s| scope == SearchScope::All || s.available)
                        .collect()
                })
                .unwrap_or_default();
            let page: Vec<CatalogScene> = matching
                .iter()
                .skip(offset)
                .take(page_size)
                .map(|s| (*s).clone())
                .collect();
            (page, matching.len())
        };

        state.pages_served += 1;
        let end = offset + page.len();
        let next = (end < total).then(|| PageToken::new(end.to_string()));
        Ok(ScenePage::new(page, next))
    }

    async fn get_download_status(
        &self,
        dataset: Dataset,
        scene_id: &SceneId,
    ) -> Result<bool, AdapterError> {
        let mut state = self.state.lock();
        state.status_calls += 1;
        if let Some(answer) = state.status_overrides.get(scene_id) {
            return answer.clone();
        }
        // A scene the catalog no longer lists has no download options
        Ok(state
            .scenes
            .get(&dataset)
            .and_then(|scenes| scenes.iter().rev().find(|s| &s.scene_id == scene_id))
            .is_some_and(|s| s.available))
    }
}

/// Sink that keeps every published batch in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChangeEvent>>,
    batches: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, events: &[ChangeEvent]) -> Result<(), SinkError> {
        self.events.lock().extend_from_slice(events);
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that always fails
#[derive(Debug, Default)]
pub struct BrokenSink;

impl EventSink for BrokenSink {
    fn publish(&self, _events: &[ChangeEvent]) -> Result<(), SinkError> {
        Err(SinkError::Io {
            path: "unreachable-sink".into(),
            source: std::io::Error::other("sink offline"),
        })
    }
}

/// [`MemoryStore`] whose writes start failing after a set number of batches
#[derive(Debug)]
pub struct FlakyStore {
    inner: MemoryStore,
    writes_left: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_after(batches: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            writes_left: AtomicUsize::new(batches),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn take_write(&self) -> StoreResult<()> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StoreError::io_error("flaky-store", std::io::Error::other("disk full")))
    }
}

impl SceneStore for FlakyStore {
    fn get(&self, scene_id: &SceneId) -> StoreResult<Option<SceneRecord>> {
        self.inner.get(scene_id)
    }

    fn upsert_batch(&self, records: Vec<SceneRecord>) -> StoreResult<UpsertSummary> {
        self.take_write()?;
        self.inner.upsert_batch(records)
    }

    fn scan_available(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        self.inner.scan_available(dataset)
    }

    fn scan_all(&self, dataset: Option<Dataset>) -> StoreResult<SceneScan> {
        self.inner.scan_all(dataset)
    }

    fn available_ids(&self, dataset: Dataset) -> StoreResult<BTreeSet<SceneId>> {
        self.inner.available_ids(dataset)
    }

    fn is_seeded(&self, dataset: Dataset) -> StoreResult<bool> {
        self.inner.is_seeded(dataset)
    }

    fn mark_seeded(&self, dataset: Dataset) -> StoreResult<()> {
        self.inner.mark_seeded(dataset)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        self.inner.stats()
    }
}
