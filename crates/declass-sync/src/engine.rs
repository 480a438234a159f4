//! The synchronization engine
//!
//! One run walks the requested datasets in order. For each dataset it pages
//! through the catalog, classifies every observed scene against the stored
//! record, and commits each page as a single store batch before asking for
//! the next one. Change events for a page are released only after that
//! page's batch commits.
//!
//! There is no durable page cursor. An interrupted run is resumed by running
//! again; re-processing committed pages is a no-op because unchanged
//! fingerprints are never rewritten.

use crate::adapter::{CatalogAdapter, PageToken, SearchScope};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::report::{DataIntegrityWarning, DatasetReport, DatasetStatus, SyncReport};
use crate::retry::with_retry;
use crate::sink::EventSink;
use chrono::Utc;
use declass_scene::{CatalogScene, ChangeEvent, Dataset, RunId, SceneId, SceneRecord, Transition};
use declass_store::{SceneStore, StoreError};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a run should cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    datasets: Vec<Dataset>,
    /// Scan every scene even for datasets that were seeded before
    pub full_rescan: bool,
}

impl SyncRequest {
    /// Request for the given datasets; empty means all of them
    #[must_use]
    pub fn new(datasets: impl IntoIterator<Item = Dataset>) -> Self {
        let mut unique = Vec::new();
        for dataset in datasets {
            if !unique.contains(&dataset) {
                unique.push(dataset);
            }
        }
        Self {
            datasets: unique,
            full_rescan: false,
        }
    }

    /// Request covering every dataset
    #[must_use]
    pub fn all() -> Self {
        Self::new(Dataset::ALL)
    }

    #[must_use]
    pub fn with_full_rescan(mut self, full_rescan: bool) -> Self {
        self.full_rescan = full_rescan;
        self
    }

    /// Datasets in processing order
    #[must_use]
    pub fn datasets(&self) -> &[Dataset] {
        if self.datasets.is_empty() {
            &Dataset::ALL
        } else {
            &self.datasets
        }
    }
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self::all()
    }
}

/// Scene synchronization engine
pub struct SyncEngine {
    config: SyncConfig,
    adapter: Arc<dyn CatalogAdapter>,
    store: Arc<dyn SceneStore>,
    sink: Option<Arc<dyn EventSink>>,
}

/// Per-dataset working state for one run
struct Pass<'a> {
    run_id: RunId,
    dataset: Dataset,
    report: DatasetReport,
    /// Ids observed by the catalog scan in this run
    seen: HashSet<SceneId>,
    events: &'a mut Vec<ChangeEvent>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        config: SyncConfig,
        adapter: Arc<dyn CatalogAdapter>,
        store: Arc<dyn SceneStore>,
    ) -> Self {
        Self {
            config,
            adapter,
            store,
            sink: None,
        }
    }

    /// Publish committed change events to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Reconcile the store against the catalog for every requested dataset
    ///
    /// Catalog failures are contained to their dataset and recorded in the
    /// report; the remaining datasets are still processed.
    ///
    /// # Errors
    /// Returns [`SyncError::Store`] if the store fails. Batches committed
    /// before the failure stay committed.
    #[tracing::instrument(
        name = "sync_run",
        skip_all,
        fields(run_id = tracing::field::Empty, full_rescan = request.full_rescan)
    )]
    pub async fn run(&self, request: &SyncRequest) -> Result<SyncReport, SyncError> {
        self.config.validate()?;
        let run_id = RunId::new();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let started_at = Utc::now();
        let mut events = Vec::new();
        let mut datasets = Vec::with_capacity(request.datasets().len());

        for &dataset in request.datasets() {
            let report = self
                .sync_dataset(run_id, dataset, request.full_rescan, &mut events)
                .await
                .map_err(|e| {
                    error!(%dataset, error = %e, "store failed, aborting run");
                    SyncError::from(e)
                })?;
            datasets.push(report);
        }

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            datasets,
            events,
        };
        info!(
            events = report.events.len(),
            failed = report.datasets.iter().filter(|d| d.is_failed()).count(),
            "sync run finished"
        );
        Ok(report)
    }

    async fn sync_dataset(
        &self,
        run_id: RunId,
        dataset: Dataset,
        full_rescan: bool,
        events: &mut Vec<ChangeEvent>,
    ) -> Result<DatasetReport, StoreError> {
        let scope = if full_rescan || !self.store.is_seeded(dataset)? {
            SearchScope::All
        } else {
            SearchScope::Available
        };
        info!(%dataset, %scope, "syncing dataset");

        let mut pass = Pass {
            run_id,
            dataset,
            report: DatasetReport::new(dataset, scope),
            seen: HashSet::new(),
            events,
        };

        let mut token: Option<PageToken> = None;
        loop {
            let adapter = &self.adapter;
            let page_size = self.config.page_size;
            let current = token.as_ref();
            let fetched = with_retry(&self.config.retry, "catalog search", move || {
                adapter.search(dataset, scope, page_size, current)
            })
            .await;

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    error!(%dataset, page = pass.report.pages + 1, error = %e, "catalog search failed");
                    pass.report.status = DatasetStatus::Failed(e.to_string());
                    return Ok(pass.report);
                }
            };

            pass.report.pages += 1;
            info!(
                %dataset,
                page = pass.report.pages,
                scenes = page.scenes.len(),
                "fetched catalog page"
            );
            self.apply_page(&mut pass, page.scenes)?;

            match page.next {
                None => break,
                Some(_) if pass.report.pages >= self.config.max_pages => {
                    warn!(
                        %dataset,
                        max_pages = self.config.max_pages,
                        "page limit reached before end of catalog"
                    );
                    pass.report.status = DatasetStatus::PageLimitReached;
                    return Ok(pass.report);
                }
                Some(next) => token = Some(next),
            }
        }

        match scope {
            SearchScope::Available => self.verify_unseen(&mut pass).await?,
            SearchScope::All => {
                self.store.mark_seeded(dataset)?;
                info!(%dataset, "dataset seeded");
            }
        }

        info!(
            %dataset,
            status = ?pass.report.status,
            changes = pass.report.transitions.changes(),
            written = pass.report.writes.writes(),
            warnings = pass.report.warnings.len(),
            "dataset finished"
        );
        Ok(pass.report)
    }

    /// Classify one page against the store and commit it as one batch
    fn apply_page(&self, pass: &mut Pass<'_>, scenes: Vec<CatalogScene>) -> Result<(), StoreError> {
        let received = scenes.len();
        let mut latest: IndexMap<SceneId, CatalogScene> = IndexMap::with_capacity(received);
        for scene in scenes {
            latest.insert(scene.scene_id.clone(), scene);
        }
        pass.report.scenes_seen += received;
        pass.report.duplicates += received - latest.len();

        let now = Utc::now();
        let mut batch = Vec::with_capacity(latest.len());
        let mut pending = Vec::new();

        for (scene_id, scene) in latest {
            let previous = self.store.get(&scene_id)?;
            if let Some(stored) = previous.as_ref().filter(|p| p.dataset != pass.dataset) {
                warn!(
                    %scene_id,
                    stored = %stored.dataset,
                    observed = %pass.dataset,
                    "scene already stored under another dataset, skipping"
                );
                pass.report.conflicts += 1;
                continue;
            }

            pass.seen.insert(scene_id);
            let transition = Transition::classify(previous.as_ref(), scene.available);
            pass.report.transitions.record(transition);

            let fingerprint = scene.fingerprint();
            if let Some(stored) = previous.as_ref().filter(|p| p.fingerprint == fingerprint) {
                if stored.is_degraded() {
                    pass.integrity_warning(stored);
                }
                continue;
            }

            let record = SceneRecord::observe(pass.dataset, scene, previous.as_ref(), now);
            if record.is_degraded() {
                pass.integrity_warning(&record);
            }
            if transition.is_change() {
                pending.push(ChangeEvent::for_record(pass.run_id, &record, transition));
            } else {
                pass.report.metadata_refreshed += 1;
            }
            batch.push(record);
        }

        self.commit(pass, batch, pending)
    }

    /// Check stored-available scenes the incremental scan did not return
    ///
    /// Only an explicit "not downloadable" answer flips a record. Errors
    /// leave records untouched and fail the dataset.
    async fn verify_unseen(&self, pass: &mut Pass<'_>) -> Result<(), StoreError> {
        let dataset = pass.dataset;
        let mut batch = Vec::new();
        let mut pending = Vec::new();

        let unseen: Vec<SceneId> = self
            .store
            .available_ids(dataset)?
            .into_iter()
            .filter(|id| !pass.seen.contains(id))
            .collect();

        for scene_id in &unseen {
            let Some(record) = self.store.get(scene_id)? else {
                continue;
            };
            pass.report.verified += 1;

            let adapter = &self.adapter;
            let status = with_retry(&self.config.retry, "download status check", move || {
                adapter.get_download_status(dataset, scene_id)
            })
            .await;

            match status {
                Ok(true) => {
                    debug!(%scene_id, "still downloadable");
                }
                Ok(false) => {
                    let flipped = record.with_availability(false, Utc::now());
                    pass.report.transitions.record(Transition::BecameUnavailable);
                    pending.push(ChangeEvent::for_record(
                        pass.run_id,
                        &flipped,
                        Transition::BecameUnavailable,
                    ));
                    batch.push(flipped);
                    if batch.len() >= self.config.page_size {
                        self.commit(pass, std::mem::take(&mut batch), std::mem::take(&mut pending))?;
                    }
                }
                Err(e) => {
                    error!(%dataset, %scene_id, error = %e, "download status check failed");
                    self.commit(pass, batch, pending)?;
                    pass.report.status = DatasetStatus::Failed(e.to_string());
                    return Ok(());
                }
            }
        }

        self.commit(pass, batch, pending)
    }

    /// Flush a batch, then release its events
    fn commit(
        &self,
        pass: &mut Pass<'_>,
        batch: Vec<SceneRecord>,
        pending: Vec<ChangeEvent>,
    ) -> Result<(), StoreError> {
        if !batch.is_empty() {
            let size = batch.len();
            let summary = self.store.upsert_batch(batch)?;
            debug!(
                dataset = %pass.dataset,
                size,
                inserted = summary.inserted,
                updated = summary.updated,
                "flushed batch"
            );
            pass.report.writes.absorb(summary);
        }

        if pending.is_empty() {
            return Ok(());
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.publish(&pending) {
                warn!(error = %e, events = pending.len(), "failed to publish change events");
            }
        }
        pass.events.extend(pending);
        Ok(())
    }
}

impl Pass<'_> {
    fn integrity_warning(&mut self, record: &SceneRecord) {
        let warning = DataIntegrityWarning::missing_footprint(record);
        warn!(
            scene_id = %warning.scene_id,
            display_id = %warning.display_id,
            dataset = %warning.dataset,
            "available scene has no footprint"
        );
        self.report.warnings.push(warning);
    }
}
