//! Subcommand bodies, independent of argument parsing and the live catalog

use crate::config::DeclassConfig;
use anyhow::Context;
use declass_export::{write_artifact, AvailabilityExport};
use declass_scene::Dataset;
use declass_store::{JournalStore, SceneStore, StoreStats};
use declass_sync::{CatalogAdapter, DatasetStatus, JsonLinesSink, SyncEngine, SyncReport, SyncRequest};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Open the configured store for a sync run
///
/// # Errors
/// Fails if the store directory cannot be created, its files are corrupt or
/// another handle has it open
pub fn open_store(config: &DeclassConfig) -> anyhow::Result<Arc<JournalStore>> {
    let store = JournalStore::open_with(&config.store_dir, config.store.journal_options())
        .with_context(|| format!("failed to open store at {}", config.store_dir.display()))?;
    Ok(Arc::new(store))
}

/// Open the configured store without modifying it
///
/// # Errors
/// Fails if the store files are corrupt or a sync run has the store open
pub fn open_store_read_only(config: &DeclassConfig) -> anyhow::Result<Arc<JournalStore>> {
    let store = JournalStore::open_read_only(&config.store_dir).with_context(|| {
        format!("failed to open store at {} read-only", config.store_dir.display())
    })?;
    Ok(Arc::new(store))
}

/// Result of `declass sync`
#[derive(Debug)]
pub struct SyncOutcome {
    pub report: SyncReport,
    /// Features written to the artifact, if it was regenerated
    pub exported: Option<usize>,
}

impl SyncOutcome {
    /// Whether the process should exit non-zero
    #[must_use]
    pub fn failed(&self) -> bool {
        self.report.has_failures()
    }
}

/// Run the engine, then regenerate the artifact from committed state
///
/// # Errors
/// Fails if the store fails during the run or the artifact cannot be written
pub async fn sync(
    config: &DeclassConfig,
    adapter: Arc<dyn CatalogAdapter>,
    request: &SyncRequest,
    regenerate: bool,
) -> anyhow::Result<SyncOutcome> {
    let store = open_store(config)?;
    let sink = Arc::new(JsonLinesSink::new(config.events_path.clone()));
    let engine = SyncEngine::new(config.sync.clone(), adapter, store.clone()).with_sink(sink);

    let report = engine.run(request).await.context("sync run aborted")?;

    let exported = if regenerate {
        Some(export(store, &BTreeSet::new(), &config.artifact_path)?)
    } else {
        None
    };
    Ok(SyncOutcome { report, exported })
}

/// Write the artifact for `datasets` (all when empty) to `output`
///
/// # Errors
/// Fails if the store cannot be scanned or the artifact cannot be written
pub fn export(
    store: Arc<dyn SceneStore>,
    datasets: &BTreeSet<Dataset>,
    output: &Path,
) -> anyhow::Result<usize> {
    let collection = AvailabilityExport::new(store)
        .export(datasets)
        .context("failed to build availability export")?;
    write_artifact(output, &collection)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        path = %output.display(),
        features = collection.len(),
        degraded = collection.degraded(),
        "artifact written"
    );
    Ok(collection.len())
}

/// Standalone export against the configured store
///
/// # Errors
/// See [`export`]
pub fn export_from_config(
    config: &DeclassConfig,
    datasets: &[Dataset],
    output: Option<PathBuf>,
) -> anyhow::Result<(PathBuf, usize)> {
    let store = open_store_read_only(config)?;
    let output = output.unwrap_or_else(|| config.artifact_path.clone());
    let selected: BTreeSet<Dataset> = config.select_datasets(datasets).into_iter().collect();
    let count = export(store, &selected, &output)?;
    Ok((output, count))
}

/// Store counts for `declass stats`
///
/// # Errors
/// Fails if the store cannot be opened
pub fn stats(config: &DeclassConfig) -> anyhow::Result<StoreStats> {
    open_store_read_only(config)?
        .stats()
        .context("failed to read store statistics")
}

/// Human-readable per-dataset run summary
#[must_use]
pub fn render_sync_summary(report: &SyncReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run {}", report.run_id);
    for dataset in &report.datasets {
        let status = match &dataset.status {
            DatasetStatus::Completed => "completed".to_string(),
            DatasetStatus::PageLimitReached => "page limit reached".to_string(),
            DatasetStatus::Failed(reason) => format!("FAILED: {reason}"),
        };
        let t = &dataset.transitions;
        let _ = writeln!(
            out,
            "  {:<11} {:<9} pages={} seen={} new_available={} new_unavailable={} \
             became_available={} became_unavailable={} verified={} warnings={} [{}]",
            dataset.dataset.to_string(),
            dataset.scope.to_string(),
            dataset.pages,
            dataset.scenes_seen,
            t.new_available,
            t.new_unavailable,
            t.became_available,
            t.became_unavailable,
            dataset.verified,
            dataset.warnings.len(),
            status,
        );
    }
    let _ = writeln!(out, "  {} change events committed", report.events.len());
    out
}

/// Human-readable store counts
#[must_use]
pub fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    for dataset in Dataset::ALL {
        let counts = stats.datasets.get(&dataset).copied().unwrap_or_default();
        let seeded = if stats.seeded.contains(&dataset) {
            "seeded"
        } else {
            "not seeded"
        };
        let _ = writeln!(
            out,
            "{:<11} total={} available={} degraded={} ({seeded})",
            dataset.to_string(),
            counts.total,
            counts.available,
            counts.degraded,
        );
    }
    let _ = writeln!(out, "{:<11} total={}", "all", stats.total());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use declass_scene::Transition;
    use declass_store::DatasetStats;
    use declass_sync::{DatasetReport, SearchScope};

    #[test]
    fn summary_lists_each_dataset() {
        let mut failed = DatasetReport::new(Dataset::DeclassI, SearchScope::Available);
        failed.status = DatasetStatus::Failed("catalog down".into());
        let mut ok = DatasetReport::new(Dataset::DeclassII, SearchScope::All);
        ok.transitions.record(Transition::NewAvailable);
        ok.pages = 2;

        let report = SyncReport {
            run_id: declass_scene::RunId::new(),
            started_at: chrono_now(),
            finished_at: chrono_now(),
            datasets: vec![failed, ok],
            events: Vec::new(),
        };
        let text = render_sync_summary(&report);
        assert!(text.contains("corona2"));
        assert!(text.contains("FAILED: catalog down"));
        assert!(text.contains("pages=2"));
        assert!(text.contains("new_available=1"));
        assert!(text.contains("0 change events committed"));
    }

    #[test]
    fn stats_render_every_dataset() {
        let mut stats = StoreStats::default();
        stats.datasets.insert(
            Dataset::DeclassIII,
            DatasetStats {
                total: 4,
                available: 3,
                degraded: 1,
            },
        );
        stats.seeded.insert(Dataset::DeclassIII);

        let text = render_stats(&stats);
        assert!(text.contains("declassiii  total=4 available=3 degraded=1 (seeded)"));
        assert!(text.contains("corona2     total=0 available=0 degraded=0 (not seeded)"));
        assert!(text.contains("all         total=4"));
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
