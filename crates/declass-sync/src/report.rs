//! Per-run and per-dataset outcome reporting

use crate::adapter::SearchScope;
use chrono::{DateTime, Utc};
use declass_scene::{ChangeEvent, Dataset, RunId, SceneId, SceneRecord, Transition};
use declass_store::UpsertSummary;
use serde::Serialize;
use std::fmt;

/// Available scene that arrived without a footprint
///
/// Never fatal. The record is stored and exported without geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataIntegrityWarning {
    pub scene_id: SceneId,
    pub dataset: Dataset,
    pub display_id: String,
}

impl DataIntegrityWarning {
    #[must_use]
    pub fn missing_footprint(record: &SceneRecord) -> Self {
        Self {
            scene_id: record.scene_id.clone(),
            dataset: record.dataset,
            display_id: record.display_id.clone(),
        }
    }
}

impl fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scene {} ({}) in {} is available but has no footprint",
            self.scene_id, self.display_id, self.dataset
        )
    }
}

/// How a dataset's pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum DatasetStatus {
    Completed,
    /// Stopped at the configured page limit; committed pages are kept
    PageLimitReached,
    /// A catalog call failed for good; committed pages are kept
    Failed(String),
}

/// Tally of classified observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransitionCounts {
    pub new_available: usize,
    pub new_unavailable: usize,
    pub became_available: usize,
    pub became_unavailable: usize,
    pub unchanged: usize,
}

impl TransitionCounts {
    pub fn record(&mut self, transition: Transition) {
        let slot = match transition {
            Transition::NewAvailable => &mut self.new_available,
            Transition::NewUnavailable => &mut self.new_unavailable,
            Transition::BecameAvailable => &mut self.became_available,
            Transition::BecameUnavailable => &mut self.became_unavailable,
            Transition::Unchanged => &mut self.unchanged,
        };
        *slot += 1;
    }

    /// Observations that produced a change event
    #[must_use]
    pub fn changes(&self) -> usize {
        self.new_available + self.new_unavailable + self.became_available + self.became_unavailable
    }
}

/// Outcome of one dataset within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub scope: SearchScope,
    #[serde(flatten)]
    pub status: DatasetStatus,
    pub pages: usize,
    /// Scenes received from the catalog, duplicates included
    pub scenes_seen: usize,
    /// Repeated ids within a page, resolved to the later occurrence
    pub duplicates: usize,
    pub transitions: TransitionCounts,
    /// Unchanged availability but a different fingerprint; written, no event
    pub metadata_refreshed: usize,
    /// Stored-available scenes checked individually after an incremental scan
    pub verified: usize,
    /// Scenes skipped because the store holds them under another dataset
    pub conflicts: usize,
    pub writes: UpsertSummary,
    pub warnings: Vec<DataIntegrityWarning>,
}

impl DatasetReport {
    #[must_use]
    pub fn new(dataset: Dataset, scope: SearchScope) -> Self {
        Self {
            dataset,
            scope,
            status: DatasetStatus::Completed,
            pages: 0,
            scenes_seen: 0,
            duplicates: 0,
            transitions: TransitionCounts::default(),
            metadata_refreshed: 0,
            verified: 0,
            conflicts: 0,
            writes: UpsertSummary::default(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.status, DatasetStatus::Failed(_))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == DatasetStatus::Completed
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub datasets: Vec<DatasetReport>,
    /// Committed change events, in commit order
    pub events: Vec<ChangeEvent>,
}

impl SyncReport {
    /// Whether any dataset ended in failure
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.datasets.iter().any(DatasetReport::is_failed)
    }

    #[must_use]
    pub fn dataset(&self, dataset: Dataset) -> Option<&DatasetReport> {
        self.datasets.iter().find(|r| r.dataset == dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_changes_only() {
        let mut counts = TransitionCounts::default();
        counts.record(Transition::NewAvailable);
        counts.record(Transition::BecameUnavailable);
        counts.record(Transition::Unchanged);
        assert_eq!(counts.changes(), 2);
        assert_eq!(counts.unchanged, 1);
    }

    #[test]
    fn status_serializes_flat() {
        let mut report = DatasetReport::new(Dataset::DeclassI, SearchScope::All);
        report.status = DatasetStatus::Failed("fatal catalog error: 401".into());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "fatal catalog error: 401");
        assert_eq!(json["dataset"], "corona2");
        assert!(report.is_failed());
    }
}
