//! Scene observations and persisted scene records
//!
//! A [`CatalogScene`] is what the catalog reported on one page of one run.
//! A [`SceneRecord`] is what the store keeps between runs: the latest
//! observation plus its fingerprint and lifecycle timestamps.

use crate::{Dataset, Fingerprint, SceneError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable catalog identifier of a scene (the catalog's entity id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    /// Wrap a catalog entity id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SceneId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SceneId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SceneId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Polygon footprint of a scene: a single exterior ring of `[lon, lat]` pairs
///
/// Never empty; an empty ring is represented as an absent footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct Footprint {
    ring: Vec<[f64; 2]>,
}

impl Footprint {
    /// Build a footprint, returning `None` for an empty ring
    #[must_use]
    pub fn new(ring: Vec<[f64; 2]>) -> Option<Self> {
        if ring.is_empty() {
            None
        } else {
            Some(Self { ring })
        }
    }

    /// Ring coordinates as received
    #[inline]
    #[must_use]
    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }

    /// Ring with the first coordinate repeated at the end if needed
    ///
    /// GeoJSON linear rings must be closed.
    #[must_use]
    pub fn closed_ring(&self) -> Vec<[f64; 2]> {
        let mut ring = self.ring.clone();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        ring
    }

    /// Bounding box as `[west, south, east, north]`
    #[must_use]
    pub fn bbox(&self) -> [f64; 4] {
        let mut bbox = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
        for [lon, lat] in &self.ring {
            bbox[0] = bbox[0].min(*lon);
            bbox[1] = bbox[1].min(*lat);
            bbox[2] = bbox[2].max(*lon);
            bbox[3] = bbox[3].max(*lat);
        }
        bbox
    }
}

impl TryFrom<Vec<[f64; 2]>> for Footprint {
    type Error = SceneError;

    fn try_from(ring: Vec<[f64; 2]>) -> Result<Self, Self::Error> {
        Footprint::new(ring).ok_or(SceneError::EmptyFootprint)
    }
}

impl From<Footprint> for Vec<[f64; 2]> {
    fn from(value: Footprint) -> Self {
        value.ring
    }
}

/// One scene as reported by the catalog during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogScene {
    pub scene_id: SceneId,
    pub display_id: String,
    pub footprint: Option<Footprint>,
    pub thumbnail_url: Option<String>,
    /// Whether the catalog reports downloadable product data right now
    pub available: bool,
    /// Capture date as `YYYY-MM-DD`
    pub acquisition_date: Option<String>,
}

impl CatalogScene {
    /// Create an unavailable observation with no geometry
    #[must_use]
    pub fn new(scene_id: impl Into<SceneId>, display_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            display_id: display_id.into(),
            footprint: None,
            thumbnail_url: None,
            available: false,
            acquisition_date: None,
        }
    }

    #[must_use]
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    #[must_use]
    pub fn with_footprint(mut self, footprint: Option<Footprint>) -> Self {
        self.footprint = footprint;
        self
    }

    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_acquisition_date(mut self, date: impl Into<String>) -> Self {
        self.acquisition_date = Some(date.into());
        self
    }

    /// Fingerprint of this observation
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(
            self.available,
            self.footprint.is_some(),
            self.thumbnail_url.as_deref(),
        )
    }
}

/// Persisted state of one scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub scene_id: SceneId,
    pub dataset: Dataset,
    pub display_id: String,
    pub footprint: Option<Footprint>,
    pub thumbnail_url: Option<String>,
    pub available: bool,
    #[serde(default)]
    pub acquisition_date: Option<String>,
    /// Fingerprint of the observation this record was written from
    pub fingerprint: Fingerprint,
    pub first_seen_at: DateTime<Utc>,
    #[serde(default)]
    pub first_available_at: Option<DateTime<Utc>>,
    pub last_checked_at: DateTime<Utc>,
}

impl SceneRecord {
    /// Build the record that results from observing `scene` at `now`
    ///
    /// Lifecycle timestamps carry over from `previous` when present.
    #[must_use]
    pub fn observe(
        dataset: Dataset,
        scene: CatalogScene,
        previous: Option<&SceneRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let fingerprint = scene.fingerprint();
        let first_seen_at = previous.map_or(now, |p| p.first_seen_at);
        let first_available_at = previous
            .and_then(|p| p.first_available_at)
            .or(scene.available.then_some(now));

        Self {
            scene_id: scene.scene_id,
            dataset,
            display_id: scene.display_id,
            footprint: scene.footprint,
            thumbnail_url: scene.thumbnail_url,
            available: scene.available,
            acquisition_date: scene.acquisition_date,
            fingerprint,
            first_seen_at,
            first_available_at,
            last_checked_at: now,
        }
    }

    /// Copy of this record with availability replaced
    ///
    /// Used when the catalog answers a direct status check rather than a
    /// search, so only availability is known to have changed.
    #[must_use]
    pub fn with_availability(&self, available: bool, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.available = available;
        next.fingerprint = Fingerprint::of(
            available,
            next.footprint.is_some(),
            next.thumbnail_url.as_deref(),
        );
        if available && next.first_available_at.is_none() {
            next.first_available_at = Some(now);
        }
        next.last_checked_at = now;
        next
    }

    /// Available but missing geometry
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.available && self.footprint.is_none()
    }

    /// EarthExplorer metadata page for this scene
    #[must_use]
    pub fn metadata_url(&self) -> String {
        self.dataset.metadata_url(&self.display_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn square() -> Footprint {
        Footprint::new(vec![[10.0, 20.0], [11.0, 20.0], [11.0, 21.0], [10.0, 21.0]]).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn empty_ring_is_absent() {
        assert!(Footprint::new(Vec::new()).is_none());
        let parsed: Result<Footprint, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());
    }

    #[test]
    fn closed_ring_repeats_first_point() {
        let ring = square().closed_ring();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn bbox_spans_ring() {
        assert_eq!(square().bbox(), [10.0, 20.0, 11.0, 21.0]);
    }

    #[test]
    fn observe_new_available_scene() {
        let scene = CatalogScene::new("E1", "D1")
            .with_available(true)
            .with_footprint(Some(square()));
        let record = SceneRecord::observe(Dataset::DeclassI, scene.clone(), None, at(1));

        assert_eq!(record.fingerprint, scene.fingerprint());
        assert_eq!(record.first_seen_at, at(1));
        assert_eq!(record.first_available_at, Some(at(1)));
        assert!(!record.is_degraded());
    }

    #[test]
    fn observe_preserves_lifecycle_timestamps() {
        let first = SceneRecord::observe(
            Dataset::DeclassI,
            CatalogScene::new("E1", "D1"),
            None,
            at(1),
        );
        assert_eq!(first.first_available_at, None);

        let second = SceneRecord::observe(
            Dataset::DeclassI,
            CatalogScene::new("E1", "D1").with_available(true),
            Some(&first),
            at(2),
        );
        assert_eq!(second.first_seen_at, at(1));
        assert_eq!(second.first_available_at, Some(at(2)));
        assert_eq!(second.last_checked_at, at(2));
        assert!(second.is_degraded());
    }

    #[test]
    fn with_availability_refreshes_fingerprint() {
        let record = SceneRecord::observe(
            Dataset::DeclassII,
            CatalogScene::new("E1", "D1").with_available(true),
            None,
            at(1),
        );
        let flipped = record.with_availability(false, at(3));
        assert!(!flipped.available);
        assert_ne!(flipped.fingerprint, record.fingerprint);
        assert_eq!(flipped.first_available_at, Some(at(1)));
    }

    #[test]
    fn record_json_round_trip() {
        let record = SceneRecord::observe(
            Dataset::DeclassIII,
            CatalogScene::new("E9", "D9")
                .with_available(true)
                .with_footprint(Some(square()))
                .with_thumbnail("https://ims.example/t.jpg"),
            None,
            at(4),
        );
        let json = serde_json::to_string(&record).unwrap();
        let decoded: SceneRecord = serde_json::from_str(&json).unwrap();
        pretty_assertions::assert_eq!(record, decoded);
    }
}
