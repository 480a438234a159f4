//! Minimal GeoJSON model for the availability artifact

use chrono::{DateTime, Utc};
use declass_scene::{Dataset, Footprint, SceneId, SceneRecord};
use serde::{Deserialize, Serialize};

/// Top-level artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features exported without geometry
    #[must_use]
    pub fn degraded(&self) -> usize {
        self.features.iter().filter(|f| f.properties.degraded).count()
    }

    /// Scene ids in feature order
    pub fn scene_ids(&self) -> impl Iterator<Item = &SceneId> {
        self.features.iter().map(|f| &f.properties.scene_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub struct Feature {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bbox: Option<[f64; 4]>,
    /// `null` for scenes the catalog returned without a footprint
    pub geometry: Option<Geometry>,
    pub properties: SceneProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl From<&Footprint> for Geometry {
    fn from(footprint: &Footprint) -> Self {
        Geometry::Polygon {
            coordinates: vec![footprint.closed_ring()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneProperties {
    pub scene_id: SceneId,
    pub dataset: Dataset,
    pub dataset_label: String,
    pub display_id: String,
    pub thumbnail_url: Option<String>,
    pub acquisition_date: Option<String>,
    pub metadata_url: String,
    pub first_available_at: Option<DateTime<Utc>>,
    pub degraded: bool,
}

impl From<&SceneRecord> for Feature {
    fn from(record: &SceneRecord) -> Self {
        Feature {
            bbox: record.footprint.as_ref().map(Footprint::bbox),
            geometry: record.footprint.as_ref().map(Geometry::from),
            properties: SceneProperties {
                scene_id: record.scene_id.clone(),
                dataset: record.dataset,
                dataset_label: record.dataset.label().to_string(),
                display_id: record.display_id.clone(),
                thumbnail_url: record.thumbnail_url.clone(),
                acquisition_date: record.acquisition_date.clone(),
                metadata_url: record.metadata_url(),
                first_available_at: record.first_available_at,
                degraded: record.is_degraded(),
            },
        }
    }
}
