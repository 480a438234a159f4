//! M2M request bodies and response shapes
//!
//! Every M2M response is an envelope `{data, errorCode, errorMessage, ...}`.
//! Only the fields the engine needs are decoded.

use declass_scene::{CatalogScene, Dataset, Footprint, SceneId};
use declass_sync::SearchScope;
use serde::Deserialize;
use serde_json::{json, Value};

/// Metadata field carrying a scene's download flag in full metadata
const DOWNLOAD_AVAILABLE_FIELD: &str = "Download Available";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub(crate) data: Option<T>,
    #[serde(default)]
    pub(crate) error_code: Option<String>,
    #[serde(default)]
    pub(crate) error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SceneSearchData {
    #[serde(default)]
    pub(crate) results: Vec<WireScene>,
    #[serde(default)]
    pub(crate) total_hits: Option<u64>,
    #[serde(default)]
    pub(crate) next_record: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireScene {
    entity_id: String,
    #[serde(default)]
    display_id: Option<String>,
    #[serde(default)]
    browse: Vec<WireBrowse>,
    #[serde(default)]
    spatial_coverage: Option<WireGeometry>,
    #[serde(default)]
    spatial_bounds: Option<WireGeometry>,
    #[serde(default)]
    temporal_coverage: Option<WireTemporal>,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    metadata: Vec<WireMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBrowse {
    #[serde(default)]
    thumbnail_path: Option<String>,
    #[serde(default)]
    browse_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTemporal {
    #[serde(default)]
    start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    #[serde(default)]
    field_name: Option<String>,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadOption {
    #[serde(default)]
    pub(crate) entity_id: Option<String>,
    #[serde(default)]
    pub(crate) available: bool,
}

pub(crate) fn login_request(username: &str, token: &str) -> Value {
    json!({ "username": username, "token": token })
}

/// `logout` body: an empty object, never `null`
pub(crate) fn logout_request() -> Value {
    json!({})
}

/// `scene-search` body for one page; `starting_number` is 1-based
pub(crate) fn scene_search_request(
    dataset: Dataset,
    scope: SearchScope,
    page_size: usize,
    starting_number: u64,
) -> Value {
    let filter = match scope {
        SearchScope::Available => json!({
            "metadataFilter": {
                "filterType": "value",
                "filterId": dataset.download_filter_id(),
                "value": "Y",
                "operand": "=",
            }
        }),
        SearchScope::All => json!({}),
    };
    json!({
        "datasetName": dataset.catalog_name(),
        "maxResults": page_size,
        "startingNumber": starting_number,
        "metadataType": "full",
        "sceneFilter": filter,
    })
}

pub(crate) fn download_options_request(dataset: Dataset, scene_id: &SceneId) -> Value {
    json!({
        "datasetName": dataset.catalog_name(),
        "entityIds": [scene_id.as_str()],
    })
}

/// Starting number of the page after this one, if any
///
/// `totalHits` decides when it is reported, since the server may cap
/// `maxResults` below the requested page size. Without it a short page ends
/// the scan.
pub(crate) fn next_starting_number(
    data: &SceneSearchData,
    starting_number: u64,
    page_size: usize,
) -> Option<u64> {
    let received = data.results.len() as u64;
    if received == 0 {
        return None;
    }
    let next = data
        .next_record
        .filter(|&n| n > starting_number)
        .unwrap_or(starting_number + received);
    match data.total_hits {
        Some(total) => (next <= total).then_some(next),
        None => (received >= page_size as u64).then_some(next),
    }
}

impl WireScene {
    /// Convert to the engine's observation
    ///
    /// Scenes returned by the `Available` scope matched the download filter
    /// and are available by construction. Otherwise availability is read from
    /// the full metadata.
    pub(crate) fn into_catalog_scene(self, scope: SearchScope) -> CatalogScene {
        let available = match scope {
            SearchScope::Available => true,
            SearchScope::All => self.download_flag(),
        };
        let footprint = self
            .spatial_coverage
            .as_ref()
            .and_then(WireGeometry::exterior_ring)
            .or_else(|| self.spatial_bounds.as_ref().and_then(WireGeometry::exterior_ring));
        let thumbnail = self
            .browse
            .first()
            .and_then(|b| b.thumbnail_path.clone().or_else(|| b.browse_path.clone()))
            .filter(|url| !url.is_empty());
        let acquisition_date = self
            .temporal_coverage
            .and_then(|t| t.start_date)
            .or(self.publish_date)
            .map(|d| date_part(&d).to_string());

        let display_id = self.display_id.unwrap_or_else(|| self.entity_id.clone());
        let mut scene = CatalogScene::new(self.entity_id, display_id)
            .with_available(available)
            .with_footprint(footprint);
        scene.thumbnail_url = thumbnail;
        scene.acquisition_date = acquisition_date;
        scene
    }

    fn download_flag(&self) -> bool {
        self.metadata
            .iter()
            .find(|m| m.field_name.as_deref() == Some(DOWNLOAD_AVAILABLE_FIELD))
            .and_then(|m| m.value.as_str())
            .is_some_and(|v| matches!(v.trim().to_ascii_uppercase().as_str(), "Y" | "YES"))
    }
}

impl WireGeometry {
    fn exterior_ring(&self) -> Option<Footprint> {
        let ring = match self.kind.as_str() {
            "Polygon" => self.coordinates.get(0)?,
            "MultiPolygon" => self.coordinates.get(0)?.get(0)?,
            _ => return None,
        };
        let points: Vec<Vec<f64>> = serde_json::from_value(ring.clone()).ok()?;
        let ring = points
            .into_iter()
            .filter(|p| p.len() >= 2)
            .map(|p| [p[0], p[1]])
            .collect();
        Footprint::new(ring)
    }
}

/// `"1972-05-31 00:00:00-05"` becomes `"1972-05-31"`
fn date_part(value: &str) -> &str {
    value.split(' ').next().unwrap_or(value)
}
