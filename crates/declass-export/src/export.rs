//! Store to feature collection

use crate::error::ExportError;
use crate::geojson::{Feature, FeatureCollection};
use declass_scene::Dataset;
use declass_store::SceneStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Builds the availability artifact from a shared store handle
pub struct AvailabilityExport {
    store: Arc<dyn SceneStore>,
}

impl AvailabilityExport {
    #[must_use]
    pub fn new(store: Arc<dyn SceneStore>) -> Self {
        Self { store }
    }

    /// Every available scene of `datasets`, ordered by `(dataset, scene_id)`
    ///
    /// An empty selection means every dataset.
    ///
    /// # Errors
    /// Returns [`ExportError::Store`] if the store cannot be scanned
    #[instrument(skip_all, fields(datasets = datasets.len()))]
    pub fn export(&self, datasets: &BTreeSet<Dataset>) -> Result<FeatureCollection, ExportError> {
        let mut collection = FeatureCollection::default();
        for dataset in Dataset::ALL {
            if !datasets.is_empty() && !datasets.contains(&dataset) {
                continue;
            }
            for record in self.store.scan_available(Some(dataset))? {
                collection.features.push(Feature::from(&record));
            }
        }

        info!(
            features = collection.len(),
            degraded = collection.degraded(),
            "built availability export"
        );
        Ok(collection)
    }
}
