//! Declass Availability Export
//!
//! Builds the downstream artifact, a GeoJSON `FeatureCollection` of every
//! scene the store currently marks available, from committed store state
//! only. No network access and no synchronization state is involved.
//!
//! Output is deterministic: features are ordered by `(dataset, scene_id)`,
//! so two exports of an unchanged store serialize to identical bytes.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod error;
mod export;
mod geojson;

pub use artifact::{to_json_bytes, write_artifact};
pub use error::ExportError;
pub use export::AvailabilityExport;
pub use geojson::{Feature, FeatureCollection, Geometry, SceneProperties};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
