//! Declass Scene Model
//!
//! Types shared by every stage of the scene synchronization pipeline.
//!
//! # Core Concepts
//!
//! - [`Dataset`]: one of the three declassified imagery collections
//! - [`CatalogScene`]: a scene as reported by the catalog during a run
//! - [`SceneRecord`]: the persisted state of a scene between runs
//! - [`Fingerprint`]: 32-byte Blake3 digest used to skip unchanged writes
//! - [`Transition`]: availability change classification
//! - [`ChangeEvent`]: a committed transition, for the notification side
//!
//! # Example
//!
//! ```rust,ignore
//! use declass_scene::{CatalogScene, Dataset, SceneRecord, Transition};
//!
//! let scene = CatalogScene::new("DS1104-1057DA024", "DS1104-1057DA024").with_available(true);
//! let transition = Transition::classify(None, scene.available);
//! let record = SceneRecord::observe(Dataset::DeclassI, scene, None, chrono::Utc::now());
//! assert_eq!(transition, Transition::NewAvailable);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dataset;
mod fingerprint;
mod scene;
mod transition;

pub use dataset::Dataset;
pub use fingerprint::{Fingerprint, FingerprintError};
pub use scene::{CatalogScene, Footprint, SceneId, SceneRecord};
pub use transition::{ChangeEvent, RunId, Transition};

/// Errors raised while building scene model values
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Dataset name is not one of the synchronized collections
    #[error("unknown dataset: '{0}'")]
    UnknownDataset(String),

    /// Footprint ring had no coordinates
    #[error("footprint ring must not be empty")]
    EmptyFootprint,
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
