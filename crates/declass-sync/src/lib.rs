//! Declass Scene Synchronization
//!
//! Reconciles the durable scene store against the upstream catalog.
//!
//! # Core Concepts
//!
//! - [`CatalogAdapter`]: the catalog as the engine sees it (paged search and
//!   single-scene download status)
//! - [`SyncEngine`]: pages, classifies, flushes and reports
//! - [`SyncReport`]: per-dataset outcome plus committed [`ChangeEvent`]s
//! - [`EventSink`]: optional consumer of committed events
//!
//! # Example
//!
//! ```rust,ignore
//! use declass_sync::{SyncConfig, SyncEngine, SyncRequest};
//! use std::sync::Arc;
//!
//! let engine = SyncEngine::new(SyncConfig::default(), adapter, Arc::new(store));
//! let report = engine.run(&SyncRequest::all()).await?;
//! for event in &report.events {
//!     println!("{} {}", event.transition, event.scene_id);
//! }
//! ```
//!
//! [`ChangeEvent`]: declass_scene::ChangeEvent

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod adapter;
mod config;
mod engine;
mod error;
mod report;
mod retry;
mod sink;

pub use adapter::{AdapterError, CatalogAdapter, PageToken, ScenePage, SearchScope};
pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncRequest};
pub use error::SyncError;
pub use report::{
    DataIntegrityWarning, DatasetReport, DatasetStatus, SyncReport, TransitionCounts,
};
pub use retry::RetryPolicy;
pub use sink::{EventSink, JsonLinesSink, SinkError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
