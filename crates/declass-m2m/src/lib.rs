//! Declass M2M Adapter
//!
//! [`CatalogAdapter`](declass_sync::CatalogAdapter) implementation over the
//! USGS Machine-to-Machine JSON API.
//!
//! - `login-token` exchanges a username and application token for a session
//! - `scene-search` pages by `startingNumber`; the incremental scope adds a
//!   metadata filter on the dataset's "Download Available" field
//! - `download-options` answers single-scene availability
//! - `logout` ends the session
//!
//! Transport failures, HTTP 429/5xx and rate-limit error codes map to
//! retryable errors. Everything else is fatal for the dataset.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod client;
mod error;
mod wire;

pub use client::{M2mClient, M2mConfig, DEFAULT_ENDPOINT};
pub use error::M2mError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
