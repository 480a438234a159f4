//! Declass CLI
//!
//! Library half of the `declass` binary: configuration loading, logging
//! setup and the bodies of the `sync`, `export` and `stats` subcommands.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod config;
pub mod logging;

pub use config::{CatalogSection, DeclassConfig, StoreSection, DEFAULT_CONFIG_FILE};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
