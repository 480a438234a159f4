//! Error types for synchronization runs
//!
//! Catalog failures are contained per dataset and reported in the
//! [`crate::SyncReport`]. Only failures that make the whole run untrustworthy
//! surface here.

use declass_store::StoreError;

/// Run-level failure
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The scene store failed; nothing further can be reconciled
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Engine settings are unusable
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),
}
