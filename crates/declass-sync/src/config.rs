//! Engine configuration

use crate::error::SyncError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Paging and retry settings for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Scenes requested per catalog page
    pub page_size: usize,
    /// Safety limit on pages fetched per dataset
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 10_000,
            max_pages: 200,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Create config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reject settings that would make a run meaningless
    ///
    /// # Errors
    /// Returns [`SyncError::InvalidConfig`] for a zero page size or page limit
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.page_size == 0 {
            return Err(SyncError::InvalidConfig("page_size must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(SyncError::InvalidConfig("max_pages must be at least 1".into()));
        }
        Ok(())
    }
}
