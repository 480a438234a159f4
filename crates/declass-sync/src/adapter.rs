//! Catalog client contract consumed by the engine
//!
//! The engine never talks HTTP itself. Anything that can page through a
//! dataset and answer a single-scene availability question can drive a run.

use async_trait::async_trait;
use declass_scene::{CatalogScene, Dataset, SceneId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which scenes a search returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Every scene in the dataset, availability reported per scene
    All,
    /// Only scenes the catalog reports as downloadable
    Available,
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchScope::All => "all",
            SearchScope::Available => "available",
        })
    }
}

/// Opaque continuation handed back by the adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(String);

impl PageToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenePage {
    pub scenes: Vec<CatalogScene>,
    /// `None` when the catalog has no further pages
    pub next: Option<PageToken>,
}

impl ScenePage {
    #[must_use]
    pub fn new(scenes: Vec<CatalogScene>, next: Option<PageToken>) -> Self {
        Self { scenes, next }
    }

    /// Final page of a listing
    #[must_use]
    pub fn last(scenes: Vec<CatalogScene>) -> Self {
        Self { scenes, next: None }
    }
}

/// Catalog failures, split by whether a retry can help
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdapterError {
    /// Network trouble, timeouts, rate limiting, upstream 5xx
    #[error("transient catalog error: {0}")]
    Transient(String),

    /// Authentication, malformed requests, undecodable responses
    #[error("fatal catalog error: {0}")]
    Fatal(String),
}

impl AdapterError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Source of catalog state
///
/// Credentials are bound when the adapter is constructed; the engine never
/// sees them.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// Fetch one page of `dataset`
    ///
    /// `token` is `None` for the first page and otherwise the `next` token of
    /// the previous page.
    async fn search(
        &self,
        dataset: Dataset,
        scope: SearchScope,
        page_size: usize,
        token: Option<&PageToken>,
    ) -> Result<ScenePage, AdapterError>;

    /// Whether one scene currently has downloadable product data
    async fn get_download_status(
        &self,
        dataset: Dataset,
        scene_id: &SceneId,
    ) -> Result<bool, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_transient() {
        assert!(AdapterError::transient("timeout").is_retryable());
        assert!(!AdapterError::fatal("401").is_retryable());
        assert!(AdapterError::fatal("401").is_fatal());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            AdapterError::transient("HTTP 503").to_string(),
            "transient catalog error: HTTP 503"
        );
    }

    #[test]
    fn scope_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SearchScope::Available).unwrap(),
            "\"available\""
        );
        assert_eq!(SearchScope::All.to_string(), "all");
    }
}
