//! `declass.toml` loading

use anyhow::{bail, Context};
use declass_m2m::M2mConfig;
use declass_scene::Dataset;
use declass_store::JournalOptions;
use declass_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "declass.toml";

/// Everything the binary needs, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeclassConfig {
    /// Directory holding the store snapshot and journal
    pub store_dir: PathBuf,
    /// GeoJSON availability artifact
    pub artifact_path: PathBuf,
    /// JSON-lines file receiving committed change events
    pub events_path: PathBuf,
    /// Datasets to synchronize; empty means all of them
    pub datasets: Vec<Dataset>,
    pub sync: SyncConfig,
    pub store: StoreSection,
    pub catalog: CatalogSection,
}

impl Default for DeclassConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data/store"),
            artifact_path: PathBuf::from("data/declass.geojson"),
            events_path: PathBuf::from("data/events.jsonl"),
            datasets: Vec::new(),
            sync: SyncConfig::default(),
            store: StoreSection::default(),
            catalog: CatalogSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Journal entries tolerated before the store compacts on open
    pub compact_after: usize,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            compact_after: JournalOptions::default().compact_after,
        }
    }
}

impl StoreSection {
    #[must_use]
    pub fn journal_options(&self) -> JournalOptions {
        JournalOptions {
            compact_after: self.compact_after,
        }
    }
}

/// Catalog connection; the token itself never lives in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogSection {
    pub endpoint: String,
    pub username: Option<String>,
    /// Environment variable holding the application token
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        let m2m = M2mConfig::default();
        Self {
            endpoint: m2m.endpoint,
            username: None,
            token_env: "M2M_TOKEN".to_string(),
            timeout_secs: m2m.timeout_secs,
        }
    }
}

impl CatalogSection {
    #[must_use]
    pub fn m2m_config(&self) -> M2mConfig {
        M2mConfig::default()
            .with_endpoint(self.endpoint.clone())
            .with_timeout_secs(self.timeout_secs)
    }

    /// Username and token for `login-token`
    ///
    /// # Errors
    /// Fails if the username is not configured or the token variable is unset
    pub fn credentials(&self) -> anyhow::Result<(String, String)> {
        let Some(username) = self.username.clone() else {
            bail!("catalog.username is not configured");
        };
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("environment variable {} is not set", self.token_env))?;
        if token.trim().is_empty() {
            bail!("environment variable {} is empty", self.token_env);
        }
        Ok((username, token))
    }
}

impl DeclassConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// Fails on malformed TOML, unknown keys or unknown dataset names
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("invalid configuration")?;
        config
            .sync
            .validate()
            .context("invalid [sync] section")?;
        Ok(config)
    }

    /// Load `path`, or `declass.toml` if present, or the defaults
    ///
    /// # Errors
    /// Fails if an explicitly named file cannot be read or any file fails to parse
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("failed to load {}", path.display()))
    }

    /// Datasets named on the command line win over the configured list
    #[must_use]
    pub fn select_datasets(&self, cli: &[Dataset]) -> Vec<Dataset> {
        if cli.is_empty() {
            self.datasets.clone()
        } else {
            cli.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DeclassConfig::from_toml("").unwrap();
        assert_eq!(config, DeclassConfig::default());
        assert_eq!(config.sync.page_size, 10_000);
        assert_eq!(config.sync.max_pages, 200);
        assert_eq!(config.sync.retry.max_attempts, 5);
        assert_eq!(config.store.compact_after, 64);
        assert_eq!(config.catalog.token_env, "M2M_TOKEN");
        assert_eq!(config.catalog.timeout_secs, 180);
    }

    #[test]
    fn full_document_parses() {
        let config = DeclassConfig::from_toml(
            r#"
            store_dir = "/var/lib/declass"
            artifact_path = "/srv/www/declass.geojson"
            events_path = "/var/lib/declass/events.jsonl"
            datasets = ["declassii", "declassiii"]

            [sync]
            page_size = 500
            max_pages = 40

            [sync.retry]
            max_attempts = 3
            initial_backoff_ms = 250

            [store]
            compact_after = 16

            [catalog]
            username = "archivist"
            token_env = "DECLASS_TOKEN"
            timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.store_dir, PathBuf::from("/var/lib/declass"));
        assert_eq!(config.datasets, vec![Dataset::DeclassII, Dataset::DeclassIII]);
        assert_eq!(config.sync.page_size, 500);
        assert_eq!(config.sync.retry.max_attempts, 3);
        assert_eq!(config.sync.retry.initial_backoff_ms, 250);
        assert_eq!(config.sync.retry.max_backoff_ms, 16_000);
        assert_eq!(config.store.journal_options().compact_after, 16);
        assert_eq!(config.catalog.username.as_deref(), Some("archivist"));
        assert_eq!(config.catalog.endpoint, declass_m2m::DEFAULT_ENDPOINT);
        assert_eq!(config.catalog.m2m_config().timeout_secs, 60);
    }

    #[test]
    fn rejects_unknown_dataset() {
        let err = DeclassConfig::from_toml(r#"datasets = ["landsat"]"#).unwrap_err();
        assert!(format!("{err:#}").contains("landsat"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(DeclassConfig::from_toml("stor_dir = \"x\"").is_err());
    }

    #[test]
    fn rejects_misspelled_nested_keys() {
        let err = DeclassConfig::from_toml("[sync]\npage_sise = 500").unwrap_err();
        assert!(format!("{err:#}").contains("page_sise"));
        assert!(DeclassConfig::from_toml("[sync.retry]\nmax_atempts = 3").is_err());
    }

    #[test]
    fn rejects_zero_page_size() {
        let err = DeclassConfig::from_toml("[sync]\npage_size = 0").unwrap_err();
        assert!(format!("{err:#}").contains("[sync]"));
    }

    #[test]
    fn missing_username_is_reported() {
        let err = CatalogSection::default().credentials().unwrap_err();
        assert!(err.to_string().contains("catalog.username"));
    }

    #[test]
    fn command_line_datasets_override_config() {
        let config = DeclassConfig {
            datasets: vec![Dataset::DeclassI],
            ..DeclassConfig::default()
        };
        assert_eq!(config.select_datasets(&[]), vec![Dataset::DeclassI]);
        assert_eq!(
            config.select_datasets(&[Dataset::DeclassIII]),
            vec![Dataset::DeclassIII]
        );
    }
}
