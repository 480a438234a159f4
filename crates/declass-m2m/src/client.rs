//! Session-bound M2M client

use crate::error::M2mError;
use crate::wire::{self, DownloadOption, Envelope, SceneSearchData};
use async_trait::async_trait;
use declass_scene::{Dataset, SceneId};
use declass_sync::{AdapterError, CatalogAdapter, PageToken, ScenePage, SearchScope};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Public M2M JSON endpoint
pub const DEFAULT_ENDPOINT: &str = "https://m2m.cr.usgs.gov/api/api/json/stable/";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct M2mConfig {
    /// Base URL; request names are appended to it
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for M2mConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 180,
        }
    }
}

impl M2mConfig {
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn url(&self, request: &str) -> String {
        if self.endpoint.ends_with('/') {
            format!("{}{request}", self.endpoint)
        } else {
            format!("{}/{request}", self.endpoint)
        }
    }
}

/// Logged-in M2M session
///
/// Holds the session key returned by `login-token`; every request sends it
/// as `X-Auth-Token`.
pub struct M2mClient {
    http: Client,
    config: M2mConfig,
    api_key: String,
}

impl std::fmt::Debug for M2mClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("M2mClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl M2mClient {
    /// Exchange a username and application token for a session
    ///
    /// # Errors
    /// Returns [`M2mError`] if the client cannot be built or login is refused
    #[instrument(level = "info", skip(config, token), fields(endpoint = %config.endpoint))]
    pub async fn login(config: M2mConfig, username: &str, token: &str) -> Result<Self, M2mError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| M2mError::Config(e.to_string()))?;

        let api_key: String =
            call(&http, &config, None, "login-token", &wire::login_request(username, token))
                .await?
                .ok_or_else(|| M2mError::Decode {
                    endpoint: "login-token".into(),
                    reason: "no session key in response".into(),
                })?;
        info!("logged in to M2M");

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// End the session
    ///
    /// # Errors
    /// Returns [`M2mError`] if the logout request fails
    pub async fn logout(&self) -> Result<(), M2mError> {
        let _: Option<Value> = self.request("logout", &wire::logout_request()).await?;
        info!("logged out of M2M");
        Ok(())
    }

    async fn request<T: DeserializeOwned>(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<Option<T>, M2mError> {
        call(&self.http, &self.config, Some(&self.api_key), name, body).await
    }
}

/// POST one request and unwrap the response envelope
async fn call<T: DeserializeOwned>(
    http: &Client,
    config: &M2mConfig,
    api_key: Option<&str>,
    name: &str,
    body: &Value,
) -> Result<Option<T>, M2mError> {
    let transport = |source: reqwest::Error| M2mError::Transport {
        endpoint: name.to_string(),
        source,
    };

    let mut request = http.post(config.url(name)).json(body);
    if let Some(key) = api_key {
        request = request.header("X-Auth-Token", key);
    }
    let response = request.send().await.map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(M2mError::Status {
            endpoint: name.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(transport)?;
    let envelope: Envelope<T> =
        serde_json::from_slice(&bytes).map_err(|e| M2mError::Decode {
            endpoint: name.to_string(),
            reason: e.to_string(),
        })?;
    if let Some(code) = envelope.error_code {
        return Err(M2mError::Api {
            endpoint: name.to_string(),
            code,
            message: envelope.error_message.unwrap_or_default(),
        });
    }
    debug!(request = name, bytes = bytes.len(), "M2M request ok");
    Ok(envelope.data)
}

fn starting_number(token: Option<&PageToken>) -> Result<u64, AdapterError> {
    match token {
        None => Ok(1),
        Some(token) => token
            .as_str()
            .parse()
            .map_err(|_| AdapterError::fatal(format!("invalid page token '{}'", token.as_str()))),
    }
}

#[async_trait]
impl CatalogAdapter for M2mClient {
    #[instrument(level = "debug", skip(self, token))]
    async fn search(
        &self,
        dataset: Dataset,
        scope: SearchScope,
        page_size: usize,
        token: Option<&PageToken>,
    ) -> Result<ScenePage, AdapterError> {
        let start = starting_number(token)?;
        let body = wire::scene_search_request(dataset, scope, page_size, start);
        let data: SceneSearchData = self
            .request("scene-search", &body)
            .await?
            .unwrap_or_default();

        let next = wire::next_starting_number(&data, start, page_size)
            .map(|n| PageToken::new(n.to_string()));
        let scenes = data
            .results
            .into_iter()
            .map(|scene| scene.into_catalog_scene(scope))
            .collect();
        Ok(ScenePage::new(scenes, next))
    }

    #[instrument(level = "debug", skip(self))]
    async fn get_download_status(
        &self,
        dataset: Dataset,
        scene_id: &SceneId,
    ) -> Result<bool, AdapterError> {
        let body = wire::download_options_request(dataset, scene_id);
        let options: Vec<DownloadOption> = self
            .request("download-options", &body)
            .await?
            .unwrap_or_default();
        Ok(options.iter().any(|option| {
            option.available
                && option
                    .entity_id
                    .as_deref()
                    .map_or(true, |id| id == scene_id.as_str())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_request_name() {
        let config = M2mConfig::default();
        assert_eq!(
            config.url("scene-search"),
            "https://m2m.cr.usgs.gov/api/api/json/stable/scene-search"
        );
        let bare = M2mConfig::default().with_endpoint("http://localhost:8080/api");
        assert_eq!(bare.url("logout"), "http://localhost:8080/api/logout");
    }

    #[test]
    fn page_token_is_starting_number() {
        assert_eq!(starting_number(None), Ok(1));
        assert_eq!(starting_number(Some(&PageToken::new("10001"))), Ok(10_001));
        assert!(starting_number(Some(&PageToken::new("abc"))).unwrap_err().is_fatal());
    }

    #[test]
    fn config_defaults_from_partial_json() {
        let config: M2mConfig = serde_json::from_str(r#"{"timeout_secs": 30}"#).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout_secs, 30);
    }
}
