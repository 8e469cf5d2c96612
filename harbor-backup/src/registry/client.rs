//! HTTP access to the registry REST API.

use super::endpoint;
use super::models::{HealthStatus, Statistics};
use crate::config::RegistryConfig;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Fetches one raw response body. Pagination and decoding happen above this seam.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }
}

/// Registry client authenticating every request with a pre-encoded Basic credential.
#[derive(Clone)]
pub struct HarborClient {
    client: reqwest::Client,
    api_base: Url,
    credential: String,
}

impl HarborClient {
    pub fn new(api_base: &str, credential: impl Into<String>) -> Result<Self> {
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(BackupError::Config(format!(
                "registry URL cannot be a base: {}",
                api_base
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base,
            credential: credential.into(),
        })
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(&config.api_base_url(), config.credential.clone())
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        debug!(url = %url, "GET");
        let mut request = self.client.get(url.clone());
        if !self.credential.is_empty() {
            request = request.header(AUTHORIZATION, format!("Basic {}", self.credential));
        }
        Ok(request.send().await?)
    }

    /// Returns true only when the API answers `Pong`.
    pub async fn ping(&self) -> Result<bool> {
        let url = endpoint(&self.api_base, &["ping"])?;
        let resp = self.get(&url).await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(BackupError::Transport(format!(
                "GET {} returned status {}",
                url, status
            )));
        }

        Ok(body.trim() == "Pong")
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = endpoint(&self.api_base, &["health"])?;
        let body = self.fetch(&url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn statistics(&self) -> Result<Statistics> {
        let url = endpoint(&self.api_base, &["statistics"])?;
        let body = self.fetch(&url).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl PageFetcher for HarborClient {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let resp = self.get(url).await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackupError::Transport(format!(
                "GET {} returned status {}: {}",
                url,
                status,
                text.trim()
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
