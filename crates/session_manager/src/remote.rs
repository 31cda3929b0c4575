//! Remote archive storage over a plain HTTP object store
//!
//! `GET`, `PUT` and `DELETE` on `{base_url}/{key}` with a JSON body.

use async_trait::async_trait;
use chat_core::{Archive, Config};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};

use crate::error::{Result, StorageError};
use crate::storage::ArchiveStorage;

#[derive(Clone)]
pub struct RemoteArchiveStorage {
    client: ClientWithMiddleware,
    base_url: String,
    token: Option<String>,
}

impl RemoteArchiveStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Remote storage from `archive_url`/`archive_token`, if configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.archive_url.as_deref()?;
        let storage = Self::new(url);
        Some(match &config.archive_token {
            Some(token) => storage.with_token(token.clone()),
            None => storage,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn authorize(
        &self,
        request: reqwest_middleware::RequestBuilder,
    ) -> reqwest_middleware::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn remote_error(response: reqwest::Response) -> StorageError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    StorageError::Remote(format!("HTTP {}: {}", status, text))
}

#[async_trait]
impl ArchiveStorage for RemoteArchiveStorage {
    async fn load_archive(&self, key: &str) -> Result<Archive> {
        let url = self.object_url(key);
        tracing::debug!("GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                Ok(serde_json::from_slice(&bytes)?)
            }
            _ => Err(remote_error(response).await),
        }
    }

    async fn store_archive(&self, key: &str, archive: &Archive) -> Result<()> {
        let url = self.object_url(key);
        tracing::debug!("PUT {} ({} sessions)", url, archive.len());
        let response = self
            .authorize(self.client.put(&url).json(archive))
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(remote_error(response).await)
        }
    }

    async fn drop_archive(&self, key: &str) -> Result<()> {
        let url = self.object_url(key);
        tracing::debug!("DELETE {}", url);
        let response = self.authorize(self.client.delete(&url)).send().await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(remote_error(response).await)
        }
    }
}
