use crate::error::WatchError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Raw result of a metadata request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value, WatchError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Transport used by the watcher to issue `GET` requests.
///
/// Network-level failures must come back as `Err(WatchError::Transport)`;
/// non-success statuses are returned as a normal response.
#[async_trait]
pub trait TagFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, WatchError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a client, optionally bounding each request by `timeout`
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder =
            Client::builder().user_agent(concat!("tagwatch/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TagFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, WatchError> {
        debug!("Fetching tag metadata from {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(WatchError::transport)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(WatchError::transport)?;

        Ok(FetchResponse::new(status, body.to_vec()))
    }
}
