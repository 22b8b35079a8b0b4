//! Remote content retrieval.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Everything the pipeline needs to know about a fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub body: String,
    pub content_type: Option<String>,
    pub status_code: u16,
    /// Length of `body` in characters
    pub content_length: usize,
}

impl FetchResult {
    pub fn new(body: String, content_type: Option<String>, status_code: u16) -> Self {
        let content_length = body.chars().count();
        Self {
            body,
            content_type,
            status_code,
            content_length,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(String),
    #[error("Request failed with status code {0}")]
    Status(u16),
    #[error("failed to read response body: {0}")]
    Body(String),
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Perform a single GET against `url`. No retries.
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError>;
}

/// `reqwest`-backed fetcher using the client's default redirect policy.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            "Fetched remote content"
        );

        Ok(FetchResult::new(body, content_type, status.as_u16()))
    }
}
