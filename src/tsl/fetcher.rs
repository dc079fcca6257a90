use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use tokio::time::timeout;
use tracing::debug;

use super::errors::{TslError, TslResult};

/// A download request for a trusted list or its published digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Cached validator for a conditional request
    pub etag: Option<String>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            etag: None,
            timeout,
        }
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    /// The server confirmed the cached copy is current
    NotModified,
    Content { body: Vec<u8>, etag: Option<String> },
}

/// Interface for retrieving remote documents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> TslResult<FetchResponse>;
}

/// An HTTP-based implementation of `Fetcher`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> TslResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .use_rustls_tls()
            .build()
            .map_err(|e| TslError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: &FetchRequest) -> TslResult<FetchResponse> {
        let mut builder = self.client.get(&request.url);
        if let Some(etag) = &request.etag {
            builder = builder.header(IF_NONE_MATCH, etag);
        }

        let network_error = |e: reqwest::Error| TslError::Network {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            debug!("{} not modified", request.url);
            return Ok(FetchResponse::NotModified);
        }

        if !status.is_success() {
            return Err(TslError::Network {
                url: request.url.clone(),
                reason: format!("HTTP error {status}"),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(network_error)?.to_vec();

        debug!("Fetched {} bytes from {}", body.len(), request.url);
        Ok(FetchResponse::Content { body, etag })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> TslResult<FetchResponse> {
        match timeout(request.timeout, self.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TslError::Timeout {
                url: request.url.clone(),
            }),
        }
    }
}
