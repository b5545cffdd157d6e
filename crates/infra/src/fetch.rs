//! Fetching raw records from a tenant's polling endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Connection, timeout or protocol failure.
    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("{endpoint} answered with status {status}")]
    Status { endpoint: String, status: u16 },

    /// The body was not a JSON array of records.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("http client setup failed: {0}")]
    Client(String),
}

/// Source of raw records for one tenant.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<JsonValue>, FetchError>;
}

#[async_trait]
impl<F> RecordFetcher for Arc<F>
where
    F: RecordFetcher + ?Sized,
{
    async fn fetch(&self) -> Result<Vec<JsonValue>, FetchError> {
        (**self).fetch().await
    }
}

/// Builds the fetcher for a polling endpoint.
pub trait FetcherFactory: Send + Sync {
    fn fetcher_for(&self, endpoint: &str) -> Arc<dyn RecordFetcher>;
}

/// `GET <endpoint>` expecting a JSON array.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RecordFetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<JsonValue>, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let records: Vec<JsonValue> = response.json().await.map_err(|e| FetchError::Decode {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        debug!(endpoint = %self.endpoint, records = records.len(), "fetched records");
        Ok(records)
    }
}

/// Hands out [`HttpFetcher`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcherFactory {
    client: reqwest::Client,
}

impl HttpFetcherFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl FetcherFactory for HttpFetcherFactory {
    fn fetcher_for(&self, endpoint: &str) -> Arc<dyn RecordFetcher> {
        Arc::new(HttpFetcher::new(self.client.clone(), endpoint))
    }
}
