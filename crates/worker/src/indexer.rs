//! Client for the external indexing function.

use async_trait::async_trait;
use engine_core::{Error, EventType, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Re-processes on-chain events in a time window.
///
/// Implementations must tolerate being called again for the same window:
/// failed attempts are retried without deduplication.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Indexes `[start, end]` for `event_types`.
    ///
    /// Returns how many malformed events were skipped.
    async fn index(&self, start: i64, end: i64, event_types: &[EventType]) -> Result<u64>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexRequest<'a> {
    start_timestamp: i64,
    end_timestamp: i64,
    event_types: &'a [EventType],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexResponse {
    #[serde(default)]
    error_count: u64,
}

/// Indexer reached over HTTP.
///
/// Calls `{base_url}/internal/indexing/run`. The literal URL `mock`
/// makes every call a no-op reporting zero skipped events; an empty URL
/// is rejected.
#[derive(Clone)]
pub struct HttpIndexer {
    base_url: String,
    http_client: reqwest::Client,
    mock_mode: bool,
}

impl HttpIndexer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::validation(
                "indexer url is required (use `mock` for a no-op indexer)",
            ));
        }
        let mock_mode = base_url == "mock";

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            mock_mode,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.mock_mode
    }

    fn run_url(&self) -> String {
        format!("{}/internal/indexing/run", self.base_url)
    }
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn index(&self, start: i64, end: i64, event_types: &[EventType]) -> Result<u64> {
        if self.mock_mode {
            debug!(start, end, "Mock indexer call");
            return Ok(0);
        }

        let url = self.run_url();
        let request = IndexRequest {
            start_timestamp: start,
            end_timestamp: end,
            event_types,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Indexer request failed");
                Error::indexer(format!("Indexer unavailable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::indexer(format!(
                "Indexer returned {}: {}",
                status, body
            )));
        }

        let body: IndexResponse = response
            .json()
            .await
            .map_err(|e| Error::indexer(format!("Invalid indexer response: {}", e)))?;

        Ok(body.error_count)
    }
}
