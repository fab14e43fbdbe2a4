//! Tavily search adapter for the [`SearchProvider`] port.
//!
//! Speaks the Tavily Search API over HTTP with typed error classification
//! and exponential backoff on transient failures (timeouts, connection
//! faults, rate limits, 5xx).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{BriefError, SearchError};
use crate::ports::SearchProvider;
use crate::schemas::SearchHit;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Tavily web search client.
///
/// # Example
/// ```ignore
/// let search = TavilySearch::from_env()?.with_max_results(5);
/// let hits = search.search("rust async runtimes").await?;
/// ```
pub struct TavilySearch {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            max_results: 5,
        }
    }

    /// Create from the `TAVILY_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, BriefError> {
        let api_key =
            std::env::var("TAVILY_API_KEY").map_err(|_| BriefError::MissingEnv("TAVILY_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Results requested per query (clamped to Tavily's 1..=20).
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, 20);
        self
    }

    async fn execute_with_retry(&self, request: &TavilyRequest) -> Result<TavilyResponse, SearchError> {
        let mut last_error = SearchError::Network("no attempts made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying Tavily request");
                tokio::time::sleep(delay).await;
            }

            match self.execute_single(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(attempt, error = %e, "Tavily request failed, will retry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn execute_single(&self, request: &TavilyRequest) -> Result<TavilyResponse, SearchError> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout
                } else {
                    SearchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| SearchError::Parse(e.to_string()));
        }

        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => Err(SearchError::Unauthorized),
            429 => Err(SearchError::RateLimited),
            status => Err(SearchError::Http { status, message }),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest {
    query: String,
    max_results: u32,
    search_depth: String,
    topic: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    content: String,
    #[allow(dead_code)]
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query = %query, "executing Tavily search");

        let request = TavilyRequest {
            query: query.to_string(),
            max_results: self.max_results,
            search_depth: "basic".to_string(),
            topic: "general".to_string(),
        };

        let response = self.execute_with_retry(&request).await?;
        debug!(query = %query, results = response.results.len(), "Tavily search complete");

        Ok(response
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title,
                snippet: r.content,
                query_origin: query.to_string(),
            })
            .collect())
    }
}
