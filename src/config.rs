//! Pipeline configuration.
//!
//! All knobs that govern fan-out widths, retry budgets, and timeouts.
//! Defaults are production-reasonable; `from_env` reads optional overrides
//! so deployments can tune without code changes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Search hits requested per plan query
    pub max_sources_per_query: usize,

    /// Minimum surviving sources below which a run routes to the error
    /// handler rather than synthesizing from nothing
    pub min_sources: usize,

    /// Concurrent page fetches during the search stage
    pub max_concurrent_fetches: usize,

    /// Width of the summarizer worker pool; excess sources queue
    pub max_concurrent_summaries: usize,

    /// Schema-validation retries per generation call (attempts = budget + 1)
    pub retry_budget: u32,

    /// Prior briefs considered when building follow-up context
    pub history_window: usize,

    /// Ceiling on stored page content, in characters
    pub max_content_chars: usize,

    /// Ceiling on page content quoted into a summarization prompt
    pub prompt_content_chars: usize,

    /// Per-query search timeout
    #[serde(with = "humantime_serde")]
    pub search_timeout: Duration,

    /// Per-URL fetch timeout
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Per-attempt generation timeout
    #[serde(with = "humantime_serde")]
    pub generate_timeout: Duration,

    /// End-to-end deadline for one pipeline run
    #[serde(with = "humantime_serde")]
    pub request_deadline: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sources_per_query: 5,
            min_sources: 1,
            max_concurrent_fetches: 8,
            max_concurrent_summaries: num_cpus::get(),
            retry_budget: 2,
            history_window: 3,
            max_content_chars: 10_000,
            prompt_content_chars: 2_000,
            search_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(30),
            generate_timeout: Duration::from_secs(60),
            request_deadline: Duration::from_secs(300),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration with environment overrides.
    ///
    /// Recognized variables: `MAX_SOURCES_PER_QUERY`, `MIN_SOURCES`,
    /// `MAX_CONCURRENT_FETCHES`, `MAX_CONCURRENT_SUMMARIES`, `RETRY_BUDGET`,
    /// `HISTORY_WINDOW`, `MAX_CONTENT_LENGTH`, `REQUEST_TIMEOUT` (seconds,
    /// applies to search and fetch), `GENERATE_TIMEOUT_SECS`,
    /// `REQUEST_DEADLINE_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("MAX_SOURCES_PER_QUERY") {
            config.max_sources_per_query = v;
        }
        if let Some(v) = env_parse("MIN_SOURCES") {
            config.min_sources = v;
        }
        if let Some(v) = env_parse("MAX_CONCURRENT_FETCHES") {
            config.max_concurrent_fetches = v;
        }
        if let Some(v) = env_parse("MAX_CONCURRENT_SUMMARIES") {
            config.max_concurrent_summaries = v;
        }
        if let Some(v) = env_parse("RETRY_BUDGET") {
            config.retry_budget = v;
        }
        if let Some(v) = env_parse("HISTORY_WINDOW") {
            config.history_window = v;
        }
        if let Some(v) = env_parse("MAX_CONTENT_LENGTH") {
            config.max_content_chars = v;
        }
        if let Some(secs) = env_parse::<u64>("REQUEST_TIMEOUT") {
            config.search_timeout = Duration::from_secs(secs);
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("GENERATE_TIMEOUT_SECS") {
            config.generate_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("REQUEST_DEADLINE_SECS") {
            config.request_deadline = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_max_sources_per_query(mut self, max: usize) -> Self {
        self.max_sources_per_query = max;
        self
    }

    pub fn with_min_sources(mut self, min: usize) -> Self {
        self.min_sources = min;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    pub fn with_max_concurrent_summaries(mut self, max: usize) -> Self {
        self.max_concurrent_summaries = max.max(1);
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = timeout;
        self
    }

    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }
}
