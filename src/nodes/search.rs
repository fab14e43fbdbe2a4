//! Search & fetch node.
//!
//! Fans the plan queries out to the search port concurrently, deduplicates
//! hits by normalized URL, interleaves them round-robin across queries so no
//! single query monopolizes the source budget, then fetches the retained
//! hits under a bounded pool with independent per-URL timeouts. Every
//! per-item fault degrades that item only; the batch survives.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tracing::{debug, info};
use url::Url;

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::nodes::Deadline;
use crate::ports::{ContentFetcher, SearchProvider};
use crate::schemas::SearchHit;
use crate::state::{FailureKind, ResearchState};

pub struct SearchFetchNode {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn ContentFetcher>,
    config: PipelineConfig,
}

/// Canonical form of a URL for cross-query deduplication: lowercased
/// scheme/host, default port and fragment dropped, trailing slash trimmed.
pub(crate) fn normalize_url(raw: &str) -> Option<String> {
    let mut parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.set_fragment(None);

    let host = parsed.host_str()?.to_lowercase();
    let port = match parsed.port() {
        Some(port) => format!(":{port}"),
        None => String::new(),
    };
    let path = parsed.path().trim_end_matches('/');
    let query = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();

    Some(format!("{}://{host}{port}{path}{query}", parsed.scheme()))
}

/// Interleave per-query hit lists round-robin, skipping duplicate URLs,
/// until `cap` hits are selected or every list is exhausted.
pub(crate) fn select_hits(per_query: Vec<Vec<SearchHit>>, cap: usize) -> Vec<SearchHit> {
    let mut selected = Vec::new();
    let mut seen = HashSet::new();
    let mut cursors: Vec<_> = per_query.into_iter().map(|hits| hits.into_iter()).collect();

    loop {
        let mut progressed = false;
        for cursor in cursors.iter_mut() {
            if selected.len() >= cap {
                return selected;
            }
            for hit in cursor.by_ref() {
                let key = normalize_url(&hit.url).unwrap_or_else(|| hit.url.trim().to_lowercase());
                if seen.insert(key) {
                    selected.push(hit);
                    progressed = true;
                    break;
                }
            }
        }
        if !progressed {
            return selected;
        }
    }
}

impl SearchFetchNode {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn ContentFetcher>,
        config: PipelineConfig,
    ) -> Self {
        Self { search, fetcher, config }
    }

    pub async fn run(&self, mut state: ResearchState, deadline: Deadline) -> ResearchState {
        let Some(plan) = state.plan.clone() else {
            state.record_failure(FailureKind::Planning, "no research plan available", false);
            return state;
        };

        info!(queries = plan.queries.len(), "executing search queries");
        let per_query = self.run_searches(&plan.queries, &mut state, deadline).await;

        let cap = plan.expected_sources as usize;
        let hits = select_hits(per_query, cap);
        debug!(hits = hits.len(), cap, "hits selected after dedup");
        state.raw_hits = hits.clone();

        if hits.is_empty() {
            state.record_failure(
                FailureKind::NoSources,
                "search produced no usable hits",
                false,
            );
            return state;
        }

        self.run_fetches(hits, &mut state, deadline).await;

        if state.fetched.len() < self.config.min_sources {
            state.record_failure(
                FailureKind::NoSources,
                format!(
                    "only {} of {} sources could be fetched (minimum {})",
                    state.fetched.len(),
                    state.raw_hits.len(),
                    self.config.min_sources
                ),
                false,
            );
        } else {
            info!(fetched = state.fetched.len(), "content fetched");
        }

        state
    }

    /// All plan queries in parallel; a failed query drops only itself.
    async fn run_searches(
        &self,
        queries: &[String],
        state: &mut ResearchState,
        deadline: Deadline,
    ) -> Vec<Vec<SearchHit>> {
        let timeout = deadline.clamp(self.config.search_timeout);
        let searches = queries.iter().cloned().map(|query| {
            let search = Arc::clone(&self.search);
            async move {
                let result = tokio::time::timeout(timeout, search.search(&query)).await;
                (query, result)
            }
        });

        let mut per_query = Vec::with_capacity(queries.len());
        for (query, result) in join_all(searches).await {
            match result {
                Ok(Ok(mut hits)) => {
                    // The query tag must reflect the plan query even if the
                    // provider left it blank
                    for hit in hits.iter_mut() {
                        hit.query_origin = query.clone();
                    }
                    per_query.push(hits);
                }
                Ok(Err(e)) => {
                    state.record_failure(
                        FailureKind::Search,
                        format!("query \"{query}\" failed: {e}"),
                        true,
                    );
                }
                Err(_) => {
                    state.record_failure(
                        FailureKind::Timeout,
                        format!("query \"{query}\" timed out"),
                        true,
                    );
                }
            }
        }
        per_query
    }

    /// Fetch retained hits under the configured pool width; results are
    /// re-ordered to hit order before touching shared state.
    async fn run_fetches(&self, hits: Vec<SearchHit>, state: &mut ResearchState, deadline: Deadline) {
        let timeout = deadline.clamp(self.config.fetch_timeout);
        let mut results: Vec<_> = stream::iter(hits.into_iter().enumerate())
            .map(|(index, hit)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let result = tokio::time::timeout(timeout, fetcher.fetch(&hit.url)).await;
                    (index, hit.url, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent_fetches)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _)| *index);

        for (_, url, result) in results {
            match result {
                Ok(Ok(page)) => state.fetched.push(page),
                Ok(Err(FetchError::Timeout)) | Err(_) => {
                    state.record_failure(
                        FailureKind::Timeout,
                        format!("fetch of {url} timed out"),
                        true,
                    );
                }
                Ok(Err(e)) => {
                    state.record_failure(
                        FailureKind::Fetch,
                        format!("fetch of {url} failed: {e}"),
                        true,
                    );
                }
            }
        }
    }
}
