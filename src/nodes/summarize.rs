//! Per-source summarizer node.
//!
//! One structured generation per fetched page, pushed through a worker pool
//! of fixed width: excess pages queue rather than spawning unbounded tasks.
//! A page that exhausts its schema retries is dropped with a recoverable
//! failure; only an empty survivor set is fatal. Results are aggregated in
//! page order regardless of completion order.

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::nodes::Deadline;
use crate::ports::ModelTier;
use crate::prompts::BriefPrompts;
use crate::schemas::SourceSummary;
use crate::state::{FailureKind, ResearchState};
use crate::structured::StructuredGenerator;

pub struct SummarizeNode {
    generator: StructuredGenerator,
    config: PipelineConfig,
}

impl SummarizeNode {
    pub fn new(generator: StructuredGenerator, config: PipelineConfig) -> Self {
        Self { generator, config }
    }

    pub async fn run(&self, mut state: ResearchState, deadline: Deadline) -> ResearchState {
        if state.fetched.is_empty() {
            state.record_failure(FailureKind::NoSources, "no content to summarize", false);
            return state;
        }

        info!(sources = state.fetched.len(), "summarizing sources");
        let timeout = deadline.clamp(self.config.generate_timeout);

        // Owned work items so the fan-out borrows nothing from the state
        let jobs: Vec<_> = state
            .fetched
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let prompt = BriefPrompts::source_summary(
                    &state.topic,
                    page,
                    self.config.prompt_content_chars,
                );
                (index, page.url.clone(), page.title.clone(), prompt)
            })
            .collect();

        let mut results: Vec<_> = stream::iter(jobs)
            .map(|(index, url, title, prompt)| {
                let generator = self.generator.clone();
                async move {
                    let result = generator
                        .generate_within::<SourceSummary>(&prompt, ModelTier::Secondary, timeout)
                        .await;
                    (index, url, title, result)
                }
            })
            .buffer_unordered(self.config.max_concurrent_summaries)
            .collect()
            .await;
        results.sort_by_key(|(index, _, _, _)| *index);

        for (_, url, title, result) in results {
            match result {
                Ok(mut summary) => {
                    // The fetched URL is authoritative; models routinely
                    // garble or shorten it. Same for a blank title.
                    summary.url = url;
                    if summary.title.trim().is_empty() {
                        summary.title = title;
                    }
                    state.source_summaries.push(summary);
                }
                Err(e) => {
                    state.record_failure(
                        FailureKind::Validation,
                        format!("summary of {url} dropped: {e}"),
                        true,
                    );
                }
            }
        }

        if state.source_summaries.is_empty() {
            state.record_failure(
                FailureKind::NoSources,
                "no source summaries survived validation",
                false,
            );
        } else {
            debug!(
                summaries = state.source_summaries.len(),
                dropped = state.fetched.len() - state.source_summaries.len(),
                "summarization complete"
            );
        }

        state
    }
}
