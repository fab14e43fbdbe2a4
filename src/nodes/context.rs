//! Context summarizer node.
//!
//! Runs only on follow-up requests. Loads the user's recent briefs through
//! the history port and condenses them into a [`ContextSummary`]. Context
//! is best-effort enrichment: a failed history load or an exhausted
//! generation degrades to running without context, never to an abort.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::nodes::Deadline;
use crate::ports::{HistoryStore, ModelTier};
use crate::prompts::BriefPrompts;
use crate::schemas::ContextSummary;
use crate::state::{FailureKind, ResearchState};
use crate::structured::StructuredGenerator;

pub struct ContextNode {
    generator: StructuredGenerator,
    history: Arc<dyn HistoryStore>,
    config: PipelineConfig,
}

impl ContextNode {
    pub fn new(
        generator: StructuredGenerator,
        history: Arc<dyn HistoryStore>,
        config: PipelineConfig,
    ) -> Self {
        Self { generator, history, config }
    }

    pub async fn run(&self, mut state: ResearchState, deadline: Deadline) -> ResearchState {
        info!(user_id = %state.user_id, "summarizing prior research context");

        let history = match self
            .history
            .load_history(&state.user_id, self.config.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                state.record_failure(FailureKind::Storage, e.to_string(), true);
                Vec::new()
            }
        };

        if history.is_empty() {
            debug!(user_id = %state.user_id, "no prior briefs, continuing without context");
            return state;
        }

        let digest = BriefPrompts::history_digest(&history);
        let prompt = BriefPrompts::context_summary(&state.topic, &digest);
        let timeout = deadline.clamp(self.config.generate_timeout);

        match self
            .generator
            .generate_within::<ContextSummary>(&prompt, ModelTier::Secondary, timeout)
            .await
        {
            Ok(summary) => {
                debug!(
                    prior_topics = summary.prior_topics.len(),
                    "context summary created"
                );
                state.context_summary = Some(summary);
            }
            Err(e) => {
                // Degrade to an empty summary rather than dropping the run
                state.record_failure(FailureKind::Validation, e.to_string(), true);
                state.context_summary = Some(ContextSummary::default());
            }
        }

        state
    }
}
