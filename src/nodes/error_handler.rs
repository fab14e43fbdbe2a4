//! Error handler node.
//!
//! Terminal formatting step: converts the accumulated failure records and
//! whatever partial evidence exists into an explicit error-shaped brief.
//! Pure and infallible: no ports, no awaits, nothing left to go wrong.

use chrono::Utc;
use tracing::error;

use crate::schemas::FinalBrief;
use crate::state::ResearchState;

pub struct ErrorHandlerNode;

/// Build the error-shaped brief for a failed run.
pub fn error_brief(state: &ResearchState) -> FinalBrief {
    let failure_reason = state
        .failures
        .iter()
        .find(|f| !f.recoverable)
        .map(|f| f.detail.clone())
        .unwrap_or_else(|| "no usable sources were gathered".to_string());

    let references = state.sorted_references();

    let mut key_insights: Vec<String> = state
        .failures
        .iter()
        .map(|f| format!("{:?} failure at {}: {}", f.kind, f.stage, f.detail))
        .collect();
    if key_insights.is_empty() {
        key_insights.push("The run terminated before gathering evidence".to_string());
    }

    let synthesis = if references.is_empty() {
        format!(
            "Research on \"{}\" could not be completed: {}. No sources were \
             successfully gathered before the failure.",
            state.topic, failure_reason,
        )
    } else {
        format!(
            "Research on \"{}\" could not be completed: {}. Partial evidence \
             from {} source(s) gathered before the failure is attached under \
             references.",
            state.topic,
            failure_reason,
            references.len(),
        )
    };

    FinalBrief {
        topic: state.topic.clone(),
        executive_summary: format!(
            "The research brief for \"{}\" could not be generated: {}.",
            state.topic, failure_reason,
        ),
        synthesis,
        key_insights,
        references,
        context_used: state.context_summary.clone(),
        failure_reason: Some(failure_reason),
        generated_at: Utc::now(),
    }
}

impl ErrorHandlerNode {
    pub fn run(&self, mut state: ResearchState) -> ResearchState {
        error!(
            topic = %state.topic,
            failures = state.failures.len(),
            "run failed, producing error brief"
        );
        state.final_brief = Some(error_brief(&state));
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{BriefRequest, SourceSummary};
    use crate::state::{FailureKind, Stage};

    fn failed_state() -> ResearchState {
        let request = BriefRequest::new("AI ethics in medicine", "user-1");
        let mut state = ResearchState::new(&request);
        state.stage = Stage::Search;
        state.record_failure(FailureKind::Fetch, "fetch of https://a.com failed", true);
        state.record_failure(FailureKind::NoSources, "all fetches failed", false);
        state.stage = Stage::Error;
        state
    }

    #[test]
    fn test_error_brief_carries_failure_reason() {
        let brief = error_brief(&failed_state());

        assert!(brief.is_error());
        assert_eq!(brief.failure_reason.as_deref(), Some("all fetches failed"));
        assert!(brief.executive_summary.contains("could not be generated"));
        assert_eq!(brief.key_insights.len(), 2);
    }

    #[test]
    fn test_error_brief_includes_partial_evidence() {
        let mut state = failed_state();
        state.source_summaries.push(SourceSummary {
            url: "https://partial.com".into(),
            title: "partial".into(),
            summary: "made it through".into(),
            relevance_score: 0.6,
            key_points: vec![],
            source_type: "article".into(),
            publication_date: None,
            author: None,
        });

        let brief = error_brief(&state);
        assert_eq!(brief.references.len(), 1);
        assert!(brief.synthesis.contains("Partial evidence"));
    }

    #[test]
    fn test_node_always_sets_brief() {
        let state = ErrorHandlerNode.run(failed_state());
        assert!(state.final_brief.is_some());
    }

    #[test]
    fn test_error_brief_without_explicit_fatal_record() {
        let request = BriefRequest::new("AI ethics in medicine", "user-1");
        let state = ResearchState::new(&request);

        let brief = error_brief(&state);
        assert_eq!(brief.failure_reason.as_deref(), Some("no usable sources were gathered"));
    }
}
