//! Synthesizer node.
//!
//! Combines the surviving source summaries (plus optional context) into the
//! final brief. References are pre-sorted and injected by this node; the
//! model never controls their order. If structured generation exhausts its
//! retries, the node degrades to a mechanically assembled brief: any run
//! that reached this stage with usable sources returns a brief object.

use chrono::Utc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::nodes::Deadline;
use crate::ports::ModelTier;
use crate::prompts::BriefPrompts;
use crate::schemas::FinalBrief;
use crate::state::{FailureKind, ResearchState};
use crate::structured::StructuredGenerator;

pub struct SynthesizeNode {
    generator: StructuredGenerator,
    config: PipelineConfig,
}

/// Best-effort brief assembled without a model: summaries concatenated into
/// the synthesis, key points promoted to insights.
pub fn mechanical_brief(state: &ResearchState) -> FinalBrief {
    let references = state.sorted_references();

    let synthesis = references
        .iter()
        .map(|s| format!("## {}\n{}", s.title, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut key_insights: Vec<String> =
        references.iter().flat_map(|s| s.key_points.iter().cloned()).take(10).collect();
    if key_insights.is_empty() {
        key_insights.push(format!("Drawn from {} sources on {}", references.len(), state.topic));
    }

    FinalBrief {
        topic: state.topic.clone(),
        executive_summary: format!(
            "Research brief on \"{}\", assembled from {} sources. Synthesis was \
             produced mechanically from the individual source summaries.",
            state.topic,
            references.len(),
        ),
        synthesis,
        key_insights,
        references,
        context_used: state.context_summary.clone(),
        failure_reason: None,
        generated_at: Utc::now(),
    }
}

impl SynthesizeNode {
    pub fn new(generator: StructuredGenerator, config: PipelineConfig) -> Self {
        Self { generator, config }
    }

    pub async fn run(&self, mut state: ResearchState, deadline: Deadline) -> ResearchState {
        info!(sources = state.source_summaries.len(), "synthesizing final brief");

        let references = state.sorted_references();
        let prompt =
            BriefPrompts::synthesis(&state.topic, &references, state.context_summary.as_ref());
        let timeout = deadline.clamp(self.config.generate_timeout);

        let brief = match self
            .generator
            .generate_within::<FinalBrief>(&prompt, ModelTier::Primary, timeout)
            .await
        {
            Ok(mut brief) => {
                // Narrative comes from the model; everything else is pipeline-owned
                brief.topic = state.topic.clone();
                brief.references = references;
                brief.context_used = state.context_summary.clone();
                brief.failure_reason = None;
                brief.generated_at = Utc::now();
                brief
            }
            Err(e) => {
                warn!(error = %e, "synthesis degraded to mechanical assembly");
                state.record_failure(FailureKind::Validation, e.to_string(), true);
                mechanical_brief(&state)
            }
        };

        state.final_brief = Some(brief);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::ports::LanguageModel;
    use crate::schemas::{BriefRequest, ContextSummary, SourceSummary};
    use crate::state::Stage;
    use crate::structured::SchemaDescriptor;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedModel(String);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn generate(
            &self,
            _prompt: &str,
            _schema: &SchemaDescriptor,
            _tier: ModelTier,
        ) -> Result<String, GenerateError> {
            Ok(self.0.clone())
        }
    }

    fn summary(url: &str, score: f32) -> SourceSummary {
        SourceSummary {
            url: url.into(),
            title: format!("title {url}"),
            summary: format!("summary of {url}"),
            relevance_score: score,
            key_points: vec![format!("point from {url}")],
            source_type: "article".into(),
            publication_date: None,
            author: None,
        }
    }

    fn synthesize_state() -> ResearchState {
        let request = BriefRequest::new("AI ethics in medicine", "user-1");
        let mut state = ResearchState::new(&request);
        state.stage = Stage::Synthesize;
        state.source_summaries =
            vec![summary("https://low.com", 0.3), summary("https://high.com", 0.9)];
        state
    }

    fn node(response: impl Into<String>) -> SynthesizeNode {
        let generator =
            StructuredGenerator::new(Arc::new(FixedModel(response.into())), 0, Duration::from_secs(5));
        SynthesizeNode::new(generator, PipelineConfig::default())
    }

    fn brief_json() -> String {
        serde_json::json!({
            "topic": "model topic echo",
            "executive_summary": "An executive summary easily exceeding the fifty character floor.",
            "synthesis": "Full synthesis across all sources.",
            "key_insights": ["insight one", "insight two"],
            "references": [{
                "url": "https://model-invented.com",
                "title": "should be discarded",
                "summary": "s",
                "relevance_score": 0.1,
                "key_points": [],
                "source_type": "article"
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_references_injected_pre_sorted() {
        let state =
            node(brief_json()).run(synthesize_state(), Deadline::after(Duration::from_secs(30))).await;

        let brief = state.final_brief.expect("brief should be set");
        // Model-provided reference list is discarded in favor of pipeline data
        let urls: Vec<_> = brief.references.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://high.com", "https://low.com"]);
        assert_eq!(brief.topic, "AI ethics in medicine");
        assert!(!brief.is_error());
        assert!(state.failures.is_empty());
    }

    #[tokio::test]
    async fn test_context_propagates_to_brief() {
        let mut state = synthesize_state();
        state.context_summary = Some(ContextSummary {
            prior_topics: vec!["prior".into()],
            ..ContextSummary::default()
        });

        let state = node(brief_json()).run(state, Deadline::after(Duration::from_secs(30))).await;
        let brief = state.final_brief.unwrap();
        assert_eq!(brief.context_used.unwrap().prior_topics, vec!["prior"]);
    }

    #[tokio::test]
    async fn test_exhaustion_degrades_to_mechanical_brief() {
        let state = node("never valid json")
            .run(synthesize_state(), Deadline::after(Duration::from_secs(30)))
            .await;

        let brief = state.final_brief.as_ref().expect("brief should still be produced");
        assert!(!brief.is_error());
        assert_eq!(brief.references.len(), 2);
        assert!(brief.synthesis.contains("summary of https://high.com"));
        assert!(brief.key_insights.iter().any(|k| k.contains("https://high.com")));

        assert_eq!(state.failures.len(), 1);
        assert_eq!(state.failures[0].kind, FailureKind::Validation);
        assert!(state.failures[0].recoverable);
    }

    #[test]
    fn test_mechanical_brief_without_key_points() {
        let mut state = synthesize_state();
        for s in state.source_summaries.iter_mut() {
            s.key_points.clear();
        }

        let brief = mechanical_brief(&state);
        assert_eq!(brief.key_insights.len(), 1);
        assert!(brief.executive_summary.len() >= 50);
    }
}
