//! Research planner node.
//!
//! Turns the topic (plus optional context) into a [`ResearchPlan`]. A plan
//! that cannot be produced or that carries no usable queries is a
//! non-recoverable planning failure: nothing downstream can run without it.

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::nodes::Deadline;
use crate::ports::ModelTier;
use crate::prompts::BriefPrompts;
use crate::schemas::ResearchPlan;
use crate::state::{FailureKind, ResearchState};
use crate::structured::StructuredGenerator;

pub struct PlannerNode {
    generator: StructuredGenerator,
    config: PipelineConfig,
}

impl PlannerNode {
    pub fn new(generator: StructuredGenerator, config: PipelineConfig) -> Self {
        Self { generator, config }
    }

    pub async fn run(&self, mut state: ResearchState, deadline: Deadline) -> ResearchState {
        info!(topic = %state.topic, depth = %state.depth, "planning research");

        let prompt = BriefPrompts::plan(
            &state.topic,
            state.depth,
            state.context_summary.as_ref(),
            state.additional_context.as_deref(),
        );
        let timeout = deadline.clamp(self.config.generate_timeout);

        let plan = match self
            .generator
            .generate_within::<ResearchPlan>(&prompt, ModelTier::Primary, timeout)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                state.record_failure(FailureKind::Planning, e.to_string(), false);
                return state;
            }
        };

        match self.normalize(plan, &state) {
            Ok(plan) => {
                debug!(
                    queries = plan.queries.len(),
                    expected_sources = plan.expected_sources,
                    "research plan ready"
                );
                state.plan = Some(plan);
            }
            Err(reason) => {
                state.record_failure(FailureKind::Planning, reason, false);
            }
        }

        state
    }

    /// Deduplicate queries and clamp `expected_sources` into the depth
    /// budget and the per-query search capacity.
    fn normalize(&self, mut plan: ResearchPlan, state: &ResearchState) -> Result<ResearchPlan, String> {
        let mut seen = std::collections::HashSet::new();
        plan.queries.retain(|q| {
            let key = q.trim().to_lowercase();
            !key.is_empty() && seen.insert(key)
        });

        if plan.queries.is_empty() {
            return Err("plan contains no usable queries".to_string());
        }

        let budget = state.depth.budget();
        let capacity = self.config.max_sources_per_query * plan.queries.len();
        let cap = budget.max.min(capacity) as u32;
        plan.expected_sources = plan.expected_sources.clamp(1, cap.max(1));

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerateError;
    use crate::ports::LanguageModel;
    use crate::schemas::{BriefRequest, ResearchDepth};
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

    fn plan_state(depth: ResearchDepth) -> ResearchState {
        let request = BriefRequest::new("AI ethics in medicine", "user-1").with_depth(depth);
        let mut state = ResearchState::new(&request);
        state.stage = Stage::Plan;
        state
    }

    fn node(response: impl Into<String>) -> PlannerNode {
        let generator =
            StructuredGenerator::new(Arc::new(FixedModel(response.into())), 0, Duration::from_secs(5));
        PlannerNode::new(generator, PipelineConfig::default())
    }

    fn plan_json(queries: &[&str], expected: u32) -> String {
        serde_json::json!({
            "queries": queries,
            "rationale": "cover the topic from several angles",
            "expected_sources": expected,
            "focus_areas": ["ethics"]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_plan_created() {
        let node = node(plan_json(&["ai ethics overview", "ai ethics regulation"], 6));
        let state = node
            .run(plan_state(ResearchDepth::Moderate), Deadline::after(Duration::from_secs(30)))
            .await;

        let plan = state.plan.expect("plan should be set");
        assert_eq!(plan.queries.len(), 2);
        assert_eq!(plan.expected_sources, 6);
        assert!(state.failures.is_empty());
    }

    #[tokio::test]
    async fn test_queries_deduplicated_case_insensitively() {
        let node = node(plan_json(&["AI Ethics", "ai ethics", "  ", "ai ethics law"], 5));
        let state = node
            .run(plan_state(ResearchDepth::Moderate), Deadline::after(Duration::from_secs(30)))
            .await;

        let plan = state.plan.expect("plan should be set");
        assert_eq!(plan.queries, vec!["AI Ethics", "ai ethics law"]);
    }

    #[tokio::test]
    async fn test_expected_sources_clamped_to_depth_budget() {
        // Depth shallow caps at 5 even when the model asks for 12
        let node = node(plan_json(&["q1", "q2", "q3"], 12));
        let state = node
            .run(plan_state(ResearchDepth::Shallow), Deadline::after(Duration::from_secs(30)))
            .await;

        assert_eq!(state.plan.expect("plan should be set").expected_sources, 5);
    }

    #[tokio::test]
    async fn test_expected_sources_clamped_to_query_capacity() {
        // One query at 5 hits per query cannot support 8 sources
        let generator = StructuredGenerator::new(
            Arc::new(FixedModel(plan_json(&["single query"], 8))),
            0,
            Duration::from_secs(5),
        );
        let node = PlannerNode::new(
            generator,
            PipelineConfig::default().with_max_sources_per_query(3),
        );
        let state = node
            .run(plan_state(ResearchDepth::Deep), Deadline::after(Duration::from_secs(30)))
            .await;

        assert_eq!(state.plan.expect("plan should be set").expected_sources, 3);
    }

    #[tokio::test]
    async fn test_generation_exhaustion_is_fatal() {
        let node = node("not json");
        let state = node
            .run(plan_state(ResearchDepth::Moderate), Deadline::after(Duration::from_secs(30)))
            .await;

        assert!(state.plan.is_none());
        assert!(state.has_fatal_failure());
        assert_eq!(state.failures[0].kind, FailureKind::Planning);
    }

    #[tokio::test]
    async fn test_all_blank_queries_is_fatal() {
        let node = node(plan_json(&["   ", "\t"], 5));
        let state = node
            .run(plan_state(ResearchDepth::Moderate), Deadline::after(Duration::from_secs(30)))
            .await;

        assert!(state.plan.is_none());
        assert!(state.has_fatal_failure());
    }
}
