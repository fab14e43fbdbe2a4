//! Structured artifact types produced and consumed by the pipeline.
//!
//! Every model-generated artifact declares its JSON schema via
//! [`StructuredOutput`](crate::structured::StructuredOutput) and carries the
//! constraint checks that cannot be expressed through deserialization alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::structured::{SchemaDescriptor, StructuredOutput, ValidationError};

/// Requested research depth; maps to a source-count budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    /// 3-5 sources
    Shallow,
    /// 5-8 sources
    #[default]
    Moderate,
    /// 8-12 sources
    Deep,
}

/// Source-count ceiling and floor for a research depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthBudget {
    pub min: usize,
    pub max: usize,
}

impl ResearchDepth {
    pub fn budget(&self) -> DepthBudget {
        match self {
            ResearchDepth::Shallow => DepthBudget { min: 3, max: 5 },
            ResearchDepth::Moderate => DepthBudget { min: 5, max: 8 },
            ResearchDepth::Deep => DepthBudget { min: 8, max: 12 },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchDepth::Shallow => "shallow",
            ResearchDepth::Moderate => "moderate",
            ResearchDepth::Deep => "deep",
        }
    }
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shallow" => Ok(ResearchDepth::Shallow),
            "moderate" => Ok(ResearchDepth::Moderate),
            "deep" => Ok(ResearchDepth::Deep),
            other => Err(format!("unknown research depth: {other}")),
        }
    }
}

/// A request to generate a research brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefRequest {
    /// The research topic (free text, at least 5 characters)
    pub topic: String,
    /// Research depth level
    #[serde(default)]
    pub depth: ResearchDepth,
    /// Unique identifier for the requesting user
    pub user_id: String,
    /// Whether this request builds on the user's prior briefs
    #[serde(default)]
    pub follow_up: bool,
    /// Additional context or specific requirements
    #[serde(default)]
    pub additional_context: Option<String>,
}

impl BriefRequest {
    pub fn new(topic: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            depth: ResearchDepth::default(),
            user_id: user_id.into(),
            follow_up: false,
            additional_context: None,
        }
    }

    pub fn with_depth(mut self, depth: ResearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_follow_up(mut self, follow_up: bool) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    /// Reject requests no planner could act on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic.trim().len() < 5 {
            return Err(ValidationError::constraint("topic", "must be at least 5 characters"));
        }
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::constraint("user_id", "must not be empty"));
        }
        Ok(())
    }
}

/// The structured plan for conducting research.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    /// Search engine queries to execute
    pub queries: Vec<String>,
    /// Why these queries were chosen and how they address the topic
    pub rationale: String,
    /// Expected number of sources to gather
    pub expected_sources: u32,
    /// Key areas to focus on during research
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

impl StructuredOutput for ResearchPlan {
    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "research_plan",
            description: "Search queries and strategy for researching a topic",
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "queries": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Search engine queries that will yield diverse, high-quality sources"
                    },
                    "rationale": {
                        "type": "string",
                        "description": "Why these queries were chosen and how they address the topic"
                    },
                    "expected_sources": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 15,
                        "description": "Expected number of sources to gather"
                    },
                    "focus_areas": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Key areas to focus on during research"
                    }
                },
                "required": ["queries", "rationale", "expected_sources", "focus_areas"]
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.queries.iter().any(|q| !q.trim().is_empty()) {
            return Err(ValidationError::constraint("queries", "must contain at least one query"));
        }
        if self.expected_sources == 0 {
            return Err(ValidationError::constraint("expected_sources", "must be positive"));
        }
        if self.expected_sources > 15 {
            return Err(ValidationError::constraint("expected_sources", "must be at most 15"));
        }
        Ok(())
    }
}

/// A single search engine result. Produced by search, consumed by fetch;
/// never part of the returned artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// The plan query that produced this hit
    pub query_origin: String,
}

/// Fetched page content, truncated to the configured ceiling.
/// Intermediate product of the search stage, input to summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    pub content: String,
    pub word_count: usize,
}

/// A structured summary of a single source. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    /// URL of the source (the fetched URL is authoritative)
    pub url: String,
    /// Title of the source
    pub title: String,
    /// Concise summary of the content relevant to the research topic
    pub summary: String,
    /// Relevance to the topic, 0.0 to 1.0
    pub relevance_score: f32,
    /// Key points extracted from this source
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Type of source (article, paper, report, ...)
    #[serde(default)]
    pub source_type: String,
    /// Publication date, if the source states one
    #[serde(default)]
    pub publication_date: Option<String>,
    /// Author or organization, if the source states one
    #[serde(default)]
    pub author: Option<String>,
}

impl StructuredOutput for SourceSummary {
    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "source_summary",
            description: "Structured summary of one fetched source",
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL of the source" },
                    "title": { "type": "string", "description": "Title of the source" },
                    "summary": {
                        "type": "string",
                        "description": "Concise summary of the content relevant to the research topic"
                    },
                    "relevance_score": {
                        "type": "number",
                        "minimum": 0.0,
                        "maximum": 1.0,
                        "description": "Relevance to the topic, 0.0 to 1.0"
                    },
                    "key_points": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Key points extracted from this source"
                    },
                    "source_type": {
                        "type": "string",
                        "description": "Type of source (article, paper, report, ...)"
                    },
                    "publication_date": { "type": ["string", "null"] },
                    "author": { "type": ["string", "null"] }
                },
                "required": ["url", "title", "summary", "relevance_score", "key_points", "source_type"]
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.relevance_score) {
            return Err(ValidationError::constraint(
                "relevance_score",
                format!("must be within [0.0, 1.0], got {}", self.relevance_score),
            ));
        }
        if self.summary.trim().is_empty() {
            return Err(ValidationError::constraint("summary", "must not be empty"));
        }
        Ok(())
    }
}

/// Condensed record of the user's prior research, built once per
/// follow-up request and read-only thereafter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Topics from previous briefs
    #[serde(default)]
    pub prior_topics: Vec<String>,
    /// Key findings from previous research
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// How the new research relates to previous work
    #[serde(default)]
    pub condensed_context: String,
    /// Identifiers of the prior briefs that informed this summary
    #[serde(default)]
    pub relevant_history_ids: Vec<String>,
}

impl StructuredOutput for ContextSummary {
    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "context_summary",
            description: "Condensed summary of the user's prior research interactions",
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "prior_topics": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Topics from previous briefs"
                    },
                    "key_findings": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Key findings from previous research"
                    },
                    "condensed_context": {
                        "type": "string",
                        "description": "How the new research relates to previous work"
                    },
                    "relevant_history_ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Identifiers of the prior briefs that informed this summary"
                    }
                },
                "required": ["prior_topics", "key_findings", "condensed_context"]
            }),
        }
    }
}

/// The final, compiled research brief. Terminal artifact of every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalBrief {
    /// The original research topic
    pub topic: String,
    /// High-level summary of the research findings
    pub executive_summary: String,
    /// Detailed synthesis of information from all sources
    pub synthesis: String,
    /// Key insights and conclusions from the research
    pub key_insights: Vec<String>,
    /// All summarized sources, sorted by relevance (descending, ties in
    /// discovery order). Injected by the pipeline, never model-ordered.
    #[serde(default)]
    pub references: Vec<SourceSummary>,
    /// Prior-interaction summary used for this brief, if any
    #[serde(default)]
    pub context_used: Option<ContextSummary>,
    /// Set only on error-shaped briefs produced by the error handler
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

impl FinalBrief {
    /// Whether this brief was produced by the error handler rather than
    /// synthesis.
    pub fn is_error(&self) -> bool {
        self.failure_reason.is_some()
    }
}

impl StructuredOutput for FinalBrief {
    fn descriptor() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "final_brief",
            description: "The final research brief synthesizing all sources",
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "topic": { "type": "string", "description": "The original research topic" },
                    "executive_summary": {
                        "type": "string",
                        "minLength": 50,
                        "description": "High-level summary of the research findings"
                    },
                    "synthesis": {
                        "type": "string",
                        "description": "Detailed synthesis of information from all sources, structured into logical sections"
                    },
                    "key_insights": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Key insights and conclusions from the research"
                    }
                },
                "required": ["topic", "executive_summary", "synthesis", "key_insights"]
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.executive_summary.trim().len() < 50 {
            return Err(ValidationError::constraint(
                "executive_summary",
                "must be at least 50 characters",
            ));
        }
        if self.synthesis.trim().is_empty() {
            return Err(ValidationError::constraint("synthesis", "must not be empty"));
        }
        if self.key_insights.is_empty() {
            return Err(ValidationError::constraint("key_insights", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structured::parse_structured;

    #[test]
    fn test_depth_budgets() {
        assert_eq!(ResearchDepth::Shallow.budget(), DepthBudget { min: 3, max: 5 });
        assert_eq!(ResearchDepth::Moderate.budget(), DepthBudget { min: 5, max: 8 });
        assert_eq!(ResearchDepth::Deep.budget(), DepthBudget { min: 8, max: 12 });
    }

    #[test]
    fn test_depth_from_str() {
        assert_eq!("shallow".parse::<ResearchDepth>().unwrap(), ResearchDepth::Shallow);
        assert_eq!("DEEP".parse::<ResearchDepth>().unwrap(), ResearchDepth::Deep);
        assert!("bottomless".parse::<ResearchDepth>().is_err());
    }

    #[test]
    fn test_depth_serde_lowercase() {
        let json = serde_json::to_string(&ResearchDepth::Moderate).unwrap();
        assert_eq!(json, r#""moderate""#);
        let parsed: ResearchDepth = serde_json::from_str(r#""deep""#).unwrap();
        assert_eq!(parsed, ResearchDepth::Deep);
    }

    #[test]
    fn test_brief_request_validation() {
        let ok = BriefRequest::new("AI ethics in medicine", "user-1");
        assert!(ok.validate().is_ok());

        let short = BriefRequest::new("AI", "user-1");
        assert!(short.validate().is_err());

        let no_user = BriefRequest::new("AI ethics in medicine", "  ");
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn test_research_plan_validation() {
        let plan = ResearchPlan {
            queries: vec!["ai ethics".into()],
            rationale: "broad coverage".into(),
            expected_sources: 5,
            focus_areas: vec![],
        };
        assert!(plan.validate().is_ok());

        let empty_queries = ResearchPlan { queries: vec!["  ".into()], ..plan.clone() };
        assert!(empty_queries.validate().is_err());

        let zero_sources = ResearchPlan { expected_sources: 0, ..plan.clone() };
        assert!(zero_sources.validate().is_err());

        let too_many = ResearchPlan { expected_sources: 30, ..plan };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_source_summary_score_bounds() {
        let raw = serde_json::json!({
            "url": "https://example.com",
            "title": "Example",
            "summary": "A summary.",
            "relevance_score": 1.4,
            "key_points": ["point"],
            "source_type": "article"
        })
        .to_string();

        let result: Result<SourceSummary, _> = parse_structured(&raw);
        assert!(result.is_err());
    }

    #[test]
    fn test_source_summary_optional_metadata_defaults() {
        let raw = serde_json::json!({
            "url": "https://example.com",
            "title": "Example",
            "summary": "A summary.",
            "relevance_score": 0.7,
            "key_points": [],
            "source_type": "article"
        })
        .to_string();

        let summary: SourceSummary = parse_structured(&raw).unwrap();
        assert!(summary.publication_date.is_none());
        assert!(summary.author.is_none());
    }

    #[test]
    fn test_final_brief_parses_without_injected_fields() {
        // The model only produces the narrative fields; references,
        // context and timestamp are injected by the pipeline afterwards.
        let raw = serde_json::json!({
            "topic": "AI ethics",
            "executive_summary": "A fifty-plus character executive summary of the findings here.",
            "synthesis": "Detailed synthesis.",
            "key_insights": ["insight one"]
        })
        .to_string();

        let brief: FinalBrief = parse_structured(&raw).unwrap();
        assert!(brief.references.is_empty());
        assert!(brief.context_used.is_none());
        assert!(!brief.is_error());
    }

    #[test]
    fn test_final_brief_rejects_short_executive_summary() {
        let raw = serde_json::json!({
            "topic": "AI ethics",
            "executive_summary": "too short",
            "synthesis": "Detailed synthesis.",
            "key_insights": ["insight"]
        })
        .to_string();

        let result: Result<FinalBrief, _> = parse_structured(&raw);
        assert!(result.is_err());
    }

    #[test]
    fn test_context_summary_default_is_empty() {
        let ctx = ContextSummary::default();
        assert!(ctx.prior_topics.is_empty());
        assert!(ctx.condensed_context.is_empty());
    }
}
