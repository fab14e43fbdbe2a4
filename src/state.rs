//! Run state and the pipeline state machine.
//!
//! A [`ResearchState`] is created at request entry, mutated stage-by-stage by
//! exactly the node that owns the current stage, and discarded once the final
//! brief is handed back. The orchestrator is the only component that advances
//! [`Stage`]; [`next_stage`] is the complete transition table and is testable
//! in isolation from node logic.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::schemas::{
    BriefRequest, ContextSummary, FetchedPage, FinalBrief, ResearchDepth, ResearchPlan, SearchHit,
    SourceSummary,
};

/// Stages of the fixed pipeline topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Init,
    Context,
    Plan,
    Search,
    Summarize,
    Synthesize,
    Error,
    Done,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Context => "context",
            Stage::Plan => "plan",
            Stage::Search => "search",
            Stage::Summarize => "summarize",
            Stage::Synthesize => "synthesize",
            Stage::Error => "error",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Model output did not satisfy its schema within the retry budget
    Validation,
    /// Model call failed at the provider level
    Generation,
    /// A search query failed
    Search,
    /// A single source could not be fetched
    Fetch,
    /// A call or the whole request ran out of time
    Timeout,
    /// Empty or invalid plan; nothing downstream can proceed
    Planning,
    /// Zero usable sources survived a stage
    NoSources,
    /// History could not be loaded (best-effort, run continues)
    Storage,
}

/// One recorded failure. Appended, never removed; the set of records drives
/// the error-vs-synthesize branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub stage: Stage,
    pub kind: FailureKind,
    pub detail: String,
    pub recoverable: bool,
}

/// The single mutable state object threaded through all pipeline nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub depth: ResearchDepth,
    pub user_id: String,
    pub is_follow_up: bool,
    pub additional_context: Option<String>,

    pub context_summary: Option<ContextSummary>,
    pub plan: Option<ResearchPlan>,
    pub raw_hits: Vec<SearchHit>,
    pub fetched: Vec<FetchedPage>,
    pub source_summaries: Vec<SourceSummary>,
    pub failures: Vec<FailureRecord>,
    pub final_brief: Option<FinalBrief>,

    pub stage: Stage,
}

impl ResearchState {
    pub fn new(request: &BriefRequest) -> Self {
        Self {
            topic: request.topic.clone(),
            depth: request.depth,
            user_id: request.user_id.clone(),
            is_follow_up: request.follow_up,
            additional_context: request.additional_context.clone(),
            context_summary: None,
            plan: None,
            raw_hits: Vec::new(),
            fetched: Vec::new(),
            source_summaries: Vec::new(),
            failures: Vec::new(),
            final_brief: None,
            stage: Stage::Init,
        }
    }

    /// Append a failure record.
    pub fn record_failure(
        &mut self,
        kind: FailureKind,
        detail: impl Into<String>,
        recoverable: bool,
    ) {
        let detail = detail.into();
        warn!(
            stage = %self.stage,
            kind = ?kind,
            recoverable,
            detail = %detail,
            "pipeline failure recorded"
        );
        self.failures.push(FailureRecord { stage: self.stage, kind, detail, recoverable });
    }

    /// Whether any non-recoverable failure has been recorded.
    pub fn has_fatal_failure(&self) -> bool {
        self.failures.iter().any(|f| !f.recoverable)
    }

    /// Failures that degraded the run without aborting it.
    pub fn recoverable_failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(|f| f.recoverable)
    }

    /// References in presentation order: relevance descending, ties kept in
    /// discovery order (stable sort).
    pub fn sorted_references(&self) -> Vec<SourceSummary> {
        let mut refs = self.source_summaries.clone();
        refs.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        refs
    }
}

/// The complete transition table of the pipeline state machine.
///
/// "Fatal" means a non-recoverable failure has been recorded. The
/// zero-usable-summaries guard after SUMMARIZE is also checked directly,
/// independent of the failure records.
pub fn next_stage(state: &ResearchState) -> Stage {
    match state.stage {
        Stage::Init => {
            if state.has_fatal_failure() {
                Stage::Error
            } else if state.is_follow_up {
                Stage::Context
            } else {
                Stage::Plan
            }
        }
        Stage::Context => Stage::Plan,
        Stage::Plan => {
            if state.has_fatal_failure() {
                Stage::Error
            } else {
                Stage::Search
            }
        }
        Stage::Search => {
            if state.has_fatal_failure() {
                Stage::Error
            } else {
                Stage::Summarize
            }
        }
        Stage::Summarize => {
            if state.has_fatal_failure() || state.source_summaries.is_empty() {
                Stage::Error
            } else {
                Stage::Synthesize
            }
        }
        Stage::Synthesize | Stage::Error => Stage::Done,
        Stage::Done => Stage::Done,
    }
}
