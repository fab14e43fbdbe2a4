//! research-brief: a schema-validated research brief pipeline.
//!
//! Turns a free-text topic into an evidence-linked brief by chaining
//! model-driven stages over a single owned state object:
//!
//! ```text
//! INIT --(follow-up)--> CONTEXT --> PLAN --> SEARCH --> SUMMARIZE
//!     \--(otherwise)------------------^                    |
//!                      +--(fatal failure)--> ERROR --------+--> SYNTHESIZE
//!                      |                       |                    |
//!                      +-----------------------+------> DONE <-----+
//! ```
//!
//! Every model artifact is validated against its JSON schema with a bounded
//! corrective-retry policy; per-item faults (a bad source, a malformed
//! response, a fetch timeout) degrade that item and the run continues. Every
//! run returns a well-formed brief (degraded, mechanical, or error-shaped),
//! never an unhandled fault.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use research_brief::{BriefRequest, Pipeline, PipelineConfig, ResearchDepth};
//! use research_brief::providers::{HttpPageFetcher, MemoryHistoryStore, OpenAiChatModel, TavilySearch};
//!
//! let pipeline = Pipeline::builder()
//!     .model(Arc::new(OpenAiChatModel::from_env()?))
//!     .search(Arc::new(TavilySearch::from_env()?))
//!     .fetcher(Arc::new(HttpPageFetcher::default()))
//!     .history(Arc::new(MemoryHistoryStore::new()))
//!     .config(PipelineConfig::from_env())
//!     .build()?;
//!
//! let request = BriefRequest::new("AI ethics in medicine", "user-1")
//!     .with_depth(ResearchDepth::Moderate);
//! let report = pipeline.run(request).await;
//! println!("{}", report.brief.executive_summary);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod nodes;
pub mod pipeline;
pub mod ports;
pub mod prompts;
pub mod providers;
pub mod schemas;
pub mod state;
pub mod structured;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{BriefError, FetchError, GenerateError, HistoryError, SearchError};
pub use events::{EventKind, NullObserver, StageEvent, StageObserver, TracingObserver};
pub use pipeline::{Pipeline, PipelineBuilder, RunReport};
pub use ports::{ContentFetcher, HistoryStore, LanguageModel, ModelTier, SearchProvider};
pub use schemas::{
    BriefRequest, ContextSummary, DepthBudget, FetchedPage, FinalBrief, ResearchDepth,
    ResearchPlan, SearchHit, SourceSummary,
};
pub use state::{next_stage, FailureKind, FailureRecord, ResearchState, Stage};
pub use structured::{
    parse_structured, SchemaDescriptor, SchemaRetryExhausted, StructuredGenerator,
    StructuredOutput, ValidationError,
};
