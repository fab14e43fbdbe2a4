//! Capability ports consumed by the pipeline core.
//!
//! The orchestrator only depends on these abstract contracts; concrete
//! integrations live in [`crate::providers`] and can be swapped freely
//! (scripted stubs in tests, real HTTP adapters in the binary). All ports
//! are stateless from the pipeline's point of view and safe to share across
//! concurrent tasks behind an `Arc`.

use async_trait::async_trait;

use crate::error::{FetchError, GenerateError, HistoryError, SearchError};
use crate::schemas::{FetchedPage, FinalBrief, SearchHit};
use crate::structured::SchemaDescriptor;

/// Which model a generation call should use.
///
/// Primary handles the reasoning-heavy artifacts (plan, synthesis);
/// secondary handles the high-volume ones (context and source summaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Secondary,
}

/// Language model port: prompt + target schema in, raw text out.
///
/// Schema conformance of the returned text is not this port's job; the
/// structured-output layer validates and retries.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
        tier: ModelTier,
    ) -> Result<String, GenerateError>;

    /// Provider name for logging.
    fn name(&self) -> &str {
        "language-model"
    }
}

/// Web search port: one query in, ranked hits out.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Content retrieval port: one URL in, readable page text out.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Prior-brief history port. Load failures are treated as empty history by
/// the pipeline (best-effort enrichment, never a reason to abort).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn load_history(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<FinalBrief>, HistoryError>;
}
