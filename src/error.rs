//! Error types for the research brief pipeline.
//!
//! Each capability port has its own error enum so callers can classify
//! failures (retryable vs. not, timeout vs. hard fault) without string
//! matching. The pipeline itself never surfaces these directly: nodes
//! convert them into `FailureRecord`s and every run terminates in a
//! well-formed brief.

use thiserror::Error;

/// Top-level error for construction and configuration problems.
///
/// Runtime faults inside a pipeline run never take this shape; they are
/// absorbed into `FailureRecord`s on the run state.
#[derive(Error, Debug)]
pub enum BriefError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),
}

/// Failure of a `LanguageModel::generate` call.
#[derive(Error, Debug, Clone)]
pub enum GenerateError {
    #[error("generation timed out")]
    Timeout,

    #[error("unauthorized - check API key")]
    Unauthorized,

    #[error("rate limited by model provider")]
    RateLimited,

    #[error("provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),
}

impl GenerateError {
    /// Transient faults worth retrying at the port level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerateError::Timeout
                | GenerateError::RateLimited
                | GenerateError::Network(_)
                | GenerateError::Http { status: 500..=599, .. }
        )
    }
}

/// Failure of a `SearchProvider::search` call.
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    #[error("search timed out")]
    Timeout,

    #[error("unauthorized - check API key")]
    Unauthorized,

    #[error("rate limited by search provider")]
    RateLimited,

    #[error("search provider returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse search response: {0}")]
    Parse(String),
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchError::Timeout
                | SearchError::RateLimited
                | SearchError::Network(_)
                | SearchError::Http { status: 500..=599, .. }
        )
    }
}

/// Failure of a `ContentFetcher::fetch` call. Always scoped to one URL.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("fetch timed out")]
    Timeout,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("fetch returned HTTP {status}")]
    Http { status: u16 },

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Failure of a `HistoryStore::load_history` call.
///
/// Always treated as best-effort by the pipeline: the run continues with
/// empty history and a recoverable failure record.
#[derive(Error, Debug, Clone)]
pub enum HistoryError {
    #[error("history storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_error_retryable() {
        assert!(GenerateError::Timeout.is_retryable());
        assert!(GenerateError::RateLimited.is_retryable());
        assert!(GenerateError::Http { status: 503, message: String::new() }.is_retryable());

        assert!(!GenerateError::Unauthorized.is_retryable());
        assert!(!GenerateError::Http { status: 400, message: String::new() }.is_retryable());
        assert!(!GenerateError::Provider("bad".into()).is_retryable());
    }

    #[test]
    fn test_search_error_retryable() {
        assert!(SearchError::Timeout.is_retryable());
        assert!(SearchError::Http { status: 500, message: String::new() }.is_retryable());
        assert!(!SearchError::Unauthorized.is_retryable());
        assert!(!SearchError::Parse("oops".into()).is_retryable());
    }

    #[test]
    fn test_error_display_carries_detail() {
        let err = FetchError::Http { status: 404 };
        assert!(err.to_string().contains("404"));

        let err = HistoryError::Storage("db unreachable".into());
        assert!(err.to_string().contains("db unreachable"));
    }
}
