//! Structured output contracts and the bounded-retry validator.
//!
//! Every model-generated artifact in the pipeline (plan, context summary,
//! source summary, final brief) is produced against a JSON schema and
//! validated before it enters shared state. When validation fails, the
//! original prompt is reissued with a corrective instruction describing the
//! error, up to a fixed retry budget. Exhausting the budget degrades the
//! unit of work that requested the artifact; it never aborts the run.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ports::{LanguageModel, ModelTier};

/// A named JSON schema handed to the language model alongside the prompt.
///
/// Schemas are plain `serde_json` documents, the same convention used for
/// tool parameter definitions.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    /// Schema name, e.g. `research_plan`
    pub name: &'static str,
    /// One-line description of the artifact
    pub description: &'static str,
    /// JSON Schema document
    pub schema: Value,
}

/// Why a raw model output failed validation.
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("output is not valid JSON: {0}")]
    Parse(String),

    #[error("`{field}`: {message}")]
    Constraint { field: &'static str, message: String },
}

impl ValidationError {
    pub fn constraint(field: &'static str, message: impl Into<String>) -> Self {
        Self::Constraint { field, message: message.into() }
    }
}

/// An artifact type that can be produced via structured generation.
pub trait StructuredOutput: Sized {
    /// The schema the model output must conform to.
    fn descriptor() -> SchemaDescriptor;

    /// Constraint checks beyond what deserialization enforces
    /// (value ranges, non-empty lists).
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Structured generation failed after every allowed attempt.
#[derive(Error, Debug, Clone)]
#[error("schema `{schema}` not satisfied after {attempts} attempts: {last_error}")]
pub struct SchemaRetryExhausted {
    pub schema: &'static str,
    pub attempts: u32,
    pub last_error: String,
}

/// Extract the JSON payload from raw model output.
///
/// Models wrap JSON in markdown fences or prose more often than not;
/// take the span from the first `{` to the last `}` after unfencing.
fn extract_json(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        // Skip a language tag such as `json` on the fence line
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        text = match body.find("```") {
            Some(end) => body[..end].trim(),
            None => body.trim(),
        };
    }

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Parse and validate raw model output against a structured output type.
pub fn parse_structured<T>(raw: &str) -> Result<T, ValidationError>
where
    T: StructuredOutput + DeserializeOwned,
{
    let payload = extract_json(raw);
    let value: T =
        serde_json::from_str(payload).map_err(|e| ValidationError::Parse(e.to_string()))?;
    value.validate()?;
    Ok(value)
}

/// Corrective instruction appended to the prompt on a retry attempt.
fn correction_instruction(descriptor: &SchemaDescriptor, error: &str) -> String {
    format!(
        "Your previous response did not satisfy the `{name}` schema: {error}.\n\
         Respond again with ONLY a JSON object conforming to this schema, \
         no prose and no markdown fences:\n{schema}",
        name = descriptor.name,
        error = error,
        schema = descriptor.schema,
    )
}

/// Uniform bounded-retry wrapper around a `LanguageModel` port.
///
/// Applied by every node that generates a structured artifact:
/// `retry_budget` retries (so `retry_budget + 1` attempts total), an
/// independent timeout per attempt, and a corrective instruction appended
/// after each validation failure. Provider faults consume attempts the same
/// way validation failures do.
#[derive(Clone)]
pub struct StructuredGenerator {
    model: Arc<dyn LanguageModel>,
    retry_budget: u32,
    timeout: Duration,
}

impl StructuredGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, retry_budget: u32, timeout: Duration) -> Self {
        Self { model, retry_budget, timeout }
    }

    /// Generate a validated artifact using the default per-attempt timeout.
    pub async fn generate<T>(&self, prompt: &str, tier: ModelTier) -> Result<T, SchemaRetryExhausted>
    where
        T: StructuredOutput + DeserializeOwned,
    {
        self.generate_within(prompt, tier, self.timeout).await
    }

    /// Generate a validated artifact with an explicit per-attempt timeout
    /// (used to clamp attempts to the remaining request deadline).
    pub async fn generate_within<T>(
        &self,
        prompt: &str,
        tier: ModelTier,
        per_attempt: Duration,
    ) -> Result<T, SchemaRetryExhausted>
    where
        T: StructuredOutput + DeserializeOwned,
    {
        let descriptor = T::descriptor();
        let attempts = self.retry_budget + 1;
        let mut current_prompt = prompt.to_string();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let call = self.model.generate(&current_prompt, &descriptor, tier);
            match tokio::time::timeout(per_attempt, call).await {
                Err(_) => {
                    last_error = format!("generation timed out after {:?}", per_attempt);
                    warn!(schema = descriptor.name, attempt, "generation attempt timed out");
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    warn!(schema = descriptor.name, attempt, error = %e, "generation attempt failed");
                }
                Ok(Ok(raw)) => match parse_structured::<T>(&raw) {
                    Ok(value) => {
                        debug!(schema = descriptor.name, attempt, "structured output validated");
                        return Ok(value);
                    }
                    Err(e) => {
                        last_error = e.to_string();
                        warn!(schema = descriptor.name, attempt, error = %e, "schema validation failed");
                        current_prompt =
                            format!("{}\n\n{}", prompt, correction_instruction(&descriptor, &last_error));
                    }
                },
            }
        }

        Err(SchemaRetryExhausted { schema: descriptor.name, attempts, last_error })
    }
}
