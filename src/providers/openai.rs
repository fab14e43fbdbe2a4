//! OpenAI-compatible chat adapter for the [`LanguageModel`] port.
//!
//! Talks to any server exposing the `/v1/chat/completions` surface. The
//! schema descriptor is rendered into the system message as a JSON-only
//! instruction; conformance checking stays in the structured-output layer.
//! Primary and secondary model tiers map to two configured model names.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{BriefError, GenerateError};
use crate::ports::{LanguageModel, ModelTier};
use crate::structured::SchemaDescriptor;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o";
const DEFAULT_SECONDARY_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 90;
const MAX_RETRIES: u32 = 2;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Chat-completions client implementing the language model port.
pub struct OpenAiChatModel {
    api_key: String,
    client: Client,
    base_url: String,
    primary_model: String,
    secondary_model: String,
    temperature: f64,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiChatModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            secondary_model: DEFAULT_SECONDARY_MODEL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
        }
    }

    /// Create from environment: `OPENAI_API_KEY` (required), plus optional
    /// `OPENAI_BASE_URL`, `PRIMARY_MODEL`, `SECONDARY_MODEL`.
    pub fn from_env() -> Result<Self, BriefError> {
        let api_key =
            std::env::var("OPENAI_API_KEY").map_err(|_| BriefError::MissingEnv("OPENAI_API_KEY"))?;
        let mut model = Self::new(api_key);

        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            model.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(primary) = std::env::var("PRIMARY_MODEL") {
            model.primary_model = primary;
        }
        if let Ok(secondary) = std::env::var("SECONDARY_MODEL") {
            model.secondary_model = secondary;
        }

        Ok(model)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(
        mut self,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        self.primary_model = primary.into();
        self.secondary_model = secondary.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.primary_model,
            ModelTier::Secondary => &self.secondary_model,
        }
    }

    fn system_message(schema: &SchemaDescriptor) -> String {
        format!(
            "You produce {description}. Respond with ONLY a JSON object \
             conforming to the `{name}` schema below. No prose, no markdown \
             fences.\n\nSchema:\n{schema}",
            description = schema.description,
            name = schema.name,
            schema = schema.schema,
        )
    }

    async fn complete_with_retry(&self, request: &ChatRequest) -> Result<String, GenerateError> {
        let mut last_error = GenerateError::Network("no attempts made".to_string());

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            match self.complete_single(request).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if !e.is_retryable() {
                        return Err(e);
                    }
                    warn!(attempt, error = %e, "chat completion failed, will retry");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn complete_single(&self, request: &ChatRequest) -> Result<String, GenerateError> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError::Timeout
                } else {
                    GenerateError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return match status.as_u16() {
                401 => Err(GenerateError::Unauthorized),
                429 => Err(GenerateError::RateLimited),
                status => Err(GenerateError::Http { status, message }),
            };
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Provider(format!("malformed completion response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError::Provider("completion carried no content".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn generate(
        &self,
        prompt: &str,
        schema: &SchemaDescriptor,
        tier: ModelTier,
    ) -> Result<String, GenerateError> {
        let model = self.model_for(tier).to_string();
        debug!(model = %model, schema = schema.name, "requesting chat completion");

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system".into(), content: Some(Self::system_message(schema)) },
                ChatMessage { role: "user".into(), content: Some(prompt.to_string()) },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object".into() },
        };

        self.complete_with_retry(&request).await
    }

    fn name(&self) -> &str {
        "openai-chat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor {
            name: "widget",
            description: "a widget",
            schema: serde_json::json!({"type": "object"}),
        }
    }

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn client(server: &MockServer) -> OpenAiChatModel {
        OpenAiChatModel::new("test-key")
            .with_base_url(server.uri())
            .with_models("primary-model", "secondary-model")
            .with_timeout(Duration::from_secs(5))
            .with_max_retries(0)
    }

    #[tokio::test]
    async fn test_generate_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(r#"{"a": 1}"#)))
            .mount(&server)
            .await;

        let raw = client(&server)
            .generate("make a widget", &schema(), ModelTier::Primary)
            .await
            .unwrap();
        assert_eq!(raw, r#"{"a": 1}"#);
    }

    #[tokio::test]
    async fn test_tier_selects_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "secondary-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let raw = client(&server)
            .generate("prompt", &schema(), ModelTier::Secondary)
            .await
            .unwrap();
        assert_eq!(raw, "ok");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_and_does_not_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server)
            .with_max_retries(3)
            .generate("prompt", &schema(), ModelTier::Primary)
            .await;
        assert!(matches!(result, Err(GenerateError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_server_error_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("recovered")))
            .mount(&server)
            .await;

        let raw = client(&server)
            .with_max_retries(2)
            .generate("prompt", &schema(), ModelTier::Primary)
            .await
            .unwrap();
        assert_eq!(raw, "recovered");
    }

    #[tokio::test]
    async fn test_empty_choices_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "x", "choices": []})),
            )
            .mount(&server)
            .await;

        let result = client(&server).generate("prompt", &schema(), ModelTier::Primary).await;
        assert!(matches!(result, Err(GenerateError::Provider(_))));
    }

    #[test]
    fn test_system_message_embeds_schema() {
        let message = OpenAiChatModel::system_message(&schema());
        assert!(message.contains("`widget`"));
        assert!(message.contains("ONLY a JSON object"));
    }
}
