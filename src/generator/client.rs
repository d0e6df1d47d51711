use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    generator::{
        errors::GenerationError,
        types::{
            DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, GenerationOutput,
            GenerationRequest, TokenUsage,
        },
    },
};

/// Produces text from a system prompt and a user prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError>;
}

// --- OpenAI-compatible wire format ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// [`Generator`] backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// Holds no state beyond the HTTP client and credential. No retries: a failed
/// call is reported once.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiGenerator {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let default_model = default_model.into();
        info!(endpoint = %base_url, model = %default_model, "generator configured");

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            default_model,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        if config.openai_api_key().is_empty() {
            warn!("OPENAI_API_KEY is not set; generation requests will be rejected upstream");
        }
        Self::new(
            config.openai_base_url(),
            config.openai_api_key(),
            config.generation_model(),
        )
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    #[instrument(skip_all, fields(model))]
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        tracing::Span::current().record("model", model);

        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    if raw.is_empty() {
                        status.canonical_reason().unwrap_or("unknown error").to_string()
                    } else {
                        raw
                    }
                });
            warn!(status = status.as_u16(), %message, "generation request rejected");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let choice = chat.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(GenerationError::NoContent)?;

        debug!(
            chars = content.len(),
            finish_reason = finish_reason.as_deref().unwrap_or("unknown"),
            "generation complete"
        );

        Ok(GenerationOutput {
            content,
            usage: chat.usage,
            finish_reason,
        })
    }
}
