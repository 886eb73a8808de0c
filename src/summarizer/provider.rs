//! LLM provider backends and model alias resolution.
//!
//! Anthropic models are called directly over the Messages API; everything
//! else routes through OpenRouter's OpenAI-compatible endpoint.

use crate::error::{PodwiseError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Timeout for LLM API requests (5 minutes).
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Which backend serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenRouter,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Anthropic => write!(f, "anthropic"),
            Provider::OpenRouter => write!(f, "openrouter"),
        }
    }
}

/// A resolved model alias.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub alias: &'static str,
    pub provider: Provider,
    pub model_id: &'static str,
}

/// Model aliases mapped to (provider, upstream model id).
const MODEL_TABLE: &[(&str, Provider, &str)] = &[
    ("sonnet", Provider::Anthropic, "claude-sonnet-4-20250514"),
    ("haiku", Provider::Anthropic, "claude-3-5-haiku-20241022"),
    ("opus", Provider::Anthropic, "claude-opus-4-20250514"),
    ("or-sonnet", Provider::OpenRouter, "anthropic/claude-sonnet-4"),
    ("or-haiku", Provider::OpenRouter, "anthropic/claude-3.5-haiku"),
    ("or-opus", Provider::OpenRouter, "anthropic/claude-opus-4"),
    ("gpt-4o", Provider::OpenRouter, "openai/gpt-4o"),
    ("gpt-4-turbo", Provider::OpenRouter, "openai/gpt-4-turbo"),
    ("llama-70b", Provider::OpenRouter, "meta-llama/llama-3-70b-instruct"),
    ("deepseek", Provider::OpenRouter, "deepseek/deepseek-chat"),
];

/// Resolve a model alias, or fail with the list of valid aliases.
pub fn resolve_model(alias: &str) -> Result<ModelSpec> {
    MODEL_TABLE
        .iter()
        .find(|(a, _, _)| *a == alias)
        .map(|(a, provider, model_id)| ModelSpec {
            alias: a,
            provider: *provider,
            model_id,
        })
        .ok_or_else(|| PodwiseError::UnknownModel(alias.to_string()))
}

/// All known model aliases with their backing provider and model id.
pub fn available_models() -> impl Iterator<Item = (&'static str, Provider, &'static str)> {
    MODEL_TABLE.iter().copied()
}

/// Trait for chat-completion backends.
///
/// Implementations map HTTP 429 responses to `PodwiseError::RateLimited`
/// so callers can back off and retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, model_id: &str, max_tokens: u32) -> Result<String>;
}

/// Build the provider backend for a resolved model, reading its API key
/// from the environment.
pub fn provider_for(spec: &ModelSpec) -> Result<Box<dyn CompletionProvider>> {
    match spec.provider {
        Provider::Anthropic => Ok(Box::new(AnthropicProvider::from_env()?)),
        Provider::OpenRouter => Ok(Box::new(OpenRouterProvider::from_env()?)),
    }
}

/// Direct Anthropic Messages API client.
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicProvider {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            PodwiseError::Config(
                "ANTHROPIC_API_KEY not set. Export it or add it to your shell profile."
                    .to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { http, api_key }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, model_id: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": model_id,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PodwiseError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PodwiseError::Provider(format!(
                "Anthropic API returned {}: {}",
                status,
                text.chars().take(300).collect::<String>()
            )));
        }

        let json: serde_json::Value = response.json().await?;
        debug!(
            input_tokens = json["usage"]["input_tokens"].as_u64(),
            output_tokens = json["usage"]["output_tokens"].as_u64(),
            "anthropic completion"
        );

        json["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| PodwiseError::Provider("Empty response from Anthropic".to_string()))
    }
}

/// OpenRouter client via the OpenAI-compatible chat API.
pub struct OpenRouterProvider {
    client: Client<OpenAIConfig>,
}

impl OpenRouterProvider {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            PodwiseError::Config(
                "OPENROUTER_API_KEY not set. Export it or add it to your shell profile."
                    .to_string(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        let config = OpenAIConfig::new()
            .with_api_base(OPENROUTER_API_BASE)
            .with_api_key(api_key);
        let client = Client::with_config(config).with_http_client(http_client);
        Self { client }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    async fn complete(&self, prompt: &str, model_id: &str, max_tokens: u32) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> =
            vec![ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PodwiseError::Provider(e.to_string()))?
                .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model_id)
            .max_tokens(max_tokens)
            .messages(messages)
            .build()
            .map_err(|e| PodwiseError::Provider(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            match &e {
                async_openai::error::OpenAIError::ApiError(api_err)
                    if api_err.code.as_deref() == Some("429")
                        || api_err
                            .message
                            .to_lowercase()
                            .contains("rate limit") =>
                {
                    PodwiseError::RateLimited
                }
                _ => PodwiseError::Provider(format!("OpenRouter request failed: {}", e)),
            }
        })?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .map(|s| s.to_string())
            .ok_or_else(|| PodwiseError::Provider("Empty response from OpenRouter".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_aliases() {
        let sonnet = resolve_model("sonnet").unwrap();
        assert_eq!(sonnet.provider, Provider::Anthropic);
        assert_eq!(sonnet.model_id, "claude-sonnet-4-20250514");

        let gpt = resolve_model("gpt-4o").unwrap();
        assert_eq!(gpt.provider, Provider::OpenRouter);
        assert_eq!(gpt.model_id, "openai/gpt-4o");
    }

    #[test]
    fn test_resolve_unknown_alias() {
        let err = resolve_model("gpt-99").unwrap_err();
        assert!(matches!(err, PodwiseError::UnknownModel(_)));
    }

    #[test]
    fn test_model_table_aliases_are_unique() {
        let mut aliases: Vec<&str> = available_models().map(|(a, _, _)| a).collect();
        let total = aliases.len();
        aliases.sort();
        aliases.dedup();
        assert_eq!(aliases.len(), total);
    }
}
