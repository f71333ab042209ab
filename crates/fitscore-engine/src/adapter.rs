//! AI request adapter: one call surface over two provider wire formats.
//!
//! Normalizes the chat-completions and structured-messages formats into a
//! single request/response shape, enforces a per-call timeout, and performs
//! exactly one retry against a model's designated backup on HTTP or
//! transport failure. Same-model retries are deliberately absent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::Error as _;
use serde::Deserialize;

use fitscore_core::SecretProvider;

use crate::catalog::{ModelCatalog, ModelDescriptor, WireFormat};
use crate::error::EngineError;

/// Longest provider error body kept in an error message.
const ERROR_BODY_MAX: usize = 300;

/// Normalized outcome of one AI call.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    /// Raw content returned by the model (JSON text when a schema was requested).
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// The model that actually answered: the primary, or its backup.
    pub model_used: String,
    pub provider: String,
}

/// HTTP client for AI providers.
///
/// Use [`AiClient::new`] in production; tests inject wiremock URLs through
/// the `base_urls` map (provider name → base URL).
pub struct AiClient {
    client: reqwest::Client,
    catalog: Arc<ModelCatalog>,
    secrets: Arc<dyn SecretProvider>,
    base_urls: HashMap<String, String>,
}

impl AiClient {
    /// Creates a new adapter.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        catalog: Arc<ModelCatalog>,
        secrets: Arc<dyn SecretProvider>,
        base_urls: HashMap<String, String>,
        user_agent: &str,
        connect_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent.to_owned())
            .build()?;
        Ok(Self {
            client,
            catalog,
            secrets,
            base_urls,
        })
    }

    /// Executes one model call with the backup-retry policy.
    ///
    /// On non-success HTTP status or transport failure (timeouts included),
    /// retries exactly once against the model's `backup_model_id` with the
    /// same prompt and schema. If the backup also fails, the original error
    /// is returned annotated with both attempted model ids.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingSecret`] when the provider key is absent;
    ///   a configuration error, never retried against the backup.
    /// - [`EngineError::BackupExhausted`] when primary and backup both fail.
    /// - [`EngineError::Provider`] / [`EngineError::Http`] when the model
    ///   fails and has no backup.
    /// - [`EngineError::Deserialize`] on an unparseable provider response.
    pub async fn execute(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        max_tokens: u32,
        output_schema: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ModelResponse, EngineError> {
        match self
            .attempt(model, prompt, max_tokens, output_schema, timeout)
            .await
        {
            Ok(response) => Ok(response),
            Err(primary_err) if backup_eligible(&primary_err) => {
                let Some(backup_id) = &model.backup_model_id else {
                    return Err(primary_err);
                };
                let backup = self.catalog.lookup_model(backup_id)?;
                tracing::warn!(
                    primary = %model.id,
                    backup = %backup.id,
                    error = %primary_err,
                    "model call failed, retrying once against backup"
                );
                // The backup may have a smaller output budget than the primary.
                match self
                    .attempt(
                        backup,
                        prompt,
                        max_tokens.min(backup.max_tokens),
                        output_schema,
                        timeout,
                    )
                    .await
                {
                    Ok(response) => Ok(response),
                    Err(backup_err) => {
                        tracing::warn!(
                            primary = %model.id,
                            backup = %backup.id,
                            error = %backup_err,
                            "backup model also failed"
                        );
                        Err(EngineError::BackupExhausted {
                            primary: model.id.clone(),
                            backup: backup.id.clone(),
                            source: Box::new(primary_err),
                        })
                    }
                }
            }
            Err(other) => Err(other),
        }
    }

    /// One call against one concrete model, no retry policy.
    async fn attempt(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        max_tokens: u32,
        output_schema: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ModelResponse, EngineError> {
        let base_url = self
            .base_urls
            .get(&model.provider)
            .ok_or_else(|| EngineError::UnknownProvider(model.provider.clone()))?;

        let key_name = format!("{}_API_KEY", model.provider.to_uppercase());
        let api_key = self
            .secrets
            .get(&key_name)
            .ok_or(EngineError::MissingSecret(key_name))?;

        match model.wire_format {
            WireFormat::Chat => {
                self.chat_call(model, base_url, &api_key, prompt, max_tokens, output_schema, timeout)
                    .await
            }
            WireFormat::StructuredResponse => {
                self.structured_call(
                    model,
                    base_url,
                    &api_key,
                    prompt,
                    max_tokens,
                    output_schema,
                    timeout,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn chat_call(
        &self,
        model: &ModelDescriptor,
        base_url: &str,
        api_key: &str,
        prompt: &str,
        max_tokens: u32,
        output_schema: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ModelResponse, EngineError> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = chat_body(&model.id, prompt, max_tokens, output_schema);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        let text = Self::success_body(&model.id, response).await?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::Deserialize {
                context: format!("chat response from {}", model.id),
                source: e,
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EngineError::Deserialize {
                context: format!("chat response from {}", model.id),
                source: serde_json::Error::custom("response contained no choices"),
            })?;

        Ok(ModelResponse {
            content,
            tokens_in: parsed.usage.prompt_tokens,
            tokens_out: parsed.usage.completion_tokens,
            model_used: model.id.clone(),
            provider: model.provider.clone(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn structured_call(
        &self,
        model: &ModelDescriptor,
        base_url: &str,
        api_key: &str,
        prompt: &str,
        max_tokens: u32,
        output_schema: Option<&serde_json::Value>,
        timeout: Duration,
    ) -> Result<ModelResponse, EngineError> {
        let url = format!("{}/v1/messages", base_url.trim_end_matches('/'));
        let body = structured_body(&model.id, prompt, max_tokens, output_schema);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(timeout)
            .json(&body)
            .send()
            .await?;

        let text = Self::success_body(&model.id, response).await?;
        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| EngineError::Deserialize {
                context: format!("messages response from {}", model.id),
                source: e,
            })?;

        let content = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| EngineError::Deserialize {
                context: format!("messages response from {}", model.id),
                source: serde_json::Error::custom("response contained no content blocks"),
            })?;

        Ok(ModelResponse {
            content,
            tokens_in: parsed.usage.input_tokens,
            tokens_out: parsed.usage.output_tokens,
            model_used: model.id.clone(),
            provider: model.provider.clone(),
        })
    }

    /// Asserts a 2xx status and returns the body text; non-success statuses
    /// become [`EngineError::Provider`] with a truncated body excerpt.
    async fn success_body(
        model_id: &str,
        response: reqwest::Response,
    ) -> Result<String, EngineError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return Ok(text);
        }
        let mut body = text;
        body.truncate(ERROR_BODY_MAX);
        Err(EngineError::Provider {
            model: model_id.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

/// Only HTTP-level and transport-level failures are worth a backup attempt;
/// configuration and parse errors would fail identically against the backup
/// provider's request for the same reason or mask a real bug.
fn backup_eligible(err: &EngineError) -> bool {
    matches!(err, EngineError::Http(_) | EngineError::Provider { .. })
}

fn chat_body(
    model_id: &str,
    prompt: &str,
    max_tokens: u32,
    output_schema: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model_id,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": max_tokens,
    });
    if let Some(schema) = output_schema {
        body["response_format"] = serde_json::json!({
            "type": "json_schema",
            "json_schema": {
                "name": "analysis_output",
                "strict": true,
                "schema": schema,
            }
        });
    }
    body
}

fn structured_body(
    model_id: &str,
    prompt: &str,
    max_tokens: u32,
    output_schema: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model_id,
        "max_tokens": max_tokens,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(schema) = output_schema {
        body["output_format"] = serde_json::json!({
            "type": "json_schema",
            "schema": schema,
        });
    }
    body
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: MessagesUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
}
