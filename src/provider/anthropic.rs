//! Anthropic Adapter
//!
//! Speaks the Anthropic messages API (`/v1/messages`). Differences from
//! the OpenAI dialect this adapter normalizes away:
//!
//! - authentication via `x-api-key` plus a pinned `anthropic-version`
//! - system messages travel in a top-level `system` field, not the
//!   message list
//! - `max_tokens` is mandatory
//! - completion text lives in `content[0].text`, usage in
//!   `usage.input_tokens` / `usage.output_tokens`

use async_trait::async_trait;

use super::{
    classify_status, classify_transport, retry_after_ms, ChatRequest, Message, MessageRole,
    ProviderAdapter, ProviderResponse, TokenUsage,
};
use crate::error::ProviderError;
use crate::registry::ModelConfig;
use crate::secrets::ApiKey;

const ANTHROPIC_VERSION: &str = "2023-06-01";

// The messages API requires max_tokens; applied when the request leaves
// it at the provider-default sentinel.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Adapter for the Anthropic messages API.
pub struct AnthropicAdapter {
    model_id: String,
    model_name: String,
    base_url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    /// Build an adapter bound to one model config.
    #[must_use]
    pub fn new(config: &ModelConfig, client: reqwest::Client) -> Self {
        Self {
            model_id: config.id.clone(),
            model_name: config.model_name.clone(),
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        // Split the system turn out of the conversation.
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();
        let turns: Vec<&Message> = request
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .collect();

        let max_tokens = if request.max_tokens > 0 {
            request.max_tokens
        } else {
            DEFAULT_MAX_TOKENS
        };

        let mut body = serde_json::json!({
            "model": self.model_name,
            "messages": turns,
            "max_tokens": max_tokens,
            "temperature": request.temperature,
        });
        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }
        body
    }

    fn parse_response(data: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
        let content = data
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("missing content[0].text".to_string())
            })?
            .to_string();

        let usage = data
            .get("usage")
            .map(|u| TokenUsage {
                prompt_tokens: u
                    .get("input_tokens")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0) as u32,
                completion_tokens: u
                    .get("output_tokens")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(ProviderResponse { content, usage })
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.build_body(request))
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_ms(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), retry_after, body));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

        Self::parse_response(&data)
    }
}
