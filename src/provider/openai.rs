//! OpenAI-Compatible Adapter
//!
//! Covers every provider speaking the OpenAI chat-completions dialect:
//! OpenAI itself plus DeepSeek, Zhipu GLM and Qwen, which expose
//! compatible `/chat/completions` endpoints behind different base URLs.
//!
//! Only the non-streaming endpoint is used; responses are decoded from
//! `choices[0].message.content` with usage from the `usage` object.

use async_trait::async_trait;

use super::{
    classify_status, classify_transport, retry_after_ms, ChatRequest, ProviderAdapter,
    ProviderResponse, TokenUsage,
};
use crate::error::ProviderError;
use crate::registry::ModelConfig;
use crate::secrets::ApiKey;

/// Adapter for OpenAI-compatible chat APIs.
pub struct OpenAiAdapter {
    model_id: String,
    model_name: String,
    provider_name: &'static str,
    base_url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl OpenAiAdapter {
    /// Build an adapter bound to one model config.
    #[must_use]
    pub fn new(config: &ModelConfig, client: reqwest::Client) -> Self {
        Self {
            model_id: config.id.clone(),
            model_name: config.model_name.clone(),
            provider_name: config.provider.id(),
            base_url: config.effective_base_url().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model_name,
            "messages": request.messages,
            "stream": false,
            "temperature": request.temperature,
        });
        if request.max_tokens > 0 {
            body["max_tokens"] = serde_json::json!(request.max_tokens);
        }
        body
    }

    fn parse_response(data: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })?
            .to_string();

        let usage = data
            .get("usage")
            .map(|u| TokenUsage {
                prompt_tokens: u
                    .get("prompt_tokens")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0) as u32,
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        Ok(ProviderResponse { content, usage })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        self.provider_name
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose()),
            )
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Provider;
    use crate::provider::Message;

    fn adapter(provider: Provider, base_url: Option<&str>) -> OpenAiAdapter {
        let mut config = ModelConfig::new("m1", provider, "test-model", ApiKey::new("k"));
        if let Some(url) = base_url {
            config = config.with_base_url(url);
        }
        OpenAiAdapter::new(&config, reqwest::Client::new())
    }

    #[test]
    fn test_endpoint_per_provider() {
        assert_eq!(
            adapter(Provider::DeepSeek, None).completions_url(),
            "https://api.deepseek.com/chat/completions"
        );
        assert_eq!(
            adapter(Provider::OpenAi, None).completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
        // Trailing slash on an override must not double up.
        assert_eq!(
            adapter(Provider::Qwen, Some("http://localhost:8000/v1/")).completions_url(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_body_omits_zero_max_tokens() {
        let a = adapter(Provider::DeepSeek, None);
        let body = a.build_body(&ChatRequest::new(vec![Message::user("hi")]));
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);

        let body = a.build_body(&ChatRequest::probe());
        assert_eq!(body["max_tokens"], 1);
    }

    #[test]
    fn test_parse_response() {
        let data = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 7}
        });
        let parsed = OpenAiAdapter::parse_response(&data).unwrap();
        assert_eq!(parsed.content, "hello");
        assert_eq!(parsed.usage.total(), 10);
    }

    #[test]
    fn test_parse_missing_content_is_malformed() {
        let data = serde_json::json!({"choices": []});
        let err = OpenAiAdapter::parse_response(&data).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_without_usage_defaults_to_zero() {
        let data = serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        });
        let parsed = OpenAiAdapter::parse_response(&data).unwrap();
        assert_eq!(parsed.usage.total(), 0);
    }
}
