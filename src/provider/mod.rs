//! Provider Adapters
//!
//! Capability-polymorphic clients, one per provider family. Each adapter
//! normalizes its provider's wire dialect into [`ProviderResponse`] and
//! classifies every failure into [`ProviderError`] — adapters never raise
//! uncaught faults, so the gateway's failover loop can treat any adapter
//! outcome as a structured value.
//!
//! New providers register a [`Provider`] variant plus an adapter here;
//! central dispatch logic never grows a per-provider branch.

pub mod anthropic;
pub mod openai;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::registry::{ModelConfig, Provider};

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

// ============================================================================
// Normalized Request / Response
// ============================================================================

/// Role of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instruction
    System,
    /// End-user message
    User,
    /// Prior model output
    Assistant,
}

/// A single chat message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

impl Message {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// The normalized request an adapter dispatches.
#[derive(Clone, Debug)]
pub struct ChatRequest {
    /// Ordered conversation
    pub messages: Vec<Message>,
    /// Maximum completion tokens (0 = provider default)
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl ChatRequest {
    /// Minimal single-turn request.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            max_tokens: 0,
            temperature: 0.7,
        }
    }

    /// The cheap probe request used by `test()`.
    #[must_use]
    pub fn probe() -> Self {
        Self {
            messages: vec![Message::user("ping")],
            max_tokens: 1,
            temperature: 0.0,
        }
    }
}

/// Token counts reported by the provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Prompt + completion tokens.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Normalized success value from a provider call.
#[derive(Clone, Debug)]
pub struct ProviderResponse {
    /// Completion text
    pub content: String,
    /// Token usage, zeroed when the provider omits it
    pub usage: TokenUsage,
}

/// Outcome of a lightweight probe call against one model.
#[derive(Clone, Debug)]
pub struct TestResult {
    /// Model that was probed
    pub model_id: String,
    /// Whether the probe succeeded
    pub success: bool,
    /// Probe round-trip latency
    pub latency_ms: u64,
    /// Classified failure text on probe failure
    pub error: Option<String>,
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// A provider client bound to one registered model.
///
/// `complete()` runs under a bounded timeout (the HTTP client's, plus
/// the gateway's own dispatch timeout) and returns either a normalized
/// response or a classified [`ProviderError`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider family name (for logging)
    fn name(&self) -> &str;

    /// Registry id of the model this adapter dispatches to
    fn model_id(&self) -> &str;

    /// Issue a completion call.
    async fn complete(&self, request: &ChatRequest) -> Result<ProviderResponse, ProviderError>;

    /// Issue a minimal cheap call and report the outcome.
    async fn test(&self) -> TestResult {
        let start = Instant::now();
        let outcome = self.complete(&ChatRequest::probe()).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(_) => TestResult {
                model_id: self.model_id().to_string(),
                success: true,
                latency_ms,
                error: None,
            },
            Err(e) => TestResult {
                model_id: self.model_id().to_string(),
                success: false,
                latency_ms,
                error: Some(e.to_string()),
            },
        }
    }
}

// ============================================================================
// Failure Classification
// ============================================================================

/// Classify a non-success HTTP status into the provider error taxonomy.
pub(crate) fn classify_status(
    status: u16,
    retry_after_ms: Option<u64>,
    body: String,
) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth,
        429 => ProviderError::RateLimited { retry_after_ms },
        _ => ProviderError::Server {
            status,
            message: truncate(body),
        },
    }
}

/// Classify a transport-level failure.
pub(crate) fn classify_transport(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        // Connection refused, DNS failure, TLS errors: the provider is
        // unreachable, which failover treats like a server failure.
        ProviderError::Server {
            status: 0,
            message: truncate(err.to_string()),
        }
    }
}

fn truncate(body: String) -> String {
    const MAX: usize = 256;
    if body.len() > MAX {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &body[..cut])
    } else {
        body
    }
}

/// Extract a Retry-After header (seconds form) as milliseconds.
pub(crate) fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}

// ============================================================================
// Adapter Factory
// ============================================================================

/// Seam for constructing adapters from model configs.
///
/// The gateway resolves an adapter through this trait on every dispatch,
/// which is also where tests inject mock providers.
pub trait AdapterFactory: Send + Sync {
    /// Build the adapter for a model config.
    fn create(&self, config: &ModelConfig) -> Arc<dyn ProviderAdapter>;
}

/// Default factory: real HTTPS adapters sharing one connection pool.
pub struct HttpAdapterFactory {
    client: reqwest::Client,
}

impl HttpAdapterFactory {
    /// Create a factory whose HTTP client enforces the given per-call
    /// timeout.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot initialize, which is fatal at
    /// construction time anyway.
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn create(&self, config: &ModelConfig) -> Arc<dyn ProviderAdapter> {
        match config.provider {
            Provider::Anthropic => Arc::new(AnthropicAdapter::new(config, self.client.clone())),
            // DeepSeek, Zhipu and Qwen all speak the OpenAI chat dialect.
            Provider::OpenAi | Provider::DeepSeek | Provider::Zhipu | Provider::Qwen => {
                Arc::new(OpenAiAdapter::new(config, self.client.clone()))
            }
        }
    }
}
