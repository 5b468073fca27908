//! Model Registry
//!
//! Holds the ordered set of configured models. The registry is the
//! single source of truth for which models exist and which are enabled;
//! routing policies only ever see snapshots taken from it.
//!
//! Insertion order is preserved: `list()` returns models in the order
//! they were added, which is also the tie-break order for routing.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::secrets::ApiKey;

// ============================================================================
// Provider Families
// ============================================================================

/// Provider families the gateway can dispatch to.
///
/// Adding a provider means adding a variant here and teaching the
/// adapter factory which wire dialect it speaks; central dispatch logic
/// never branches on provider identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// DeepSeek (OpenAI-compatible chat API)
    DeepSeek,
    /// OpenAI
    OpenAi,
    /// Anthropic (messages API)
    Anthropic,
    /// Zhipu GLM (OpenAI-compatible chat API)
    Zhipu,
    /// Alibaba Qwen (OpenAI-compatible chat API)
    Qwen,
}

impl Provider {
    /// Stable identifier used for credential lookup and logging.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::DeepSeek => "deepseek",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Zhipu => "zhipu",
            Self::Qwen => "qwen",
        }
    }

    /// Default API base URL, used when the model config carries no
    /// override.
    #[must_use]
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::DeepSeek => "https://api.deepseek.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Zhipu => "https://open.bigmodel.cn/api/paas/v4",
            Self::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        }
    }

    /// Fallback price per 1K tokens, used only when the configured
    /// price table has no entry for a model. Pricing is an external,
    /// configuration-supplied input; these are last-resort defaults.
    #[must_use]
    pub fn default_price_per_1k(&self) -> f64 {
        match self {
            Self::DeepSeek => 0.0003,
            Self::OpenAi => 0.0050,
            Self::Anthropic => 0.0080,
            Self::Zhipu => 0.0010,
            Self::Qwen => 0.0008,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Model Configuration
// ============================================================================

/// Configuration for a single routable model.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Unique identifier within the registry
    pub id: String,

    /// Provider family this model belongs to
    pub provider: Provider,

    /// Provider-side model name (e.g. "deepseek-chat")
    pub model_name: String,

    /// Secret reference captured at registry-load time; never logged
    pub api_key: ApiKey,

    /// Base URL override (None = provider default)
    pub base_url: Option<String>,

    /// Routing priority, lower = preferred
    pub priority: u8,

    /// Whether this model participates in routing
    pub enabled: bool,

    /// Capability tags (e.g. "chat", "tools"); must be non-empty
    pub capabilities: BTreeSet<String>,
}

impl ModelConfig {
    /// Create a model config with defaults: priority 10, enabled, a
    /// bare "chat" capability, provider-default base URL.
    pub fn new(
        id: impl Into<String>,
        provider: Provider,
        model_name: impl Into<String>,
        api_key: ApiKey,
    ) -> Self {
        Self {
            id: id.into(),
            provider,
            model_name: model_name.into(),
            api_key,
            base_url: None,
            priority: 10,
            enabled: true,
            capabilities: BTreeSet::from(["chat".to_string()]),
        }
    }

    /// Set routing priority (lower = preferred).
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set enabled state.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Replace the capability set.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: BTreeSet<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Effective base URL: the override if present, otherwise the
    /// provider default.
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

// ============================================================================
// Model Registry
// ============================================================================

/// Ordered registry of model configurations.
///
/// Interior mutability keeps management calls usable through a shared
/// gateway handle; the lock is held only for the duration of each call,
/// never across a dispatch.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<Vec<ModelConfig>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from an ordered config list.
    ///
    /// Fails on the first config that violates an invariant; earlier
    /// entries are kept out of the failed registry (the caller gets a
    /// fresh error, not a partial registry).
    pub fn from_configs(configs: Vec<ModelConfig>) -> Result<Self, GatewayError> {
        let registry = Self::new();
        for config in configs {
            registry.add(config)?;
        }
        Ok(registry)
    }

    /// Add a model.
    ///
    /// Fails with [`GatewayError::Validation`] on a duplicate id or an
    /// empty capability set.
    pub fn add(&self, config: ModelConfig) -> Result<(), GatewayError> {
        if config.id.trim().is_empty() {
            return Err(GatewayError::Validation("model id is empty".to_string()));
        }
        if config.capabilities.is_empty() {
            return Err(GatewayError::Validation(format!(
                "model '{}' has an empty capability set",
                config.id
            )));
        }

        let mut models = self.models.write();
        if models.iter().any(|m| m.id == config.id) {
            return Err(GatewayError::Validation(format!(
                "duplicate model id '{}'",
                config.id
            )));
        }

        tracing::debug!(model = %config.id, provider = %config.provider, "model registered");
        models.push(config);
        Ok(())
    }

    /// Remove a model. Returns false if the id was not present.
    pub fn remove(&self, id: &str) -> bool {
        let mut models = self.models.write();
        let before = models.len();
        models.retain(|m| m.id != id);
        models.len() != before
    }

    /// Enable a model. Fails with [`GatewayError::NotFound`] if absent.
    pub fn enable(&self, id: &str) -> Result<(), GatewayError> {
        self.set_enabled(id, true)
    }

    /// Disable a model. Fails with [`GatewayError::NotFound`] if absent.
    pub fn disable(&self, id: &str) -> Result<(), GatewayError> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), GatewayError> {
        let mut models = self.models.write();
        let model = models
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        model.enabled = enabled;
        Ok(())
    }

    /// Stable snapshot of the registry, insertion order preserved.
    #[must_use]
    pub fn list(&self, enabled_only: bool) -> Vec<ModelConfig> {
        let models = self.models.read();
        models
            .iter()
            .filter(|m| !enabled_only || m.enabled)
            .cloned()
            .collect()
    }

    /// Look up a single model by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ModelConfig> {
        let models = self.models.read();
        models.iter().find(|m| m.id == id).cloned()
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}
