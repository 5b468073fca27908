//! Gateway Configuration
//!
//! Loads the ordered model list and gateway settings from a TOML file,
//! resolving secrets through the [`CredentialStore`] boundary so raw
//! keys never live in the file. When no file is supplied a documented
//! default set is used: one model per provider family, enabled only if
//! its credential resolves.
//!
//! # File Format
//!
//! ```toml
//! request_timeout_ms = 5000
//!
//! [[models]]
//! id = "deepseek-main"
//! provider = "deepseek"
//! model_name = "deepseek-chat"
//! priority = 1
//! enabled = true
//! capabilities = ["chat"]
//!
//! [prices]
//! deepseek-main = 0.0003
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::{ModelConfig, Provider};
use crate::secrets::{ApiKey, CredentialStore};

/// Default per-call dispatch timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Price Table
// ============================================================================

/// Per-model price table (cost per 1K tokens).
///
/// Pricing is an external, configuration-supplied input. Lookups fall
/// back to the provider family's default price when a model has no
/// entry, so routing by cost still orders candidates sensibly on a
/// sparse table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceTable(HashMap<String, f64>);

impl PriceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price for a model id.
    pub fn set(&mut self, model_id: impl Into<String>, price_per_1k: f64) {
        self.0.insert(model_id.into(), price_per_1k);
    }

    /// Price per 1K tokens for a model, falling back to the provider
    /// default.
    #[must_use]
    pub fn price_per_1k(&self, model_id: &str, provider: Provider) -> f64 {
        self.0
            .get(model_id)
            .copied()
            .unwrap_or_else(|| provider.default_price_per_1k())
    }

    /// Whether the table carries an explicit entry for a model.
    #[must_use]
    pub fn has_entry(&self, model_id: &str) -> bool {
        self.0.contains_key(model_id)
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Gateway-level settings carried alongside the model list.
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    /// Per-dispatch timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Cost-per-token price table
    pub prices: PriceTable,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            prices: PriceTable::new(),
        }
    }
}

impl GatewaySettings {
    /// The dispatch timeout as a [`std::time::Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

/// A fully resolved configuration: ordered models plus settings.
#[derive(Debug, Default)]
pub struct LoadedConfig {
    /// Ordered model list, secrets already resolved
    pub models: Vec<ModelConfig>,
    /// Gateway settings
    pub settings: GatewaySettings,
}

// ============================================================================
// File Schema
// ============================================================================

/// On-disk schema of the gateway config file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_timeout_ms")]
    request_timeout_ms: u64,
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default)]
    prices: HashMap<String, f64>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// One `[[models]]` entry.
#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    provider: Provider,
    model_name: String,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_capabilities")]
    capabilities: Vec<String>,
}

fn default_priority() -> u8 {
    10
}

fn default_enabled() -> bool {
    true
}

fn default_capabilities() -> Vec<String> {
    vec!["chat".to_string()]
}

impl ModelEntry {
    fn resolve(self, store: &dyn CredentialStore) -> Result<ModelConfig, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Invalid("model entry with empty id".to_string()));
        }
        if self.capabilities.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "model '{}' has an empty capability set",
                self.id
            )));
        }

        let api_key = store
            .get(self.provider.id())
            .unwrap_or_else(ApiKey::empty);

        let mut config = ModelConfig::new(self.id, self.provider, self.model_name, api_key)
            .with_priority(self.priority)
            .with_enabled(self.enabled)
            .with_capabilities(BTreeSet::from_iter(self.capabilities));
        config.base_url = self.base_url;
        Ok(config)
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Load configuration from a TOML file.
pub fn load_config_from_path(
    path: &Path,
    store: &dyn CredentialStore,
) -> Result<LoadedConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&raw)?;

    let mut prices = PriceTable::new();
    for (model_id, price) in file.prices {
        prices.set(model_id, price);
    }

    let models = file
        .models
        .into_iter()
        .map(|entry| entry.resolve(store))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        path = %path.display(),
        models = models.len(),
        "gateway config loaded"
    );

    Ok(LoadedConfig {
        models,
        settings: GatewaySettings {
            request_timeout_ms: file.request_timeout_ms,
            prices,
        },
    })
}

/// Load configuration from an optional path, falling back to
/// [`default_config`] when no path is given or the file does not exist.
pub fn load_config(
    path: Option<&Path>,
    store: &dyn CredentialStore,
) -> Result<LoadedConfig, ConfigError> {
    match path {
        Some(p) if p.exists() => load_config_from_path(p, store),
        _ => Ok(default_config(store)),
    }
}

/// The documented default model set: one model per provider family.
///
/// Each model is enabled only if its credential resolves, so a bare
/// environment still produces a registry (just one with nothing routable
/// until keys appear).
#[must_use]
pub fn default_config(store: &dyn CredentialStore) -> LoadedConfig {
    let defaults = [
        ("deepseek-chat", Provider::DeepSeek, "deepseek-chat", 1),
        ("gpt-4o-mini", Provider::OpenAi, "gpt-4o-mini", 2),
        (
            "claude-sonnet",
            Provider::Anthropic,
            "claude-sonnet-4-20250514",
            3,
        ),
        ("glm-4-flash", Provider::Zhipu, "glm-4-flash", 4),
        ("qwen-turbo", Provider::Qwen, "qwen-turbo", 5),
    ];

    let models = defaults
        .into_iter()
        .map(|(id, provider, model_name, priority)| {
            let key = store.get(provider.id());
            let enabled = key.is_some();
            ModelConfig::new(id, provider, model_name, key.unwrap_or_else(ApiKey::empty))
                .with_priority(priority)
                .with_enabled(enabled)
        })
        .collect();

    LoadedConfig {
        models,
        settings: GatewaySettings::default(),
    }
}
