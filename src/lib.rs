//! Modelgate - Multi-Provider AI Model Gateway
//!
//! This crate routes chat/completion requests across interchangeable AI
//! model providers, selecting a provider via a pluggable policy, failing
//! over on provider errors, and tracking per-model latency/cost/error
//! statistics to inform future routing.
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |     Gateway      |  <-- Entry point: complete(), test_all()
//! +--------+---------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  RoutingPolicy   | <-- |    StatsStore    |
//! |  smart/cost/     |     |  rolling latency |
//! |  speed/priority  |     |  error / cost    |
//! +--------+---------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  ModelRegistry   |  <-- ordered, enable/disable
//! +--------+---------+
//!          |
//!    +-----+-----+
//!    |           |
//!    v           v
//! +-------+  +-----------+
//! |OpenAI-|  | Anthropic |   <-- provider adapters
//! |compat.|  | messages  |
//! +-------+  +-----------+
//! ```
//!
//! # Design Principles
//!
//! 1. **Explicit ownership**: one [`Gateway`] constructed by the entry
//!    point and passed to call sites; no hidden singleton.
//! 2. **Bounded failover**: one pass over the ranked candidates, never
//!    more attempts than enabled models.
//! 3. **Structured failures**: every provider outcome is a classified
//!    value; nothing panics across the dispatch path.
//! 4. **Capability-tagged providers**: new providers register a variant
//!    and an adapter, central dispatch never grows a branch.
//!
//! # Quick Start
//!
//! ```ignore
//! use modelgate::{
//!     load_config, CompletionRequest, EnvCredentialStore, Gateway, Strategy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = EnvCredentialStore::new();
//!     let config = load_config(None, &store)?;
//!     let gateway = Gateway::new(config)?;
//!
//!     let request = CompletionRequest::user("Explain failover in one line")
//!         .with_strategy(Strategy::Speed);
//!     let result = gateway.complete(&request).await?;
//!
//!     println!("[{} via {}] {}", result.model_id, result.reason, result.content);
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`registry`]: model configurations, CRUD + enable/disable
//! - [`provider`]: provider adapters and the factory seam
//! - [`policy`]: pure routing strategies with reason strings
//! - [`stats`]: per-model rolling statistics
//! - [`gateway`]: orchestration, failover, result assembly
//! - [`health`]: concurrent probe fan-out
//! - [`config`]: TOML config loading and the price table
//! - [`secrets`]: credential store boundary and key redaction
//! - [`error`]: the full error taxonomy

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod secrets;
pub mod stats;

// Re-exports for convenience
pub use config::{
    default_config, load_config, load_config_from_path, GatewaySettings, LoadedConfig, PriceTable,
};
pub use error::{AttemptError, ConfigError, GatewayError, ProviderError};
pub use gateway::{CompletionRequest, CompletionResult, Gateway};
pub use health::HealthChecker;
pub use policy::{rank, Ranking, Strategy};
pub use provider::{
    AdapterFactory, AnthropicAdapter, ChatRequest, HttpAdapterFactory, Message, MessageRole,
    OpenAiAdapter, ProviderAdapter, ProviderResponse, TestResult, TokenUsage,
};
pub use registry::{ModelConfig, ModelRegistry, Provider};
pub use secrets::{ApiKey, CredentialStore, EnvCredentialStore};
pub use stats::{ModelStats, Sample, StatsStore, LATENCY_WINDOW};
