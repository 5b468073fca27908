//! Gateway Core
//!
//! Orchestrates a completion: policy selection over the enabled
//! registry, adapter dispatch in rank order with bounded failover,
//! stats updates after every attempt, and result assembly.
//!
//! # Dispatch Flow
//!
//! ```text
//! 1. Explicit model override? Use exactly that model, no failover.
//! 2. Otherwise rank enabled models via the routing policy.
//! 3. Attempt adapters in rank order, each under its own timeout.
//!    Failures record a stats sample and advance to the next candidate.
//! 4. First success records latency/cost and returns the result with
//!    the routing reason attached.
//! 5. Exhaustion surfaces AllProvidersFailed with one ordered error
//!    per attempted candidate. One pass, no retry storms.
//! ```
//!
//! The gateway owns its registry and stats store for its lifetime and
//! is safe for concurrent use through a shared reference; callers add
//! no synchronization of their own.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GatewaySettings, LoadedConfig};
use crate::error::{AttemptError, GatewayError, ProviderError};
use crate::health::HealthChecker;
use crate::policy::{self, Strategy};
use crate::provider::{
    AdapterFactory, ChatRequest, HttpAdapterFactory, Message, ProviderResponse, TestResult,
};
use crate::registry::{ModelConfig, ModelRegistry, Provider};
use crate::stats::{ModelStats, Sample, StatsStore};

// ============================================================================
// Request / Result
// ============================================================================

/// A caller-facing completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    /// Ordered conversation
    pub messages: Vec<Message>,
    /// Routing strategy
    pub strategy: Strategy,
    /// Explicit model id override (no policy, no failover)
    pub model_override: Option<String>,
    /// Maximum completion tokens (0 = provider default)
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Correlation id for logs
    pub request_id: String,
}

impl CompletionRequest {
    /// Create a request from a full conversation.
    #[must_use]
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            strategy: Strategy::default(),
            model_override: None,
            max_tokens: 0,
            temperature: 0.7,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a single-turn user request.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![Message::user(content)])
    }

    /// Set the routing strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Pin the request to a specific model id.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_override = Some(model_id.into());
        self
    }

    /// Set the maximum completion tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    fn to_chat_request(&self) -> ChatRequest {
        ChatRequest {
            messages: self.messages.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// A successful completion with its routing explanation.
#[derive(Clone, Debug)]
pub struct CompletionResult {
    /// Model that produced the completion
    pub model_id: String,
    /// Provider family of that model
    pub provider: Provider,
    /// Strategy that routed the request
    pub strategy: Strategy,
    /// Why routing selected this model
    pub reason: String,
    /// Observed dispatch latency
    pub latency_ms: u64,
    /// Cost of this completion (token usage x configured price)
    pub cost: f64,
    /// Completion text
    pub content: String,
    /// Total tokens reported by the provider
    pub tokens_used: u32,
}

// ============================================================================
// Gateway
// ============================================================================

/// The routing/dispatch engine.
///
/// Constructed once by the entry point and passed (behind `Arc` or a
/// reference) to every call site; there is deliberately no global
/// instance.
pub struct Gateway {
    registry: ModelRegistry,
    stats: StatsStore,
    settings: GatewaySettings,
    factory: Box<dyn AdapterFactory>,
    health: HealthChecker,
}

impl Gateway {
    /// Build a gateway from loaded configuration, using real HTTPS
    /// adapters.
    pub fn new(config: LoadedConfig) -> Result<Self, GatewayError> {
        let timeout = config.settings.request_timeout();
        Self::with_factory(config, Box::new(HttpAdapterFactory::new(timeout)))
    }

    /// Build a gateway with a custom adapter factory (the seam mock
    /// providers are injected through).
    pub fn with_factory(
        config: LoadedConfig,
        factory: Box<dyn AdapterFactory>,
    ) -> Result<Self, GatewayError> {
        let registry = ModelRegistry::from_configs(config.models)?;
        let timeout = config.settings.request_timeout();
        Ok(Self {
            registry,
            stats: StatsStore::new(),
            settings: config.settings,
            factory,
            health: HealthChecker::new(timeout),
        })
    }

    /// The model registry (management calls: add/remove/enable/disable).
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The per-model statistics store.
    #[must_use]
    pub fn stats(&self) -> &StatsStore {
        &self.stats
    }

    /// Per-model statistics in registry order, for operational
    /// inspection.
    #[must_use]
    pub fn stats_report(&self) -> Vec<(String, ModelStats)> {
        self.registry
            .list(false)
            .into_iter()
            .map(|m| {
                let stats = self.stats.get(&m.id).unwrap_or_default();
                (m.id, stats)
            })
            .collect()
    }

    /// Route and dispatch a completion request.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResult, GatewayError> {
        let chat = request.to_chat_request();

        // Explicit override: exactly that model, no policy, no failover.
        if let Some(ref model_id) = request.model_override {
            return self.complete_pinned(request, model_id, &chat).await;
        }

        let candidates = self.registry.list(true);
        if candidates.is_empty() {
            return Err(GatewayError::NoModelsAvailable);
        }

        let ranking = policy::rank(
            request.strategy,
            &candidates,
            &self.stats.snapshot(),
            &self.settings.prices,
        );
        debug!(
            request_id = %request.request_id,
            strategy = %request.strategy,
            order = ?ranking.ranked,
            reason = %ranking.reason,
            "routing decision"
        );

        let mut attempts: Vec<AttemptError> = Vec::new();
        for model_id in &ranking.ranked {
            // Ranked ids come from the candidate snapshot taken above.
            let Some(config) = candidates.iter().find(|m| &m.id == model_id) else {
                continue;
            };

            let (latency_ms, outcome) = self.dispatch(config, &chat).await;
            match outcome {
                Ok(response) => {
                    let cost = self.cost_of(config, &response);
                    self.stats.record(model_id, Sample::success(latency_ms, cost));
                    info!(
                        request_id = %request.request_id,
                        model = %model_id,
                        latency_ms,
                        attempts = attempts.len() + 1,
                        "completion dispatched"
                    );
                    return Ok(self.assemble(request, config, &ranking.reason, latency_ms, cost, response));
                }
                Err(error) => {
                    self.stats.record(model_id, Sample::failure(latency_ms));
                    warn!(
                        request_id = %request.request_id,
                        model = %model_id,
                        %error,
                        "provider failed, advancing to next candidate"
                    );
                    attempts.push(AttemptError {
                        model_id: model_id.clone(),
                        error,
                    });
                }
            }
        }

        Err(GatewayError::AllProvidersFailed(attempts))
    }

    async fn complete_pinned(
        &self,
        request: &CompletionRequest,
        model_id: &str,
        chat: &ChatRequest,
    ) -> Result<CompletionResult, GatewayError> {
        let config = self
            .registry
            .get(model_id)
            .filter(|m| m.enabled)
            .ok_or_else(|| GatewayError::NotFound(model_id.to_string()))?;

        let (latency_ms, outcome) = self.dispatch(&config, chat).await;
        match outcome {
            Ok(response) => {
                let cost = self.cost_of(&config, &response);
                self.stats.record(model_id, Sample::success(latency_ms, cost));
                let reason = format!("explicitly requested model '{model_id}'");
                Ok(self.assemble(request, &config, &reason, latency_ms, cost, response))
            }
            Err(error) => {
                self.stats.record(model_id, Sample::failure(latency_ms));
                Err(GatewayError::Provider {
                    model_id: model_id.to_string(),
                    source: error,
                })
            }
        }
    }

    /// One adapter call under the gateway's dispatch timeout. On expiry
    /// the call is abandoned and failover proceeds immediately.
    async fn dispatch(
        &self,
        config: &ModelConfig,
        chat: &ChatRequest,
    ) -> (u64, Result<ProviderResponse, ProviderError>) {
        let adapter = self.factory.create(config);
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.request_timeout(), adapter.complete(chat))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };
        (start.elapsed().as_millis() as u64, outcome)
    }

    fn request_timeout(&self) -> Duration {
        self.settings.request_timeout()
    }

    fn cost_of(&self, config: &ModelConfig, response: &ProviderResponse) -> f64 {
        let price = self
            .settings
            .prices
            .price_per_1k(&config.id, config.provider);
        f64::from(response.usage.total()) / 1000.0 * price
    }

    fn assemble(
        &self,
        request: &CompletionRequest,
        config: &ModelConfig,
        reason: &str,
        latency_ms: u64,
        cost: f64,
        response: ProviderResponse,
    ) -> CompletionResult {
        CompletionResult {
            model_id: config.id.clone(),
            provider: config.provider,
            strategy: request.strategy,
            reason: reason.to_string(),
            latency_ms,
            cost,
            content: response.content,
            tokens_used: response.usage.total(),
        }
    }

    /// Probe every registered model concurrently, enabled or not.
    ///
    /// Each probe runs under its own timeout; one model's failure never
    /// aborts or delays the others. Returns one result per model in
    /// registry order.
    pub async fn test_all(&self) -> Vec<TestResult> {
        let adapters = self
            .registry
            .list(false)
            .iter()
            .map(|config| self.factory.create(config))
            .collect();
        self.health.probe_all(adapters).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::provider::{ProviderAdapter, TokenUsage};
    use crate::secrets::ApiKey;

    /// Scripted behavior for one mock model.
    #[derive(Clone)]
    enum Script {
        Succeed { latency: Duration, tokens: u32 },
        Fail(ProviderError),
        Hang,
    }

    struct MockAdapter {
        model_id: String,
        script: Script,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn name(&self) -> &str {
            "mock"
        }

        fn model_id(&self) -> &str {
            &self.model_id
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<ProviderResponse, ProviderError> {
            self.calls.lock().push(self.model_id.clone());
            match &self.script {
                Script::Succeed { latency, tokens } => {
                    tokio::time::sleep(*latency).await;
                    Ok(ProviderResponse {
                        content: format!("reply from {}", self.model_id),
                        usage: TokenUsage {
                            prompt_tokens: 0,
                            completion_tokens: *tokens,
                        },
                    })
                }
                Script::Fail(e) => Err(e.clone()),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hung call should be abandoned by timeout")
                }
            }
        }
    }

    struct MockFactory {
        scripts: HashMap<String, Script>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl MockFactory {
        fn new(scripts: Vec<(&str, Script)>) -> Self {
            Self {
                scripts: scripts
                    .into_iter()
                    .map(|(id, s)| (id.to_string(), s))
                    .collect(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl AdapterFactory for MockFactory {
        fn create(&self, config: &ModelConfig) -> Arc<dyn ProviderAdapter> {
            let script = self
                .scripts
                .get(&config.id)
                .cloned()
                .unwrap_or(Script::Fail(ProviderError::Auth));
            Arc::new(MockAdapter {
                model_id: config.id.clone(),
                script,
                calls: self.calls.clone(),
            })
        }
    }

    fn model(id: &str, priority: u8) -> ModelConfig {
        ModelConfig::new(id, Provider::DeepSeek, "deepseek-chat", ApiKey::new("k"))
            .with_priority(priority)
    }

    fn gateway(models: Vec<ModelConfig>, scripts: Vec<(&str, Script)>) -> Gateway {
        let config = LoadedConfig {
            models,
            settings: GatewaySettings {
                request_timeout_ms: 200,
                ..Default::default()
            },
        };
        Gateway::with_factory(config, Box::new(MockFactory::new(scripts))).unwrap()
    }

    fn ok(latency_ms: u64) -> Script {
        Script::Succeed {
            latency: Duration::from_millis(latency_ms),
            tokens: 100,
        }
    }

    #[tokio::test]
    async fn test_success_records_stats_and_reason() {
        let gw = gateway(vec![model("a", 1)], vec![("a", ok(5))]);
        let request = CompletionRequest::user("hello").with_strategy(Strategy::Priority);

        let result = gw.complete(&request).await.unwrap();
        assert_eq!(result.model_id, "a");
        assert_eq!(result.content, "reply from a");
        assert!(result.reason.contains("priority"));

        let stats = gw.stats().get("a").unwrap();
        assert_eq!(stats.successes, 1);
        assert_eq!(stats.failures, 0);
        assert!(stats.cumulative_cost > 0.0);
    }

    #[tokio::test]
    async fn test_empty_enabled_set() {
        let gw = gateway(
            vec![model("a", 1).with_enabled(false)],
            vec![("a", ok(5))],
        );
        let err = gw.complete(&CompletionRequest::user("hi")).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoModelsAvailable));
    }

    #[tokio::test]
    async fn test_failover_advances_past_timeout() {
        // Top-ranked model hangs, second succeeds: result comes from
        // the second, stats show one failure and one success.
        let gw = gateway(
            vec![model("first", 1), model("second", 2), model("third", 3)],
            vec![("first", Script::Hang), ("second", ok(5)), ("third", ok(5))],
        );
        let request = CompletionRequest::user("hi").with_strategy(Strategy::Priority);

        let result = gw.complete(&request).await.unwrap();
        assert_eq!(result.model_id, "second");

        assert_eq!(gw.stats().get("first").unwrap().failures, 1);
        assert_eq!(gw.stats().get("second").unwrap().successes, 1);
        assert!(gw.stats().get("third").is_none());
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let gw = gateway(
            vec![model("a", 1), model("b", 2), model("c", 3)],
            vec![
                ("a", Script::Fail(ProviderError::Auth)),
                (
                    "b",
                    Script::Fail(ProviderError::RateLimited {
                        retry_after_ms: None,
                    }),
                ),
                ("c", Script::Hang),
            ],
        );
        let request = CompletionRequest::user("hi").with_strategy(Strategy::Priority);

        let err = gw.complete(&request).await.unwrap_err();
        let GatewayError::AllProvidersFailed(attempts) = err else {
            panic!("expected AllProvidersFailed");
        };

        // One ordered entry per enabled model.
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[0].model_id, "a");
        assert_eq!(attempts[0].error, ProviderError::Auth);
        assert_eq!(attempts[2].model_id, "c");
        assert_eq!(attempts[2].error, ProviderError::Timeout);
    }

    #[tokio::test]
    async fn test_override_skips_policy_and_failover() {
        let gw = gateway(
            vec![model("a", 1), model("b", 2)],
            vec![("a", ok(5)), ("b", Script::Fail(ProviderError::Auth))],
        );

        // Pinned to the failing model: surfaced directly, no failover
        // to the healthy one.
        let request = CompletionRequest::user("hi").with_model("b");
        let err = gw.complete(&request).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Provider {
                source: ProviderError::Auth,
                ..
            }
        ));
        assert_eq!(gw.stats().get("b").unwrap().failures, 1);
        assert!(gw.stats().get("a").is_none());
    }

    #[tokio::test]
    async fn test_override_missing_or_disabled() {
        let gw = gateway(
            vec![model("a", 1).with_enabled(false)],
            vec![("a", ok(5))],
        );

        let missing = CompletionRequest::user("hi").with_model("nope");
        assert!(matches!(
            gw.complete(&missing).await.unwrap_err(),
            GatewayError::NotFound(_)
        ));

        let disabled = CompletionRequest::user("hi").with_model("a");
        assert!(matches!(
            gw.complete(&disabled).await.unwrap_err(),
            GatewayError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_result_model_drawn_from_enabled_set() {
        let gw = gateway(
            vec![model("on", 2), model("off", 1).with_enabled(false)],
            vec![("on", ok(5)), ("off", ok(5))],
        );
        let request = CompletionRequest::user("hi").with_strategy(Strategy::Priority);

        // "off" has the better priority but is disabled.
        let result = gw.complete(&request).await.unwrap();
        assert_eq!(result.model_id, "on");
    }

    #[tokio::test]
    async fn test_test_all_covers_disabled_models() {
        let gw = gateway(
            vec![model("a", 1), model("b", 2).with_enabled(false)],
            vec![("a", ok(5)), ("b", Script::Fail(ProviderError::Auth))],
        );

        let results = gw.test_all().await;
        assert_eq!(results.len(), 2);

        let a = results.iter().find(|r| r.model_id == "a").unwrap();
        assert!(a.success);
        let b = results.iter().find(|r| r.model_id == "b").unwrap();
        assert!(!b.success);
        assert!(b.error.as_deref().unwrap().contains("authentication"));
    }

    #[tokio::test]
    async fn test_stats_report_in_registry_order() {
        let gw = gateway(
            vec![model("z", 1), model("a", 2)],
            vec![("z", ok(5)), ("a", ok(5))],
        );
        gw.complete(&CompletionRequest::user("hi")).await.unwrap();

        let report = gw.stats_report();
        let ids: Vec<_> = report.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a"]);
    }
}
