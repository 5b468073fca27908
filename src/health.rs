//! Health Checking
//!
//! Fans lightweight probe calls out across adapters, one concurrent
//! probe per model with its own timeout. Failures are isolated: a dead
//! provider produces a failed [`TestResult`] without aborting or
//! delaying the probes running beside it. There is no overall deadline;
//! wall-clock duration is bounded by the slowest individual probe.
//!
//! The checker carries no state of its own beyond the probe timeout —
//! it reuses each adapter's `test()` directly.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{ProviderAdapter, TestResult};

/// Concurrent probe fan-out over provider adapters.
pub struct HealthChecker {
    probe_timeout: Duration,
}

impl HealthChecker {
    /// Create a checker with the given per-probe timeout.
    #[must_use]
    pub fn new(probe_timeout: Duration) -> Self {
        Self { probe_timeout }
    }

    /// Probe a single adapter under the checker's timeout.
    pub async fn probe(&self, adapter: Arc<dyn ProviderAdapter>) -> TestResult {
        let model_id = adapter.model_id().to_string();
        let result = match tokio::time::timeout(self.probe_timeout, adapter.test()).await {
            Ok(result) => result,
            Err(_) => TestResult {
                model_id: model_id.clone(),
                success: false,
                latency_ms: self.probe_timeout.as_millis() as u64,
                error: Some(ProviderError::Timeout.to_string()),
            },
        };

        debug!(
            model = %model_id,
            success = result.success,
            latency_ms = result.latency_ms,
            "probe finished"
        );
        result
    }

    /// Probe every adapter concurrently. Results come back in input
    /// order, one per adapter.
    pub async fn probe_all(&self, adapters: Vec<Arc<dyn ProviderAdapter>>) -> Vec<TestResult> {
        join_all(adapters.into_iter().map(|a| self.probe(a))).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use async_trait::async_trait;

    use super::*;
    use crate::provider::{ChatRequest, ProviderResponse, TokenUsage};

    struct StubAdapter {
        id: &'static str,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        fn name(&self) -> &str {
            "stub"
        }

        fn model_id(&self) -> &str {
            self.id
        }

        async fn complete(
            &self,
            _request: &ChatRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(ProviderError::Server {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(ProviderResponse {
                    content: "pong".to_string(),
                    usage: TokenUsage::default(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_probe_failure_isolated() {
        let checker = HealthChecker::new(Duration::from_millis(500));
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(StubAdapter {
                id: "good",
                delay: Duration::from_millis(1),
                fail: false,
            }),
            Arc::new(StubAdapter {
                id: "bad",
                delay: Duration::from_millis(1),
                fail: true,
            }),
        ];

        let results = checker.probe_all(adapters).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert!(results[1].error.as_deref().unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let checker = HealthChecker::new(Duration::from_millis(50));
        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(StubAdapter {
            id: "slow",
            delay: Duration::from_secs(30),
            fail: false,
        })];

        let results = checker.probe_all(adapters).await;
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("request timed out"));
    }

    #[tokio::test]
    async fn test_probes_run_concurrently() {
        // Four probes of ~80ms each: sequential would take ~320ms.
        let checker = HealthChecker::new(Duration::from_secs(1));
        let adapters: Vec<Arc<dyn ProviderAdapter>> = (0..4)
            .map(|i| {
                Arc::new(StubAdapter {
                    id: ["a", "b", "c", "d"][i],
                    delay: Duration::from_millis(80),
                    fail: false,
                }) as Arc<dyn ProviderAdapter>
            })
            .collect();

        let start = Instant::now();
        let results = checker.probe_all(adapters).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.success));
        assert!(
            elapsed < Duration::from_millis(250),
            "probes serialized: {elapsed:?}"
        );
    }
}
