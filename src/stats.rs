//! Per-Model Statistics
//!
//! Rolling latency/error/cost statistics, one entry per model, mutated
//! after every dispatch attempt. The latency window is a fixed-capacity
//! ring buffer (FIFO eviction) so averages reflect recent behavior, not
//! process-lifetime history. Nothing here is persisted across restarts.
//!
//! Synchronization is per-model: each entry sits behind its own mutex
//! inside a concurrent map, so updates for unrelated models never
//! serialize against each other.

use std::collections::{HashMap, VecDeque};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Number of latency samples retained per model.
pub const LATENCY_WINDOW: usize = 20;

/// One dispatch outcome to record.
#[derive(Clone, Copy, Debug)]
pub struct Sample {
    /// Whether the dispatch succeeded
    pub success: bool,
    /// Observed latency in milliseconds
    pub latency_ms: u64,
    /// Cost incurred by this dispatch (0 for failures)
    pub cost_delta: f64,
}

impl Sample {
    /// A successful dispatch.
    #[must_use]
    pub fn success(latency_ms: u64, cost_delta: f64) -> Self {
        Self {
            success: true,
            latency_ms,
            cost_delta,
        }
    }

    /// A failed dispatch.
    #[must_use]
    pub fn failure(latency_ms: u64) -> Self {
        Self {
            success: false,
            latency_ms,
            cost_delta: 0.0,
        }
    }
}

/// Rolling statistics for a single model.
#[derive(Debug)]
struct StatsEntry {
    latencies: VecDeque<u64>,
    successes: u64,
    failures: u64,
    cumulative_cost: f64,
}

impl StatsEntry {
    fn new() -> Self {
        Self {
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            successes: 0,
            failures: 0,
            cumulative_cost: 0.0,
        }
    }

    fn record(&mut self, sample: Sample) {
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(sample.latency_ms);

        if sample.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.cumulative_cost += sample.cost_delta;
    }

    fn snapshot(&self) -> ModelStats {
        let avg_latency_ms = if self.latencies.is_empty() {
            None
        } else {
            let sum: u64 = self.latencies.iter().sum();
            Some(sum as f64 / self.latencies.len() as f64)
        };

        let total = self.successes + self.failures;
        let error_rate = if total == 0 {
            0.0
        } else {
            self.failures as f64 / total as f64
        };

        ModelStats {
            avg_latency_ms,
            error_rate,
            successes: self.successes,
            failures: self.failures,
            cumulative_cost: self.cumulative_cost,
        }
    }
}

/// Consistent point-in-time view of one model's statistics.
///
/// Snapshots are taken under the model's lock, so readers never observe
/// a torn write (e.g. a latency sample without its counter update).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelStats {
    /// Average latency over the retained window, None with no samples
    pub avg_latency_ms: Option<f64>,
    /// failures / (successes + failures), 0.0 with no samples
    pub error_rate: f64,
    /// Successful dispatch count (process lifetime)
    pub successes: u64,
    /// Failed dispatch count (process lifetime)
    pub failures: u64,
    /// Total cost recorded (process lifetime)
    pub cumulative_cost: f64,
}

/// Store of per-model rolling statistics.
#[derive(Debug, Default)]
pub struct StatsStore {
    entries: DashMap<String, Mutex<StatsEntry>>,
}

impl StatsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatch outcome for a model. O(1) amortized.
    pub fn record(&self, model_id: &str, sample: Sample) {
        let entry = self
            .entries
            .entry(model_id.to_string())
            .or_insert_with(|| Mutex::new(StatsEntry::new()));
        entry.lock().record(sample);
    }

    /// Snapshot of one model's statistics. None if never recorded.
    #[must_use]
    pub fn get(&self, model_id: &str) -> Option<ModelStats> {
        self.entries.get(model_id).map(|e| e.lock().snapshot())
    }

    /// Average latency for a model, None with no samples.
    #[must_use]
    pub fn avg_latency(&self, model_id: &str) -> Option<f64> {
        self.get(model_id).and_then(|s| s.avg_latency_ms)
    }

    /// Error rate for a model, 0.0 with no samples.
    #[must_use]
    pub fn error_rate(&self, model_id: &str) -> f64 {
        self.get(model_id).map(|s| s.error_rate).unwrap_or(0.0)
    }

    /// Cumulative cost for a model.
    #[must_use]
    pub fn cumulative_cost(&self, model_id: &str) -> f64 {
        self.get(model_id).map(|s| s.cumulative_cost).unwrap_or(0.0)
    }

    /// Snapshot of every model's statistics, keyed by model id.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ModelStats> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().lock().snapshot()))
            .collect()
    }
}
