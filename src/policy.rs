//! Routing Policy
//!
//! Pure decision functions: given the enabled candidate set and a stats
//! snapshot, each strategy produces a ranked candidate list plus a
//! human-readable reason derived from the metric that actually drove
//! the decision. No strategy performs I/O or mutates state, which keeps
//! every routing decision unit-testable in isolation.
//!
//! # Strategies
//!
//! - `priority`: ascending configured priority, insertion order breaks
//!   ties
//! - `speed`: ascending rolling average latency; unsampled models rank
//!   after sampled ones; degrades to priority order with no samples
//!   anywhere
//! - `cost`: ascending configured price per 1K tokens, priority breaks
//!   ties
//! - `smart`: weighted composite of normalized latency (0.4), error
//!   rate (0.3), cost (0.2) and priority (0.1); lowest score wins;
//!   degrades to priority order with no statistics at all

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::PriceTable;
use crate::registry::ModelConfig;
use crate::stats::ModelStats;

/// Composite weight on normalized latency.
pub const SMART_WEIGHT_LATENCY: f64 = 0.4;
/// Composite weight on error rate.
pub const SMART_WEIGHT_ERROR: f64 = 0.3;
/// Composite weight on normalized cost.
pub const SMART_WEIGHT_COST: f64 = 0.2;
/// Composite weight on normalized priority.
pub const SMART_WEIGHT_PRIORITY: f64 = 0.1;

/// Routing strategy selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Weighted composite of latency, errors, cost and priority
    #[default]
    Smart,
    /// Cheapest first
    Cost,
    /// Fastest observed first
    Speed,
    /// Configured priority order
    Priority,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Smart => "smart",
            Self::Cost => "cost",
            Self::Speed => "speed",
            Self::Priority => "priority",
        };
        f.write_str(name)
    }
}

/// Output of a routing decision: ranked model ids plus the reason the
/// top candidate won.
#[derive(Clone, Debug)]
pub struct Ranking {
    /// Candidate ids, best first
    pub ranked: Vec<String>,
    /// Why the top candidate was selected
    pub reason: String,
}

/// Rank candidates under a strategy.
///
/// `candidates` must already be filtered to the enabled set, in
/// insertion order; callers with an empty set should not route at all.
#[must_use]
pub fn rank(
    strategy: Strategy,
    candidates: &[ModelConfig],
    stats: &HashMap<String, ModelStats>,
    prices: &PriceTable,
) -> Ranking {
    if candidates.is_empty() {
        return Ranking {
            ranked: Vec::new(),
            reason: "no candidates".to_string(),
        };
    }

    match strategy {
        Strategy::Priority => rank_priority(candidates),
        Strategy::Speed => rank_speed(candidates, stats),
        Strategy::Cost => rank_cost(candidates, prices),
        Strategy::Smart => rank_smart(candidates, stats, prices),
    }
}

fn rank_priority(candidates: &[ModelConfig]) -> Ranking {
    let mut order: Vec<&ModelConfig> = candidates.iter().collect();
    // Stable sort: equal priorities keep insertion order.
    order.sort_by_key(|m| m.priority);

    let top = order[0];
    Ranking {
        reason: format!(
            "lowest configured priority ({}) among {} enabled models",
            top.priority,
            candidates.len()
        ),
        ranked: order.into_iter().map(|m| m.id.clone()).collect(),
    }
}

fn rank_speed(candidates: &[ModelConfig], stats: &HashMap<String, ModelStats>) -> Ranking {
    let sampled_any = candidates
        .iter()
        .any(|m| stats.get(&m.id).and_then(|s| s.avg_latency_ms).is_some());
    if !sampled_any {
        let mut ranking = rank_priority(candidates);
        ranking.reason = format!(
            "no latency samples for any of {} enabled models; using priority order",
            candidates.len()
        );
        return ranking;
    }

    let latency_of = |m: &ModelConfig| {
        stats
            .get(&m.id)
            .and_then(|s| s.avg_latency_ms)
            .unwrap_or(f64::INFINITY)
    };

    let mut order: Vec<&ModelConfig> = candidates.iter().collect();
    // Unsampled models (infinite latency) fall to the tail; priority
    // orders them there, and breaks exact latency ties up front.
    order.sort_by(|a, b| {
        latency_of(a)
            .total_cmp(&latency_of(b))
            .then(a.priority.cmp(&b.priority))
    });

    let top = order[0];
    Ranking {
        reason: format!(
            "lowest average latency ({:.0} ms) among {} enabled models",
            latency_of(top),
            candidates.len()
        ),
        ranked: order.into_iter().map(|m| m.id.clone()).collect(),
    }
}

fn rank_cost(candidates: &[ModelConfig], prices: &PriceTable) -> Ranking {
    let price_of = |m: &ModelConfig| prices.price_per_1k(&m.id, m.provider);

    let mut order: Vec<&ModelConfig> = candidates.iter().collect();
    order.sort_by(|a, b| {
        price_of(a)
            .total_cmp(&price_of(b))
            .then(a.priority.cmp(&b.priority))
    });

    let top = order[0];
    Ranking {
        reason: format!(
            "lowest cost (${:.4} per 1K tokens) among {} enabled models",
            price_of(top),
            candidates.len()
        ),
        ranked: order.into_iter().map(|m| m.id.clone()).collect(),
    }
}

fn rank_smart(
    candidates: &[ModelConfig],
    stats: &HashMap<String, ModelStats>,
    prices: &PriceTable,
) -> Ranking {
    let has_any_stats = candidates.iter().any(|m| stats.contains_key(&m.id));
    if !has_any_stats {
        let mut ranking = rank_priority(candidates);
        ranking.reason = format!(
            "no statistics for any of {} enabled models; using priority order",
            candidates.len()
        );
        return ranking;
    }

    // Min-max normalize each metric across the candidate set so the
    // fixed weights compare like with like. Unsampled latency counts as
    // worst-in-set.
    let latencies: Vec<Option<f64>> = candidates
        .iter()
        .map(|m| stats.get(&m.id).and_then(|s| s.avg_latency_ms))
        .collect();
    let max_latency = latencies
        .iter()
        .flatten()
        .fold(0.0_f64, |acc, &v| acc.max(v));
    let min_latency = latencies
        .iter()
        .flatten()
        .fold(f64::INFINITY, |acc, &v| acc.min(v));

    let costs: Vec<f64> = candidates
        .iter()
        .map(|m| prices.price_per_1k(&m.id, m.provider))
        .collect();
    let (min_cost, max_cost) = min_max(&costs);

    let priorities: Vec<f64> = candidates.iter().map(|m| f64::from(m.priority)).collect();
    let (min_priority, max_priority) = min_max(&priorities);

    let normalize = |value: f64, min: f64, max: f64| {
        if max > min {
            (value - min) / (max - min)
        } else {
            0.0
        }
    };

    let mut scored: Vec<(f64, &ModelConfig)> = candidates
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let latency_norm = match latencies[i] {
                Some(v) => normalize(v, min_latency, max_latency),
                None => 1.0,
            };
            let error_rate = stats.get(&m.id).map(|s| s.error_rate).unwrap_or(0.0);
            let cost_norm = normalize(costs[i], min_cost, max_cost);
            let priority_norm = normalize(priorities[i], min_priority, max_priority);

            let score = SMART_WEIGHT_LATENCY * latency_norm
                + SMART_WEIGHT_ERROR * error_rate
                + SMART_WEIGHT_COST * cost_norm
                + SMART_WEIGHT_PRIORITY * priority_norm;
            (score, m)
        })
        .collect();

    scored.sort_by(|(sa, a), (sb, b)| sa.total_cmp(sb).then(a.priority.cmp(&b.priority)));

    let (top_score, _) = scored[0];
    Ranking {
        reason: format!(
            "best composite score ({top_score:.3}; weights: latency {SMART_WEIGHT_LATENCY}, errors {SMART_WEIGHT_ERROR}, cost {SMART_WEIGHT_COST}, priority {SMART_WEIGHT_PRIORITY}) among {} enabled models",
            candidates.len()
        ),
        ranked: scored.iter().map(|(_, m)| m.id.clone()).collect(),
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().fold(f64::INFINITY, |acc, &v| acc.min(v));
    let max = values.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    (min, max)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::registry::Provider;
    use crate::secrets::ApiKey;
    use crate::stats::{Sample, StatsStore};

    fn model(id: &str, priority: u8) -> ModelConfig {
        ModelConfig::new(id, Provider::DeepSeek, "deepseek-chat", ApiKey::empty())
            .with_priority(priority)
    }

    fn ids(ranking: &Ranking) -> Vec<&str> {
        ranking.ranked.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_priority_ties_break_by_insertion_order() {
        // A(1), B(5), C(1) inserted in that order -> [A, C, B].
        let candidates = vec![model("A", 1), model("B", 5), model("C", 1)];
        let ranking = rank(
            Strategy::Priority,
            &candidates,
            &HashMap::new(),
            &PriceTable::new(),
        );

        assert_eq!(ids(&ranking), vec!["A", "C", "B"]);
        assert!(ranking.reason.contains("priority (1)"));
        assert!(ranking.reason.contains("3 enabled models"));
    }

    #[test]
    fn test_speed_without_samples_equals_priority() {
        let candidates = vec![model("A", 3), model("B", 1), model("C", 2)];
        let prices = PriceTable::new();

        let by_priority = rank(Strategy::Priority, &candidates, &HashMap::new(), &prices);
        let by_speed = rank(Strategy::Speed, &candidates, &HashMap::new(), &prices);

        assert_eq!(by_speed.ranked, by_priority.ranked);
        assert!(by_speed.reason.contains("no latency samples"));
    }

    #[test]
    fn test_speed_orders_by_average_latency() {
        let candidates = vec![model("slow", 1), model("fast", 9), model("cold", 5)];

        let store = StatsStore::new();
        store.record("slow", Sample::success(900, 0.0));
        store.record("fast", Sample::success(100, 0.0));
        // "cold" has no samples and must rank last despite priority 5.

        let ranking = rank(
            Strategy::Speed,
            &candidates,
            &store.snapshot(),
            &PriceTable::new(),
        );
        assert_eq!(ids(&ranking), vec!["fast", "slow", "cold"]);
        assert!(ranking.reason.contains("100 ms"));
    }

    #[test]
    fn test_cost_uses_price_table_with_priority_tiebreak() {
        let candidates = vec![
            model("pricey", 1),
            model("cheap-b", 2),
            model("cheap-a", 1),
        ];
        let mut prices = PriceTable::new();
        prices.set("pricey", 0.01);
        prices.set("cheap-a", 0.001);
        prices.set("cheap-b", 0.001);

        let ranking = rank(
            Strategy::Cost,
            &candidates,
            &HashMap::new(),
            &prices,
        );
        assert_eq!(ids(&ranking), vec!["cheap-a", "cheap-b", "pricey"]);
        assert!(ranking.reason.contains("$0.0010"));
    }

    #[test]
    fn test_smart_without_stats_equals_priority() {
        let candidates = vec![model("A", 2), model("B", 1)];
        let ranking = rank(
            Strategy::Smart,
            &candidates,
            &HashMap::new(),
            &PriceTable::new(),
        );
        assert_eq!(ids(&ranking), vec!["B", "A"]);
        assert!(ranking.reason.contains("no statistics"));
    }

    #[test]
    fn test_smart_penalizes_errors_and_latency() {
        // Same price, same priority: the model with clean fast history
        // must win over the slow flaky one.
        let candidates = vec![model("flaky", 1), model("steady", 1)];

        let store = StatsStore::new();
        for _ in 0..5 {
            store.record("flaky", Sample::failure(2000));
        }
        store.record("flaky", Sample::success(2000, 0.001));
        for _ in 0..6 {
            store.record("steady", Sample::success(150, 0.001));
        }

        let ranking = rank(
            Strategy::Smart,
            &candidates,
            &store.snapshot(),
            &PriceTable::new(),
        );
        assert_eq!(ids(&ranking)[0], "steady");
        assert!(ranking.reason.contains("composite score"));
    }

    #[test]
    fn test_smart_unsampled_latency_counts_as_worst() {
        let candidates = vec![model("sampled", 5), model("cold", 1)];

        let store = StatsStore::new();
        store.record("sampled", Sample::success(100, 0.0));

        let ranking = rank(
            Strategy::Smart,
            &candidates,
            &store.snapshot(),
            &PriceTable::new(),
        );
        // Latency (weight 0.4) dominates priority (weight 0.1).
        assert_eq!(ids(&ranking)[0], "sampled");
    }

    #[test]
    fn test_empty_candidates() {
        let ranking = rank(
            Strategy::Smart,
            &[],
            &HashMap::new(),
            &PriceTable::new(),
        );
        assert!(ranking.ranked.is_empty());
    }
}
