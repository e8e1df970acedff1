use std::cmp::Ordering;
use std::sync::RwLock;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{COST_SCORE_LOG10_CEILING, TIME_SCORE_CEILING_SECS, WEIGHT_SUM_TOLERANCE};
use crate::types::RoutingPath;
use crate::utils::u256_to_f64;

/// Route optimization strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteStrategy {
    /// Minimize total cost (fees + gas)
    LowestCost,
    /// Minimize completion time
    FastestTime,
    /// Highest success probability
    MostReliable,
    /// Best overall score (balanced)
    Balanced,
}

impl RouteStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "lowest_cost" | "cost" => Some(Self::LowestCost),
            "fastest_time" | "time" | "speed" => Some(Self::FastestTime),
            "most_reliable" | "reliability" => Some(Self::MostReliable),
            "balanced" => Some(Self::Balanced),
            _ => None,
        }
    }

    /// Preset weights for this strategy
    pub fn weights(&self) -> PathWeights {
        match self {
            Self::LowestCost => PathWeights { cost: 0.7, time: 0.2, reliability: 0.1 },
            Self::FastestTime => PathWeights { cost: 0.2, time: 0.7, reliability: 0.1 },
            Self::MostReliable => PathWeights { cost: 0.2, time: 0.2, reliability: 0.6 },
            Self::Balanced => PathWeights::balanced(),
        }
    }
}

/// Scoring weights over the three path dimensions, kept normalized to sum to 1
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PathWeights {
    pub cost: f64,
    pub time: f64,
    pub reliability: f64,
}

impl PathWeights {
    pub fn balanced() -> Self {
        Self { cost: 0.33, time: 0.33, reliability: 0.34 }
    }

    pub fn sum(&self) -> f64 {
        self.cost + self.time + self.reliability
    }

    /// Renormalize so the weights sum to 1. Inputs already within tolerance
    /// are kept as-is; a zero (or negative) sum resets to the balanced preset.
    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return Self::balanced();
        }
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Self {
                cost: self.cost / sum,
                time: self.time / sum,
                reliability: self.reliability / sum,
            };
        }
        self
    }
}

impl Default for PathWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Optional path constraints, AND-combined; absent fields impose nothing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConstraints {
    pub max_cost: Option<U256>,
    pub max_time_secs: Option<u64>,
    pub min_reliability: Option<f64>,
    pub max_hops: Option<usize>,
}

/// Path optimizer
///
/// Turns a set of candidate routing paths into a total order. Lower score is
/// better; each dimension is normalized to [0,1] before weighting so a single
/// expensive dimension cannot dominate by unit alone.
#[derive(Debug)]
pub struct PathOptimizer {
    weights: RwLock<PathWeights>,
}

impl PathOptimizer {
    pub fn new(weights: PathWeights) -> Self {
        Self {
            weights: RwLock::new(weights.normalized()),
        }
    }

    pub fn current_weights(&self) -> PathWeights {
        *self.weights.read().unwrap()
    }

    /// Weighted score of a path, lower is better.
    ///
    /// cost: `log10(wei) / 21` clamped to [0,1] (zero cost scores 0) - the
    /// ceiling is 1e21 wei, a deliberately coarse logarithmic scale.
    /// time: linear against a 1 hour ceiling. reliability: `1 - r`.
    pub fn calculate_score(&self, path: &RoutingPath) -> f64 {
        let weights = self.current_weights();

        let cost_score = Self::cost_score(path.estimated_cost);
        let time_score = (path.estimated_time_secs as f64 / TIME_SCORE_CEILING_SECS).min(1.0);
        let reliability_score = 1.0 - path.reliability;

        cost_score * weights.cost
            + time_score * weights.time
            + reliability_score * weights.reliability
    }

    /// Sort candidates ascending by score. The sort is stable, so candidates
    /// with equal scores keep their discovery order.
    pub fn rank_paths(&self, paths: Vec<RoutingPath>) -> Vec<RoutingPath> {
        let mut scored: Vec<(f64, RoutingPath)> = paths
            .into_iter()
            .map(|path| (self.calculate_score(&path), path))
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        scored.into_iter().map(|(_, path)| path).collect()
    }

    /// Best-scoring path, or None when the input is empty
    pub fn find_optimal_path(&self, paths: Vec<RoutingPath>) -> Option<RoutingPath> {
        self.rank_paths(paths).into_iter().next()
    }

    /// Keep only paths satisfying every provided constraint
    pub fn filter_paths(
        &self,
        paths: Vec<RoutingPath>,
        constraints: &PathConstraints,
    ) -> Vec<RoutingPath> {
        paths
            .into_iter()
            .filter(|path| {
                if let Some(max_cost) = constraints.max_cost {
                    if path.estimated_cost > max_cost {
                        return false;
                    }
                }
                if let Some(max_time) = constraints.max_time_secs {
                    if path.estimated_time_secs > max_time {
                        return false;
                    }
                }
                if let Some(min_reliability) = constraints.min_reliability {
                    if path.reliability < min_reliability {
                        return false;
                    }
                }
                if let Some(max_hops) = constraints.max_hops {
                    if path.hop_count() > max_hops {
                        return false;
                    }
                }
                true
            })
            .collect()
    }

    /// Replace the weights, renormalizing so they sum to 1
    pub fn update_weights(&self, weights: PathWeights) {
        let normalized = weights.normalized();
        *self.weights.write().unwrap() = normalized;
        debug!(
            "가중치 업데이트: cost={:.2}, time={:.2}, reliability={:.2}",
            normalized.cost, normalized.time, normalized.reliability
        );
    }

    /// Apply a strategy preset
    pub fn set_preference(&self, strategy: RouteStrategy) {
        info!("🎯 라우팅 선호도 변경: {:?}", strategy);
        self.update_weights(strategy.weights());
    }

    fn cost_score(cost: U256) -> f64 {
        if cost.is_zero() {
            return 0.0;
        }
        (u256_to_f64(cost).log10() / COST_SCORE_LOG10_CEILING).clamp(0.0, 1.0)
    }
}

impl Default for PathOptimizer {
    fn default() -> Self {
        Self::new(PathWeights::balanced())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn path_with(cost_wei: u128, time_secs: u64, reliability: f64) -> RoutingPath {
        RoutingPath {
            from: ChainId::Base,
            to: ChainId::Optimism,
            hops: Vec::new(),
            estimated_cost: U256::from(cost_wei),
            estimated_time_secs: time_secs,
            reliability,
            fallbacks: Vec::new(),
        }
    }

    #[test]
    fn test_score_monotonic_in_cost() {
        let optimizer = PathOptimizer::default();
        let cheap = optimizer.calculate_score(&path_with(1_000, 300, 0.95));
        let pricey = optimizer.calculate_score(&path_with(1_000_000_000, 300, 0.95));
        assert!(pricey >= cheap);
    }

    #[test]
    fn test_score_monotonic_in_time() {
        let optimizer = PathOptimizer::default();
        let fast = optimizer.calculate_score(&path_with(1_000, 60, 0.95));
        let slow = optimizer.calculate_score(&path_with(1_000, 1800, 0.95));
        assert!(slow >= fast);
    }

    #[test]
    fn test_score_monotonic_in_reliability() {
        let optimizer = PathOptimizer::default();
        let flaky = optimizer.calculate_score(&path_with(1_000, 300, 0.5));
        let solid = optimizer.calculate_score(&path_with(1_000, 300, 0.99));
        assert!(solid <= flaky);
    }

    #[test]
    fn test_cost_score_edges() {
        // 비용 0은 0점, 한도(1e21) 초과는 1점으로 클램프
        assert_eq!(PathOptimizer::cost_score(U256::ZERO), 0.0);
        let above_ceiling = U256::from(10u64).pow(U256::from(22u64));
        assert_eq!(PathOptimizer::cost_score(above_ceiling), 1.0);
        // 1 wei는 log10 == 0 -> 0점
        assert_eq!(PathOptimizer::cost_score(U256::from(1u64)), 0.0);
    }

    #[test]
    fn test_rank_is_sorted_stable_permutation() {
        let optimizer = PathOptimizer::default();
        let a = path_with(1_000_000, 300, 0.95);
        let b = path_with(1_000, 60, 0.99);
        let twin_one = path_with(500, 120, 0.9);
        let twin_two = path_with(500, 120, 0.9);

        let ranked = optimizer.rank_paths(vec![a.clone(), twin_one.clone(), b.clone(), twin_two.clone()]);

        assert_eq!(ranked.len(), 4);
        let scores: Vec<f64> = ranked.iter().map(|p| optimizer.calculate_score(p)).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
        // 동점 경로는 발견 순서 유지
        let twin_positions: Vec<usize> = ranked
            .iter()
            .enumerate()
            .filter(|(_, p)| p.estimated_cost == U256::from(500u64))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(twin_positions.len(), 2);
        assert!(twin_positions[0] < twin_positions[1]);
    }

    #[test]
    fn test_find_optimal_of_empty_is_none() {
        let optimizer = PathOptimizer::default();
        assert!(optimizer.find_optimal_path(Vec::new()).is_none());
    }

    #[test]
    fn test_filter_paths_and_semantics() {
        let optimizer = PathOptimizer::default();
        let paths = vec![
            path_with(1_000, 60, 0.99),
            path_with(1_000_000, 600, 0.9),
            path_with(10, 3600, 0.8),
        ];

        // 제약 없음 - 전부 통과
        let all = optimizer.filter_paths(paths.clone(), &PathConstraints::default());
        assert_eq!(all.len(), 3);

        let constraints = PathConstraints {
            max_cost: Some(U256::from(1_000_000u64)),
            max_time_secs: Some(600),
            min_reliability: Some(0.85),
            max_hops: None,
        };
        let filtered = optimizer.filter_paths(paths, &constraints);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|p| p.reliability >= 0.85));
    }

    #[test]
    fn test_weights_always_sum_to_one() {
        let optimizer = PathOptimizer::default();

        optimizer.update_weights(PathWeights { cost: 2.0, time: 1.0, reliability: 1.0 });
        assert!((optimizer.current_weights().sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((optimizer.current_weights().cost - 0.5).abs() < 1e-9);

        // 0 합은 균형 프리셋으로 복귀
        optimizer.update_weights(PathWeights { cost: 0.0, time: 0.0, reliability: 0.0 });
        assert_eq!(optimizer.current_weights(), PathWeights::balanced());

        for strategy in [
            RouteStrategy::LowestCost,
            RouteStrategy::FastestTime,
            RouteStrategy::MostReliable,
            RouteStrategy::Balanced,
        ] {
            optimizer.set_preference(strategy);
            assert!((optimizer.current_weights().sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
        }
    }

    #[test]
    fn test_preference_changes_ranking() {
        let optimizer = PathOptimizer::default();
        let cheap_slow = path_with(1_000_000_000, 3600, 0.95);
        let pricey_fast = path_with(1_000_000_000_000_000_000, 60, 0.95);

        optimizer.set_preference(RouteStrategy::LowestCost);
        let best = optimizer
            .find_optimal_path(vec![cheap_slow.clone(), pricey_fast.clone()])
            .unwrap();
        assert_eq!(best.estimated_cost, cheap_slow.estimated_cost);

        optimizer.set_preference(RouteStrategy::FastestTime);
        let best = optimizer
            .find_optimal_path(vec![cheap_slow, pricey_fast.clone()])
            .unwrap();
        assert_eq!(best.estimated_cost, pricey_fast.estimated_cost);
    }

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(RouteStrategy::from_name("lowest_cost"), Some(RouteStrategy::LowestCost));
        assert_eq!(RouteStrategy::from_name("SPEED"), Some(RouteStrategy::FastestTime));
        assert_eq!(RouteStrategy::from_name("balanced"), Some(RouteStrategy::Balanced));
        assert_eq!(RouteStrategy::from_name("teleport"), None);
    }
}
