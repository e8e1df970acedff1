use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use alloy::primitives::U256;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bridges::BridgeConnector;
use crate::config::RouterSettings;
use crate::constants::{
    is_native_messaging_pair, EXECUTION_GAS_UNITS, FALLBACK_EXECUTION_COST_WEI,
    FALLBACK_HOP_COST_WEI,
};
use crate::liquidity::LiquidityChecker;
use crate::oracle::{GasPrice, GasPriceOracle};
use crate::routing::optimizer::{PathOptimizer, RouteStrategy};
use crate::types::{BridgeKind, ChainId, RoutingHop, RoutingPath};
use crate::utils::current_timestamp;

/// 라우터 에러
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("No viable paths from {from} to {to} within {max_hops} hops")]
    NoViablePaths {
        from: ChainId,
        to: ChainId,
        max_hops: usize,
    },

    #[error("Insufficient liquidity for {amount} {token} on every candidate path")]
    InsufficientLiquidity { token: String, amount: U256 },

    #[error("Chain not configured: {0}")]
    UnsupportedChain(ChainId),
}

pub type RouterResult<T> = Result<T, RouterError>;

/// 경로 탐색 옵션 (미지정 필드는 라우터 기본값 사용)
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RouteQuery {
    pub max_hops: Option<usize>,
    pub strategy: Option<RouteStrategy>,
}

#[derive(Debug, Clone)]
struct CachedRoute {
    path: RoutingPath,
    expires_at: u64,
}

/// BFS 프런티어 - 경로 prefix와 방문 집합을 값으로 들고 다닌다 (분기 간 공유 없음)
struct PathPrefix {
    at: ChainId,
    hops: Vec<RoutingHop>,
    visited: HashSet<ChainId>,
}

/// 크로스체인 라우터
///
/// 소스 체인에서 대상 체인까지의 최적 경로를 찾는다. 가스 오라클과 유동성
/// 체커가 비용/실행가능성 데이터를 공급하고, 경로 순위는 PathOptimizer에
/// 위임한다. 승자 경로는 (from, to, token) 키로 캐시된다 - amount는 키에
/// 포함되지 않으므로 캐시 윈도우 내 다른 금액의 호출은 같은 경로를 받는다.
pub struct CrossChainRouter {
    /// 탐색 대상 체인 집합
    chains: Vec<ChainId>,
    oracle: Arc<GasPriceOracle>,
    liquidity: Arc<LiquidityChecker>,
    optimizer: Arc<PathOptimizer>,
    /// 브리지 종류별 커넥터 (엣지 지원 판정)
    connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>>,
    /// 설정된 선호 브리지 - 있으면 항상 우선
    preferred_bridge: Option<BridgeKind>,
    max_hops: usize,
    route_cache: DashMap<(ChainId, ChainId, String), CachedRoute>,
    route_cache_ttl_secs: u64,
}

impl CrossChainRouter {
    pub fn new(
        chains: Vec<ChainId>,
        oracle: Arc<GasPriceOracle>,
        liquidity: Arc<LiquidityChecker>,
        connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>>,
        settings: &RouterSettings,
    ) -> Self {
        let preferred_bridge = settings
            .preferred_bridge
            .as_deref()
            .and_then(BridgeKind::from_name);

        Self {
            chains,
            oracle,
            liquidity,
            optimizer: Arc::new(PathOptimizer::default()),
            connectors,
            preferred_bridge,
            max_hops: settings.max_hops,
            route_cache: DashMap::new(),
            route_cache_ttl_secs: settings.route_cache_ttl_secs,
        }
    }

    pub fn configured_chains(&self) -> &[ChainId] {
        &self.chains
    }

    pub fn optimizer(&self) -> &PathOptimizer {
        &self.optimizer
    }

    pub fn cached_route_count(&self) -> usize {
        self.route_cache.len()
    }

    /// 최적 경로 탐색
    ///
    /// 같은 체인이면 캐시/유동성을 건드리지 않고 0-hop 경로를 즉시 반환한다.
    /// 이후 순서: 경로 캐시 확인 -> 가스 가격 프리페치 -> BFS 열거 ->
    /// 유동성 필터 -> 순위 결정(폴백 2개 부착) -> 캐시 기록.
    pub async fn find_optimal_route(
        &self,
        from: ChainId,
        to: ChainId,
        token: &str,
        amount: U256,
        query: &RouteQuery,
    ) -> RouterResult<RoutingPath> {
        if from == to {
            debug!("동일 체인 요청: {} - 0-hop 경로 반환", from.name());
            return Ok(RoutingPath::same_chain(from));
        }

        if !self.chains.contains(&from) {
            return Err(RouterError::UnsupportedChain(from));
        }
        if !self.chains.contains(&to) {
            return Err(RouterError::UnsupportedChain(to));
        }

        let cache_key = (from, to, token.to_string());
        if let Some(cached) = self.route_cache.get(&cache_key) {
            if cached.expires_at > current_timestamp() {
                debug!("🔁 캐시된 경로 사용: {} -> {}", from.name(), to.name());
                return Ok(cached.path.clone());
            }
        }

        let max_hops = query.max_hops.unwrap_or(self.max_hops);
        if let Some(strategy) = query.strategy {
            self.optimizer.set_preference(strategy);
        }

        info!(
            "🔍 경로 탐색: {} -> {} ({} {}, 최대 {} hop)",
            from.name(),
            to.name(),
            amount,
            token,
            max_hops
        );

        // 이후 홉 추정이 캐시에서 읽도록 전체 체인의 가스 가격을 미리 당겨온다
        let gas_prices = self.oracle.get_gas_prices(&self.chains).await;

        let candidates = self.enumerate_paths(from, to, amount, max_hops, &gas_prices).await;
        if candidates.is_empty() {
            return Err(RouterError::NoViablePaths { from, to, max_hops });
        }
        debug!("후보 경로 {}개 발견", candidates.len());

        let mut viable = Vec::with_capacity(candidates.len());
        for path in candidates {
            if self.path_has_liquidity(&path, token, amount).await {
                viable.push(path);
            }
        }
        if viable.is_empty() {
            return Err(RouterError::InsufficientLiquidity {
                token: token.to_string(),
                amount,
            });
        }

        let mut ranked = self.optimizer.rank_paths(viable);
        let mut best = ranked.remove(0);
        best.fallbacks = ranked.into_iter().take(2).collect();

        info!("🏆 최적 경로: {}", best);

        self.route_cache.insert(
            cache_key,
            CachedRoute {
                path: best.clone(),
                expires_at: current_timestamp() + self.route_cache_ttl_secs,
            },
        );

        Ok(best)
    }

    /// 경로 캐시를 비우고 오라클/유동성 캐시 초기화를 위임
    pub fn clear_cache(&self) {
        self.route_cache.clear();
        self.oracle.clear_cache();
        self.liquidity.clear_cache(None, None);
        info!("🧹 라우터 캐시 초기화");
    }

    /// 구독을 포함한 전체 정리
    pub async fn destroy(&self) {
        self.clear_cache();
        self.oracle.destroy().await;
        info!("🛑 라우터 종료");
    }

    /// 워크리스트 BFS로 단순 경로 열거
    ///
    /// 완전 그래프 가정 위에서 hop 한도와 방문 집합만으로 가지를 친다.
    /// 선택된 브리지의 커넥터가 지원하지 않는 쌍은 엣지에서 제외된다.
    async fn enumerate_paths(
        &self,
        from: ChainId,
        to: ChainId,
        amount: U256,
        max_hops: usize,
        gas_prices: &HashMap<ChainId, GasPrice>,
    ) -> Vec<RoutingPath> {
        let mut paths = Vec::new();
        let mut worklist = VecDeque::new();
        worklist.push_back(PathPrefix {
            at: from,
            hops: Vec::new(),
            visited: HashSet::from([from]),
        });

        while let Some(prefix) = worklist.pop_front() {
            if prefix.hops.len() >= max_hops {
                continue;
            }

            for &next in &self.chains {
                if prefix.visited.contains(&next) {
                    continue;
                }

                let bridge = self.select_bridge(prefix.at, next);
                if !self.edge_supported(bridge, prefix.at, next).await {
                    continue;
                }

                let cost = self.estimate_hop_cost(prefix.at, bridge, amount, gas_prices);
                let mut hops = prefix.hops.clone();
                hops.push(RoutingHop::new(prefix.at, next, bridge, cost));

                if next == to {
                    let execution_cost = self.estimate_execution_cost(to, gas_prices);
                    paths.push(RoutingPath::from_hops(from, to, hops, execution_cost));
                } else {
                    let mut visited = prefix.visited.clone();
                    visited.insert(next);
                    worklist.push_back(PathPrefix { at: next, hops, visited });
                }
            }
        }

        paths
    }

    /// 브리지 선택: 명시적 선호가 항상 우선, 다음으로 superchain 쌍은
    /// 네이티브 메시징, 그 외에는 hyperlane
    fn select_bridge(&self, from: ChainId, to: ChainId) -> BridgeKind {
        if let Some(preferred) = self.preferred_bridge {
            return preferred;
        }
        if is_native_messaging_pair(from, to) {
            return BridgeKind::Native;
        }
        BridgeKind::Hyperlane
    }

    async fn edge_supported(&self, bridge: BridgeKind, from: ChainId, to: ChainId) -> bool {
        match self.connectors.get(&bridge) {
            Some(connector) => connector.supports_route(from, to).await,
            None => {
                debug!("커넥터 미설정: {} ({} -> {})", bridge.name(), from.name(), to.name());
                false
            }
        }
    }

    /// 홉 비용 = 브리지 명목 가스량 x 소스 체인 가스 가격 + 전송액의 0.1% 수수료.
    /// 오라클 실패 시 보수적 상수(0.001 ETH)로 대체.
    fn estimate_hop_cost(
        &self,
        source: ChainId,
        bridge: BridgeKind,
        amount: U256,
        gas_prices: &HashMap<ChainId, GasPrice>,
    ) -> U256 {
        match gas_prices.get(&source) {
            Some(snapshot) => {
                U256::from(bridge.transfer_gas_units()) * snapshot.gas_price
                    + RoutingHop::bridge_fee(amount)
            }
            None => {
                warn!("⚠️ {} 가스 가격 없음 - 보수적 홉 비용 사용", source.name());
                U256::from(FALLBACK_HOP_COST_WEI)
            }
        }
    }

    /// 대상 체인 실행 비용 (경로당 1회 가산)
    fn estimate_execution_cost(
        &self,
        destination: ChainId,
        gas_prices: &HashMap<ChainId, GasPrice>,
    ) -> U256 {
        match gas_prices.get(&destination) {
            Some(snapshot) => U256::from(EXECUTION_GAS_UNITS) * snapshot.gas_price,
            None => U256::from(FALLBACK_EXECUTION_COST_WEI),
        }
    }

    /// 경로의 모든 경유/대상 체인이 유동성 확인을 통과해야 생존
    async fn path_has_liquidity(&self, path: &RoutingPath, token: &str, amount: U256) -> bool {
        for chain in path.transit_chains() {
            if !self.liquidity.has_liquidity(chain, token, amount).await {
                debug!("유동성 부족으로 제외: {} ({}에서 막힘)", path.describe(), chain.name());
                return false;
            }
        }
        true
    }
}
