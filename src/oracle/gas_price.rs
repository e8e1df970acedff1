use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::blockchain::ChainRpc;
use crate::constants::{
    GAS_HISTORY_CAPACITY, GAS_PRICE_CACHE_TTL_SECS, PREDICTION_EDGE_SAMPLE,
    PREDICTION_MIN_HISTORY, PREDICTION_WINDOW,
};
use crate::types::ChainId;
use crate::utils::{current_timestamp, u256_to_f64, wei_to_gwei};

/// 가스 가격 오라클 에러
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Chain not configured: {0}")]
    ChainNotConfigured(ChainId),

    #[error("RPC fetch failed for {chain}: {reason}")]
    RpcFailed { chain: ChainId, reason: String },
}

pub type OracleResult<T> = Result<T, OracleError>;

/// 체인별 가스 가격 스냅샷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GasPrice {
    /// 대상 체인
    pub chain: ChainId,
    /// 가스 가격 (wei)
    pub gas_price: U256,
    /// EIP-1559 base fee (조회 실패 시 None)
    pub base_fee: Option<U256>,
    /// priority fee (gas_price - base_fee, base fee 없으면 None)
    pub priority_fee: Option<U256>,
    /// 타임스탬프 (unix 초)
    pub timestamp: u64,
}

impl GasPrice {
    pub fn new(chain: ChainId, gas_price: U256, base_fee: Option<U256>) -> Self {
        let priority_fee = base_fee
            .and_then(|base| gas_price.checked_sub(base))
            .filter(|fee| !fee.is_zero());

        Self {
            chain,
            gas_price,
            base_fee,
            priority_fee,
            timestamp: current_timestamp(),
        }
    }

    /// 스냅샷이 만료되었는지 확인
    pub fn is_stale(&self, max_age_seconds: u64) -> bool {
        current_timestamp().saturating_sub(self.timestamp) > max_age_seconds
    }

    /// gwei 단위 가격 (로깅용)
    pub fn gwei(&self) -> f64 {
        wei_to_gwei(self.gas_price)
    }
}

/// 구독자에게 전달되는 갱신 이벤트
#[derive(Debug, Clone)]
pub struct GasPriceUpdate {
    pub chain: ChainId,
    pub snapshot: GasPrice,
}

/// 가스 가격 오라클
///
/// 체인별 현재 가스 가격을 TTL 캐시로 제공하고, 최근 이력 링버퍼를 기반으로
/// 추세 예측과 기간 집계를 계산한다. 구독을 걸면 백그라운드 태스크가 주기적으로
/// 가격을 갱신하고 모든 watcher에게 브로드캐스트한다.
pub struct GasPriceOracle {
    /// 체인별 RPC 엔드포인트
    endpoints: HashMap<ChainId, Arc<dyn ChainRpc>>,
    /// 최신 스냅샷 캐시 (TTL 기반)
    cache: Arc<DashMap<ChainId, GasPrice>>,
    /// 체인별 이력 링버퍼 (최대 GAS_HISTORY_CAPACITY개, FIFO)
    history: Arc<DashMap<ChainId, VecDeque<GasPrice>>>,
    /// 캐시 유효 시간 (초)
    cache_ttl_secs: u64,
    /// 체인별 구독 태스크 (멱등 - 체인당 최대 1개)
    subscriptions: Arc<RwLock<HashMap<ChainId, JoinHandle<()>>>>,
    /// 갱신 이벤트 수신자들
    watchers: Arc<RwLock<Vec<mpsc::UnboundedSender<GasPriceUpdate>>>>,
}

impl GasPriceOracle {
    /// 새로운 오라클 생성
    pub fn new(endpoints: HashMap<ChainId, Arc<dyn ChainRpc>>, cache_ttl_secs: u64) -> Self {
        Self {
            endpoints,
            cache: Arc::new(DashMap::new()),
            history: Arc::new(DashMap::new()),
            cache_ttl_secs,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            watchers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 기본 TTL(5초)로 생성
    pub fn with_default_ttl(endpoints: HashMap<ChainId, Arc<dyn ChainRpc>>) -> Self {
        Self::new(endpoints, GAS_PRICE_CACHE_TTL_SECS)
    }

    /// 설정된 체인 목록
    pub fn configured_chains(&self) -> Vec<ChainId> {
        self.endpoints.keys().copied().collect()
    }

    /// 현재 가스 가격 조회 (캐시 우선, 만료 시 RPC 조회)
    ///
    /// RPC 실패는 그대로 전파하며, 실패 시 캐시와 이력은 건드리지 않는다.
    pub async fn get_current_gas_price(&self, chain: ChainId) -> OracleResult<GasPrice> {
        if let Some(cached) = self.cache.get(&chain) {
            if !cached.is_stale(self.cache_ttl_secs) {
                debug!("⛽ 캐시된 가스 가격 사용: {} ({:.2} gwei)", chain.name(), cached.gwei());
                return Ok(cached.clone());
            }
        }

        let endpoint = self
            .endpoints
            .get(&chain)
            .ok_or(OracleError::ChainNotConfigured(chain))?;

        let snapshot = Self::fetch_snapshot(endpoint.as_ref()).await?;
        debug!("⛽ 가스 가격 갱신: {} ({:.2} gwei)", chain.name(), snapshot.gwei());

        Self::record_snapshot(&self.cache, &self.history, snapshot.clone());
        Ok(snapshot)
    }

    /// 여러 체인의 가스 가격을 동시에 조회 (실패한 체인은 결과에서 제외)
    pub async fn get_gas_prices(&self, chains: &[ChainId]) -> HashMap<ChainId, GasPrice> {
        let futures: Vec<_> = chains
            .iter()
            .map(|chain| async move { (*chain, self.get_current_gas_price(*chain).await) })
            .collect();

        let mut prices = HashMap::new();
        for (chain, result) in join_all(futures).await {
            match result {
                Ok(snapshot) => {
                    prices.insert(chain, snapshot);
                }
                Err(e) => {
                    warn!("⚠️ 가스 가격 조회 실패 ({}): {}", chain.name(), e);
                }
            }
        }
        prices
    }

    /// 추세 기반 가스 가격 예측
    ///
    /// 이력이 10개 미만이면 None. 최근 20개의 평균에, 그 구간의 최신 5개 평균과
    /// 가장 오래된 5개 평균의 차이를 추세로 삼아 `minutes_ahead/5` 배 투영한다.
    /// 투영 결과가 0 이하로 내려가면 평균으로 바닥 처리.
    pub fn predict_gas_price(&self, chain: ChainId, minutes_ahead: u64) -> Option<U256> {
        let history = self.history.get(&chain)?;
        if history.len() < PREDICTION_MIN_HISTORY {
            return None;
        }

        // 링버퍼 뒤쪽이 최신 - 역순으로 최근 20개를 취한다 (window[0]이 가장 최신)
        let window: Vec<f64> = history
            .iter()
            .rev()
            .take(PREDICTION_WINDOW)
            .map(|s| u256_to_f64(s.gas_price))
            .collect();

        let avg = window.iter().sum::<f64>() / window.len() as f64;
        let latest: f64 = window.iter().take(PREDICTION_EDGE_SAMPLE).sum::<f64>()
            / PREDICTION_EDGE_SAMPLE as f64;
        let earliest: f64 = window.iter().rev().take(PREDICTION_EDGE_SAMPLE).sum::<f64>()
            / PREDICTION_EDGE_SAMPLE as f64;

        let trend = latest - earliest;
        let projected = avg + trend * (minutes_ahead as f64 / 5.0);
        let predicted = if projected <= 0.0 { avg } else { projected };

        Some(U256::from(predicted as u128))
    }

    /// 기간 내 평균 가스 가격 (이력이 비어있으면 None)
    pub fn get_average_gas_price(&self, chain: ChainId, period_secs: u64) -> Option<U256> {
        let prices = self.window_prices(chain, period_secs);
        if prices.is_empty() {
            return None;
        }
        let sum = prices.iter().fold(U256::ZERO, |acc, p| acc + *p);
        Some(sum / U256::from(prices.len() as u64))
    }

    /// 기간 내 최저 가스 가격
    pub fn get_min_gas_price(&self, chain: ChainId, period_secs: u64) -> Option<U256> {
        self.window_prices(chain, period_secs).into_iter().min()
    }

    /// 기간 내 최고 가스 가격
    pub fn get_max_gas_price(&self, chain: ChainId, period_secs: u64) -> Option<U256> {
        self.window_prices(chain, period_secs).into_iter().max()
    }

    /// 가스 가격 구독 시작 (멱등 - 이미 구독 중이면 no-op)
    ///
    /// 즉시 1회 조회 후 `interval` 간격으로 반복 조회한다 (기본값 = 캐시 TTL).
    /// 각 tick의 실패는 경고만 남기고 다음 tick에서 자동 복구된다.
    pub async fn subscribe_to_gas_price_updates(
        &self,
        chain: ChainId,
        interval: Option<Duration>,
    ) -> OracleResult<()> {
        let endpoint = self
            .endpoints
            .get(&chain)
            .cloned()
            .ok_or(OracleError::ChainNotConfigured(chain))?;

        let mut subs = self.subscriptions.write().await;
        if let Some(handle) = subs.get(&chain) {
            if !handle.is_finished() {
                debug!("이미 구독 중: {}", chain.name());
                return Ok(());
            }
        }

        let period = interval
            .unwrap_or(Duration::from_secs(self.cache_ttl_secs))
            .max(Duration::from_millis(1));
        info!("🔔 가스 가격 구독 시작: {} ({}ms 간격)", chain.name(), period.as_millis());

        let cache = Arc::clone(&self.cache);
        let history = Arc::clone(&self.history);
        let watchers = Arc::clone(&self.watchers);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                // 첫 tick은 즉시 발화
                ticker.tick().await;
                match Self::fetch_snapshot(endpoint.as_ref()).await {
                    Ok(snapshot) => {
                        Self::record_snapshot(&cache, &history, snapshot.clone());
                        let update = GasPriceUpdate { chain, snapshot };
                        watchers
                            .write()
                            .await
                            .retain(|tx| tx.send(update.clone()).is_ok());
                    }
                    Err(e) => {
                        warn!("⚠️ 가스 가격 갱신 실패 ({}): {}", chain.name(), e);
                    }
                }
            }
        });

        subs.insert(chain, handle);
        Ok(())
    }

    /// 구독 해제 (없으면 no-op)
    pub async fn unsubscribe(&self, chain: ChainId) {
        if let Some(handle) = self.subscriptions.write().await.remove(&chain) {
            handle.abort();
            info!("🔕 가스 가격 구독 해제: {}", chain.name());
        }
    }

    /// 활성 구독 수
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// 갱신 이벤트 수신 채널 등록
    pub async fn watch_updates(&self) -> mpsc::UnboundedReceiver<GasPriceUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.write().await.push(tx);
        rx
    }

    /// 체인별 이력 조회 (오래된 것부터)
    pub fn get_history(&self, chain: ChainId) -> Vec<GasPrice> {
        self.history
            .get(&chain)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 가격 캐시 초기화 (이력은 유지)
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("가스 가격 캐시 초기화");
    }

    /// 모든 구독을 중단하고 상태를 정리
    pub async fn destroy(&self) {
        let mut subs = self.subscriptions.write().await;
        for (chain, handle) in subs.drain() {
            handle.abort();
            debug!("구독 태스크 중단: {}", chain.name());
        }
        drop(subs);

        self.cache.clear();
        self.history.clear();
        self.watchers.write().await.clear();
        info!("🛑 가스 가격 오라클 종료");
    }

    async fn fetch_snapshot(endpoint: &dyn ChainRpc) -> OracleResult<GasPrice> {
        let chain = endpoint.chain();
        let gas_price = endpoint.gas_price().await.map_err(|e| OracleError::RpcFailed {
            chain,
            reason: e.to_string(),
        })?;

        // base fee는 best effort - 실패해도 스냅샷은 유효
        let base_fee = match endpoint.latest_block().await {
            Ok(header) => header.base_fee_per_gas,
            Err(e) => {
                debug!("base fee 조회 실패 ({}): {}", chain.name(), e);
                None
            }
        };

        Ok(GasPrice::new(chain, gas_price, base_fee))
    }

    fn record_snapshot(
        cache: &DashMap<ChainId, GasPrice>,
        history: &DashMap<ChainId, VecDeque<GasPrice>>,
        snapshot: GasPrice,
    ) {
        {
            let mut ring = history.entry(snapshot.chain).or_default();
            ring.push_back(snapshot.clone());
            while ring.len() > GAS_HISTORY_CAPACITY {
                ring.pop_front();
            }
        }
        cache.insert(snapshot.chain, snapshot);
    }

    fn window_prices(&self, chain: ChainId, period_secs: u64) -> Vec<U256> {
        let cutoff = current_timestamp().saturating_sub(period_secs);
        self.history
            .get(&chain)
            .map(|ring| {
                ring.iter()
                    .filter(|s| s.timestamp >= cutoff)
                    .map(|s| s.gas_price)
                    .collect()
            })
            .unwrap_or_default()
    }
}
