use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::U256;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{LIQUIDITY_AVAILABLE_PCT, LIQUIDITY_CACHE_TTL_SECS};
use crate::types::{ChainId, CrossChainToken};
use crate::utils::{current_timestamp, u256_to_f64};

/// 유동성 체커 에러
#[derive(Debug, Error)]
pub enum LiquidityError {
    #[error("Treasury not configured for chain: {0}")]
    TreasuryNotConfigured(ChainId),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Token {symbol} not deployed on {chain}")]
    TokenNotDeployed { symbol: String, chain: ChainId },
}

pub type LiquidityResult<T> = Result<T, LiquidityError>;

/// Treasury/settlement pool query capability, one per chain.
///
/// Both reads must be idempotent; the checker treats any error as
/// "pool unavailable" rather than propagating it.
#[async_trait]
pub trait TreasuryProvider: Send + Sync {
    /// Chain this treasury settles on
    fn chain(&self) -> ChainId;

    /// Total token liquidity held by the settlement pool
    async fn total_liquidity(&self, token: &CrossChainToken) -> Result<U256>;

    /// Total outstanding pool shares
    async fn total_shares(&self, token: &CrossChainToken) -> Result<U256>;
}

/// 체인-토큰별 유동성 스냅샷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiquidityInfo {
    pub chain: ChainId,
    /// 토큰 심볼
    pub token: String,
    /// 즉시 인출 가능한 양
    pub available: U256,
    /// 예약분 (인출 불가)
    pub reserved: U256,
    /// 풀 총량
    pub total: U256,
    /// reserved / total (총량 0이면 0.0, 조회 실패 시 1.0)
    pub utilization_rate: f64,
    pub timestamp: u64,
}

impl LiquidityInfo {
    /// 풀 총량에 80/20 가용/예약 분할을 적용한 스냅샷
    pub fn from_total(chain: ChainId, token: &str, total: U256) -> Self {
        let available = total * U256::from(LIQUIDITY_AVAILABLE_PCT) / U256::from(100u64);
        let reserved = total - available;
        let utilization_rate = if total.is_zero() {
            0.0
        } else {
            u256_to_f64(reserved) / u256_to_f64(total)
        };

        Self {
            chain,
            token: token.to_string(),
            available,
            reserved,
            total,
            utilization_rate,
            timestamp: current_timestamp(),
        }
    }

    /// 조회 실패 시의 합성 레코드 - 전량 사용 중(가용 0)으로 취급
    pub fn unavailable(chain: ChainId, token: &str) -> Self {
        Self {
            chain,
            token: token.to_string(),
            available: U256::ZERO,
            reserved: U256::ZERO,
            total: U256::ZERO,
            utilization_rate: 1.0,
            timestamp: current_timestamp(),
        }
    }

    pub fn is_stale(&self, max_age_seconds: u64) -> bool {
        current_timestamp().saturating_sub(self.timestamp) > max_age_seconds
    }
}

/// 유동성 체커
///
/// "체인 C에 토큰 T가 얼마나 있나"를 TTL 캐시와 함께 답한다. 조회 실패는
/// 가용 0 레코드로 흡수되므로 라우터는 항상 경로를 평가(및 거부)할 수 있다.
pub struct LiquidityChecker {
    /// 체인별 treasury 제공자
    treasuries: HashMap<ChainId, Arc<dyn TreasuryProvider>>,
    /// 심볼 -> 토큰 레지스트리
    tokens: HashMap<String, CrossChainToken>,
    /// (체인, 심볼) 키 캐시
    cache: DashMap<(ChainId, String), LiquidityInfo>,
    cache_ttl_secs: u64,
}

impl LiquidityChecker {
    pub fn new(
        treasuries: HashMap<ChainId, Arc<dyn TreasuryProvider>>,
        tokens: Vec<CrossChainToken>,
        cache_ttl_secs: u64,
    ) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|t| (t.symbol.clone(), t))
            .collect();

        Self {
            treasuries,
            tokens,
            cache: DashMap::new(),
            cache_ttl_secs,
        }
    }

    /// 기본 TTL(10초)로 생성
    pub fn with_default_ttl(
        treasuries: HashMap<ChainId, Arc<dyn TreasuryProvider>>,
        tokens: Vec<CrossChainToken>,
    ) -> Self {
        Self::new(treasuries, tokens, LIQUIDITY_CACHE_TTL_SECS)
    }

    /// 유동성 스냅샷 조회 (캐시 우선)
    ///
    /// 설정 누락(treasury 없음, 미등록/미배포 토큰)은 즉시 에러.
    /// treasury 조회 실패는 에러가 아니라 가용 0 스냅샷으로 돌아온다.
    pub async fn get_liquidity(
        &self,
        chain: ChainId,
        token: &str,
    ) -> LiquidityResult<LiquidityInfo> {
        let treasury = self
            .treasuries
            .get(&chain)
            .ok_or(LiquidityError::TreasuryNotConfigured(chain))?;
        let registered = self
            .tokens
            .get(token)
            .ok_or_else(|| LiquidityError::UnknownToken(token.to_string()))?;
        if !registered.is_deployed_on(chain) {
            return Err(LiquidityError::TokenNotDeployed {
                symbol: token.to_string(),
                chain,
            });
        }

        let key = (chain, token.to_string());
        if let Some(cached) = self.cache.get(&key) {
            if !cached.is_stale(self.cache_ttl_secs) {
                return Ok(cached.clone());
            }
        }

        let (liquidity, shares) = tokio::join!(
            treasury.total_liquidity(registered),
            treasury.total_shares(registered)
        );

        let info = match liquidity {
            Ok(total) => {
                if let Ok(shares) = shares {
                    debug!(
                        "💧 {} {} 유동성: 총량 {}, 지분 {}",
                        chain.name(),
                        token,
                        total,
                        shares
                    );
                }
                LiquidityInfo::from_total(chain, token, total)
            }
            Err(e) => {
                warn!(
                    "⚠️ 유동성 조회 실패 ({} {}): {} - 가용 0으로 처리",
                    chain.name(),
                    token,
                    e
                );
                LiquidityInfo::unavailable(chain, token)
            }
        };

        self.cache.insert(key, info.clone());
        Ok(info)
    }

    /// 해당 양만큼 인출 가능한지 확인 - 어떤 실패도 false로 흡수
    pub async fn has_liquidity(&self, chain: ChainId, token: &str, amount: U256) -> bool {
        match self.get_liquidity(chain, token).await {
            Ok(info) => info.available >= amount,
            Err(e) => {
                debug!("유동성 확인 불가 ({} {}): {}", chain.name(), token, e);
                false
            }
        }
    }

    /// 여러 체인의 유동성 가능 여부를 동시에 확인
    pub async fn check_multiple_chains(
        &self,
        chains: &[ChainId],
        token: &str,
        amount: U256,
    ) -> HashMap<ChainId, bool> {
        let futures: Vec<_> = chains
            .iter()
            .map(|chain| async move { (*chain, self.has_liquidity(*chain, token, amount).await) })
            .collect();

        join_all(futures).await.into_iter().collect()
    }

    /// 해당 양을 감당할 수 있는 체인 목록 (입력 순서 유지)
    pub async fn find_chains_with_liquidity(
        &self,
        chains: &[ChainId],
        token: &str,
        amount: U256,
    ) -> Vec<ChainId> {
        let futures: Vec<_> = chains
            .iter()
            .map(|chain| async move { (*chain, self.has_liquidity(*chain, token, amount).await) })
            .collect();

        join_all(futures)
            .await
            .into_iter()
            .filter(|(_, ok)| *ok)
            .map(|(chain, _)| chain)
            .collect()
    }

    /// 체인들의 풀 총량 합계 (조회 실패/미설정 체인은 0으로 기여)
    pub async fn get_total_liquidity(&self, chains: &[ChainId], token: &str) -> U256 {
        let futures: Vec<_> = chains
            .iter()
            .map(|chain| self.get_liquidity(*chain, token))
            .collect();

        join_all(futures)
            .await
            .into_iter()
            .filter_map(|r| r.ok())
            .fold(U256::ZERO, |acc, info| acc + info.total)
    }

    /// 캐시 무효화 - 키를 주지 않으면 전체 삭제
    pub fn clear_cache(&self, chain: Option<ChainId>, token: Option<&str>) {
        match (chain, token) {
            (None, None) => self.cache.clear(),
            (Some(chain), None) => self.cache.retain(|(c, _), _| *c != chain),
            (None, Some(token)) => self.cache.retain(|(_, t), _| t != token),
            (Some(chain), Some(token)) => {
                self.cache.remove(&(chain, token.to_string()));
            }
        }
    }

    /// 등록된 토큰 심볼 목록
    pub fn registered_tokens(&self) -> Vec<String> {
        self.tokens.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockTreasury;
    use alloy::primitives::Address;

    fn usdc_on(chains: &[ChainId]) -> CrossChainToken {
        let mut token = CrossChainToken::new("USDC", 6);
        for chain in chains {
            token = token.with_address(*chain, Address::ZERO);
        }
        token
    }

    fn checker_with(
        entries: Vec<(ChainId, Arc<MockTreasury>)>,
        tokens: Vec<CrossChainToken>,
        ttl: u64,
    ) -> LiquidityChecker {
        let treasuries: HashMap<ChainId, Arc<dyn TreasuryProvider>> = entries
            .into_iter()
            .map(|(chain, t)| (chain, t as Arc<dyn TreasuryProvider>))
            .collect();
        LiquidityChecker::new(treasuries, tokens, ttl)
    }

    #[test]
    fn test_split_preserves_total() {
        let info = LiquidityInfo::from_total(ChainId::Base, "USDC", U256::from(1_000u64));
        assert_eq!(info.available, U256::from(800u64));
        assert_eq!(info.reserved, U256::from(200u64));
        assert_eq!(info.available + info.reserved, info.total);
        assert!((info.utilization_rate - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_pool() {
        let info = LiquidityInfo::from_total(ChainId::Base, "USDC", U256::ZERO);
        assert_eq!(info.available, U256::ZERO);
        assert_eq!(info.utilization_rate, 0.0);
    }

    #[test]
    fn test_unavailable_record() {
        let info = LiquidityInfo::unavailable(ChainId::Base, "USDC");
        assert_eq!(info.available, U256::ZERO);
        assert_eq!(info.utilization_rate, 1.0);
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let treasury = Arc::new(MockTreasury::new(ChainId::Base).with_liquidity("USDC", 10_000));
        let checker = checker_with(
            vec![(ChainId::Base, treasury.clone())],
            vec![usdc_on(&[ChainId::Base])],
            60,
        );

        checker.get_liquidity(ChainId::Base, "USDC").await.unwrap();
        checker.get_liquidity(ChainId::Base, "USDC").await.unwrap();
        assert_eq!(treasury.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_becomes_zero_liquidity() {
        let treasury = Arc::new(MockTreasury::new(ChainId::Optimism).with_liquidity("USDC", 10_000));
        treasury.set_failing(true);
        let checker = checker_with(
            vec![(ChainId::Optimism, treasury)],
            vec![usdc_on(&[ChainId::Optimism])],
            60,
        );

        let info = checker.get_liquidity(ChainId::Optimism, "USDC").await.unwrap();
        assert_eq!(info.available, U256::ZERO);
        assert_eq!(info.utilization_rate, 1.0);
    }

    #[tokio::test]
    async fn test_config_errors_fail_fast() {
        let treasury = Arc::new(MockTreasury::new(ChainId::Base).with_liquidity("USDC", 10_000));
        let checker = checker_with(
            vec![(ChainId::Base, treasury)],
            vec![usdc_on(&[ChainId::Base])],
            60,
        );

        assert!(matches!(
            checker.get_liquidity(ChainId::Polygon, "USDC").await,
            Err(LiquidityError::TreasuryNotConfigured(ChainId::Polygon))
        ));
        assert!(matches!(
            checker.get_liquidity(ChainId::Base, "DAI").await,
            Err(LiquidityError::UnknownToken(_))
        ));

        // 토큰은 등록되어 있으나 해당 체인에 미배포
        let treasury = Arc::new(MockTreasury::new(ChainId::Base));
        let checker = checker_with(
            vec![(ChainId::Base, treasury)],
            vec![usdc_on(&[ChainId::Optimism])],
            60,
        );
        assert!(matches!(
            checker.get_liquidity(ChainId::Base, "USDC").await,
            Err(LiquidityError::TokenNotDeployed { .. })
        ));
    }

    #[tokio::test]
    async fn test_has_liquidity_never_errors() {
        let treasury = Arc::new(MockTreasury::new(ChainId::Base).with_liquidity("USDC", 1_000));
        let checker = checker_with(
            vec![(ChainId::Base, treasury.clone())],
            vec![usdc_on(&[ChainId::Base])],
            0,
        );

        // 가용 800 >= 500
        assert!(checker.has_liquidity(ChainId::Base, "USDC", U256::from(500u64)).await);
        // 가용 800 < 900
        assert!(!checker.has_liquidity(ChainId::Base, "USDC", U256::from(900u64)).await);

        // 조회 실패 -> false
        treasury.set_failing(true);
        assert!(!checker.has_liquidity(ChainId::Base, "USDC", U256::from(1u64)).await);

        // 설정 에러들도 false
        assert!(!checker.has_liquidity(ChainId::Polygon, "USDC", U256::from(1u64)).await);
        assert!(!checker.has_liquidity(ChainId::Base, "DAI", U256::from(1u64)).await);
    }

    #[tokio::test]
    async fn test_multi_chain_fanout() {
        let rich = Arc::new(MockTreasury::new(ChainId::Base).with_liquidity("USDC", 10_000));
        let poor = Arc::new(MockTreasury::new(ChainId::Optimism).with_liquidity("USDC", 10));
        let checker = checker_with(
            vec![(ChainId::Base, rich), (ChainId::Optimism, poor)],
            vec![usdc_on(&[ChainId::Base, ChainId::Optimism])],
            60,
        );

        let chains = [ChainId::Base, ChainId::Optimism];
        let results = checker
            .check_multiple_chains(&chains, "USDC", U256::from(1_000u64))
            .await;
        assert_eq!(results[&ChainId::Base], true);
        assert_eq!(results[&ChainId::Optimism], false);

        let viable = checker
            .find_chains_with_liquidity(&chains, "USDC", U256::from(1_000u64))
            .await;
        assert_eq!(viable, vec![ChainId::Base]);

        let total = checker.get_total_liquidity(&chains, "USDC").await;
        assert_eq!(total, U256::from(10_010u64));
    }

    #[tokio::test]
    async fn test_clear_cache_selective() {
        let base = Arc::new(MockTreasury::new(ChainId::Base).with_liquidity("USDC", 1_000));
        let op = Arc::new(MockTreasury::new(ChainId::Optimism).with_liquidity("USDC", 1_000));
        let checker = checker_with(
            vec![(ChainId::Base, base.clone()), (ChainId::Optimism, op.clone())],
            vec![usdc_on(&[ChainId::Base, ChainId::Optimism])],
            60,
        );

        checker.get_liquidity(ChainId::Base, "USDC").await.unwrap();
        checker.get_liquidity(ChainId::Optimism, "USDC").await.unwrap();

        // Base만 무효화 - Base는 재조회, Optimism은 캐시 유지
        checker.clear_cache(Some(ChainId::Base), None);
        checker.get_liquidity(ChainId::Base, "USDC").await.unwrap();
        checker.get_liquidity(ChainId::Optimism, "USDC").await.unwrap();
        assert_eq!(base.call_count(), 2);
        assert_eq!(op.call_count(), 1);

        // 전체 무효화
        checker.clear_cache(None, None);
        checker.get_liquidity(ChainId::Optimism, "USDC").await.unwrap();
        assert_eq!(op.call_count(), 2);
    }
}
