use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use alloy::primitives::U256;
use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;

use crate::liquidity::TreasuryProvider;
use crate::types::{ChainId, CrossChainToken};

/// 결정적 트레저리 목
///
/// 토큰 심볼별 총 유동성을 들고 있고, 셰어는 유동성과 1:1로 보고합니다.
/// 등록되지 않은 심볼은 유동성 0으로 취급합니다.
#[derive(Debug)]
pub struct MockTreasury {
    chain: ChainId,
    liquidity: DashMap<String, u128>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockTreasury {
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            liquidity: DashMap::new(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_liquidity(self, symbol: &str, total: u128) -> Self {
        self.liquidity.insert(symbol.to_string(), total);
        self
    }

    pub fn set_liquidity(&self, symbol: &str, total: u128) {
        self.liquidity.insert(symbol.to_string(), total);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// total_liquidity 조회 횟수 (캐시 동작 검증용)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, symbol: &str) -> u128 {
        self.liquidity.get(symbol).map(|total| *total).unwrap_or(0)
    }
}

#[async_trait]
impl TreasuryProvider for MockTreasury {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn total_liquidity(&self, token: &CrossChainToken) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated treasury failure on {}", self.chain.name());
        }
        Ok(U256::from(self.lookup(&token.symbol)))
    }

    async fn total_shares(&self, token: &CrossChainToken) -> Result<U256> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated treasury failure on {}", self.chain.name());
        }
        Ok(U256::from(self.lookup(&token.symbol)))
    }
}
