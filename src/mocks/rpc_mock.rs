use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use alloy::primitives::U256;
use anyhow::{bail, Result};
use async_trait::async_trait;

use super::get_mock_config;
use crate::blockchain::{BlockHeader, ChainRpc};
use crate::types::ChainId;
use crate::utils::current_timestamp;

/// 결정적 체인 RPC 목
///
/// 가스 가격은 언제든 바꿀 수 있고, 블록 번호는 설정된 블록 타임에 맞춰
/// 진행합니다. `set_failing`으로 모든 조회를 실패시킬 수 있습니다.
#[derive(Debug)]
pub struct MockChainRpc {
    chain: ChainId,
    gas_price: AtomicU64,
    /// 0이면 base fee 미보고 (pre-EIP-1559 흉내)
    base_fee: AtomicU64,
    start_block: u64,
    started_at: Instant,
    block_time_secs: u64,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockChainRpc {
    pub fn new(chain: ChainId, gas_price_wei: u64) -> Self {
        let config = get_mock_config();
        Self {
            chain,
            gas_price: AtomicU64::new(gas_price_wei),
            base_fee: AtomicU64::new(0),
            start_block: 18_000_000,
            started_at: Instant::now(),
            block_time_secs: config.block_time.max(1),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_base_fee(self, wei: u64) -> Self {
        self.base_fee.store(wei, Ordering::SeqCst);
        self
    }

    pub fn set_gas_price(&self, wei: u64) {
        self.gas_price.store(wei, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// gas_price 조회 횟수 (캐시 동작 검증용)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn current_block(&self) -> u64 {
        self.start_block + self.started_at.elapsed().as_secs() / self.block_time_secs
    }
}

#[async_trait]
impl ChainRpc for MockChainRpc {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn gas_price(&self) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated RPC failure on {}", self.chain.name());
        }
        Ok(U256::from(self.gas_price.load(Ordering::SeqCst)))
    }

    async fn latest_block(&self) -> Result<BlockHeader> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("simulated RPC failure on {}", self.chain.name());
        }
        let base_fee = match self.base_fee.load(Ordering::SeqCst) {
            0 => None,
            wei => Some(U256::from(wei)),
        };
        Ok(BlockHeader {
            number: self.current_block(),
            base_fee_per_gas: base_fee,
            timestamp: current_timestamp(),
        })
    }
}
