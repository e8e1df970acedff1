use std::sync::Arc;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use alloy::primitives::U256;
use ethers::providers::{Provider, Http, Middleware};
use ethers::types::BlockNumber;
use tracing::{info, warn};

use crate::types::ChainId;
use crate::utils::ethers_u256_to_alloy;

/// 오라클이 사용하는 최신 블록 헤더 필드
#[derive(Debug, Clone)]
pub struct BlockHeader {
    /// 블록 번호
    pub number: u64,
    /// EIP-1559 base fee (런던 이전 체인은 None)
    pub base_fee_per_gas: Option<U256>,
    /// 블록 타임스탬프 (unix 초)
    pub timestamp: u64,
}

/// Read-only RPC view of a single chain.
///
/// Implementations must be idempotent and side-effect free; the oracle
/// calls these on every cache miss and on every subscription tick.
#[async_trait]
pub trait ChainRpc: Send + Sync + std::fmt::Debug {
    /// Chain this endpoint serves
    fn chain(&self) -> ChainId;

    /// Current gas price in wei
    async fn gas_price(&self) -> Result<U256>;

    /// Latest block header (base fee source)
    async fn latest_block(&self) -> Result<BlockHeader>;
}

/// 체인 RPC 클라이언트
/// HTTP Provider를 통해 가스 가격과 최신 블록 헤더를 읽어오는 모듈
#[derive(Debug)]
pub struct EthersRpcClient {
    /// 대상 체인
    chain: ChainId,
    /// HTTP Provider (읽기 전용)
    provider: Arc<Provider<Http>>,
}

impl EthersRpcClient {
    /// 새로운 RPC 클라이언트 생성 및 연결 확인
    pub async fn connect(chain: ChainId, rpc_url: &str) -> Result<Self> {
        info!("🔌 {} RPC 클라이언트 초기화: {}", chain.name(), rpc_url);

        let provider = Provider::<Http>::try_from(rpc_url)?;
        let provider = Arc::new(provider);

        // 체인 ID 확인 (불일치 시 경고만, 프록시 엔드포인트일 수 있음)
        let reported = provider.get_chainid().await?.as_u64();
        if reported != chain.id() {
            warn!("⚠️ 체인 ID 불일치: 설정={}, 엔드포인트={}", chain.id(), reported);
        }

        let current_block = provider.get_block_number().await?.as_u64();
        info!("📦 {} 현재 블록: {}", chain.name(), current_block);

        Ok(Self { chain, provider })
    }
}

#[async_trait]
impl ChainRpc for EthersRpcClient {
    fn chain(&self) -> ChainId {
        self.chain
    }

    async fn gas_price(&self) -> Result<U256> {
        let price = self.provider.get_gas_price().await?;
        Ok(ethers_u256_to_alloy(price))
    }

    async fn latest_block(&self) -> Result<BlockHeader> {
        let block = self.provider.get_block(BlockNumber::Latest).await?
            .ok_or_else(|| anyhow!("최신 블록을 가져올 수 없습니다"))?;

        Ok(BlockHeader {
            number: block.number.map(|n| n.as_u64()).unwrap_or_default(),
            base_fee_per_gas: block.base_fee_per_gas.map(ethers_u256_to_alloy),
            timestamp: block.timestamp.as_u64(),
        })
    }
}
