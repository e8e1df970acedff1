pub mod bridge_mock;
pub mod rpc_mock;
pub mod treasury_mock;

pub use bridge_mock::MockBridgeConnector;
pub use rpc_mock::MockChainRpc;
pub use treasury_mock::MockTreasury;

use std::env;

/// Check if mock mode is enabled
pub fn is_mock_mode() -> bool {
    env::var("API_MODE").unwrap_or_default() == "mock"
}

/// Fabricated 32-byte transaction hash
pub fn mock_tx_hash() -> String {
    format!(
        "0x{:016x}{:016x}{:016x}{:016x}",
        fastrand::u64(..),
        fastrand::u64(..),
        fastrand::u64(..),
        fastrand::u64(..)
    )
}

/// Get mock configuration values
pub fn get_mock_config() -> MockConfig {
    MockConfig {
        gas_price: env::var("MOCK_GAS_PRICE")
            .unwrap_or_else(|_| "20000000000".to_string())
            .parse()
            .unwrap_or(20_000_000_000u64),
        base_fee: env::var("MOCK_BASE_FEE")
            .unwrap_or_else(|_| "15000000000".to_string())
            .parse()
            .unwrap_or(15_000_000_000u64),
        block_time: env::var("MOCK_BLOCK_TIME")
            .unwrap_or_else(|_| "12".to_string())
            .parse()
            .unwrap_or(12),
        treasury_liquidity: env::var("MOCK_TREASURY_LIQUIDITY")
            .unwrap_or_else(|_| "1000000000000".to_string())
            .parse()
            .unwrap_or(1_000_000_000_000u128),
    }
}

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// 모의 가스 가격 (wei)
    pub gas_price: u64,
    /// 모의 base fee (wei)
    pub base_fee: u64,
    /// 모의 블록 생성 간격 (초)
    pub block_time: u64,
    /// 체인별 트레저리 초기 유동성 (토큰 최소 단위)
    pub treasury_liquidity: u128,
}
