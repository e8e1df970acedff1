use std::collections::HashMap;
use once_cell::sync::Lazy;

use crate::types::ChainId;

// Bridge reliability coefficients (calibration stand-ins until live
// measurement replaces them)
pub const NATIVE_RELIABILITY: f64 = 0.95;
pub const HYPERLANE_RELIABILITY: f64 = 0.90;
pub const LAYERZERO_RELIABILITY: f64 = 0.88;

// Nominal transit times per bridge kind (seconds)
pub const NATIVE_TRANSFER_TIME_SECS: u64 = 300;
pub const HYPERLANE_TRANSFER_TIME_SECS: u64 = 180;
pub const LAYERZERO_TRANSFER_TIME_SECS: u64 = 120;

// Nominal source-chain gas units per transfer
pub const NATIVE_TRANSFER_GAS_UNITS: u64 = 200_000;
pub const HYPERLANE_TRANSFER_GAS_UNITS: u64 = 300_000;
pub const LAYERZERO_TRANSFER_GAS_UNITS: u64 = 250_000;

// Destination-chain execution, charged once per route
pub const EXECUTION_GAS_UNITS: u64 = 50_000;

// Bridge protocol fee in basis points (0.1%)
pub const BRIDGE_FEE_BPS: u64 = 10;

// Conservative cost stand-ins when gas oracles are unreachable
pub const FALLBACK_HOP_COST_WEI: u128 = 1_000_000_000_000_000; // 0.001 ETH
pub const FALLBACK_EXECUTION_COST_WEI: u128 = 1_000_000_000_000_000; // 0.001 ETH

// Path scoring ceilings
pub const COST_SCORE_LOG10_CEILING: f64 = 21.0; // log10(1e21 wei), ~$2000 at 2000 USD/ETH
pub const TIME_SCORE_CEILING_SECS: f64 = 3600.0; // 1 hour

// Weight renormalization tolerance
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

// Gas price oracle
pub const GAS_PRICE_CACHE_TTL_SECS: u64 = 5;
pub const GAS_HISTORY_CAPACITY: usize = 100;
pub const PREDICTION_MIN_HISTORY: usize = 10;
pub const PREDICTION_WINDOW: usize = 20;
pub const PREDICTION_EDGE_SAMPLE: usize = 5;

// Liquidity checker
pub const LIQUIDITY_CACHE_TTL_SECS: u64 = 10;
pub const LIQUIDITY_AVAILABLE_PCT: u64 = 80; // 80/20 available/reserved split

// Router defaults
pub const DEFAULT_MAX_HOPS: usize = 3;
pub const ROUTE_CACHE_TTL_SECS: u64 = 300;

// Bridge monitoring
pub const BRIDGE_POLL_INTERVAL_SECS: u64 = 5;
pub const BRIDGE_TIMEOUT_FACTOR: u64 = 2; // force-fail after 2x estimated time
pub const WAIT_POLL_INTERVAL_MS: u64 = 200;
pub const COMPLETED_HISTORY_CAPACITY: usize = 256;

/// Static per-chain metadata
#[derive(Debug, Clone)]
pub struct ChainMetadata {
    pub name: &'static str,
    pub native_symbol: &'static str,
    /// Average block time in seconds
    pub block_time: u64,
    /// OP Stack family membership (native messaging eligibility)
    pub superchain: bool,
    /// Env var carrying the RPC URL override
    pub rpc_env: &'static str,
    pub default_rpc: &'static str,
}

pub static CHAIN_REGISTRY: Lazy<HashMap<ChainId, ChainMetadata>> = Lazy::new(|| {
    let mut registry = HashMap::new();
    registry.insert(ChainId::Ethereum, ChainMetadata {
        name: "ethereum",
        native_symbol: "ETH",
        block_time: 12,
        superchain: false,
        rpc_env: "ETHEREUM_RPC_URL",
        default_rpc: "https://eth.llamarpc.com",
    });
    registry.insert(ChainId::Optimism, ChainMetadata {
        name: "optimism",
        native_symbol: "ETH",
        block_time: 2,
        superchain: true,
        rpc_env: "OPTIMISM_RPC_URL",
        default_rpc: "https://mainnet.optimism.io",
    });
    registry.insert(ChainId::Polygon, ChainMetadata {
        name: "polygon",
        native_symbol: "MATIC",
        block_time: 2,
        superchain: false,
        rpc_env: "POLYGON_RPC_URL",
        default_rpc: "https://polygon.llamarpc.com",
    });
    registry.insert(ChainId::Base, ChainMetadata {
        name: "base",
        native_symbol: "ETH",
        block_time: 2,
        superchain: true,
        rpc_env: "BASE_RPC_URL",
        default_rpc: "https://mainnet.base.org",
    });
    registry.insert(ChainId::Arbitrum, ChainMetadata {
        name: "arbitrum",
        native_symbol: "ETH",
        block_time: 1,
        superchain: false,
        rpc_env: "ARBITRUM_RPC_URL",
        default_rpc: "https://arb1.arbitrum.io/rpc",
    });
    registry.insert(ChainId::Zora, ChainMetadata {
        name: "zora",
        native_symbol: "ETH",
        block_time: 2,
        superchain: true,
        rpc_env: "ZORA_RPC_URL",
        default_rpc: "https://rpc.zora.energy",
    });
    registry
});

pub fn chain_metadata(chain: ChainId) -> &'static ChainMetadata {
    // Registry covers every ChainId variant
    CHAIN_REGISTRY.get(&chain).expect("chain registry entry missing")
}

/// RPC URL for a chain: env override first, then the registry default
pub fn chain_rpc_url(chain: ChainId) -> String {
    let meta = chain_metadata(chain);
    std::env::var(meta.rpc_env).unwrap_or_else(|_| meta.default_rpc.to_string())
}

/// Both endpoints in the OP Stack family, so the canonical messaging
/// bridge can carry the hop
pub fn is_native_messaging_pair(from: ChainId, to: ChainId) -> bool {
    chain_metadata(from).superchain && chain_metadata(to).superchain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_all_chains() {
        for chain in ChainId::all() {
            let meta = chain_metadata(chain);
            assert_eq!(meta.name, chain.name());
            assert_eq!(meta.superchain, chain.is_superchain());
            assert!(!meta.default_rpc.is_empty());
        }
    }

    #[test]
    fn test_native_messaging_pairs() {
        assert!(is_native_messaging_pair(ChainId::Optimism, ChainId::Base));
        assert!(is_native_messaging_pair(ChainId::Base, ChainId::Zora));
        assert!(!is_native_messaging_pair(ChainId::Ethereum, ChainId::Base));
        assert!(!is_native_messaging_pair(ChainId::Arbitrum, ChainId::Polygon));
    }

    #[test]
    fn test_reliability_constants_are_probabilities() {
        for r in [NATIVE_RELIABILITY, HYPERLANE_RELIABILITY, LAYERZERO_RELIABILITY] {
            assert!(r > 0.0 && r <= 1.0);
        }
        // Native messaging is the most trusted, LayerZero the fastest
        assert!(NATIVE_RELIABILITY > HYPERLANE_RELIABILITY);
        assert!(HYPERLANE_RELIABILITY > LAYERZERO_RELIABILITY);
        assert!(LAYERZERO_TRANSFER_TIME_SECS < HYPERLANE_TRANSFER_TIME_SECS);
        assert!(HYPERLANE_TRANSFER_TIME_SECS < NATIVE_TRANSFER_TIME_SECS);
    }
}
