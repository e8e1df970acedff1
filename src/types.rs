use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use alloy::primitives::{Address, U256};

use crate::constants::{
    BRIDGE_FEE_BPS, HYPERLANE_RELIABILITY, HYPERLANE_TRANSFER_GAS_UNITS,
    HYPERLANE_TRANSFER_TIME_SECS, LAYERZERO_RELIABILITY, LAYERZERO_TRANSFER_GAS_UNITS,
    LAYERZERO_TRANSFER_TIME_SECS, NATIVE_RELIABILITY, NATIVE_TRANSFER_GAS_UNITS,
    NATIVE_TRANSFER_TIME_SECS,
};

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ChainId {
    Ethereum = 1,
    Optimism = 10,
    Polygon = 137,
    Base = 8453,
    Arbitrum = 42161,
    Zora = 7777777,
}

impl ChainId {
    pub fn name(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Optimism => "optimism",
            ChainId::Polygon => "polygon",
            ChainId::Base => "base",
            ChainId::Arbitrum => "arbitrum",
            ChainId::Zora => "zora",
        }
    }

    pub fn native_token(&self) -> &'static str {
        match self {
            ChainId::Polygon => "MATIC",
            _ => "ETH",
        }
    }

    pub fn id(&self) -> u64 {
        *self as u64
    }

    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(ChainId::Ethereum),
            10 => Some(ChainId::Optimism),
            137 => Some(ChainId::Polygon),
            8453 => Some(ChainId::Base),
            42161 => Some(ChainId::Arbitrum),
            7777777 => Some(ChainId::Zora),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "ethereum" | "mainnet" => Some(ChainId::Ethereum),
            "optimism" => Some(ChainId::Optimism),
            "polygon" => Some(ChainId::Polygon),
            "base" => Some(ChainId::Base),
            "arbitrum" => Some(ChainId::Arbitrum),
            "zora" => Some(ChainId::Zora),
            _ => None,
        }
    }

    pub fn all() -> [ChainId; 6] {
        [
            ChainId::Ethereum,
            ChainId::Optimism,
            ChainId::Polygon,
            ChainId::Base,
            ChainId::Arbitrum,
            ChainId::Zora,
        ]
    }

    /// OP Stack 계열 체인 여부 (네이티브 메시징 브리지 사용 가능)
    pub fn is_superchain(&self) -> bool {
        matches!(self, ChainId::Optimism | ChainId::Base | ChainId::Zora)
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Bridge protocol kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BridgeKind {
    Native,
    Hyperlane,
    LayerZero,
}

impl BridgeKind {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeKind::Native => "native",
            BridgeKind::Hyperlane => "hyperlane",
            BridgeKind::LayerZero => "layerzero",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "native" => Some(BridgeKind::Native),
            "hyperlane" => Some(BridgeKind::Hyperlane),
            "layerzero" => Some(BridgeKind::LayerZero),
            _ => None,
        }
    }

    /// Static per-protocol success coefficient, combined multiplicatively
    /// across hops as an end-to-end success proxy
    pub fn reliability(&self) -> f64 {
        match self {
            BridgeKind::Native => NATIVE_RELIABILITY,
            BridgeKind::Hyperlane => HYPERLANE_RELIABILITY,
            BridgeKind::LayerZero => LAYERZERO_RELIABILITY,
        }
    }

    /// Nominal transit time in seconds, calibration constant per protocol
    pub fn nominal_transfer_time(&self) -> u64 {
        match self {
            BridgeKind::Native => NATIVE_TRANSFER_TIME_SECS,
            BridgeKind::Hyperlane => HYPERLANE_TRANSFER_TIME_SECS,
            BridgeKind::LayerZero => LAYERZERO_TRANSFER_TIME_SECS,
        }
    }

    /// Nominal source-chain gas units consumed by one transfer
    pub fn transfer_gas_units(&self) -> u64 {
        match self {
            BridgeKind::Native => NATIVE_TRANSFER_GAS_UNITS,
            BridgeKind::Hyperlane => HYPERLANE_TRANSFER_GAS_UNITS,
            BridgeKind::LayerZero => LAYERZERO_TRANSFER_GAS_UNITS,
        }
    }

    pub fn all() -> [BridgeKind; 3] {
        [BridgeKind::Native, BridgeKind::Hyperlane, BridgeKind::LayerZero]
    }
}

impl std::fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Cross-chain token information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossChainToken {
    /// Token symbol (e.g., "USDC")
    pub symbol: String,
    /// Token addresses on different chains
    pub addresses: HashMap<ChainId, Address>,
    /// Token decimals (usually same across chains)
    pub decimals: u8,
}

impl CrossChainToken {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            addresses: HashMap::new(),
            decimals,
        }
    }

    pub fn with_address(mut self, chain: ChainId, address: Address) -> Self {
        self.addresses.insert(chain, address);
        self
    }

    /// Token address on a specific chain, None if not deployed there
    pub fn address_on(&self, chain: ChainId) -> Option<Address> {
        self.addresses.get(&chain).copied()
    }

    pub fn is_deployed_on(&self, chain: ChainId) -> bool {
        self.addresses.contains_key(&chain)
    }
}

/// 라우트의 한 구간: 하나의 브리지 프로토콜이 처리하는 체인 간 전송
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingHop {
    /// Source chain of this leg
    pub from: ChainId,
    /// Destination chain of this leg
    pub to: ChainId,
    /// Bridge protocol handling this leg
    pub bridge: BridgeKind,
    /// Estimated cost in wei (source-chain gas + bridge fee)
    pub cost: U256,
    /// Nominal transit time in seconds
    pub time_secs: u64,
}

impl RoutingHop {
    pub fn new(from: ChainId, to: ChainId, bridge: BridgeKind, cost: U256) -> Self {
        Self {
            from,
            to,
            bridge,
            cost,
            time_secs: bridge.nominal_transfer_time(),
        }
    }

    /// Protocol fee portion of a transfer amount (0.1%)
    pub fn bridge_fee(amount: U256) -> U256 {
        amount * U256::from(BRIDGE_FEE_BPS) / U256::from(10_000u64)
    }
}

/// 소스 체인에서 대상 체인까지의 홉 시퀀스와 집계 비용/시간/신뢰도
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingPath {
    /// Source chain
    pub from: ChainId,
    /// Destination chain
    pub to: ChainId,
    /// Ordered hop sequence (empty for same-chain)
    pub hops: Vec<RoutingHop>,
    /// Sum of hop costs plus destination execution cost, in wei
    pub estimated_cost: U256,
    /// Sum of hop transit times in seconds
    pub estimated_time_secs: u64,
    /// Product of per-hop bridge reliability coefficients
    pub reliability: f64,
    /// Ranked alternates, best first
    pub fallbacks: Vec<RoutingPath>,
}

impl RoutingPath {
    /// Zero-hop path for a same-chain request: no cost, no wait, reliability 1.0
    pub fn same_chain(chain: ChainId) -> Self {
        Self {
            from: chain,
            to: chain,
            hops: Vec::new(),
            estimated_cost: U256::ZERO,
            estimated_time_secs: 0,
            reliability: 1.0,
            fallbacks: Vec::new(),
        }
    }

    /// Build a path from its hops, aggregating cost/time/reliability.
    /// `execution_cost` is the destination-chain execution estimate added once.
    pub fn from_hops(from: ChainId, to: ChainId, hops: Vec<RoutingHop>, execution_cost: U256) -> Self {
        let hop_cost: U256 = hops.iter().fold(U256::ZERO, |acc, h| acc + h.cost);
        let time: u64 = hops.iter().map(|h| h.time_secs).sum();
        let reliability: f64 = hops.iter().map(|h| h.bridge.reliability()).product();

        Self {
            from,
            to,
            hops,
            estimated_cost: hop_cost + execution_cost,
            estimated_time_secs: time,
            reliability,
            fallbacks: Vec::new(),
        }
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    pub fn is_same_chain(&self) -> bool {
        self.hops.is_empty()
    }

    /// Chains a transfer lands on along the way: every hop's `to`,
    /// i.e. intermediates plus the final destination
    pub fn transit_chains(&self) -> Vec<ChainId> {
        self.hops.iter().map(|h| h.to).collect()
    }

    /// Hop endpoints line up and match the path endpoints
    pub fn is_continuous(&self) -> bool {
        if self.hops.is_empty() {
            return self.from == self.to;
        }
        if self.hops[0].from != self.from || self.hops[self.hops.len() - 1].to != self.to {
            return false;
        }
        self.hops.windows(2).all(|w| w[0].to == w[1].from)
    }

    /// Human-readable chain sequence, e.g. "ethereum -> base -> zora"
    pub fn describe(&self) -> String {
        let mut out = self.from.name().to_string();
        for hop in &self.hops {
            out.push_str(" -> ");
            out.push_str(hop.to.name());
        }
        out
    }
}

impl std::fmt::Display for RoutingPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} hops, {} wei, {}s, {:.4} reliability)",
            self.describe(),
            self.hops.len(),
            self.estimated_cost,
            self.estimated_time_secs,
            self.reliability
        )
    }
}
