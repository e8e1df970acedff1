// omnigas - 크로스체인 가스 추상화 라우터 라이브러리

#![allow(dead_code)]

pub mod api;
pub mod blockchain;
pub mod bridges;
pub mod config;
pub mod liquidity;
pub mod mocks;
pub mod oracle;
pub mod routing;

// Core types
pub mod constants;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use bridges::{BridgeManager, BridgeStatus, BridgeTx};
pub use liquidity::{LiquidityChecker, LiquidityInfo};
pub use oracle::{GasPrice, GasPriceOracle};
pub use routing::{CrossChainRouter, PathOptimizer, RouteStrategy};
pub use types::{BridgeKind, ChainId, CrossChainToken, RoutingHop, RoutingPath};
