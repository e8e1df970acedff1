//! Utility functions and helpers

use alloy::primitives::U256;
use chrono::Utc;

/// Get current unix timestamp in seconds
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}

/// Lossy U256 -> f64 conversion, saturating instead of panicking for
/// values beyond u128 range
pub fn u256_to_f64(value: U256) -> f64 {
    match u128::try_from(value) {
        Ok(v) => v as f64,
        Err(_) => u128::MAX as f64,
    }
}

/// Convert wei to ether
pub fn wei_to_ether(wei: U256) -> f64 {
    u256_to_f64(wei) / 1e18
}

/// Convert ether to wei
pub fn ether_to_wei(ether: f64) -> U256 {
    U256::from((ether * 1e18) as u128)
}

/// Convert a gwei amount to wei
pub fn gwei_to_wei(gwei: u64) -> U256 {
    U256::from(gwei) * U256::from(1_000_000_000u64)
}

/// Convert a wei amount to gwei (lossy, for logs)
pub fn wei_to_gwei(wei: U256) -> f64 {
    u256_to_f64(wei) / 1e9
}

/// Format a wei amount for logs, e.g. "0.003100 ETH"
pub fn format_eth_amount(wei: U256) -> String {
    format!("{:.6} ETH", wei_to_ether(wei))
}

/// Ethers -> alloy U256 (the RPC layer speaks ethers, everything else alloy)
pub fn ethers_u256_to_alloy(value: ethers::types::U256) -> U256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    U256::from_be_bytes(bytes)
}
