use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use anyhow::Result;
use alloy::primitives::Address;

use crate::constants::{
    chain_metadata, BRIDGE_POLL_INTERVAL_SECS, DEFAULT_MAX_HOPS, GAS_PRICE_CACHE_TTL_SECS,
    LIQUIDITY_CACHE_TTL_SECS, ROUTE_CACHE_TTL_SECS,
};
use crate::types::{BridgeKind, ChainId, CrossChainToken};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEndpoint {
    pub name: String,
    pub rpc_url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub symbol: String,
    pub decimals: u8,
    /// chain name -> checksummed token address
    pub addresses: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_route_cache_ttl")]
    pub route_cache_ttl_secs: u64,
    /// 선호 브리지 (예: "native") - 설정 시 라우터 선택에 가중치 부여
    #[serde(default)]
    pub preferred_bridge: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSettings {
    #[serde(default = "default_gas_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquiditySettings {
    #[serde(default = "default_liquidity_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    pub hyperlane_api_url: String,
    pub layerzero_api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub chains: Vec<ChainEndpoint>,
    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
    pub router: RouterSettings,
    pub oracle: OracleSettings,
    pub liquidity: LiquiditySettings,
    pub bridges: BridgeSettings,
    pub api: ApiSettings,
}

// 기본값 함수들
fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_route_cache_ttl() -> u64 {
    ROUTE_CACHE_TTL_SECS
}

fn default_gas_cache_ttl() -> u64 {
    GAS_PRICE_CACHE_TTL_SECS
}

fn default_liquidity_cache_ttl() -> u64 {
    LIQUIDITY_CACHE_TTL_SECS
}

fn default_poll_interval() -> u64 {
    BRIDGE_POLL_INTERVAL_SECS
}

impl Config {
    pub async fn load(path: &str) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn default() -> Self {
        let chains = ChainId::all()
            .iter()
            .map(|chain| ChainEndpoint {
                name: chain.name().to_string(),
                rpc_url: chain_metadata(*chain).default_rpc.to_string(),
                enabled: true,
            })
            .collect();

        let tokens = vec![
            TokenEntry {
                symbol: "USDC".to_string(),
                decimals: 6,
                addresses: [
                    ("ethereum", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
                    ("optimism", "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
                    ("polygon", "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
                    ("base", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
                    ("arbitrum", "0xaf88d065e77c8cC2239327C5EDb3A432268e5831"),
                    ("zora", "0xCccCCccc7021b32EBb4e8C08314bD62F7c653EC4"),
                ]
                .iter()
                .map(|(chain, addr)| (chain.to_string(), addr.to_string()))
                .collect(),
            },
            TokenEntry {
                symbol: "WETH".to_string(),
                decimals: 18,
                addresses: [
                    ("ethereum", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
                    ("optimism", "0x4200000000000000000000000000000000000006"),
                    ("polygon", "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619"),
                    ("base", "0x4200000000000000000000000000000000000006"),
                    ("arbitrum", "0x82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
                    ("zora", "0x4200000000000000000000000000000000000006"),
                ]
                .iter()
                .map(|(chain, addr)| (chain.to_string(), addr.to_string()))
                .collect(),
            },
        ];

        Self {
            chains,
            tokens,
            router: RouterSettings {
                max_hops: DEFAULT_MAX_HOPS,
                route_cache_ttl_secs: ROUTE_CACHE_TTL_SECS,
                preferred_bridge: None,
            },
            oracle: OracleSettings {
                cache_ttl_secs: GAS_PRICE_CACHE_TTL_SECS,
            },
            liquidity: LiquiditySettings {
                cache_ttl_secs: LIQUIDITY_CACHE_TTL_SECS,
            },
            bridges: BridgeSettings {
                poll_interval_secs: BRIDGE_POLL_INTERVAL_SECS,
                hyperlane_api_url: "https://explorer.hyperlane.xyz/api".to_string(),
                layerzero_api_url: "https://scan.layerzero-api.com/v1".to_string(),
            },
            api: ApiSettings {
                enabled: true,
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
        }
    }

    /// 활성화된 체인 목록 (이름 파싱 포함)
    pub fn enabled_chains(&self) -> Vec<ChainId> {
        self.chains
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| ChainId::from_name(&c.name))
            .collect()
    }

    /// 체인의 RPC URL 조회 (환경변수가 설정 파일보다 우선)
    pub fn rpc_url_for(&self, chain: ChainId) -> Option<String> {
        if let Ok(url) = std::env::var(chain_metadata(chain).rpc_env) {
            return Some(url);
        }
        self.chains
            .iter()
            .find(|c| c.enabled && ChainId::from_name(&c.name) == Some(chain))
            .map(|c| c.rpc_url.clone())
    }

    /// 토큰 레지스트리 구성 (주소 파싱 실패 시 에러)
    pub fn token_registry(&self) -> Result<Vec<CrossChainToken>> {
        let mut registry = Vec::with_capacity(self.tokens.len());
        for entry in &self.tokens {
            let mut token = CrossChainToken::new(&entry.symbol, entry.decimals);
            for (chain_name, addr) in &entry.addresses {
                let chain = ChainId::from_name(chain_name).ok_or_else(|| {
                    anyhow::anyhow!("unknown chain '{}' for token {}", chain_name, entry.symbol)
                })?;
                let address: Address = addr.parse().map_err(|_| {
                    anyhow::anyhow!("invalid address '{}' for token {}", addr, entry.symbol)
                })?;
                token.addresses.insert(chain, address);
            }
            registry.push(token);
        }
        Ok(registry)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(anyhow::anyhow!("At least one chain must be configured"));
        }

        for endpoint in &self.chains {
            if ChainId::from_name(&endpoint.name).is_none() {
                return Err(anyhow::anyhow!("Unknown chain name: {}", endpoint.name));
            }
            if endpoint.enabled && endpoint.rpc_url.is_empty() {
                return Err(anyhow::anyhow!("RPC URL for {} cannot be empty", endpoint.name));
            }
        }

        if self.router.max_hops == 0 {
            return Err(anyhow::anyhow!("router.max_hops must be at least 1"));
        }

        if let Some(name) = &self.router.preferred_bridge {
            if BridgeKind::from_name(name).is_none() {
                return Err(anyhow::anyhow!("Unknown preferred bridge: {}", name));
            }
        }

        if self.bridges.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("bridges.poll_interval_secs must be positive"));
        }

        // 토큰 주소 파싱 검사
        self.token_registry()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.chains.len(), 6);
        assert!(config.chains.iter().all(|c| c.enabled));
        assert_eq!(config.router.max_hops, 3);
        assert_eq!(config.router.route_cache_ttl_secs, 300);
        assert_eq!(config.oracle.cache_ttl_secs, 5);
        assert_eq!(config.liquidity.cache_ttl_secs, 10);
        assert_eq!(config.bridges.poll_interval_secs, 5);

        assert!(config.tokens.iter().any(|t| t.symbol == "USDC"));
        assert!(config.tokens.iter().any(|t| t.symbol == "WETH"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_chains() {
        let mut config = Config::default();
        config.chains[0].enabled = false; // ethereum off

        let chains = config.enabled_chains();
        assert_eq!(chains.len(), 5);
        assert!(!chains.contains(&ChainId::Ethereum));
        assert!(chains.contains(&ChainId::Base));
    }

    #[test]
    fn test_token_registry() {
        let config = Config::default();
        let registry = config.token_registry().unwrap();

        let usdc = registry.iter().find(|t| t.symbol == "USDC").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert!(usdc.is_deployed_on(ChainId::Arbitrum));
        assert!(usdc.address_on(ChainId::Polygon).is_some());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.router.max_hops = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chains[0].name = "solana".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.router.preferred_bridge = Some("wormhole".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tokens[0]
            .addresses
            .insert("ethereum".to_string(), "not_an_address".to_string());
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_config_load_roundtrip() {
        let config = Config::default();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("omnigas.toml");
        let path_str = path.to_str().unwrap();

        config.save(path_str).await.unwrap();
        let loaded = Config::load(path_str).await.unwrap();

        assert_eq!(loaded.chains.len(), config.chains.len());
        assert_eq!(loaded.router.max_hops, config.router.max_hops);
        assert_eq!(loaded.tokens.len(), config.tokens.len());
        assert_eq!(loaded.api.port, config.api.port);
    }

    #[tokio::test]
    async fn test_config_partial_toml_uses_defaults() {
        let toml_str = r#"
            [[chains]]
            name = "optimism"
            rpc_url = "https://mainnet.optimism.io"
            enabled = true

            [router]

            [oracle]

            [liquidity]

            [bridges]
            hyperlane_api_url = "https://explorer.hyperlane.xyz/api"
            layerzero_api_url = "https://scan.layerzero-api.com/v1"

            [api]
            enabled = false
            host = "127.0.0.1"
            port = 9090
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.router.max_hops, 3);
        assert_eq!(config.oracle.cache_ttl_secs, 5);
        assert_eq!(config.bridges.poll_interval_secs, 5);
        assert!(config.router.preferred_bridge.is_none());
        assert!(!config.api.enabled);
    }
}
