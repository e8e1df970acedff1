use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omnigas::api::ApiServer;
use omnigas::blockchain::{ChainRpc, EthersRpcClient};
use omnigas::bridges::{
    BridgeConnector, BridgeEvent, BridgeManager, HyperlaneBridge, LayerZeroBridge, NativeBridge,
};
use omnigas::config::Config;
use omnigas::liquidity::{LiquidityChecker, TreasuryProvider};
use omnigas::mocks::{self, MockChainRpc, MockTreasury};
use omnigas::oracle::GasPriceOracle;
use omnigas::routing::CrossChainRouter;
use omnigas::types::{BridgeKind, ChainId};

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일 로드 (있는 경우 - RPC URL 등 민감 정보)
    dotenvy::dotenv().ok();

    let matches = Command::new("omnigas")
        .version("0.1.0")
        .about("⛽ 크로스체인 가스 추상화 라우터 - 수수료 최적화 + 브리지 오케스트레이션")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value("config/default.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .arg(
            Arg::new("chains")
                .short('n')
                .long("chains")
                .value_name("CHAINS")
                .help("활성화할 체인들 (예: ethereum,base,optimism)")
                .default_value("all"),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .help("모의 모드 (실제 RPC/브리지 API를 호출하지 않음)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // 로그 레벨 설정
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_filter = match log_level.as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    if matches.get_flag("mock") {
        std::env::set_var("API_MODE", "mock");
    }

    // 설정 파일 로드 (없으면 기본값 사용)
    let config_path = matches.get_one::<String>("config").unwrap();
    info!("📋 설정 파일 로드 중: {}", config_path);

    let mut config = match Config::load(config_path).await {
        Ok(config) => config,
        Err(e) => {
            warn!("⚠️ 설정 파일 로드 실패 ({}): {}", config_path, e);
            info!("🔧 기본 설정 사용");
            Config::default()
        }
    };

    // 명령줄 체인 선택 적용
    let chain_selection = matches.get_one::<String>("chains").unwrap();
    apply_chain_selection(&mut config, chain_selection);

    // 설정 검증
    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }
    info!("✅ 설정 로드 완료");

    let mock_mode = mocks::is_mock_mode();
    if mock_mode {
        warn!("🎭 모의 모드 활성화 - 시뮬레이션 데이터로 동작합니다");
    }

    let tokens = config.token_registry()?;
    let mock_config = mocks::get_mock_config();

    // 체인별 RPC 엔드포인트 구성
    let mut endpoints: HashMap<ChainId, Arc<dyn ChainRpc>> = HashMap::new();
    for chain in config.enabled_chains() {
        if mock_mode {
            let rpc =
                MockChainRpc::new(chain, mock_config.gas_price).with_base_fee(mock_config.base_fee);
            endpoints.insert(chain, Arc::new(rpc));
            continue;
        }

        let url = config
            .rpc_url_for(chain)
            .ok_or_else(|| anyhow!("RPC URL not configured for {}", chain.name()))?;
        match EthersRpcClient::connect(chain, &url).await {
            Ok(client) => {
                endpoints.insert(chain, Arc::new(client));
            }
            Err(e) => {
                warn!("⚠️ {} RPC 연결 실패, 해당 체인 제외: {}", chain.name(), e);
            }
        }
    }

    // 연결에 성공한 체인만 라우팅 대상으로 남긴다
    let chains: Vec<ChainId> = config
        .enabled_chains()
        .into_iter()
        .filter(|chain| endpoints.contains_key(chain))
        .collect();
    if chains.is_empty() {
        return Err(anyhow!("사용 가능한 체인이 없습니다"));
    }
    if chains.len() == 1 {
        warn!("⚠️ 활성 체인이 1개뿐 - 크로스체인 라우팅이 불가합니다");
    }
    info!(
        "🌐 활성 체인 {}개: {}",
        chains.len(),
        chains.iter().map(|c| c.name()).collect::<Vec<_>>().join(", ")
    );

    // Treasury(정산 풀) 구성 - 실시간 어댑터가 없어 모의 풀로 동작
    if !mock_mode {
        warn!("⚠️ 실시간 treasury 어댑터 미구현 - 시뮬레이션 유동성 풀 사용");
    }
    let mut treasuries: HashMap<ChainId, Arc<dyn TreasuryProvider>> = HashMap::new();
    for chain in &chains {
        let mut treasury = MockTreasury::new(*chain);
        for token in &tokens {
            treasury = treasury.with_liquidity(&token.symbol, mock_config.treasury_liquidity);
        }
        treasuries.insert(*chain, Arc::new(treasury));
    }

    // 핵심 컴포넌트 초기화
    info!("⛽ 가스 가격 오라클 초기화 중...");
    let oracle = Arc::new(GasPriceOracle::new(endpoints, config.oracle.cache_ttl_secs));

    info!("💧 유동성 체커 초기화 중...");
    let liquidity = Arc::new(LiquidityChecker::new(
        treasuries,
        tokens.clone(),
        config.liquidity.cache_ttl_secs,
    ));

    info!("🌉 브리지 커넥터 초기화 중...");
    let mut connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>> = HashMap::new();
    connectors.insert(BridgeKind::Native, Arc::new(NativeBridge::new()));
    connectors.insert(
        BridgeKind::Hyperlane,
        Arc::new(HyperlaneBridge::new(config.bridges.hyperlane_api_url.clone())),
    );
    connectors.insert(
        BridgeKind::LayerZero,
        Arc::new(LayerZeroBridge::new(config.bridges.layerzero_api_url.clone())),
    );

    info!("🗺️ 크로스체인 라우터 초기화 중...");
    let router = Arc::new(CrossChainRouter::new(
        chains.clone(),
        Arc::clone(&oracle),
        Arc::clone(&liquidity),
        connectors.clone(),
        &config.router,
    ));

    info!("📦 브리지 매니저 초기화 중...");
    let manager = Arc::new(
        BridgeManager::new(connectors)
            .with_poll_interval(Duration::from_secs(config.bridges.poll_interval_secs)),
    );

    // 체인별 가스 가격 구독 시작
    for chain in &chains {
        oracle.subscribe_to_gas_price_updates(*chain, None).await?;
    }

    // 브리지 이벤트 로그 태스크
    let mut events = manager.subscribe_events().await;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                BridgeEvent::Started { tx } => {
                    info!("🌉 브리지 시작: {} ({} -> {})", tx.id, tx.from.name(), tx.to.name());
                }
                BridgeEvent::Updated { transfer_id, status } => {
                    debug!("🔄 브리지 상태: {} -> {}", transfer_id, status);
                }
                BridgeEvent::Completed { tx } => {
                    info!("✅ 브리지 완료: {} ({}초 소요)", tx.id, tx.elapsed_secs());
                }
                BridgeEvent::Failed { tx, reason } => {
                    error!("❌ 브리지 실패: {} - {}", tx.id, reason);
                }
                BridgeEvent::Timeout { transfer_id, waited_secs } => {
                    warn!("⏰ 브리지 타임아웃: {} ({}초 경과)", transfer_id, waited_secs);
                }
            }
        }
    });

    // 주기적 상태 리포트 태스크
    let status_oracle = Arc::clone(&oracle);
    let status_router = Arc::clone(&router);
    let status_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            info!("📊 라우터 상태:");
            info!("  🔔 가스 구독: {}", status_oracle.subscription_count().await);
            info!("  🗺️ 캐시된 경로: {}", status_router.cached_route_count());
            info!("  🌉 진행 중 브리지: {}", status_manager.get_active_bridges().len());
            info!(
                "  ✅ 완료된 브리지: {}",
                status_manager.get_completed_bridges().await.len()
            );
        }
    });

    // API 서버 시작
    if config.api.enabled {
        let api = ApiServer::new(
            config.api.host.clone(),
            config.api.port,
            Arc::clone(&router),
            Arc::clone(&oracle),
            Arc::clone(&liquidity),
            Arc::clone(&manager),
            tokens,
        );
        api.start().await?;
    }

    info!("🚀 omnigas 라우터가 성공적으로 시작되었습니다. Ctrl+C로 종료합니다.");

    // 종료 신호 대기
    match signal::ctrl_c().await {
        Ok(()) => info!("🛑 종료 신호 수신됨"),
        Err(e) => error!("❌ 신호 처리 오류: {}", e),
    }

    // 안전 종료
    info!("🧹 핵심 컴포넌트 정리 중...");
    manager.destroy().await;
    router.destroy().await;

    info!("👋 omnigas 라우터가 안전하게 종료되었습니다");
    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║  ⛽ omnigas 크로스체인 라우터 v0.1.0                          ║
    ║                                                              ║
    ║  가스 추상화를 위한 수수료 최적화 라우팅 엔진                ║
    ║                                                              ║
    ║  🎯 핵심 기능:                                               ║
    ║     • 체인별 실시간 가스 가격 오라클 (추세 예측)             ║
    ║     • 정산 풀 유동성 검사 (80/20 가용 분할)                  ║
    ║     • 비용/시간/신뢰도 가중 경로 최적화                      ║
    ║     • BFS 기반 멀티홉 경로 탐색                              ║
    ║     • 브리지 전송 라이프사이클 모니터링                      ║
    ║                                                              ║
    ║  🌉 지원 브리지:                                             ║
    ║     • 네이티브 메신저 (Superchain)                           ║
    ║     • Hyperlane / LayerZero                                  ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#
    );
}

fn apply_chain_selection(config: &mut Config, selection: &str) {
    let selection = selection.trim();
    if selection.is_empty() || selection == "all" {
        return;
    }

    // 모든 체인을 먼저 비활성화하고 선택된 체인만 켠다
    for endpoint in config.chains.iter_mut() {
        endpoint.enabled = false;
    }

    for name in selection.split(',') {
        let name = name.trim();
        match ChainId::from_name(name) {
            Some(chain) => {
                let mut found = false;
                for endpoint in config.chains.iter_mut() {
                    if ChainId::from_name(&endpoint.name) == Some(chain) {
                        endpoint.enabled = true;
                        found = true;
                    }
                }
                if found {
                    info!("✅ 체인 활성화: {}", chain.name());
                } else {
                    warn!("⚠️ 설정에 없는 체인: {}", name);
                }
            }
            None => {
                warn!("⚠️ 알 수 없는 체인: {}", name);
            }
        }
    }
}
