use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use axum::response::sse::{Event, Sse};
use axum::{
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::bridges::{BridgeManager, BridgeTx};
use crate::liquidity::{LiquidityChecker, LiquidityInfo};
use crate::oracle::GasPriceOracle;
use crate::routing::{CrossChainRouter, RouteQuery, RouteStrategy};
use crate::types::{BridgeKind, ChainId, CrossChainToken, RoutingPath};
use crate::utils::wei_to_gwei;

/// 체인 파라미터 파싱: 숫자 ID 또는 이름 둘 다 허용
fn parse_chain(value: &str) -> Option<ChainId> {
    value
        .parse::<u64>()
        .ok()
        .and_then(ChainId::from_id)
        .or_else(|| ChainId::from_name(value))
}

/// 라우팅 엔진 HTTP API
#[derive(Clone)]
pub struct ApiServer {
    host: String,
    port: u16,
    router: Arc<CrossChainRouter>,
    oracle: Arc<GasPriceOracle>,
    liquidity: Arc<LiquidityChecker>,
    manager: Arc<BridgeManager>,
    tokens: HashMap<String, CrossChainToken>,
    started_at: Instant,
}

impl ApiServer {
    pub fn new(
        host: String,
        port: u16,
        router: Arc<CrossChainRouter>,
        oracle: Arc<GasPriceOracle>,
        liquidity: Arc<LiquidityChecker>,
        manager: Arc<BridgeManager>,
        tokens: Vec<CrossChainToken>,
    ) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|token| (token.symbol.clone(), token))
            .collect();
        Self {
            host,
            port,
            router,
            oracle,
            liquidity,
            manager,
            tokens,
            started_at: Instant::now(),
        }
    }

    pub async fn start(&self) -> Result<()> {
        let status_state = self.clone();
        let gas_oracle = Arc::clone(&self.oracle);
        let route_state = self.clone();
        let liq_state = self.clone();
        let bridges_manager = Arc::clone(&self.manager);
        let completed_manager = Arc::clone(&self.manager);
        let lookup_manager = Arc::clone(&self.manager);
        let execute_state = self.clone();
        let stream_manager = Arc::clone(&self.manager);

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/api/health", get(|| async { Json(json!({"ok": true})) }))
            .route("/api/status", get(move || get_status(status_state.clone())))
            .route("/api/gas", get(move || get_gas_prices(gas_oracle.clone())))
            .route(
                "/api/routes",
                post(move |payload| post_route(route_state.clone(), payload)),
            )
            .route(
                "/api/liquidity/:token",
                get(
                    move |axum::extract::Path(token): axum::extract::Path<String>| {
                        get_liquidity(liq_state.clone(), token)
                    },
                ),
            )
            .route(
                "/api/bridges",
                get(move || get_active_bridges(bridges_manager.clone())),
            )
            .route(
                "/api/bridges/completed",
                get(move || get_completed_bridges(completed_manager.clone())),
            )
            .route(
                "/api/bridges/:id",
                get(
                    move |axum::extract::Path(id): axum::extract::Path<String>| {
                        get_bridge_by_id(lookup_manager.clone(), id)
                    },
                ),
            )
            .route(
                "/api/bridges/execute",
                post(move |payload| post_bridge(execute_state.clone(), payload)),
            )
            .route(
                "/api/stream/bridges",
                get(move || sse_bridge_events(stream_manager.clone())),
            )
            .layer(cors);

        let host: std::net::IpAddr = self.host.parse().unwrap_or([0, 0, 0, 0].into());
        let addr = SocketAddr::from((host, self.port));
        tracing::info!("🛰️ API server listening on http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::Server::bind(&addr)
                .serve(app.into_make_service())
                .await
            {
                tracing::error!("API server error: {}", e);
            }
        });

        Ok(())
    }
}

#[derive(Serialize)]
struct StatusResponse {
    chains: Vec<String>,
    cached_routes: usize,
    gas_subscriptions: usize,
    active_bridges: usize,
    completed_bridges: usize,
    uptime_seconds: u64,
}

async fn get_status(state: ApiServer) -> Json<StatusResponse> {
    Json(StatusResponse {
        chains: state
            .router
            .configured_chains()
            .iter()
            .map(|chain| chain.name().to_string())
            .collect(),
        cached_routes: state.router.cached_route_count(),
        gas_subscriptions: state.oracle.subscription_count().await,
        active_bridges: state.manager.get_active_bridges().len(),
        completed_bridges: state.manager.get_completed_bridges().await.len(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct GasPriceOut {
    chain: String,
    wei: String,
    gwei: f64,
    predicted_5m_wei: Option<String>,
}

async fn get_gas_prices(oracle: Arc<GasPriceOracle>) -> Json<Vec<GasPriceOut>> {
    let chains = oracle.configured_chains();
    let snapshots = oracle.get_gas_prices(&chains).await;

    let mut out: Vec<GasPriceOut> = snapshots
        .into_iter()
        .map(|(chain, snapshot)| GasPriceOut {
            chain: chain.name().to_string(),
            wei: snapshot.gas_price.to_string(),
            gwei: wei_to_gwei(snapshot.gas_price),
            predicted_5m_wei: oracle
                .predict_gas_price(chain, 5)
                .map(|wei| wei.to_string()),
        })
        .collect();
    out.sort_by(|a, b| a.chain.cmp(&b.chain));

    Json(out)
}

#[derive(Serialize)]
struct HopOut {
    from: String,
    to: String,
    bridge: String,
    estimated_cost_wei: String,
    estimated_time_secs: u64,
}

#[derive(Serialize)]
struct PathOut {
    from: String,
    to: String,
    route: String,
    hops: Vec<HopOut>,
    estimated_cost_wei: String,
    estimated_time_secs: u64,
    reliability: f64,
    fallbacks: Vec<String>,
}

impl From<&RoutingPath> for PathOut {
    fn from(path: &RoutingPath) -> Self {
        Self {
            from: path.from.name().to_string(),
            to: path.to.name().to_string(),
            route: path.describe(),
            hops: path
                .hops
                .iter()
                .map(|hop| HopOut {
                    from: hop.from.name().to_string(),
                    to: hop.to.name().to_string(),
                    bridge: hop.bridge.name().to_string(),
                    estimated_cost_wei: hop.cost.to_string(),
                    estimated_time_secs: hop.time_secs,
                })
                .collect(),
            estimated_cost_wei: path.estimated_cost.to_string(),
            estimated_time_secs: path.estimated_time_secs,
            reliability: path.reliability,
            fallbacks: path.fallbacks.iter().map(|f| f.describe()).collect(),
        }
    }
}

#[derive(Deserialize)]
struct RouteRequestPayload {
    from: String,
    to: String,
    token: String,
    amount: String,
    #[serde(default)]
    max_hops: Option<usize>,
    #[serde(default)]
    strategy: Option<String>,
}

async fn post_route(
    state: ApiServer,
    Json(payload): Json<RouteRequestPayload>,
) -> Json<serde_json::Value> {
    let Some(from) = parse_chain(&payload.from) else {
        return Json(json!({"ok": false, "error": format!("unknown chain: {}", payload.from)}));
    };
    let Some(to) = parse_chain(&payload.to) else {
        return Json(json!({"ok": false, "error": format!("unknown chain: {}", payload.to)}));
    };
    let Ok(amount) = payload.amount.parse::<U256>() else {
        return Json(json!({"ok": false, "error": format!("invalid amount: {}", payload.amount)}));
    };

    let strategy = match payload.strategy.as_deref() {
        Some(name) => match RouteStrategy::from_name(name) {
            Some(strategy) => Some(strategy),
            None => {
                return Json(json!({"ok": false, "error": format!("unknown strategy: {}", name)}))
            }
        },
        None => None,
    };

    let query = RouteQuery {
        max_hops: payload.max_hops,
        strategy,
    };

    match state
        .router
        .find_optimal_route(from, to, &payload.token, amount, &query)
        .await
    {
        Ok(path) => Json(json!({"ok": true, "route": PathOut::from(&path)})),
        Err(e) => Json(json!({"ok": false, "error": e.to_string()})),
    }
}

async fn get_liquidity(state: ApiServer, token: String) -> Json<serde_json::Value> {
    let chains = state.router.configured_chains().to_vec();
    let mut infos: Vec<LiquidityInfo> = Vec::new();
    for chain in chains {
        if let Ok(info) = state.liquidity.get_liquidity(chain, &token).await {
            infos.push(info);
        }
    }

    if infos.is_empty() {
        return Json(json!({"ok": false, "error": "no liquidity data", "token": token}));
    }
    Json(json!({"ok": true, "token": token, "chains": infos}))
}

async fn get_active_bridges(manager: Arc<BridgeManager>) -> Json<Vec<BridgeTx>> {
    Json(manager.get_active_bridges())
}

async fn get_completed_bridges(manager: Arc<BridgeManager>) -> Json<Vec<BridgeTx>> {
    Json(manager.get_completed_bridges().await)
}

async fn get_bridge_by_id(manager: Arc<BridgeManager>, id: String) -> Json<serde_json::Value> {
    match manager.get_bridge_status(&id).await {
        Some(tx) => Json(json!({"ok": true, "bridge": tx})),
        None => Json(json!({"ok": false, "error": "not_found"})),
    }
}

#[derive(Deserialize)]
struct BridgeRequestPayload {
    bridge: String,
    from: String,
    to: String,
    token: String,
    amount: String,
    recipient: String,
}

async fn post_bridge(
    state: ApiServer,
    Json(payload): Json<BridgeRequestPayload>,
) -> Json<serde_json::Value> {
    let Some(bridge) = BridgeKind::from_name(&payload.bridge) else {
        return Json(json!({"ok": false, "error": format!("unknown bridge: {}", payload.bridge)}));
    };
    let Some(from) = parse_chain(&payload.from) else {
        return Json(json!({"ok": false, "error": format!("unknown chain: {}", payload.from)}));
    };
    let Some(to) = parse_chain(&payload.to) else {
        return Json(json!({"ok": false, "error": format!("unknown chain: {}", payload.to)}));
    };
    let Some(token) = state.tokens.get(&payload.token) else {
        return Json(json!({"ok": false, "error": format!("unknown token: {}", payload.token)}));
    };
    let Ok(amount) = payload.amount.parse::<U256>() else {
        return Json(json!({"ok": false, "error": format!("invalid amount: {}", payload.amount)}));
    };
    let Ok(recipient) = payload.recipient.parse::<Address>() else {
        return Json(
            json!({"ok": false, "error": format!("invalid recipient: {}", payload.recipient)}),
        );
    };

    match state
        .manager
        .execute_bridge(bridge, from, to, token, amount, recipient)
        .await
    {
        Ok(tx) => Json(json!({"ok": true, "bridge": tx})),
        Err(e) => Json(json!({"ok": false, "error": e.to_string()})),
    }
}

async fn sse_bridge_events(
    manager: Arc<BridgeManager>,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = manager.subscribe_events().await;
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(event) => {
                let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                Some((Ok(Event::default().event("bridge").data(json)), rx))
            }
            None => None,
        }
    });
    Sse::new(stream)
}
