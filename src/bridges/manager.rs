use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use super::traits::{
    BridgeConnector, BridgeError, BridgeResult, BridgeStatus, BridgeTx,
};
use crate::constants::{
    BRIDGE_POLL_INTERVAL_SECS, COMPLETED_HISTORY_CAPACITY, WAIT_POLL_INTERVAL_MS,
};
use crate::types::{BridgeKind, ChainId, CrossChainToken};

/// 브리지 전송 라이프사이클 이벤트
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// 소스 체인 제출 완료, 추적 시작
    Started { tx: BridgeTx },

    /// 폴링 1회마다 현재 단계 보고
    Updated {
        transfer_id: String,
        status: BridgeStatus,
    },

    /// 대상 체인 전달 확인
    Completed { tx: BridgeTx },

    /// 전송 실패 (프로토콜 실패 또는 타임아웃 강제 실패)
    Failed { tx: BridgeTx, reason: String },

    /// 추정 시간의 2배를 넘겨 강제 종료됨 (Failed 직전에 1회만 발행)
    Timeout {
        transfer_id: String,
        waited_secs: u64,
    },
}

/// 브리지 전송 실행/추적 매니저
///
/// 크로스체인 전송의 전체 라이프사이클을 추적합니다:
/// 1. 커넥터를 통한 소스 체인 제출
/// 2. 주기적 폴링으로 단계 전이 반영 (전진만 허용)
/// 3. 종결 시 완료 히스토리로 이동, 이벤트 발행
///
/// 명목 추정 시간의 2배가 지나도록 종결되지 않은 전송은 Failed로
/// 강제 전환됩니다.
pub struct BridgeManager {
    /// Available bridge connectors
    connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>>,

    /// 추적 중인 전송들
    active: Arc<DashMap<String, BridgeTx>>,

    /// 완료된 전송 히스토리 (용량 제한)
    completed: Arc<RwLock<VecDeque<BridgeTx>>>,

    /// 전송별 모니터 태스크
    monitors: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,

    /// 이벤트 구독자들
    watchers: Arc<RwLock<Vec<mpsc::UnboundedSender<BridgeEvent>>>>,

    /// 폴링 간격
    poll_interval: Duration,
}

impl BridgeManager {
    pub fn new(connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>>) -> Self {
        Self {
            connectors,
            active: Arc::new(DashMap::new()),
            completed: Arc::new(RwLock::new(VecDeque::new())),
            monitors: Arc::new(RwLock::new(HashMap::new())),
            watchers: Arc::new(RwLock::new(Vec::new())),
            poll_interval: Duration::from_secs(BRIDGE_POLL_INTERVAL_SECS),
        }
    }

    /// Override the polling interval (tests use milliseconds)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn available_bridges(&self) -> Vec<BridgeKind> {
        self.connectors.keys().copied().collect()
    }

    /// 전송 실행 및 추적 시작
    ///
    /// 커넥터 제출이 성공하면 Pending 상태의 BridgeTx를 활성 테이블에
    /// 등록하고 모니터 태스크를 띄운 뒤 핸들 사본을 돌려준다.
    pub async fn execute_bridge(
        &self,
        bridge: BridgeKind,
        from: ChainId,
        to: ChainId,
        token: &CrossChainToken,
        amount: U256,
        recipient: Address,
    ) -> BridgeResult<BridgeTx> {
        let connector = self
            .connectors
            .get(&bridge)
            .ok_or_else(|| BridgeError::BridgeUnavailable(bridge.name().to_string()))?
            .clone();

        info!(
            "🚀 브리지 전송 실행: {} {} {} -> {} via {}",
            amount,
            token.symbol,
            from.name(),
            to.name(),
            bridge.name()
        );

        let handle = connector
            .initiate_transfer(from, to, token, amount, recipient)
            .await?;
        let tx = BridgeTx::new(from, to, bridge, &token.symbol, amount, recipient, handle);

        self.active.insert(tx.id.clone(), tx.clone());
        Self::emit(&self.watchers, BridgeEvent::Started { tx: tx.clone() }).await;
        self.spawn_monitor(tx.id.clone(), connector).await;

        Ok(tx)
    }

    /// 활성/완료 테이블에서 전송 조회 (순수 읽기, 폴링 유발 없음)
    pub async fn get_bridge_status(&self, transfer_id: &str) -> Option<BridgeTx> {
        if let Some(tx) = self.active.get(transfer_id) {
            return Some(tx.clone());
        }
        self.completed
            .read()
            .await
            .iter()
            .find(|tx| tx.id == transfer_id)
            .cloned()
    }

    /// 추적 중인 전송 목록
    pub fn get_active_bridges(&self) -> Vec<BridgeTx> {
        self.active.iter().map(|entry| entry.value().clone()).collect()
    }

    /// 완료 히스토리 (최신이 뒤쪽)
    pub async fn get_completed_bridges(&self) -> Vec<BridgeTx> {
        self.completed.read().await.iter().cloned().collect()
    }

    /// 라이프사이클 이벤트 구독
    pub async fn subscribe_events(&self) -> mpsc::UnboundedReceiver<BridgeEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.write().await.push(tx);
        rx
    }

    /// 전송이 종결될 때까지 대기
    ///
    /// Completed로 끝나면 최종 BridgeTx를 돌려주고, Failed로 끝나면
    /// TransferFailed, 대기 한도를 넘기면 Timeout 에러를 돌려준다.
    pub async fn wait_for_bridge_completion(
        &self,
        transfer_id: &str,
        wait_timeout: Duration,
    ) -> BridgeResult<BridgeTx> {
        let poll = Duration::from_millis(WAIT_POLL_INTERVAL_MS);

        let outcome = tokio::time::timeout(wait_timeout, async {
            loop {
                match self.get_bridge_status(transfer_id).await {
                    Some(tx) if tx.is_terminal() => return Ok(tx),
                    Some(_) => {}
                    None => {
                        return Err(BridgeError::NotFound {
                            transfer_id: transfer_id.to_string(),
                        })
                    }
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await;

        match outcome {
            Ok(Ok(tx)) => match tx.status {
                BridgeStatus::Completed => Ok(tx),
                _ => Err(BridgeError::TransferFailed {
                    reason: tx
                        .error_message
                        .unwrap_or_else(|| "bridge transfer failed".to_string()),
                }),
            },
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BridgeError::Timeout {
                transfer_id: transfer_id.to_string(),
                waited_secs: wait_timeout.as_secs(),
            }),
        }
    }

    /// 모니터 태스크 중지 및 구독 해제
    pub async fn destroy(&self) {
        let mut monitors = self.monitors.write().await;
        for (transfer_id, handle) in monitors.drain() {
            handle.abort();
            debug!("모니터 중지: {}", transfer_id);
        }
        drop(monitors);

        self.watchers.write().await.clear();
        info!("🛑 브리지 매니저 종료");
    }

    async fn spawn_monitor(&self, transfer_id: String, connector: Arc<dyn BridgeConnector>) {
        let active = Arc::clone(&self.active);
        let completed = Arc::clone(&self.completed);
        let monitors = Arc::clone(&self.monitors);
        let watchers = Arc::clone(&self.watchers);
        let poll_interval = self.poll_interval;
        let id = transfer_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.tick().await; // 첫 틱은 즉시 발화

            loop {
                ticker.tick().await;

                let Some(current) = active.get(&id).map(|tx| tx.clone()) else {
                    break;
                };

                // 타임아웃 먼저: 추정 시간의 2배가 지나면 강제 실패
                if current.is_timed_out() {
                    let waited = current.elapsed_secs();
                    warn!("⏰ 브리지 전송 타임아웃: {} ({}초 경과)", id, waited);

                    let mut failed = current;
                    failed.status = BridgeStatus::Failed;
                    failed.updated_at = Utc::now();
                    failed.completed_at = Some(Utc::now());
                    failed.error_message = Some(format!("timed out after {}s", waited));

                    Self::emit(
                        &watchers,
                        BridgeEvent::Timeout {
                            transfer_id: id.clone(),
                            waited_secs: waited,
                        },
                    )
                    .await;
                    Self::retire(&active, &completed, failed.clone()).await;
                    Self::emit(
                        &watchers,
                        BridgeEvent::Failed {
                            tx: failed,
                            reason: format!("timed out after {}s", waited),
                        },
                    )
                    .await;
                    break;
                }

                let polled = match connector.poll_status(&id).await {
                    Ok(status) => status,
                    Err(e) => {
                        // 일시적 조회 실패는 다음 틱에 재시도
                        warn!("⚠️ 브리지 상태 조회 실패: {} - {}", id, e);
                        continue;
                    }
                };

                let mut tx = current;
                if polled != tx.status {
                    if tx.status.can_transition_to(polled) {
                        debug!("브리지 상태 전이: {} {} -> {}", id, tx.status, polled);
                        tx.status = polled;
                        tx.updated_at = Utc::now();
                        if polled.is_terminal() {
                            tx.completed_at = Some(Utc::now());
                        }
                        if polled == BridgeStatus::Completed {
                            if let Ok(Some(hash)) = connector.target_tx_hash(&id).await {
                                tx.target_tx_hash = Some(hash);
                            }
                        }
                        active.insert(id.clone(), tx.clone());
                    } else {
                        debug!("역방향 전이 무시: {} {} -> {}", id, tx.status, polled);
                    }
                }

                Self::emit(
                    &watchers,
                    BridgeEvent::Updated {
                        transfer_id: id.clone(),
                        status: tx.status,
                    },
                )
                .await;

                if tx.is_terminal() {
                    Self::retire(&active, &completed, tx.clone()).await;
                    let event = match tx.status {
                        BridgeStatus::Completed => {
                            info!("✅ 브리지 전송 완료: {} ({}초 소요)", id, tx.elapsed_secs());
                            BridgeEvent::Completed { tx }
                        }
                        _ => {
                            let reason = tx
                                .error_message
                                .clone()
                                .unwrap_or_else(|| "bridge transfer failed".to_string());
                            warn!("❌ 브리지 전송 실패: {} - {}", id, reason);
                            BridgeEvent::Failed { tx, reason }
                        }
                    };
                    Self::emit(&watchers, event).await;
                    break;
                }
            }

            monitors.write().await.remove(&id);
        });

        self.monitors.write().await.insert(transfer_id, handle);
    }

    /// 활성 테이블에서 제거하고 완료 히스토리에 추가 (용량 초과분은 앞에서 제거)
    async fn retire(
        active: &DashMap<String, BridgeTx>,
        completed: &RwLock<VecDeque<BridgeTx>>,
        tx: BridgeTx,
    ) {
        active.remove(&tx.id);
        let mut history = completed.write().await;
        history.push_back(tx);
        while history.len() > COMPLETED_HISTORY_CAPACITY {
            history.pop_front();
        }
    }

    async fn emit(
        watchers: &Arc<RwLock<Vec<mpsc::UnboundedSender<BridgeEvent>>>>,
        event: BridgeEvent,
    ) {
        watchers
            .write()
            .await
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for BridgeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeManager")
            .field("connectors", &self.connectors.keys().collect::<Vec<_>>())
            .field("active", &self.active.len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockBridgeConnector;

    fn usdc() -> CrossChainToken {
        let mut token = CrossChainToken::new("USDC", 6);
        for chain in ChainId::all() {
            token = token.with_address(chain, Address::ZERO);
        }
        token
    }

    fn manager_with(connector: MockBridgeConnector) -> (BridgeManager, Arc<MockBridgeConnector>) {
        let connector = Arc::new(connector);
        let mut connectors: HashMap<BridgeKind, Arc<dyn BridgeConnector>> = HashMap::new();
        connectors.insert(connector.kind(), connector.clone() as Arc<dyn BridgeConnector>);
        let manager =
            BridgeManager::new(connectors).with_poll_interval(Duration::from_millis(20));
        (manager, connector)
    }

    #[tokio::test]
    async fn test_execute_registers_active_and_emits_started() {
        let (manager, _) = manager_with(MockBridgeConnector::new(BridgeKind::Hyperlane));
        let mut events = manager.subscribe_events().await;

        let tx = manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Base,
                &usdc(),
                U256::from(1_000_000u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        assert_eq!(tx.status, BridgeStatus::Pending);
        assert_eq!(manager.get_active_bridges().len(), 1);

        let event = events.recv().await.unwrap();
        assert!(matches!(event, BridgeEvent::Started { .. }));

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_missing_connector_is_unavailable() {
        let (manager, _) = manager_with(MockBridgeConnector::new(BridgeKind::Hyperlane));

        let err = manager
            .execute_bridge(
                BridgeKind::LayerZero,
                ChainId::Ethereum,
                ChainId::Base,
                &usdc(),
                U256::from(1u64),
                Address::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::BridgeUnavailable(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_reaches_completed() {
        let (manager, _) = manager_with(MockBridgeConnector::new(BridgeKind::LayerZero));

        let tx = manager
            .execute_bridge(
                BridgeKind::LayerZero,
                ChainId::Arbitrum,
                ChainId::Base,
                &usdc(),
                U256::from(5_000u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        let done = manager
            .wait_for_bridge_completion(&tx.id, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(done.status, BridgeStatus::Completed);
        assert!(done.completed_at.is_some());
        assert!(done.target_tx_hash.is_some());

        // 종결 후에는 활성 테이블에서 빠지고 히스토리에 남는다
        assert!(manager.get_active_bridges().is_empty());
        assert_eq!(manager.get_completed_bridges().await.len(), 1);
        let looked_up = manager.get_bridge_status(&tx.id).await.unwrap();
        assert_eq!(looked_up.status, BridgeStatus::Completed);

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_updated_events_precede_terminal_event() {
        let (manager, _) = manager_with(MockBridgeConnector::new(BridgeKind::Hyperlane));
        let mut events = manager.subscribe_events().await;

        let tx = manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Polygon,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        manager
            .wait_for_bridge_completion(&tx.id, Duration::from_secs(5))
            .await
            .unwrap();

        let mut updated = 0;
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                BridgeEvent::Updated { .. } => {
                    assert!(!saw_completed);
                    updated += 1;
                }
                BridgeEvent::Completed { .. } => saw_completed = true,
                _ => {}
            }
        }
        assert!(updated >= 1);
        assert!(saw_completed);

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_protocol_failure_surfaces_as_transfer_failed() {
        let connector = MockBridgeConnector::new(BridgeKind::Hyperlane);
        connector.set_fail_after_relaying(true);
        let (manager, _) = manager_with(connector);

        let tx = manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Optimism,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        let err = manager
            .wait_for_bridge_completion(&tx.id, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransferFailed { .. }));

        let final_tx = manager.get_bridge_status(&tx.id).await.unwrap();
        assert_eq!(final_tx.status, BridgeStatus::Failed);

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_stuck_transfer_times_out_with_single_timeout_event() {
        // 추정 0초 + 영원히 Pending -> 경과 1초를 넘기면 강제 실패
        let connector =
            MockBridgeConnector::new(BridgeKind::Native).with_estimated_time(0);
        connector.set_always_pending(true);
        let (manager, _) = manager_with(connector);
        let mut events = manager.subscribe_events().await;

        let tx = manager
            .execute_bridge(
                BridgeKind::Native,
                ChainId::Optimism,
                ChainId::Base,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        let err = manager
            .wait_for_bridge_completion(&tx.id, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransferFailed { .. }));

        let mut timeouts = 0;
        let mut saw_completed = false;
        while let Ok(event) = events.try_recv() {
            match event {
                BridgeEvent::Timeout { .. } => timeouts += 1,
                BridgeEvent::Completed { .. } => saw_completed = true,
                _ => {}
            }
        }
        assert_eq!(timeouts, 1);
        assert!(!saw_completed);

        let final_tx = manager.get_bridge_status(&tx.id).await.unwrap();
        assert_eq!(final_tx.status, BridgeStatus::Failed);
        assert!(final_tx.error_message.unwrap().contains("timed out"));

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_wait_never_blocks_past_caller_timeout() {
        // 명목 추정 180초짜리 전송이 영원히 Pending -> 모니터의 2배 데드라인은
        // 멀었으므로 호출자 대기 한도만 만료된다
        let connector = MockBridgeConnector::new(BridgeKind::Hyperlane);
        connector.set_always_pending(true);
        let (manager, _) = manager_with(connector);

        let tx = manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Arbitrum,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let err = manager
            .wait_for_bridge_completion(&tx.id, Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));

        // 대기 만료는 전송 자체를 실패시키지 않는다
        let still_active = manager.get_bridge_status(&tx.id).await.unwrap();
        assert_eq!(still_active.status, BridgeStatus::Pending);

        manager.destroy().await;
    }

    #[tokio::test]
    async fn test_initiation_failure_registers_nothing() {
        let connector = MockBridgeConnector::new(BridgeKind::Hyperlane);
        connector.set_fail_initiate(true);
        let (manager, connector) = manager_with(connector);
        let mut events = manager.subscribe_events().await;

        let err = manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Base,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::TransferFailed { .. }));

        // 제출 실패는 흔적을 남기지 않는다
        assert!(manager.get_active_bridges().is_empty());
        assert_eq!(connector.initiated_count(), 0);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_transfer_lookups() {
        let (manager, _) = manager_with(MockBridgeConnector::new(BridgeKind::Hyperlane));

        assert!(manager.get_bridge_status("nope").await.is_none());
        let err = manager
            .wait_for_bridge_completion("nope", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_destroy_closes_event_channel() {
        let connector = MockBridgeConnector::new(BridgeKind::Hyperlane);
        connector.set_always_pending(true);
        let (manager, _) = manager_with(connector);
        let mut events = manager.subscribe_events().await;

        manager
            .execute_bridge(
                BridgeKind::Hyperlane,
                ChainId::Ethereum,
                ChainId::Base,
                &usdc(),
                U256::from(100u64),
                Address::ZERO,
            )
            .await
            .unwrap();

        manager.destroy().await;

        // 송신자들이 drop되어 채널이 닫힌다
        while let Some(_event) = events.recv().await {}
    }
}
