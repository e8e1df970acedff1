use std::time::Instant;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::traits::{BridgeConnector, BridgeError, BridgeResult, BridgeStatus, TransferHandle};
use crate::constants::{is_native_messaging_pair, NATIVE_TRANSFER_TIME_SECS};
use crate::mocks::mock_tx_hash;
use crate::types::{BridgeKind, ChainId, CrossChainToken};

/// 전송 시간 중 Pending으로 보고되는 앞쪽 구간 비율
const RELAY_PHASE_START: f64 = 0.2;

/// In-flight transfer tracked by the connector
#[derive(Debug)]
struct NativeTransfer {
    initiated_at: Instant,
    estimated_time_secs: u64,
    target_tx_hash: Option<String>,
}

/// Superchain 네이티브 메시징 브리지
///
/// OP Stack 체인(Optimism, Base, Zora) 간의 L2-to-L2 크로스 도메인 메신저를
/// 사용합니다.
/// - 외부 릴레이어 없이 프로토콜 레벨에서 전달
/// - 가장 높은 신뢰도, 중간 수준의 전송 시간
/// - Superchain 멤버 쌍에서만 사용 가능
///
/// 별도 상태 API가 없으므로 전송 단계는 경과 시간 대비 명목 추정치로
/// 유도합니다.
#[derive(Debug)]
pub struct NativeBridge {
    /// Mock mode flag
    mock_mode: bool,
    /// Nominal completion estimate in seconds
    estimated_time_secs: u64,
    /// In-flight transfers keyed by transfer ID
    transfers: DashMap<String, NativeTransfer>,
}

impl NativeBridge {
    pub fn new() -> Self {
        Self {
            mock_mode: crate::mocks::is_mock_mode(),
            estimated_time_secs: NATIVE_TRANSFER_TIME_SECS,
            transfers: DashMap::new(),
        }
    }

    /// Override the nominal estimate (tests use 0 to complete instantly)
    pub fn with_estimated_time(mut self, secs: u64) -> Self {
        self.estimated_time_secs = secs;
        self
    }

    /// Derive the lifecycle phase from elapsed time vs the nominal estimate
    fn derive_phase(elapsed_secs: f64, estimated_time_secs: u64) -> BridgeStatus {
        if estimated_time_secs == 0 {
            return BridgeStatus::Completed;
        }
        let fraction = elapsed_secs / estimated_time_secs as f64;
        if fraction < RELAY_PHASE_START {
            BridgeStatus::Pending
        } else if fraction < 1.0 {
            BridgeStatus::Relaying
        } else {
            BridgeStatus::Completed
        }
    }

    async fn simulate_transfer(&self) -> TransferHandle {
        // 소스 체인 제출 지연 흉내
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        TransferHandle {
            transfer_id: Uuid::new_v4().to_string(),
            source_tx_hash: mock_tx_hash(),
            estimated_time_secs: self.estimated_time_secs,
        }
    }
}

impl Default for NativeBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BridgeConnector for NativeBridge {
    fn kind(&self) -> BridgeKind {
        BridgeKind::Native
    }

    async fn supports_route(&self, from: ChainId, to: ChainId) -> bool {
        is_native_messaging_pair(from, to)
    }

    async fn initiate_transfer(
        &self,
        from: ChainId,
        to: ChainId,
        token: &CrossChainToken,
        amount: U256,
        recipient: Address,
    ) -> BridgeResult<TransferHandle> {
        if !self.supports_route(from, to).await {
            return Err(BridgeError::UnsupportedRoute { from, to });
        }
        if !token.is_deployed_on(from) || !token.is_deployed_on(to) {
            return Err(BridgeError::TokenNotSupported {
                token: token.symbol.clone(),
            });
        }

        info!(
            "🌉 네이티브 메시징 전송 시작: {} {} {} -> {} (수신자 {})",
            amount,
            token.symbol,
            from.name(),
            to.name(),
            recipient
        );

        if !self.mock_mode {
            // 실제 제출에는 서명자가 필요 - 시뮬레이션 경로 사용
            warn!("네이티브 메신저 실제 제출 미구현, 시뮬레이션 전송 사용");
        }

        let handle = self.simulate_transfer().await;
        self.transfers.insert(
            handle.transfer_id.clone(),
            NativeTransfer {
                initiated_at: Instant::now(),
                estimated_time_secs: handle.estimated_time_secs,
                target_tx_hash: None,
            },
        );

        Ok(handle)
    }

    async fn poll_status(&self, transfer_id: &str) -> BridgeResult<BridgeStatus> {
        let mut transfer =
            self.transfers
                .get_mut(transfer_id)
                .ok_or_else(|| BridgeError::NotFound {
                    transfer_id: transfer_id.to_string(),
                })?;

        let elapsed = transfer.initiated_at.elapsed().as_secs_f64();
        let status = Self::derive_phase(elapsed, transfer.estimated_time_secs);

        if status == BridgeStatus::Completed && transfer.target_tx_hash.is_none() {
            transfer.target_tx_hash = Some(mock_tx_hash());
        }
        debug!("🔍 네이티브 전송 상태: {} -> {}", transfer_id, status);

        Ok(status)
    }

    async fn target_tx_hash(&self, transfer_id: &str) -> BridgeResult<Option<String>> {
        let transfer = self
            .transfers
            .get(transfer_id)
            .ok_or_else(|| BridgeError::NotFound {
                transfer_id: transfer_id.to_string(),
            })?;
        Ok(transfer.target_tx_hash.clone())
    }
}
