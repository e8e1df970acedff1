use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::mock_tx_hash;
use crate::bridges::{
    BridgeConnector, BridgeError, BridgeResult, BridgeStatus, TransferHandle,
};
use crate::types::{BridgeKind, ChainId, CrossChainToken};

/// 스크립트 가능한 브리지 커넥터 목
///
/// 기본 동작은 폴링마다 한 단계씩 전진 (Pending -> Relaying -> Completed).
/// 스위치로 영원히 Pending에 머물게 하거나, 제출을 실패시키거나, Relaying
/// 다음에 Failed로 빠지게 할 수 있습니다. 지원 쌍을 제한하면 방향이 있는
/// 엣지 집합으로 동작합니다.
#[derive(Debug)]
pub struct MockBridgeConnector {
    kind: BridgeKind,
    /// None이면 모든 (from != to) 쌍 지원
    pairs: Option<HashSet<(ChainId, ChainId)>>,
    estimated_time_secs: u64,
    always_pending: AtomicBool,
    fail_initiate: AtomicBool,
    fail_after_relaying: AtomicBool,
    /// 전송별 폴링 횟수
    transfers: DashMap<String, u32>,
    completed_hashes: DashMap<String, String>,
}

impl MockBridgeConnector {
    pub fn new(kind: BridgeKind) -> Self {
        Self {
            kind,
            pairs: None,
            estimated_time_secs: kind.nominal_transfer_time(),
            always_pending: AtomicBool::new(false),
            fail_initiate: AtomicBool::new(false),
            fail_after_relaying: AtomicBool::new(false),
            transfers: DashMap::new(),
            completed_hashes: DashMap::new(),
        }
    }

    /// 지원 쌍을 명시적 방향 엣지 집합으로 제한
    pub fn with_pairs(kind: BridgeKind, pairs: &[(ChainId, ChainId)]) -> Self {
        let mut connector = Self::new(kind);
        connector.pairs = Some(pairs.iter().copied().collect());
        connector
    }

    pub fn with_estimated_time(mut self, secs: u64) -> Self {
        self.estimated_time_secs = secs;
        self
    }

    pub fn set_always_pending(&self, stuck: bool) {
        self.always_pending.store(stuck, Ordering::SeqCst);
    }

    pub fn set_fail_initiate(&self, fail: bool) {
        self.fail_initiate.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_after_relaying(&self, fail: bool) {
        self.fail_after_relaying.store(fail, Ordering::SeqCst);
    }

    /// 지금까지 제출된 전송 수
    pub fn initiated_count(&self) -> usize {
        self.transfers.len()
    }
}

#[async_trait]
impl BridgeConnector for MockBridgeConnector {
    fn kind(&self) -> BridgeKind {
        self.kind
    }

    async fn supports_route(&self, from: ChainId, to: ChainId) -> bool {
        if from == to {
            return false;
        }
        match &self.pairs {
            None => true,
            Some(set) => set.contains(&(from, to)),
        }
    }

    async fn initiate_transfer(
        &self,
        from: ChainId,
        to: ChainId,
        token: &CrossChainToken,
        _amount: U256,
        _recipient: Address,
    ) -> BridgeResult<TransferHandle> {
        if self.fail_initiate.load(Ordering::SeqCst) {
            return Err(BridgeError::TransferFailed {
                reason: "simulated initiation failure".to_string(),
            });
        }
        if !self.supports_route(from, to).await {
            return Err(BridgeError::UnsupportedRoute { from, to });
        }
        if !token.is_deployed_on(from) || !token.is_deployed_on(to) {
            return Err(BridgeError::TokenNotSupported {
                token: token.symbol.clone(),
            });
        }

        let handle = TransferHandle {
            transfer_id: Uuid::new_v4().to_string(),
            source_tx_hash: mock_tx_hash(),
            estimated_time_secs: self.estimated_time_secs,
        };
        self.transfers.insert(handle.transfer_id.clone(), 0);
        Ok(handle)
    }

    async fn poll_status(&self, transfer_id: &str) -> BridgeResult<BridgeStatus> {
        let mut polls =
            self.transfers
                .get_mut(transfer_id)
                .ok_or_else(|| BridgeError::NotFound {
                    transfer_id: transfer_id.to_string(),
                })?;

        if self.always_pending.load(Ordering::SeqCst) {
            return Ok(BridgeStatus::Pending);
        }

        let count = *polls;
        *polls += 1;

        let status = match (count, self.fail_after_relaying.load(Ordering::SeqCst)) {
            (0, _) => BridgeStatus::Pending,
            (1, _) => BridgeStatus::Relaying,
            (_, true) => BridgeStatus::Failed,
            (_, false) => BridgeStatus::Completed,
        };

        if status == BridgeStatus::Completed {
            self.completed_hashes
                .entry(transfer_id.to_string())
                .or_insert_with(mock_tx_hash);
        }

        Ok(status)
    }

    async fn target_tx_hash(&self, transfer_id: &str) -> BridgeResult<Option<String>> {
        if !self.transfers.contains_key(transfer_id) {
            return Err(BridgeError::NotFound {
                transfer_id: transfer_id.to_string(),
            });
        }
        Ok(self
            .completed_hashes
            .get(transfer_id)
            .map(|hash| hash.value().clone()))
    }
}
