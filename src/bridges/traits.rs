use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::BRIDGE_TIMEOUT_FACTOR;
use crate::types::{BridgeKind, ChainId, CrossChainToken};

/// Bridge operation result type
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge-specific errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unsupported route: {from} -> {to}")]
    UnsupportedRoute { from: ChainId, to: ChainId },

    #[error("Token not supported: {token}")]
    TokenNotSupported { token: String },

    #[error("Bridge temporarily unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Transfer not found: {transfer_id}")]
    NotFound { transfer_id: String },

    #[error("Transfer timed out: {transfer_id} after {waited_secs}s")]
    Timeout {
        transfer_id: String,
        waited_secs: u64,
    },

    #[error("API error: {message}")]
    ApiError { message: String },
}

/// Lifecycle phase of a bridge transfer
///
/// Phases only move forward: Pending -> Relaying -> Completed/Failed.
/// Skipping Relaying is allowed (fast bridges confirm in one poll),
/// terminal phases never change again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    /// Source transaction submitted, not yet picked up by the bridge
    Pending,

    /// Message in flight between chains
    Relaying,

    /// Funds delivered on the destination chain
    Completed,

    /// Transfer failed or was forced out by timeout
    Failed,
}

impl BridgeStatus {
    fn rank(&self) -> u8 {
        match self {
            BridgeStatus::Pending => 0,
            BridgeStatus::Relaying => 1,
            BridgeStatus::Completed | BridgeStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeStatus::Completed | BridgeStatus::Failed)
    }

    /// Forward-only transition check; terminal states reject everything
    pub fn can_transition_to(&self, next: BridgeStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn name(&self) -> &'static str {
        match self {
            BridgeStatus::Pending => "pending",
            BridgeStatus::Relaying => "relaying",
            BridgeStatus::Completed => "completed",
            BridgeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Handle returned when a transfer is initiated on the source chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHandle {
    /// Connector-scoped transfer ID (used for polling)
    pub transfer_id: String,

    /// Source chain transaction hash
    pub source_tx_hash: String,

    /// Nominal completion estimate in seconds
    pub estimated_time_secs: u64,
}

/// A tracked bridge transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeTx {
    /// Tracking ID (connector transfer ID)
    pub id: String,

    /// Source chain
    pub from: ChainId,

    /// Destination chain
    pub to: ChainId,

    /// Bridge protocol carrying the transfer
    pub bridge: BridgeKind,

    /// Token symbol being moved
    pub token: String,

    /// Amount in token units
    pub amount: U256,

    /// Recipient on the destination chain
    pub recipient: Address,

    /// Source transaction hash
    pub source_tx_hash: String,

    /// Destination transaction hash (once delivered)
    pub target_tx_hash: Option<String>,

    /// Current lifecycle phase
    pub status: BridgeStatus,

    /// When the transfer was initiated
    pub initiated_at: DateTime<Utc>,

    /// Last status change
    pub updated_at: DateTime<Utc>,

    /// Completion time (terminal states only)
    pub completed_at: Option<DateTime<Utc>>,

    /// Nominal completion estimate in seconds
    pub estimated_time_secs: u64,

    /// Error message (if failed)
    pub error_message: Option<String>,
}

impl BridgeTx {
    pub fn new(
        from: ChainId,
        to: ChainId,
        bridge: BridgeKind,
        token: &str,
        amount: U256,
        recipient: Address,
        handle: TransferHandle,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: handle.transfer_id,
            from,
            to,
            bridge,
            token: token.to_string(),
            amount,
            recipient,
            source_tx_hash: handle.source_tx_hash,
            target_tx_hash: None,
            status: BridgeStatus::Pending,
            initiated_at: now,
            updated_at: now,
            completed_at: None,
            estimated_time_secs: handle.estimated_time_secs,
            error_message: None,
        }
    }

    pub fn elapsed_secs(&self) -> u64 {
        (Utc::now() - self.initiated_at).num_seconds().max(0) as u64
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Deadline after which a non-terminal transfer is declared failed
    pub fn timeout_deadline_secs(&self) -> u64 {
        self.estimated_time_secs * BRIDGE_TIMEOUT_FACTOR
    }

    pub fn is_timed_out(&self) -> bool {
        !self.is_terminal() && self.elapsed_secs() > self.timeout_deadline_secs()
    }
}

/// Cross-chain bridge connector trait
///
/// One implementation per protocol. Connectors own the protocol-specific
/// wire details; lifecycle tracking lives in the BridgeManager.
#[async_trait]
pub trait BridgeConnector: Send + Sync + std::fmt::Debug {
    /// Bridge protocol this connector speaks
    fn kind(&self) -> BridgeKind;

    /// Check if the connector can carry a specific pair
    async fn supports_route(&self, from: ChainId, to: ChainId) -> bool;

    /// Submit a transfer on the source chain
    async fn initiate_transfer(
        &self,
        from: ChainId,
        to: ChainId,
        token: &CrossChainToken,
        amount: U256,
        recipient: Address,
    ) -> BridgeResult<TransferHandle>;

    /// Current phase of a previously initiated transfer
    async fn poll_status(&self, transfer_id: &str) -> BridgeResult<BridgeStatus>;

    /// Destination transaction hash, once the transfer is delivered
    async fn target_tx_hash(&self, _transfer_id: &str) -> BridgeResult<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward_only() {
        assert!(BridgeStatus::Pending.can_transition_to(BridgeStatus::Relaying));
        assert!(BridgeStatus::Pending.can_transition_to(BridgeStatus::Completed));
        assert!(BridgeStatus::Pending.can_transition_to(BridgeStatus::Failed));
        assert!(BridgeStatus::Relaying.can_transition_to(BridgeStatus::Completed));
        assert!(BridgeStatus::Relaying.can_transition_to(BridgeStatus::Failed));

        assert!(!BridgeStatus::Relaying.can_transition_to(BridgeStatus::Pending));
        assert!(!BridgeStatus::Pending.can_transition_to(BridgeStatus::Pending));
        assert!(!BridgeStatus::Relaying.can_transition_to(BridgeStatus::Relaying));
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        for terminal in [BridgeStatus::Completed, BridgeStatus::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                BridgeStatus::Pending,
                BridgeStatus::Relaying,
                BridgeStatus::Completed,
                BridgeStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_bridge_tx_timeout_deadline_doubles_estimate() {
        let handle = TransferHandle {
            transfer_id: "tx-1".to_string(),
            source_tx_hash: "0xabc".to_string(),
            estimated_time_secs: 180,
        };
        let tx = BridgeTx::new(
            ChainId::Ethereum,
            ChainId::Base,
            BridgeKind::Hyperlane,
            "USDC",
            U256::from(1_000u64),
            Address::ZERO,
            handle,
        );

        assert_eq!(tx.status, BridgeStatus::Pending);
        assert_eq!(tx.timeout_deadline_secs(), 360);
        // 방금 생성된 전송은 타임아웃 대상이 아니다
        assert!(!tx.is_timed_out());
    }

    #[test]
    fn test_terminal_tx_never_times_out() {
        let handle = TransferHandle {
            transfer_id: "tx-2".to_string(),
            source_tx_hash: "0xdef".to_string(),
            estimated_time_secs: 0,
        };
        let mut tx = BridgeTx::new(
            ChainId::Optimism,
            ChainId::Base,
            BridgeKind::Native,
            "WETH",
            U256::from(5u64),
            Address::ZERO,
            handle,
        );

        // 추정 0초면 경과 즉시 타임아웃 후보
        tx.initiated_at = Utc::now() - chrono::Duration::seconds(10);
        assert!(tx.is_timed_out());

        tx.status = BridgeStatus::Completed;
        assert!(!tx.is_timed_out());
    }
}
