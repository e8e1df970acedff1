pub mod hyperlane;
pub mod layerzero;
pub mod manager;
pub mod native;
pub mod traits;

// Re-exports
pub use hyperlane::HyperlaneBridge;
pub use layerzero::LayerZeroBridge;
pub use manager::{BridgeEvent, BridgeManager};
pub use native::NativeBridge;
pub use traits::{
    BridgeConnector, BridgeError, BridgeResult, BridgeStatus, BridgeTx, TransferHandle,
};
