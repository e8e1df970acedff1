pub mod rpc;

pub use rpc::{BlockHeader, ChainRpc, EthersRpcClient};
