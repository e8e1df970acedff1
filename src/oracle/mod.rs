pub mod gas_price;

pub use gas_price::{GasPrice, GasPriceOracle, GasPriceUpdate, OracleError, OracleResult};
