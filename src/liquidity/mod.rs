pub mod checker;

pub use checker::{
    LiquidityChecker, LiquidityError, LiquidityInfo, LiquidityResult, TreasuryProvider,
};
