pub mod optimizer;
pub mod router;

pub use optimizer::{PathConstraints, PathOptimizer, PathWeights, RouteStrategy};
pub use router::{CrossChainRouter, RouteQuery, RouterError, RouterResult};
