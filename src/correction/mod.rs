//! Correction Module
//!
//! Rate aggregation, correction planning and swap execution for pegged pools.

pub mod aggregator;
pub mod executor;
pub mod keeper;
pub mod planner;
pub mod policy;

pub use aggregator::{Normalization, RateAggregator, StableDecimals};
pub use executor::{CorrectionExecutor, ExecutorSettings};
pub use keeper::{KeeperSettings, PegKeeper};
pub use planner::{plan_entry, CorrectionPlanner};
pub use policy::{ExecutePrivilege, MaxSlippageBps, NoMinimum, SlippagePolicy, SwapQuote};
