//! USDM Peg Keeper Library
//!
//! Keeps pegged USDM/native pools in line with the reserve-weighted market
//! rate of a registry of Uniswap V2 and V3 pools.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod correction;
pub mod error;
pub mod pool;
pub mod types;

// Re-export commonly used types
pub use config::{load_env, KeeperConfig};
pub use correction::{KeeperSettings, PegKeeper};
pub use error::{KeeperError, KeeperResult};
pub use pool::PoolRegistry;
pub use types::{AggregateRate, CorrectionPlan, CorrectionReport, PoolDescriptor, PoolKind, PoolVersion};
