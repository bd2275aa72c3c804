//! Pool management module for the peg keeper
//!
//! Handles the pool registry, live reserve reads and reserve arithmetic.
//! Supports both V2 (constant product) and V3 (concentrated liquidity) pools.

pub mod calculator;
pub mod reader;
pub mod registry;

pub use reader::ReserveReader;
pub use registry::PoolRegistry;
