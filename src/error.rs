//! Keeper errors
//!
//! Every failure surfaces as an aborted operation with a short fixed reason.
//! Collaborator (pool, router, token) failures are wrapped, never retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("zero address")]
    ZeroAddress,

    #[error("pool not found")]
    PoolNotFound,

    #[error("caller is not the operator")]
    NotOperator,

    #[error("no liquidity")]
    NoLiquidity,

    #[error("router not configured")]
    RouterNotConfigured,

    #[error("insufficient output amount")]
    InsufficientOutput,

    #[error("collaborator call failed: {0:#}")]
    Chain(#[from] anyhow::Error),
}

pub type KeeperResult<T> = std::result::Result<T, KeeperError>;
