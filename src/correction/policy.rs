//! Execution policy hooks
//!
//! `SlippagePolicy` decides the minimum output of each correcting swap. The
//! default `NoMinimum` enforces nothing (amountOutMinimum = 0); callers bear the
//! full slippage. `MaxSlippageBps` layers a bound on top without touching the
//! planner or executor.
//!
//! `ExecutePrivilege` records which pool versions require the operator to
//! trigger a correction pass.

use crate::types::PoolVersion;
use alloy::primitives::{Address, U256};
use serde::Deserialize;

/// Swap about to be issued, with the constant-product estimate of its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub expected_out: U256,
}

pub trait SlippagePolicy: Send + Sync {
    /// Minimum acceptable output for `quote`
    fn min_amount_out(&self, quote: &SwapQuote) -> U256;

    fn name(&self) -> &str;
}

/// No minimum output (amountOutMinimum = 0)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMinimum;

impl SlippagePolicy for NoMinimum {
    fn min_amount_out(&self, _quote: &SwapQuote) -> U256 {
        U256::ZERO
    }

    fn name(&self) -> &str {
        "no-minimum"
    }
}

/// Accept at most `bps` basis points below the expected output
#[derive(Debug, Clone, Copy)]
pub struct MaxSlippageBps {
    bps: u32,
}

impl MaxSlippageBps {
    pub fn new(bps: u32) -> Self {
        Self {
            bps: bps.min(10_000),
        }
    }
}

impl SlippagePolicy for MaxSlippageBps {
    fn min_amount_out(&self, quote: &SwapQuote) -> U256 {
        let keep = U256::from(10_000 - self.bps);
        quote.expected_out.saturating_mul(keep) / U256::from(10_000)
    }

    fn name(&self) -> &str {
        "max-slippage-bps"
    }
}

/// Which pool versions only the operator may correct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExecutePrivilege {
    #[serde(default = "default_true")]
    pub v2_operator_only: bool,
    #[serde(default)]
    pub v3_operator_only: bool,
}

fn default_true() -> bool { true }

impl Default for ExecutePrivilege {
    fn default() -> Self {
        Self {
            v2_operator_only: true,
            v3_operator_only: false,
        }
    }
}

impl ExecutePrivilege {
    pub fn requires_operator(&self, version: PoolVersion) -> bool {
        match version {
            PoolVersion::V2 => self.v2_operator_only,
            PoolVersion::V3 => self.v3_operator_only,
        }
    }
}
