//! Chain collaborators
//!
//! The keeper only talks to factories, pools, routers and tokens through these
//! two traits. `RpcChain` implements them over an alloy provider; tests use an
//! in-memory chain.

pub mod rpc;

#[cfg(test)]
pub(crate) mod testing;

pub use rpc::RpcChain;

use alloy::primitives::{Address, TxHash, U256};
use anyhow::Result;
use async_trait::async_trait;

/// Read-only collaborator calls used by the reader and aggregator
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Constant-product factory `getPair`. Zero address if the pair does not exist.
    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address>;

    /// Concentrated-liquidity factory `getPool`. Zero address if the pool does not exist.
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address>;

    /// Pair `getReserves` as (reserve0, reserve1)
    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)>;

    async fn token0(&self, pool: Address) -> Result<Address>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    async fn decimals(&self, token: Address) -> Result<u8>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
}

/// `exactInputSingle` arguments (sqrtPriceLimitX96 is always 0)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactInputSingle {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub recipient: Address,
    pub deadline: u64,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
}

/// State-changing collaborator calls used by the executor.
/// Each returns once the transaction is confirmed successful.
#[async_trait]
pub trait ChainWriter: ChainReader {
    /// Account that signs and pays for transactions
    fn sender(&self) -> Address;

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash>;

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<TxHash>;

    /// Pair `swap(amount0Out, amount1Out, to, "")`; input must already sit in the pair
    async fn pair_swap(
        &self,
        pair: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<TxHash>;

    /// Pair `skim(to)`: sends out any balance above the recorded reserves
    async fn pair_skim(&self, pair: Address, to: Address) -> Result<TxHash>;

    async fn exact_input_single(&self, router: Address, params: &ExactInputSingle) -> Result<TxHash>;
}
