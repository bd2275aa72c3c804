//! alloy-backed chain collaborators
//!
//! Reads go through `#[sol(rpc)]` contract instances with `.call()`.
//! Writes are sent from the provider's wallet and awaited until the receipt
//! is available; a reverted receipt is an error.

use super::{ChainReader, ChainWriter, ExactInputSingle};
use crate::contracts::{ISwapRouter, IUniswapV2Factory, IUniswapV2Pair, UniswapV3Factory, IERC20};
use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Convert u32 fee tier to alloy uint24 type for contract calls.
/// Uses from_limbs() because Uint<24, 1> doesn't impl From<u32>.
fn fee_to_u24(fee: u32) -> U24 {
    debug_assert!(fee <= 0xFFFFFF, "fee {} exceeds U24 max (16777215)", fee);
    U24::from_limbs([fee as u64])
}

fn ensure_success(receipt: &TransactionReceipt, what: &str) -> Result<TxHash> {
    if !receipt.status() {
        bail!("{} transaction reverted: {:?}", what, receipt.transaction_hash);
    }
    Ok(receipt.transaction_hash)
}

/// Chain collaborators over any alloy provider.
/// For writes the provider must carry a wallet for `sender`.
pub struct RpcChain<P> {
    provider: Arc<P>,
    sender: Address,
}

impl<P: Provider + 'static> RpcChain<P> {
    pub fn new(provider: Arc<P>, sender: Address) -> Self {
        Self { provider, sender }
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for RpcChain<P> {
    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address> {
        let factory = IUniswapV2Factory::new(factory, Arc::clone(&self.provider));
        factory
            .getPair(token_a, token_b)
            .call()
            .await
            .context("Failed to get V2 pair address")
    }

    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address> {
        let factory = UniswapV3Factory::new(factory, Arc::clone(&self.provider));
        factory
            .getPool(token_a, token_b, fee_to_u24(fee))
            .call()
            .await
            .context("Failed to get V3 pool address")
    }

    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let contract = IUniswapV2Pair::new(pair, Arc::clone(&self.provider));
        let reserves = contract
            .getReserves()
            .call()
            .await
            .context("Failed to get reserves")?;
        Ok((U256::from(reserves.reserve0), U256::from(reserves.reserve1)))
    }

    async fn token0(&self, pool: Address) -> Result<Address> {
        let contract = IUniswapV2Pair::new(pool, Arc::clone(&self.provider));
        contract.token0().call().await.context("Failed to get token0")
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let contract = IERC20::new(token, Arc::clone(&self.provider));
        contract
            .balanceOf(owner)
            .call()
            .await
            .with_context(|| format!("Failed to get balance of {:?} for {:?}", token, owner))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let contract = IERC20::new(token, Arc::clone(&self.provider));
        contract
            .decimals()
            .call()
            .await
            .with_context(|| format!("Failed to get decimals for {:?}", token))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let contract = IERC20::new(token, Arc::clone(&self.provider));
        contract
            .allowance(owner, spender)
            .call()
            .await
            .context("Failed to get allowance")
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainWriter for RpcChain<P> {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        let contract = IERC20::new(token, Arc::clone(&self.provider));
        let receipt = contract
            .approve(spender, amount)
            .send()
            .await
            .context("Approve: send failed")?
            .get_receipt()
            .await
            .context("Approve: no receipt returned")?;
        let tx_hash = ensure_success(&receipt, "Approval")?;
        info!("Approval confirmed: {:?}", tx_hash);
        Ok(tx_hash)
    }

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<TxHash> {
        let contract = IERC20::new(token, Arc::clone(&self.provider));
        let receipt = contract
            .transfer(to, amount)
            .send()
            .await
            .context("Transfer: send failed")?
            .get_receipt()
            .await
            .context("Transfer: no receipt returned")?;
        let tx_hash = ensure_success(&receipt, "Transfer")?;
        debug!("Transfer confirmed: {} of {:?} -> {:?} ({:?})", amount, token, to, tx_hash);
        Ok(tx_hash)
    }

    async fn pair_swap(
        &self,
        pair: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<TxHash> {
        let contract = IUniswapV2Pair::new(pair, Arc::clone(&self.provider));
        let receipt = contract
            .swap(amount0_out, amount1_out, to, Bytes::new())
            .send()
            .await
            .context("V2 swap: send failed")?
            .get_receipt()
            .await
            .context("V2 swap: no receipt returned")?;
        ensure_success(&receipt, "V2 swap")
    }

    async fn pair_skim(&self, pair: Address, to: Address) -> Result<TxHash> {
        let contract = IUniswapV2Pair::new(pair, Arc::clone(&self.provider));
        let receipt = contract
            .skim(to)
            .send()
            .await
            .context("V2 skim: send failed")?
            .get_receipt()
            .await
            .context("V2 skim: no receipt returned")?;
        ensure_success(&receipt, "V2 skim")
    }

    async fn exact_input_single(&self, router: Address, params: &ExactInputSingle) -> Result<TxHash> {
        let contract = ISwapRouter::new(router, Arc::clone(&self.provider));

        // sqrtPriceLimitX96 = 0 means no price limit
        let call_params = ISwapRouter::ExactInputSingleParams {
            tokenIn: params.token_in,
            tokenOut: params.token_out,
            fee: fee_to_u24(params.fee),
            recipient: params.recipient,
            deadline: U256::from(params.deadline),
            amountIn: params.amount_in,
            amountOutMinimum: params.amount_out_minimum,
            sqrtPriceLimitX96: U160::ZERO,
        };

        let receipt = contract
            .exactInputSingle(call_params)
            .send()
            .await
            .context("V3 swap: send failed")?
            .get_receipt()
            .await
            .context("V3 swap: no receipt returned")?;
        ensure_success(&receipt, "V3 swap")
    }
}
