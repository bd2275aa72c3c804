//! Correction Executor
//!
//! Turns a correction plan into one swap per active pegged pool against the
//! pool's own exchange mechanism. The token the plan says the pool should
//! receive is the swap input; the planned amount of that token is the amount in.
//!
//! V2: push-then-call. The input is transferred into the pair, then
//!     `swap(amount0Out, amount1Out, recipient, "")` takes the output computed
//!     with the constant-product formula from freshly read reserves.
//! V3: `exactInputSingle` through the router, after making sure the router may
//!     pull the input token (allowance/approve).
//!
//! No retry: the first collaborator error aborts the remaining swaps of the
//! pass. A V2 swap that reverts after its input was pushed skims the pair back
//! to the sender before the error is returned.

use crate::chain::{ChainWriter, ExactInputSingle};
use crate::correction::policy::{ExecutePrivilege, SlippagePolicy, SwapQuote};
use crate::error::{KeeperError, KeeperResult};
use crate::pool::calculator::get_amount_out;
use crate::pool::{PoolRegistry, ReserveReader};
use crate::types::{CorrectionPlan, ExecutedSwap, PoolDescriptor, PoolKind, PoolVersion, SwapDirection};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Receiver of swap outputs (defaults to the sender)
    pub recipient: Option<Address>,
    /// V3 SwapRouter; required to correct V3 pools
    pub v3_router: Option<Address>,
    /// exactInputSingle deadline = now + deadline_secs
    pub deadline_secs: u64,
    pub privilege: ExecutePrivilege,
    /// Dry run mode - logs swaps without sending transactions
    pub dry_run: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            recipient: None,
            v3_router: None,
            deadline_secs: 300,
            privilege: ExecutePrivilege::default(),
            dry_run: true, // Default to dry run for safety
        }
    }
}

pub struct CorrectionExecutor<C> {
    chain: Arc<C>,
    reader: ReserveReader<C>,
    settings: ExecutorSettings,
    policy: Arc<dyn SlippagePolicy>,
}

impl<C: ChainWriter> CorrectionExecutor<C> {
    pub fn new(chain: Arc<C>, settings: ExecutorSettings, policy: Arc<dyn SlippagePolicy>) -> Self {
        if settings.dry_run {
            debug!("Executor in DRY RUN mode - swaps will be simulated");
        }
        Self {
            reader: ReserveReader::new(Arc::clone(&chain)),
            chain,
            settings,
            policy,
        }
    }

    fn recipient(&self) -> Address {
        self.settings.recipient.unwrap_or_else(|| self.chain.sender())
    }

    /// Fail unless `caller` may run a correction pass for `version`
    pub fn authorize(
        &self,
        caller: Address,
        registry: &PoolRegistry,
        version: PoolVersion,
    ) -> KeeperResult<()> {
        if self.settings.privilege.requires_operator(version) && caller != registry.operator() {
            return Err(KeeperError::NotOperator);
        }
        Ok(())
    }

    /// Issue at most one swap per active pegged pool of `version` with a non-zero plan entry
    pub async fn execute(
        &self,
        caller: Address,
        registry: &PoolRegistry,
        version: PoolVersion,
        plan: &CorrectionPlan,
    ) -> KeeperResult<Vec<ExecutedSwap>> {
        self.authorize(caller, registry, version)?;

        let mut swaps = Vec::new();

        for (index, pool) in registry.pools().iter().enumerate() {
            if !pool.active || !pool.is_pegged || pool.version() != version {
                continue;
            }

            let entry = plan.entries.get(index).copied().unwrap_or_default();
            let Some(direction) = entry.direction else {
                continue;
            };

            let amount_in = entry.amount_in();
            if amount_in.is_zero() {
                debug!(
                    "Pegged pool #{}: {} input truncated to zero, skipping",
                    index, direction
                );
                continue;
            }

            if let Some(swap) = self.correct_pool(index, pool, direction, amount_in).await? {
                swaps.push(swap);
            }
        }

        info!("{} correction pass: {} swap(s)", version, swaps.len());
        Ok(swaps)
    }

    async fn correct_pool(
        &self,
        index: usize,
        pool: &PoolDescriptor,
        direction: SwapDirection,
        amount_in: U256,
    ) -> KeeperResult<Option<ExecutedSwap>> {
        let Some(address) = self.reader.locate(pool).await? else {
            warn!(
                "Pegged pool #{} not deployed on {:?}, skipping correction",
                index, pool.exchange
            );
            return Ok(None);
        };

        let (token_in, token_out) = match direction {
            SwapDirection::NativeIn => (pool.native_token, pool.stable_token),
            SwapDirection::StableIn => (pool.stable_token, pool.native_token),
        };

        let (reserves, native_is_token0) = self.reader.read_oriented(pool, address).await?;
        let (reserve_in, reserve_out) = match direction {
            SwapDirection::NativeIn => (reserves.native, reserves.stable),
            SwapDirection::StableIn => (reserves.stable, reserves.native),
        };

        let quote = SwapQuote {
            pool: address,
            token_in,
            token_out,
            amount_in,
            expected_out: get_amount_out(amount_in, reserve_in, reserve_out),
        };
        let min_amount_out = self.policy.min_amount_out(&quote);

        info!(
            "Correcting {} pool #{} ({:?}): {} {} in, ~{} out (min {}, policy {})",
            pool.kind,
            index,
            address,
            direction,
            amount_in,
            quote.expected_out,
            min_amount_out,
            self.policy.name()
        );

        let tx_hash = match pool.kind {
            PoolKind::ConstantProduct => {
                if quote.expected_out.is_zero() {
                    debug!("Pegged pool #{}: quoted output is zero, skipping", index);
                    return Ok(None);
                }
                if quote.expected_out < min_amount_out {
                    return Err(KeeperError::InsufficientOutput);
                }
                // StableIn takes native out, NativeIn takes stable out
                let output_is_token0 = (direction == SwapDirection::StableIn) == native_is_token0;
                self.swap_v2(&quote, output_is_token0).await?
            }
            PoolKind::ConcentratedLiquidity { fee } => {
                let router = self
                    .settings
                    .v3_router
                    .ok_or(KeeperError::RouterNotConfigured)?;
                self.swap_v3(router, fee, &quote, min_amount_out).await?
            }
        };

        Ok(Some(ExecutedSwap {
            pool_index: index,
            pool: format!("{:?}", address),
            kind: pool.kind.to_string(),
            token_in: format!("{:?}", token_in),
            token_out: format!("{:?}", token_out),
            amount_in: amount_in.to_string(),
            expected_out: quote.expected_out.to_string(),
            min_amount_out: min_amount_out.to_string(),
            tx_hash,
        }))
    }

    /// Push input into the pair, then pull the quoted output
    async fn swap_v2(&self, quote: &SwapQuote, output_is_token0: bool) -> KeeperResult<Option<String>> {
        let (amount0_out, amount1_out) = if output_is_token0 {
            (quote.expected_out, U256::ZERO)
        } else {
            (U256::ZERO, quote.expected_out)
        };

        if self.settings.dry_run {
            info!(
                "DRY RUN: would transfer {} of {:?} to {:?} and swap({}, {})",
                quote.amount_in, quote.token_in, quote.pool, amount0_out, amount1_out
            );
            return Ok(None);
        }

        self.chain
            .transfer(quote.token_in, quote.pool, quote.amount_in)
            .await?;
        let tx_hash = match self
            .chain
            .pair_swap(quote.pool, amount0_out, amount1_out, self.recipient())
            .await
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                warn!("V2 swap on {:?} failed, skimming input back: {:#}", quote.pool, e);
                if let Err(skim_err) = self.chain.pair_skim(quote.pool, self.chain.sender()).await {
                    warn!(
                        "Skim of {:?} failed, {} of {:?} left in the pair: {:#}",
                        quote.pool, quote.amount_in, quote.token_in, skim_err
                    );
                }
                return Err(e.into());
            }
        };

        info!("V2 correction swap confirmed: {:?}", tx_hash);
        Ok(Some(format!("{:?}", tx_hash)))
    }

    async fn swap_v3(
        &self,
        router: Address,
        fee: u32,
        quote: &SwapQuote,
        min_amount_out: U256,
    ) -> KeeperResult<Option<String>> {
        let params = ExactInputSingle {
            token_in: quote.token_in,
            token_out: quote.token_out,
            fee,
            recipient: self.recipient(),
            deadline: (chrono::Utc::now().timestamp().max(0) as u64)
                .saturating_add(self.settings.deadline_secs),
            amount_in: quote.amount_in,
            amount_out_minimum: min_amount_out,
        };

        if self.settings.dry_run {
            info!(
                "DRY RUN: would exactInputSingle {} {:?} -> {:?} (fee {}) via {:?}",
                params.amount_in, params.token_in, params.token_out, fee, router
            );
            return Ok(None);
        }

        self.ensure_approval(quote.token_in, router, quote.amount_in)
            .await?;
        let tx_hash = self.chain.exact_input_single(router, &params).await?;

        info!("V3 correction swap confirmed: {:?}", tx_hash);
        Ok(Some(format!("{:?}", tx_hash)))
    }

    /// Ensure the router may pull `amount` of `token` from the sender
    async fn ensure_approval(&self, token: Address, router: Address, amount: U256) -> KeeperResult<()> {
        let allowance = self
            .chain
            .allowance(token, self.chain.sender(), router)
            .await?;

        if allowance >= amount {
            debug!("Sufficient allowance: {} >= {}", allowance, amount);
            return Ok(());
        }

        // Approve max uint256 for future corrections
        info!("Approving {:?} for router {:?}", token, router);
        self.chain.approve(token, router, U256::MAX).await?;
        Ok(())
    }
}
