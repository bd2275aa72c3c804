//! Reserve Reader
//!
//! Resolves a descriptor's pool through its factory and reads (native, stable)
//! reserves from it.
//!
//! Key differences between kinds:
//! - V2: `getReserves()` on the pair, oriented by comparing `token0()` with
//!   the declared native token
//! - V3: raw `balanceOf(pool)` of both tokens. This counts uncollected fees and
//!   stray transfers as liquidity, so the rate can be slightly off.
//!
//! A pair that is registered but not deployed resolves to the zero address
//! and reads as (0, 0).

use crate::chain::ChainReader;
use crate::types::{PoolDescriptor, PoolKind, ReserveSnapshot};
use alloy::primitives::Address;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

pub struct ReserveReader<C> {
    chain: Arc<C>,
}

impl<C> Clone for ReserveReader<C> {
    fn clone(&self) -> Self {
        Self {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<C: ChainReader> ReserveReader<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<C> {
        &self.chain
    }

    /// Pool address for a descriptor, None if the factory has no such pool
    pub async fn locate(&self, pool: &PoolDescriptor) -> Result<Option<Address>> {
        let address = match pool.kind {
            PoolKind::ConstantProduct => {
                self.chain
                    .get_pair(pool.exchange, pool.native_token, pool.stable_token)
                    .await?
            }
            PoolKind::ConcentratedLiquidity { fee } => {
                self.chain
                    .get_pool(pool.exchange, pool.native_token, pool.stable_token, fee)
                    .await?
            }
        };

        if address == Address::ZERO {
            return Ok(None);
        }
        Ok(Some(address))
    }

    /// Live (native, stable) reserves in natural token units
    pub async fn read(&self, pool: &PoolDescriptor) -> Result<ReserveSnapshot> {
        let Some(address) = self.locate(pool).await? else {
            debug!(
                "No {} pool deployed for {:?}/{:?} on {:?}, reading zero reserves",
                pool.kind, pool.native_token, pool.stable_token, pool.exchange
            );
            return Ok(ReserveSnapshot::default());
        };

        self.read_at(pool, address).await
    }

    /// Reserves of an already-resolved pool
    pub async fn read_at(&self, pool: &PoolDescriptor, address: Address) -> Result<ReserveSnapshot> {
        let (snapshot, _) = self.read_oriented(pool, address).await?;
        Ok(snapshot)
    }

    /// Reserves of an already-resolved pool, plus whether the native token is token0
    pub async fn read_oriented(
        &self,
        pool: &PoolDescriptor,
        address: Address,
    ) -> Result<(ReserveSnapshot, bool)> {
        let (snapshot, native_is_token0) = match pool.kind {
            PoolKind::ConstantProduct => {
                let (reserve0, reserve1) = self.chain.get_reserves(address).await?;
                let token0 = self.chain.token0(address).await?;
                if token0 == pool.native_token {
                    (ReserveSnapshot::new(reserve0, reserve1), true)
                } else {
                    (ReserveSnapshot::new(reserve1, reserve0), false)
                }
            }
            PoolKind::ConcentratedLiquidity { .. } => {
                let native = self.chain.balance_of(pool.native_token, address).await?;
                let stable = self.chain.balance_of(pool.stable_token, address).await?;
                // V3 pools sort their tokens by address
                (
                    ReserveSnapshot::new(native, stable),
                    pool.native_token < pool.stable_token,
                )
            }
        };

        debug!(
            "{} pool {:?}: native={} stable={}",
            pool.kind, address, snapshot.native, snapshot.stable
        );
        Ok((snapshot, native_is_token0))
    }
}
