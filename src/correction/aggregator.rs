//! Rate Aggregator
//!
//! Sums (native, stable) reserves across active market pools of one version,
//! with stable amounts rescaled to the common fixed-point scale first. If no
//! market pool contributes anything, the sum is repeated over every active
//! pool of that version, pegged ones included, so a caller still gets a rate.
//!
//! Pegged pools pair against USDM, which is already at the common scale, so
//! their stable side is never rescaled.

use crate::chain::ChainReader;
use crate::error::KeeperResult;
use crate::pool::calculator::scale_to_decimals;
use crate::pool::{PoolRegistry, ReserveReader};
use crate::types::{AggregateRate, PoolDescriptor, PoolVersion};
use alloy::primitives::U256;
use serde::Deserialize;
use tracing::debug;

/// How the decimals of a market pool's stable token are determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StableDecimals {
    /// Assume every external stablecoin has this many decimals
    Fixed(u8),
    /// Ask the token contract (`decimals()`)
    Query,
}

impl Default for StableDecimals {
    fn default() -> Self {
        StableDecimals::Fixed(6)
    }
}

/// Normalization of stable amounts before summation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalization {
    /// Native token precision; every stable amount is scaled to it
    pub common_decimals: u8,
    pub stable_decimals: StableDecimals,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            common_decimals: 18,
            stable_decimals: StableDecimals::default(),
        }
    }
}

pub struct RateAggregator<C> {
    reader: ReserveReader<C>,
    normalization: Normalization,
}

impl<C: ChainReader> RateAggregator<C> {
    pub fn new(reader: ReserveReader<C>, normalization: Normalization) -> Self {
        Self {
            reader,
            normalization,
        }
    }

    /// Aggregate (total_native, total_stable) for `version`.
    /// Zero-division is left to the caller.
    pub async fn aggregate(
        &self,
        registry: &PoolRegistry,
        version: PoolVersion,
    ) -> KeeperResult<AggregateRate> {
        let market = self.sum(registry, version, false).await?;
        if !market.is_zero() {
            debug!(
                "{} market aggregate: native={} stable={}",
                version, market.total_native, market.total_stable
            );
            return Ok(market);
        }

        debug!("{} market aggregate is empty, including pegged pools", version);
        self.sum(registry, version, true).await
    }

    async fn sum(
        &self,
        registry: &PoolRegistry,
        version: PoolVersion,
        include_pegged: bool,
    ) -> KeeperResult<AggregateRate> {
        let mut aggregate = AggregateRate::default();

        let qualifying = registry
            .pools()
            .iter()
            .filter(|p| p.active && p.version() == version)
            .filter(|p| include_pegged || !p.is_pegged);

        for pool in qualifying {
            let snapshot = self.reader.read(pool).await?;
            let stable = self.normalize_stable(pool, snapshot.stable).await?;
            aggregate.add(snapshot.native, stable);
        }

        Ok(aggregate)
    }

    async fn normalize_stable(&self, pool: &PoolDescriptor, amount: U256) -> KeeperResult<U256> {
        if pool.is_pegged || amount.is_zero() {
            return Ok(amount);
        }

        let decimals = match self.normalization.stable_decimals {
            StableDecimals::Fixed(decimals) => decimals,
            StableDecimals::Query => self.reader.chain().decimals(pool.stable_token).await?,
        };

        Ok(scale_to_decimals(
            amount,
            decimals,
            self.normalization.common_decimals,
        ))
    }
}
