//! Correction Planner
//!
//! For each active pegged pool, compares its own (native, stable) reserves
//! against the aggregate rate and computes how much of each token should move
//! to bring it back in line.
//!
//! The aggregate rate is an integer quotient taken on whichever side is larger
//! (see `AggregateRate::average`), which gives four branches:
//!
//! | basis              | pool state                    | pool receives |
//! |--------------------|-------------------------------|---------------|
//! | native per stable  | rs * rate > rn (short native) | native        |
//! | native per stable  | otherwise                     | stable        |
//! | stable per native  | rn * rate > rs (short stable) | stable        |
//! | stable per native  | otherwise                     | native        |
//!
//! A rate that truncates to zero skips the pool. The plan stays index-aligned
//! with the registry; non-qualifying pools keep zero entries.

use crate::chain::ChainReader;
use crate::error::KeeperResult;
use crate::pool::calculator::{div_or_zero, saturating_sub};
use crate::pool::{PoolRegistry, ReserveReader};
use crate::types::{
    AggregateRate, CorrectionPlan, PlanEntry, PoolVersion, RateBasis, ReserveSnapshot, SwapDirection,
};
use tracing::debug;

/// Plan entry for one pegged pool with `reserves` against `aggregate`
pub fn plan_entry(aggregate: &AggregateRate, reserves: &ReserveSnapshot) -> PlanEntry {
    let (basis, rate) = aggregate.average();
    if rate.is_zero() {
        return PlanEntry::default();
    }

    let (rn, rs) = (reserves.native, reserves.stable);

    let (native_to_move, stable_to_move, direction) = match basis {
        RateBasis::NativePerStable => {
            let target_native = rs.saturating_mul(rate);
            if target_native > rn {
                (
                    target_native - rn,
                    saturating_sub(rs, div_or_zero(rn, rate)),
                    SwapDirection::NativeIn,
                )
            } else {
                (
                    rn - target_native,
                    saturating_sub(div_or_zero(rn, rate), rs),
                    SwapDirection::StableIn,
                )
            }
        }
        RateBasis::StablePerNative => {
            let target_stable = rn.saturating_mul(rate);
            if target_stable > rs {
                (
                    saturating_sub(rn, div_or_zero(rs, rate)),
                    target_stable - rs,
                    SwapDirection::StableIn,
                )
            } else {
                (
                    saturating_sub(div_or_zero(rs, rate), rn),
                    rs - target_stable,
                    SwapDirection::NativeIn,
                )
            }
        }
    };

    let mut entry = PlanEntry {
        native_to_move,
        stable_to_move,
        direction: Some(direction),
    };
    if entry.is_zero() {
        entry.direction = None;
    }
    entry
}

pub struct CorrectionPlanner<C> {
    reader: ReserveReader<C>,
}

impl<C: ChainReader> CorrectionPlanner<C> {
    pub fn new(reader: ReserveReader<C>) -> Self {
        Self { reader }
    }

    pub async fn plan(
        &self,
        registry: &PoolRegistry,
        version: PoolVersion,
        aggregate: &AggregateRate,
    ) -> KeeperResult<CorrectionPlan> {
        let mut plan = CorrectionPlan::zeroed(registry.len());
        if aggregate.is_zero() {
            debug!("{} aggregate is zero, nothing to plan", version);
            return Ok(plan);
        }

        if aggregate.average().1.is_zero() {
            debug!(
                "{} average rate truncates to zero (native={} stable={}), skipping",
                version, aggregate.total_native, aggregate.total_stable
            );
            return Ok(plan);
        }

        for (index, pool) in registry.pools().iter().enumerate() {
            if !pool.active || !pool.is_pegged || pool.version() != version {
                continue;
            }

            let reserves = self.reader.read(pool).await?;
            let entry = plan_entry(aggregate, &reserves);

            debug!(
                "Pegged pool #{} ({:?}): reserves=({}, {}) -> native={} stable={} {:?}",
                index,
                pool.exchange,
                reserves.native,
                reserves.stable,
                entry.native_to_move,
                entry.stable_to_move,
                entry.direction
            );
            plan.entries[index] = entry;
        }

        Ok(plan)
    }
}
