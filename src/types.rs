//! Core data structures for the peg keeper
//!
//! Pool descriptors, reserve snapshots, aggregate rates and correction plans.
//! Snapshots, aggregates and plans are ephemeral: every pass re-reads them.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Pool versions the keeper can aggregate and correct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolVersion {
    V2, // constant product (getReserves)
    V3, // concentrated liquidity (raw balances)
}

impl fmt::Display for PoolVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolVersion::V2 => write!(f, "V2"),
            PoolVersion::V3 => write!(f, "V3"),
        }
    }
}

impl FromStr for PoolVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v2" | "constant_product" => Ok(PoolVersion::V2),
            "v3" | "concentrated_liquidity" => Ok(PoolVersion::V3),
            other => anyhow::bail!("Unknown pool kind: '{}'. Supported: v2, v3", other),
        }
    }
}

/// Reserve-read / swap-execute strategy of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Factory `getPair`, pair `getReserves`, pair `swap`
    ConstantProduct,
    /// Factory `getPool(fee)`, token balances of the pool, router `exactInputSingle`
    ConcentratedLiquidity { fee: u32 },
}

impl PoolKind {
    pub fn version(&self) -> PoolVersion {
        match self {
            PoolKind::ConstantProduct => PoolVersion::V2,
            PoolKind::ConcentratedLiquidity { .. } => PoolVersion::V3,
        }
    }

    /// Fee tier (500 = 0.05%, 3000 = 0.30%, 10000 = 1.00%), V3 only
    pub fn fee_tier(&self) -> Option<u32> {
        match self {
            PoolKind::ConstantProduct => None,
            PoolKind::ConcentratedLiquidity { fee } => Some(*fee),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolKind::ConstantProduct => write!(f, "V2"),
            PoolKind::ConcentratedLiquidity { fee } => {
                write!(f, "V3_{:.2}%", *fee as f64 / 10000.0)
            }
        }
    }
}

/// One registered exchange pool
///
/// Orientation is declared: `native_token` is whatever the operator says it is,
/// never inferred from the pool's token ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDescriptor {
    /// Factory the pool is resolved through
    pub exchange: Address,
    pub kind: PoolKind,
    pub native_token: Address,
    pub stable_token: Address,
    /// Inactive descriptors are excluded from aggregation, planning and execution
    pub active: bool,
    /// Pool pairs native against USDM (corrected) instead of an external stablecoin (market)
    pub is_pegged: bool,
}

impl PoolDescriptor {
    pub fn new(
        exchange: Address,
        kind: PoolKind,
        native_token: Address,
        stable_token: Address,
        is_pegged: bool,
    ) -> Self {
        Self {
            exchange,
            kind,
            native_token,
            stable_token,
            active: true,
            is_pegged,
        }
    }

    pub fn version(&self) -> PoolVersion {
        self.kind.version()
    }

    /// True if any of the identifying addresses is zero
    pub fn has_zero_address(&self) -> bool {
        self.exchange == Address::ZERO
            || self.native_token == Address::ZERO
            || self.stable_token == Address::ZERO
    }
}

/// Two-sided reserves oriented as (native, stable), read live at call time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReserveSnapshot {
    pub native: U256,
    pub stable: U256,
}

impl ReserveSnapshot {
    pub fn new(native: U256, stable: U256) -> Self {
        Self { native, stable }
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_zero() && self.stable.is_zero()
    }
}

/// Which aggregate side dominates, and therefore which way the integer rate is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    /// total_native > total_stable: rate = native units per stable unit
    NativePerStable,
    /// total_stable >= total_native: rate = stable units per native unit
    StablePerNative,
}

/// Summed (native, stable) across qualifying pools, both at the common scale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateRate {
    pub total_native: U256,
    pub total_stable: U256,
}

impl AggregateRate {
    pub fn new(total_native: U256, total_stable: U256) -> Self {
        Self {
            total_native,
            total_stable,
        }
    }

    /// No liquidity anywhere
    pub fn is_zero(&self) -> bool {
        self.total_native.is_zero() && self.total_stable.is_zero()
    }

    pub fn add(&mut self, native: U256, stable: U256) {
        self.total_native = self.total_native.saturating_add(native);
        self.total_stable = self.total_stable.saturating_add(stable);
    }

    /// Integer average rate, truncated. Zero when the divisor side is empty.
    pub fn average(&self) -> (RateBasis, U256) {
        if self.total_native > self.total_stable {
            (
                RateBasis::NativePerStable,
                crate::pool::calculator::div_or_zero(self.total_native, self.total_stable),
            )
        } else {
            (
                RateBasis::StablePerNative,
                crate::pool::calculator::div_or_zero(self.total_stable, self.total_native),
            )
        }
    }

    /// Stable per native as a decimal, for reports. None when native is zero
    /// or the ratio itself does not fit a Decimal.
    pub fn stable_per_native(&self) -> Option<Decimal> {
        // Decimal holds 28 digits: drop the same low digits from both totals
        let limit = U256::from(10u64).pow(U256::from(27));
        let ten = U256::from(10u64);
        let (mut native, mut stable) = (self.total_native, self.total_stable);
        while native > limit || stable > limit {
            native /= ten;
            stable /= ten;
        }

        let native = Decimal::from_str(&native.to_string()).ok()?;
        let stable = Decimal::from_str(&stable.to_string()).ok()?;
        stable.checked_div(native)
    }
}

/// Token the pegged pool should receive; it is the input of the correcting swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Pool is short on native: sell native into it, take stable (USDM) out
    NativeIn,
    /// Pool is short on stable: sell stable (USDM) into it, take native out
    StableIn,
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SwapDirection::NativeIn => write!(f, "native->stable"),
            SwapDirection::StableIn => write!(f, "stable->native"),
        }
    }
}

/// Planned movement for one descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanEntry {
    pub native_to_move: U256,
    pub stable_to_move: U256,
    /// None for zero entries
    pub direction: Option<SwapDirection>,
}

impl PlanEntry {
    pub fn is_zero(&self) -> bool {
        self.native_to_move.is_zero() && self.stable_to_move.is_zero()
    }

    /// Amount of the token the pool receives
    pub fn amount_in(&self) -> U256 {
        match self.direction {
            Some(SwapDirection::NativeIn) => self.native_to_move,
            Some(SwapDirection::StableIn) => self.stable_to_move,
            None => U256::ZERO,
        }
    }
}

/// Per-descriptor plan, index-aligned with the registry (sparse: zero for non-qualifying pools)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionPlan {
    pub entries: Vec<PlanEntry>,
}

impl CorrectionPlan {
    pub fn zeroed(len: usize) -> Self {
        Self {
            entries: vec![PlanEntry::default(); len],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.entries.iter().all(PlanEntry::is_zero)
    }

    /// Parallel arrays as exposed by the read surface: (native amounts, stable amounts)
    pub fn amounts(&self) -> (Vec<U256>, Vec<U256>) {
        self.entries
            .iter()
            .map(|e| (e.native_to_move, e.stable_to_move))
            .unzip()
    }
}

/// Swap issued (or simulated) by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutedSwap {
    pub pool_index: usize,
    pub pool: String,
    pub kind: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub expected_out: String,
    pub min_amount_out: String,
    pub tx_hash: Option<String>,
}

/// Aggregate as reported
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub total_native: String,
    pub total_stable: String,
    pub basis: RateBasis,
    pub integer_rate: String,
    pub stable_per_native: Option<Decimal>,
}

impl From<&AggregateRate> for AggregateReport {
    fn from(aggregate: &AggregateRate) -> Self {
        let (basis, rate) = aggregate.average();
        let stable_per_native = aggregate.stable_per_native();
        if stable_per_native.is_none() && !aggregate.total_native.is_zero() {
            warn!(
                "Rate not representable as a decimal: native={} stable={}",
                aggregate.total_native, aggregate.total_stable
            );
        }
        Self {
            total_native: aggregate.total_native.to_string(),
            total_stable: aggregate.total_stable.to_string(),
            basis,
            integer_rate: rate.to_string(),
            stable_per_native,
        }
    }
}

/// Non-zero plan entry as reported
#[derive(Debug, Clone, Serialize)]
pub struct PlanReportEntry {
    pub pool_index: usize,
    pub native_to_move: String,
    pub stable_to_move: String,
    pub direction: Option<SwapDirection>,
}

/// Outcome of one correction pass
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    pub version: PoolVersion,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub dry_run: bool,
    pub aggregate: AggregateReport,
    pub plan: Vec<PlanReportEntry>,
    pub swaps: Vec<ExecutedSwap>,
}

impl CorrectionReport {
    pub fn new(
        version: PoolVersion,
        dry_run: bool,
        aggregate: &AggregateRate,
        plan: &CorrectionPlan,
        swaps: Vec<ExecutedSwap>,
    ) -> Self {
        let plan = plan
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_zero())
            .map(|(i, e)| PlanReportEntry {
                pool_index: i,
                native_to_move: e.native_to_move.to_string(),
                stable_to_move: e.stable_to_move.to_string(),
                direction: e.direction,
            })
            .collect();

        Self {
            version,
            timestamp: chrono::Utc::now(),
            dry_run,
            aggregate: AggregateReport::from(aggregate),
            plan,
            swaps,
        }
    }
}
