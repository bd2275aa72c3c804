//! Peg Keeper
//!
//! Ties the pipeline together: aggregate → plan → execute.
//! Every pass starts from scratch by re-reading reserves; nothing is kept
//! between passes except the registry the caller owns.

use crate::chain::{ChainReader, ChainWriter};
use crate::correction::aggregator::{Normalization, RateAggregator};
use crate::correction::executor::{CorrectionExecutor, ExecutorSettings};
use crate::correction::planner::CorrectionPlanner;
use crate::correction::policy::{NoMinimum, SlippagePolicy};
use crate::error::{KeeperError, KeeperResult};
use crate::pool::{PoolRegistry, ReserveReader};
use crate::types::{AggregateRate, CorrectionPlan, CorrectionReport, PoolVersion};
use alloy::primitives::Address;
use std::sync::Arc;
use tracing::info;

/// Everything a keeper needs besides the chain and the registry
#[derive(Debug, Clone, Default)]
pub struct KeeperSettings {
    pub normalization: Normalization,
    pub executor: ExecutorSettings,
}

pub struct PegKeeper<C> {
    chain: Arc<C>,
    aggregator: RateAggregator<C>,
    planner: CorrectionPlanner<C>,
    settings: KeeperSettings,
    policy: Arc<dyn SlippagePolicy>,
}

impl<C: ChainReader> PegKeeper<C> {
    pub fn new(chain: Arc<C>, settings: KeeperSettings) -> Self {
        let reader = ReserveReader::new(Arc::clone(&chain));
        Self {
            aggregator: RateAggregator::new(reader.clone(), settings.normalization),
            planner: CorrectionPlanner::new(reader),
            chain,
            settings,
            policy: Arc::new(NoMinimum),
        }
    }

    /// Replace the minimum-output policy used when executing
    pub fn with_policy(mut self, policy: Arc<dyn SlippagePolicy>) -> Self {
        info!("Slippage policy: {}", policy.name());
        self.policy = policy;
        self
    }

    pub fn settings(&self) -> &KeeperSettings {
        &self.settings
    }

    /// Aggregate (total_native, total_stable) for `version`
    pub async fn aggregate_rate(
        &self,
        registry: &PoolRegistry,
        version: PoolVersion,
    ) -> KeeperResult<AggregateRate> {
        self.aggregator.aggregate(registry, version).await
    }

    /// Aggregate then plan, without executing
    pub async fn plan(
        &self,
        registry: &PoolRegistry,
        version: PoolVersion,
    ) -> KeeperResult<(AggregateRate, CorrectionPlan)> {
        let aggregate = self.aggregator.aggregate(registry, version).await?;
        let plan = self.planner.plan(registry, version, &aggregate).await?;
        Ok((aggregate, plan))
    }
}

impl<C: ChainWriter> PegKeeper<C> {
    /// One correction pass for `version` triggered by `caller`
    pub async fn correct(
        &self,
        caller: Address,
        registry: &PoolRegistry,
        version: PoolVersion,
    ) -> KeeperResult<CorrectionReport> {
        let executor = CorrectionExecutor::new(
            Arc::clone(&self.chain),
            self.settings.executor.clone(),
            Arc::clone(&self.policy),
        );
        executor.authorize(caller, registry, version)?;

        let aggregate = self.aggregator.aggregate(registry, version).await?;
        if aggregate.is_zero() {
            return Err(KeeperError::NoLiquidity);
        }

        let plan = self.planner.plan(registry, version, &aggregate).await?;
        let swaps = executor.execute(caller, registry, version, &plan).await?;

        Ok(CorrectionReport::new(
            version,
            self.settings.executor.dry_run,
            &aggregate,
            &plan,
            swaps,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{MockCall, MockChain};
    use crate::correction::aggregator::StableDecimals;
    use crate::types::{PoolDescriptor, PoolKind, SwapDirection};
    use alloy::primitives::U256;

    const NATIVE: u8 = 0x11;
    const USDC: u8 = 0x22;
    const USDM: u8 = 0x33;

    fn addr(b: u8) -> Address {
        Address::with_last_byte(b)
    }

    fn operator() -> Address {
        addr(0xAA)
    }

    fn settings(dry_run: bool) -> KeeperSettings {
        KeeperSettings {
            normalization: Normalization {
                common_decimals: 18,
                stable_decimals: StableDecimals::Fixed(18),
            },
            executor: ExecutorSettings {
                v3_router: Some(addr(0xEE)),
                dry_run,
                ..ExecutorSettings::default()
            },
        }
    }

    /// Two market pools (100, 200_000) and (50, 100_000) plus one pegged pool
    fn scenario(pegged_stable: u128) -> (Arc<MockChain>, PoolRegistry) {
        let chain = Arc::new(MockChain::new(operator()));
        chain.add_v2_pair(addr(0xF1), addr(NATIVE), addr(USDC), 100, 200_000);
        chain.add_v2_pair(addr(0xF2), addr(NATIVE), addr(USDC), 50, 100_000);
        chain.add_v2_pair(addr(0xF3), addr(NATIVE), addr(USDM), 25, pegged_stable);

        let mut registry = PoolRegistry::new(operator());
        for (factory, stable, pegged) in [(0xF1, USDC, false), (0xF2, USDC, false), (0xF3, USDM, true)] {
            registry
                .register(
                    operator(),
                    PoolDescriptor::new(addr(factory), PoolKind::ConstantProduct, addr(NATIVE), addr(stable), pegged),
                )
                .unwrap();
        }
        (chain, registry)
    }

    #[tokio::test]
    async fn test_scenario_a_balanced_pool_needs_nothing() {
        let (chain, registry) = scenario(50_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        let (aggregate, plan) = keeper.plan(&registry, PoolVersion::V2).await.unwrap();
        assert_eq!(aggregate, AggregateRate::new(U256::from(150), U256::from(300_000)));
        assert_eq!(aggregate.average().1, U256::from(2000));
        assert!(plan.is_zero());

        let report = keeper.correct(operator(), &registry, PoolVersion::V2).await.unwrap();
        assert!(report.swaps.is_empty());
        assert!(report.plan.is_empty());
        assert!(chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_b_overvalued_pool_takes_native() {
        let (chain, registry) = scenario(55_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        let report = keeper.correct(operator(), &registry, PoolVersion::V2).await.unwrap();

        assert_eq!(report.plan.len(), 1);
        assert_eq!(report.plan[0].pool_index, 2);
        assert_eq!(report.plan[0].direction, Some(SwapDirection::NativeIn));
        assert_eq!(report.swaps.len(), 1);
        assert_eq!(report.swaps[0].token_in, format!("{:?}", addr(NATIVE)));

        let calls = chain.calls();
        assert!(matches!(
            calls[0],
            MockCall::Transfer { token, amount, .. } if token == addr(NATIVE) && amount == U256::from(2)
        ));
        assert!(matches!(calls[1], MockCall::PairSwap { .. }));
    }

    #[tokio::test]
    async fn test_scenario_c_undervalued_pool_takes_stable() {
        let (chain, registry) = scenario(45_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        let report = keeper.correct(operator(), &registry, PoolVersion::V2).await.unwrap();

        assert_eq!(report.plan[0].direction, Some(SwapDirection::StableIn));
        assert_eq!(report.plan[0].stable_to_move, "5000");
        assert!(matches!(
            chain.calls()[0],
            MockCall::Transfer { token, amount, .. } if token == addr(USDM) && amount == U256::from(5_000)
        ));
    }

    #[tokio::test]
    async fn test_scenario_d_deactivation_changes_aggregate() {
        let (chain, mut registry) = scenario(50_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(true));

        registry.toggle_active(operator(), addr(0xF2)).unwrap();
        let aggregate = keeper.aggregate_rate(&registry, PoolVersion::V2).await.unwrap();
        assert_eq!(aggregate.total_native, U256::from(100));

        registry.toggle_active(operator(), addr(0xF2)).unwrap();
        registry.toggle_active(operator(), addr(0xF1)).unwrap();
        let aggregate = keeper.aggregate_rate(&registry, PoolVersion::V2).await.unwrap();
        assert_eq!(aggregate.total_native, U256::from(50));
    }

    #[tokio::test]
    async fn test_correct_without_liquidity_fails() {
        let chain = Arc::new(MockChain::new(operator()));
        let mut registry = PoolRegistry::new(operator());
        registry
            .register(
                operator(),
                PoolDescriptor::new(addr(0xF3), PoolKind::ConstantProduct, addr(NATIVE), addr(USDM), true),
            )
            .unwrap();
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        // Reads still succeed with an all-zero plan
        let (aggregate, plan) = keeper.plan(&registry, PoolVersion::V2).await.unwrap();
        assert!(aggregate.is_zero());
        assert!(plan.is_zero());

        let result = keeper.correct(operator(), &registry, PoolVersion::V2).await;
        assert!(matches!(result, Err(KeeperError::NoLiquidity)));
    }

    #[tokio::test]
    async fn test_correct_checks_privilege_before_reading() {
        let (chain, registry) = scenario(55_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        let result = keeper.correct(addr(0xBB), &registry, PoolVersion::V2).await;
        assert!(matches!(result, Err(KeeperError::NotOperator)));
        assert_eq!(chain.read_count(), 0);
    }

    #[tokio::test]
    async fn test_report_serializes() {
        let (chain, registry) = scenario(55_000);
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(true));

        let report = keeper.correct(operator(), &registry, PoolVersion::V2).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["version"], "v2");
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["aggregate"]["integer_rate"], "2000");
        assert_eq!(json["aggregate"]["basis"], "stable_per_native");
        assert_eq!(json["plan"][0]["direction"], "native_in");
        assert!(json["swaps"][0]["tx_hash"].is_null());
    }

    #[tokio::test]
    async fn test_v3_pass_plans_and_routes_through_router() {
        let chain = Arc::new(MockChain::new(operator()));
        chain.add_v3_pool(addr(0xF1), addr(NATIVE), addr(USDC), 500, 100, 200_000);
        chain.add_v3_pool(addr(0xF2), addr(NATIVE), addr(USDC), 3000, 50, 100_000);
        chain.add_v3_pool(addr(0xF3), addr(NATIVE), addr(USDM), 500, 25, 45_000);

        let mut registry = PoolRegistry::new(operator());
        for (factory, fee, stable, pegged) in [
            (0xF1, 500, USDC, false),
            (0xF2, 3000, USDC, false),
            (0xF3, 500, USDM, true),
        ] {
            registry
                .register(
                    operator(),
                    PoolDescriptor::new(
                        addr(factory),
                        PoolKind::ConcentratedLiquidity { fee },
                        addr(NATIVE),
                        addr(stable),
                        pegged,
                    ),
                )
                .unwrap();
        }
        let keeper = PegKeeper::new(Arc::clone(&chain), settings(false));

        let (aggregate, plan) = keeper.plan(&registry, PoolVersion::V3).await.unwrap();
        assert_eq!(aggregate, AggregateRate::new(U256::from(150), U256::from(300_000)));
        assert!(plan.entries[0].is_zero());
        assert!(plan.entries[1].is_zero());
        assert_eq!(plan.entries[2].direction, Some(SwapDirection::StableIn));
        assert_eq!(plan.entries[2].stable_to_move, U256::from(5_000));
        assert_eq!(plan.entries[2].native_to_move, U256::from(3));

        let report = keeper.correct(operator(), &registry, PoolVersion::V3).await.unwrap();
        assert_eq!(report.plan.len(), 1);
        assert_eq!(report.plan[0].pool_index, 2);
        assert_eq!(report.swaps.len(), 1);

        let calls = chain.calls();
        assert_eq!(
            calls[0],
            MockCall::Approve { token: addr(USDM), spender: addr(0xEE), amount: U256::MAX }
        );
        match &calls[1] {
            MockCall::ExactInputSingle { router, params } => {
                assert_eq!(*router, addr(0xEE));
                assert_eq!(params.token_in, addr(USDM));
                assert_eq!(params.token_out, addr(NATIVE));
                assert_eq!(params.fee, 500);
                assert_eq!(params.amount_in, U256::from(5_000));
                assert_eq!(params.amount_out_minimum, U256::ZERO);
                assert_eq!(params.recipient, operator());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }
}
