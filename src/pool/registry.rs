//! Pool Registry
//!
//! Ordered, append-only list of pool descriptors owned by the keeper.
//! Mutations take the caller explicitly and require it to be the operator;
//! reads are unrestricted. Descriptors are never removed, only deactivated.
//!
//! Edit and toggle resolve a descriptor by exchange address and act on the
//! first match only. Duplicates are accepted on register and double-count in
//! aggregation.

use crate::error::{KeeperError, KeeperResult};
use crate::types::PoolDescriptor;
use alloy::primitives::Address;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PoolRegistry {
    operator: Address,
    pools: Vec<PoolDescriptor>,
}

impl PoolRegistry {
    /// Create an empty registry administered by `operator`
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            pools: Vec::new(),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    fn ensure_operator(&self, caller: Address) -> KeeperResult<()> {
        if caller != self.operator {
            return Err(KeeperError::NotOperator);
        }
        Ok(())
    }

    /// Hand the registry over to a new operator
    pub fn transfer_operator(&mut self, caller: Address, new_operator: Address) -> KeeperResult<()> {
        self.ensure_operator(caller)?;
        if new_operator == Address::ZERO {
            return Err(KeeperError::ZeroAddress);
        }
        info!("Operator transferred: {:?} -> {:?}", self.operator, new_operator);
        self.operator = new_operator;
        Ok(())
    }

    /// Append a descriptor. Returns its index.
    pub fn register(&mut self, caller: Address, pool: PoolDescriptor) -> KeeperResult<usize> {
        self.ensure_operator(caller)?;
        if pool.has_zero_address() {
            return Err(KeeperError::ZeroAddress);
        }

        info!(
            "Registered {} pool #{}: exchange={:?} native={:?} stable={:?} pegged={}",
            pool.kind,
            self.pools.len(),
            pool.exchange,
            pool.native_token,
            pool.stable_token,
            pool.is_pegged
        );
        self.pools.push(pool);
        Ok(self.pools.len() - 1)
    }

    /// Replace the first descriptor whose exchange address is `exchange`
    pub fn edit(
        &mut self,
        caller: Address,
        exchange: Address,
        updated: PoolDescriptor,
    ) -> KeeperResult<usize> {
        self.ensure_operator(caller)?;
        if updated.has_zero_address() {
            return Err(KeeperError::ZeroAddress);
        }

        let index = self
            .pools
            .iter()
            .position(|p| p.exchange == exchange)
            .ok_or(KeeperError::PoolNotFound)?;

        info!("Edited pool #{} ({:?}): {:?}", index, exchange, updated);
        self.pools[index] = updated;
        Ok(index)
    }

    /// Flip `active` on the first non-pegged descriptor with this exchange address.
    /// Pegged descriptors always stay visible to the correction logic.
    pub fn toggle_active(&mut self, caller: Address, exchange: Address) -> KeeperResult<bool> {
        self.ensure_operator(caller)?;

        let pool = self
            .pools
            .iter_mut()
            .find(|p| p.exchange == exchange && !p.is_pegged)
            .ok_or(KeeperError::PoolNotFound)?;

        pool.active = !pool.active;
        info!("Pool {:?} active={}", exchange, pool.active);
        Ok(pool.active)
    }

    pub fn pools(&self) -> &[PoolDescriptor] {
        &self.pools
    }

    pub fn get(&self, index: usize) -> Option<&PoolDescriptor> {
        self.pools.get(index)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Count of (active, pegged) descriptors, for status output
    pub fn stats(&self) -> (usize, usize) {
        let active = self.pools.iter().filter(|p| p.active).count();
        let pegged = self.pools.iter().filter(|p| p.is_pegged).count();
        debug!("Registry: {} pools, {} active, {} pegged", self.pools.len(), active, pegged);
        (active, pegged)
    }
}
