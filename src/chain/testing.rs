//! In-memory chain for unit tests
//!
//! Factories resolve pools by sorted token pair, V2 pairs keep reserves in
//! token0/token1 order, V3 pools only hold token balances. Writes are recorded
//! in order so tests can assert on the exact swap sequence.

use super::{ChainReader, ChainWriter, ExactInputSingle};
use alloy::primitives::{Address, TxHash, U256};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Approve { token: Address, spender: Address, amount: U256 },
    Transfer { token: Address, to: Address, amount: U256 },
    PairSwap { pair: Address, amount0_out: U256, amount1_out: U256, to: Address },
    PairSkim { pair: Address, to: Address },
    ExactInputSingle { router: Address, params: ExactInputSingle },
}

#[derive(Default)]
struct MockState {
    pairs: HashMap<(Address, Address, Address), Address>,
    pools: HashMap<(Address, Address, Address, u32), Address>,
    reserves: HashMap<Address, (U256, U256)>,
    token0: HashMap<Address, Address>,
    balances: HashMap<(Address, Address), U256>,
    decimals: HashMap<Address, u8>,
    allowances: HashMap<(Address, Address, Address), U256>,
    calls: Vec<MockCall>,
    reads: usize,
    next_pool: u64,
    fail_writes: bool,
    fail_pair_swap: Option<String>,
}

fn sorted(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct MockChain {
    sender: Address,
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            state: Mutex::new(MockState {
                next_pool: 0x1000,
                ..MockState::default()
            }),
        }
    }

    fn next_pool_address(state: &mut MockState) -> Address {
        state.next_pool += 1;
        Address::left_padding_from(&state.next_pool.to_be_bytes())
    }

    /// Deploy a V2 pair; reserves are given in (native, stable) orientation
    pub fn add_v2_pair(
        &self,
        factory: Address,
        native: Address,
        stable: Address,
        reserve_native: u128,
        reserve_stable: u128,
    ) -> Address {
        let mut state = self.state.lock().unwrap();
        let pair = Self::next_pool_address(&mut state);
        let (lo, hi) = sorted(native, stable);
        state.pairs.insert((factory, lo, hi), pair);
        state.token0.insert(pair, lo);
        let reserves = if lo == native {
            (U256::from(reserve_native), U256::from(reserve_stable))
        } else {
            (U256::from(reserve_stable), U256::from(reserve_native))
        };
        state.reserves.insert(pair, reserves);
        pair
    }

    /// Deploy a V3 pool holding the given balances
    pub fn add_v3_pool(
        &self,
        factory: Address,
        native: Address,
        stable: Address,
        fee: u32,
        balance_native: u128,
        balance_stable: u128,
    ) -> Address {
        let mut state = self.state.lock().unwrap();
        let pool = Self::next_pool_address(&mut state);
        let (lo, hi) = sorted(native, stable);
        state.pools.insert((factory, lo, hi, fee), pool);
        state.token0.insert(pool, lo);
        state.balances.insert((native, pool), U256::from(balance_native));
        state.balances.insert((stable, pool), U256::from(balance_stable));
        pool
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.state.lock().unwrap().decimals.insert(token, decimals);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token, owner, spender), amount);
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    /// Make every pair `swap` revert with `reason`; other writes still succeed
    pub fn fail_pair_swaps(&self, reason: &str) {
        self.state.lock().unwrap().fail_pair_swap = Some(reason.to_string());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of read calls served so far
    pub fn read_count(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    fn record(&self, call: MockCall) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            bail!("execution reverted");
        }
        state.calls.push(call);
        Ok(TxHash::with_last_byte(state.calls.len() as u8))
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let (lo, hi) = sorted(token_a, token_b);
        Ok(state.pairs.get(&(factory, lo, hi)).copied().unwrap_or(Address::ZERO))
    }

    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
        fee: u32,
    ) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        let (lo, hi) = sorted(token_a, token_b);
        Ok(state.pools.get(&(factory, lo, hi, fee)).copied().unwrap_or(Address::ZERO))
    }

    async fn get_reserves(&self, pair: Address) -> Result<(U256, U256)> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match state.reserves.get(&pair) {
            Some(reserves) => Ok(*reserves),
            None => bail!("no pair at {:?}", pair),
        }
    }

    async fn token0(&self, pool: Address) -> Result<Address> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match state.token0.get(&pool) {
            Some(token) => Ok(*token),
            None => bail!("no pool at {:?}", pool),
        }
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state.balances.get(&(token, owner)).copied().unwrap_or(U256::ZERO))
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state.decimals.get(&token).copied().unwrap_or(18))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        Ok(state
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<TxHash> {
        let hash = self.record(MockCall::Approve { token, spender, amount })?;
        self.set_allowance(token, self.sender, spender, amount);
        Ok(hash)
    }

    async fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<TxHash> {
        self.record(MockCall::Transfer { token, to, amount })
    }

    async fn pair_swap(
        &self,
        pair: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<TxHash> {
        if let Some(reason) = self.state.lock().unwrap().fail_pair_swap.clone() {
            bail!("{}", reason);
        }
        self.record(MockCall::PairSwap {
            pair,
            amount0_out,
            amount1_out,
            to,
        })
    }

    async fn pair_skim(&self, pair: Address, to: Address) -> Result<TxHash> {
        self.record(MockCall::PairSkim { pair, to })
    }

    async fn exact_input_single(&self, router: Address, params: &ExactInputSingle) -> Result<TxHash> {
        self.record(MockCall::ExactInputSingle {
            router,
            params: params.clone(),
        })
    }
}
