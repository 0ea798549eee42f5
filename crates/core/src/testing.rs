//! # In-Memory Host
//!
//! Ledgers, pools and a swap router that live entirely in memory. Used by
//! the unit and integration tests and by the scenario runner; enabled with
//! the `test-utils` feature.

use std::collections::{BTreeMap, BTreeSet};

use meridian_math::{get_sqrt_price_at_tick, mul_div_u128, BPS_DENOMINATOR, U256};

use crate::config::VaultConfig;
use crate::errors::{LedgerError, OracleError, OracleResult, SwapError, VaultResult};
use crate::interfaces::{
    AmmPool, AssetLedger, ExactInputSingle, Observations, OwnershipLedger, PoolDirectory,
    PoolState, SwapAdapter, SwapInstruction, SwapOutcome,
};
use crate::oracle::quote_at_tick;
use crate::types::{Address, CallContext};
use crate::vault::Vault;

/// Vault wired to the in-memory host
pub type MemoryVault = Vault<MemoryShareLedger, MemoryAssetLedger, MockRouter, MemoryPoolDirectory>;

// ============================================================================
// Asset Ledger
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLedger {
    balances: BTreeMap<(Address, Address), u128>,
    allowances: BTreeMap<(Address, Address, Address), u128>,
    /// Assets that reject changing a non-zero allowance to another non-zero value
    reset_required: BTreeSet<Address>,
}

impl MemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `asset` out of thin air
    pub fn mint(&mut self, asset: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let balance = self.balances.entry((*asset, *to)).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    pub fn require_approval_reset(&mut self, asset: &Address) {
        self.reset_required.insert(*asset);
    }

    /// Sum of every holder's balance of `asset`
    pub fn total_of(&self, asset: &Address) -> u128 {
        self.balances
            .iter()
            .filter(|((held, _), _)| held == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }

    fn debit(&mut self, asset: &Address, from: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(asset, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.balances.insert((*asset, *from), available - amount);
        Ok(())
    }
}

impl AssetLedger for MemoryAssetLedger {
    fn balance_of(&self, asset: &Address, owner: &Address) -> u128 {
        self.balances.get(&(*asset, *owner)).copied().unwrap_or(0)
    }

    fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        self.debit(asset, from, amount)?;
        self.mint(asset, to, amount)
    }

    fn transfer_from(
        &mut self,
        asset: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if spender != from {
            let available = self.allowance(asset, from, spender);
            if available < amount {
                return Err(LedgerError::InsufficientAllowance {
                    available,
                    requested: amount,
                });
            }
            self.allowances
                .insert((*asset, *from, *spender), available - amount);
        }
        self.transfer(asset, from, to, amount)
    }

    fn approve(
        &mut self,
        asset: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if self.reset_required.contains(asset)
            && amount != 0
            && self.allowance(asset, owner, spender) != 0
        {
            return Err(LedgerError::ApprovalNotReset);
        }
        self.allowances.insert((*asset, *owner, *spender), amount);
        Ok(())
    }
}

// ============================================================================
// Share Ledger
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryShareLedger {
    total_supply: u128,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<(Address, Address), u128>,
}

impl MemoryShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) {
        self.allowances.insert((*owner, *spender), amount);
    }
}

impl OwnershipLedger for MemoryShareLedger {
    fn total_supply(&self) -> u128 {
        self.total_supply
    }

    fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    fn mint(&mut self, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let supply = self.total_supply.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let balance = self.balance_of(to) + amount;
        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    fn burn(&mut self, from: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.balances.insert(*from, available - amount);
        self.total_supply -= amount;
        Ok(())
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        self.balances.insert(*from, available - amount);
        *self.balances.entry(*to).or_default() += amount;
        Ok(())
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let available = self.allowance(owner, spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                available,
                requested: amount,
            });
        }
        self.allowances.insert((*owner, *spender), available - amount);
        Ok(())
    }
}

// ============================================================================
// Pools
// ============================================================================

/// Seconds of history behind "now" in a mock pool's accumulators
const HISTORY_ANCHOR: u32 = 1_000_000;

/// Pool whose tick has been constant for its whole history unless the
/// accumulators are overridden
#[derive(Debug, Clone)]
pub struct MockPool {
    token0: Address,
    token1: Address,
    fee: u32,
    tick: i32,
    liquidity: u128,
    cardinality: u16,
    tick_cumulatives: Option<(i64, i64)>,
    max_history: Option<u32>,
}

impl MockPool {
    /// `tick` is the price of the higher address in units of the lower one
    pub fn new(token_a: Address, token_b: Address, fee: u32, tick: i32, liquidity: u128) -> Self {
        let (token0, token1) = sorted(token_a, token_b);
        Self {
            token0,
            token1,
            fee,
            tick,
            liquidity,
            cardinality: 100,
            tick_cumulatives: None,
            max_history: None,
        }
    }

    pub fn set_tick(&mut self, tick: i32) {
        self.tick = tick;
    }

    pub fn set_liquidity(&mut self, liquidity: u128) {
        self.liquidity = liquidity;
    }

    pub fn set_cardinality(&mut self, cardinality: u16) {
        self.cardinality = cardinality;
    }

    /// Fixed (older, newer) tick cumulatives returned by every observe call
    pub fn set_tick_cumulatives(&mut self, cumulatives: Option<(i64, i64)>) {
        self.tick_cumulatives = cumulatives;
    }

    /// Oldest observation available, in seconds ago
    pub fn set_max_history(&mut self, seconds: Option<u32>) {
        self.max_history = seconds;
    }

    fn elapsed_at(&self, seconds_ago: u32) -> OracleResult<u32> {
        let limit = self.max_history.unwrap_or(HISTORY_ANCHOR);
        if seconds_ago > limit {
            return Err(OracleError::PoolRead(format!(
                "observation {seconds_ago}s ago is older than the buffer ({limit}s)"
            )));
        }
        Ok(HISTORY_ANCHOR - seconds_ago)
    }
}

impl AmmPool for MockPool {
    fn token0(&self) -> Address {
        self.token0
    }

    fn token1(&self) -> Address {
        self.token1
    }

    fn fee(&self) -> u32 {
        self.fee
    }

    fn current_state(&self) -> OracleResult<PoolState> {
        Ok(PoolState {
            sqrt_price_x96: get_sqrt_price_at_tick(self.tick)?,
            tick: self.tick,
            observation_cardinality: self.cardinality,
        })
    }

    fn observe(&self, seconds_agos: &[u32]) -> OracleResult<Observations> {
        let mut tick_cumulatives = Vec::with_capacity(seconds_agos.len());
        let mut seconds_per_liquidity_cumulatives = Vec::with_capacity(seconds_agos.len());

        for &seconds_ago in seconds_agos {
            let elapsed = self.elapsed_at(seconds_ago)?;
            let tick_cumulative = match self.tick_cumulatives {
                Some((older, newer)) => {
                    if seconds_ago == 0 {
                        newer
                    } else {
                        older
                    }
                }
                None => i64::from(self.tick) * i64::from(elapsed),
            };
            tick_cumulatives.push(tick_cumulative);

            let per_liquidity =
                (U256::new(u128::from(elapsed)) << 128u32) / U256::new(self.liquidity.max(1));
            seconds_per_liquidity_cumulatives.push(per_liquidity);
        }

        Ok(Observations {
            tick_cumulatives,
            seconds_per_liquidity_cumulatives,
        })
    }

    fn liquidity(&self) -> OracleResult<u128> {
        Ok(self.liquidity)
    }
}

/// Pools keyed by sorted pair and fee tier
#[derive(Debug, Clone, Default)]
pub struct MemoryPoolDirectory {
    pools: BTreeMap<(Address, Address, u32), MockPool>,
}

impl MemoryPoolDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pool: MockPool) {
        self.pools.insert((pool.token0, pool.token1, pool.fee), pool);
    }

    pub fn pool_mut(&mut self, token_a: &Address, token_b: &Address, fee: u32) -> Option<&mut MockPool> {
        let (token0, token1) = sorted(*token_a, *token_b);
        self.pools.get_mut(&(token0, token1, fee))
    }

    /// Every pool of the pair, whatever its tier
    pub fn pair_mut(&mut self, token_a: &Address, token_b: &Address) -> impl Iterator<Item = &mut MockPool> {
        let (token0, token1) = sorted(*token_a, *token_b);
        self.pools
            .iter_mut()
            .filter(move |((a, b, _), _)| *a == token0 && *b == token1)
            .map(|(_, pool)| pool)
    }
}

impl PoolDirectory for MemoryPoolDirectory {
    fn pool(&self, token_a: &Address, token_b: &Address, fee: u32) -> Option<&dyn AmmPool> {
        let (token0, token1) = sorted(*token_a, *token_b);
        self.pools
            .get(&(token0, token1, fee))
            .map(|pool| pool as &dyn AmmPool)
    }
}

fn sorted(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

// ============================================================================
// Router
// ============================================================================

/// Swap venue that fills at fixed pool ticks out of its own reserves.
/// Every asset is quoted against one numeraire; other pairs route through it.
#[derive(Debug, Clone)]
pub struct MockRouter {
    address: Address,
    numeraire: Address,
    /// Pool tick of each (asset, numeraire) pair
    ticks: BTreeMap<Address, i32>,
    /// Price worsening applied to every fill
    haircut_bps: u32,
    /// Share of each fill withheld while still reporting the full amount
    short_delivery_bps: u32,
    rejecting: bool,
}

impl MockRouter {
    pub fn new(address: Address, numeraire: Address) -> Self {
        Self {
            address,
            numeraire,
            ticks: BTreeMap::new(),
            haircut_bps: 0,
            short_delivery_bps: 0,
            rejecting: false,
        }
    }

    pub fn set_tick(&mut self, asset: Address, tick: i32) {
        self.ticks.insert(asset, tick);
    }

    pub fn set_haircut_bps(&mut self, bps: u32) {
        self.haircut_bps = bps;
    }

    pub fn set_short_delivery_bps(&mut self, bps: u32) {
        self.short_delivery_bps = bps;
    }

    pub fn set_rejecting(&mut self, rejecting: bool) {
        self.rejecting = rejecting;
    }

    /// Output for `amount_in`, after the haircut
    pub fn quote(&self, token_in: &Address, token_out: &Address, amount_in: u128) -> Result<u128, SwapError> {
        let gross = if token_in == token_out {
            amount_in
        } else if *token_in == self.numeraire || *token_out == self.numeraire {
            self.quote_leg(token_in, token_out, amount_in)?
        } else {
            let value = self.quote_leg(token_in, &self.numeraire, amount_in)?;
            self.quote_leg(&self.numeraire, token_out, value)?
        };
        apply_bps_cut(gross, self.haircut_bps)
    }

    fn quote_leg(&self, token_in: &Address, token_out: &Address, amount_in: u128) -> Result<u128, SwapError> {
        let asset = if *token_in == self.numeraire { token_out } else { token_in };
        let tick = self
            .ticks
            .get(asset)
            .copied()
            .ok_or_else(|| SwapError::Rejected(format!("no market for {asset}")))?;
        quote_at_tick(tick, amount_in, token_in, token_out)
            .map_err(|err| SwapError::Rejected(err.to_string()))
    }

    /// Pull the input, check the minimum and pay out. Returns the amount
    /// reported to the caller.
    #[allow(clippy::too_many_arguments)]
    fn fill(
        &mut self,
        assets: &mut dyn AssetLedger,
        payer: &Address,
        recipient: &Address,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
        min_amount_out: u128,
        deadline: u64,
        now: u64,
    ) -> Result<u128, SwapError> {
        if self.rejecting {
            return Err(SwapError::Rejected("router paused".to_string()));
        }
        if now > deadline {
            return Err(SwapError::DeadlineExpired { deadline, now });
        }
        let amount_out = self.quote(token_in, token_out, amount_in)?;
        if amount_out < min_amount_out {
            return Err(SwapError::InsufficientOutput {
                amount_out,
                min_amount_out,
            });
        }

        let router = self.address;
        assets.transfer_from(token_in, &router, payer, &router, amount_in)?;
        let delivered = apply_bps_cut(amount_out, self.short_delivery_bps)?;
        assets.transfer(token_out, &router, recipient, delivered)?;
        Ok(amount_out)
    }
}

impl SwapAdapter for MockRouter {
    fn address(&self) -> Address {
        self.address
    }

    fn exact_input_single(
        &mut self,
        assets: &mut dyn AssetLedger,
        payer: &Address,
        params: &ExactInputSingle,
        now: u64,
    ) -> Result<u128, SwapError> {
        self.fill(
            assets,
            payer,
            &params.recipient,
            &params.token_in,
            &params.token_out,
            params.amount_in,
            params.min_amount_out,
            params.deadline,
            now,
        )
    }

    fn execute(
        &mut self,
        assets: &mut dyn AssetLedger,
        payer: &Address,
        instruction: &SwapInstruction,
        now: u64,
    ) -> Result<SwapOutcome, SwapError> {
        let amount_out = self.fill(
            assets,
            payer,
            payer,
            &instruction.token_in,
            &instruction.token_out,
            instruction.amount_in,
            instruction.min_amount_out,
            instruction.deadline,
            now,
        )?;
        Ok(SwapOutcome {
            amount_in: instruction.amount_in,
            amount_out,
        })
    }
}

fn apply_bps_cut(amount: u128, bps: u32) -> Result<u128, SwapError> {
    let keep = BPS_DENOMINATOR.saturating_sub(u128::from(bps));
    mul_div_u128(amount, keep, BPS_DENOMINATOR).map_err(|err| SwapError::Rejected(err.to_string()))
}

// ============================================================================
// Market Builder
// ============================================================================

/// Ledger, pools and router assembled from numeraire prices
#[derive(Debug, Clone)]
pub struct Market {
    pub assets: MemoryAssetLedger,
    pub pools: MemoryPoolDirectory,
    pub router: MockRouter,
}

impl Market {
    /// Create a vault over this market, with the manager pre-funded for any
    /// seed shares
    pub fn into_vault(
        mut self,
        address: Address,
        config: VaultConfig,
        now: u64,
    ) -> VaultResult<MemoryVault> {
        let seed = u128::from(config.seed_shares);
        if seed > 0 {
            self.assets.mint(&config.numeraire, &config.manager, seed)?;
            self.assets.approve(&config.numeraire, &config.manager, &address, seed)?;
        }
        Vault::new(
            address,
            config.clone(),
            MemoryShareLedger::new(),
            self.assets,
            self.router,
            self.pools,
            &CallContext::new(config.manager, now),
        )
    }
}

/// Builds a [`Market`] where every asset trades against the numeraire
#[derive(Debug, Clone)]
pub struct MarketBuilder {
    numeraire: Address,
    router: Address,
    fee_tier: u32,
    reserve: u128,
    /// (asset, price tick, liquidity)
    listings: Vec<(Address, i32, u128)>,
}

impl MarketBuilder {
    pub fn new(numeraire: Address, router: Address) -> Self {
        Self {
            numeraire,
            router,
            fee_tier: 3_000,
            reserve: 1_000_000_000_000_000_000,
            listings: Vec::new(),
        }
    }

    pub fn fee_tier(mut self, fee_tier: u32) -> Self {
        self.fee_tier = fee_tier;
        self
    }

    /// Router inventory of every listed asset and the numeraire
    pub fn reserve(mut self, reserve: u128) -> Self {
        self.reserve = reserve;
        self
    }

    /// List `asset` at a numeraire price of `1.0001^price_tick` per unit
    pub fn asset(mut self, asset: Address, price_tick: i32, liquidity: u128) -> Self {
        self.listings.push((asset, price_tick, liquidity));
        self
    }

    pub fn build(self) -> Result<Market, LedgerError> {
        let mut assets = MemoryAssetLedger::new();
        let mut pools = MemoryPoolDirectory::new();
        let mut router = MockRouter::new(self.router, self.numeraire);

        assets.mint(&self.numeraire, &self.router, self.reserve)?;
        for (asset, price_tick, liquidity) in self.listings {
            let pool_tick = pool_tick(&asset, &self.numeraire, price_tick);
            pools.insert(MockPool::new(asset, self.numeraire, self.fee_tier, pool_tick, liquidity));
            router.set_tick(asset, pool_tick);
            assets.mint(&asset, &self.router, self.reserve)?;
        }

        Ok(Market {
            assets,
            pools,
            router,
        })
    }
}

/// Pool tick of the (asset, numeraire) pair for a numeraire price of
/// `1.0001^price_tick` per unit of `asset`
pub fn pool_tick(asset: &Address, numeraire: &Address, price_tick: i32) -> i32 {
    if asset < numeraire {
        price_tick
    } else {
        -price_tick
    }
}
