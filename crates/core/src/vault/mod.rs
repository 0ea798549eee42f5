//! # Vault
//!
//! The fund engine. A [`Vault`] owns its configuration and mutable state and
//! holds capability references to the share ledger, the asset ledger, the
//! swap venue and the pool directory behind its oracle.
//!
//! Every entry point takes a [`CallContext`] and runs under the reentrancy
//! lock. State changes happen before external calls wherever the flow
//! allows it; balance deltas are checked after every external call.

mod admin;
mod deposit;
mod rebalance;
mod reentrancy;
mod state;
mod withdraw;

pub use deposit::{DepositQuote, DepositRequest};
pub use reentrancy::{ReentrancyGuard, ReentrancyStatus};
pub use state::VaultState;
pub use withdraw::SingleAssetRedeem;

use tracing::{debug, info, warn};

use crate::accounting::{compute_nav, share_price, NavReport, ValuationMode};
use crate::config::VaultConfig;
use crate::errors::{ErrorKind, VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::interfaces::{AssetLedger, OwnershipLedger, PoolDirectory, SwapAdapter};
use crate::oracle::TwapOracle;
use crate::types::{Address, AssetAmount, CallContext};

/// How a failed valuation inside a follow-up step is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CheckMode {
    /// Abort the call
    Strict,
    /// Skip the step with a warning
    BestEffort,
}

#[derive(Clone)]
pub struct Vault<L, A, S, P> {
    address: Address,
    config: VaultConfig,
    state: VaultState,
    shares: L,
    assets: A,
    swapper: S,
    oracle: TwapOracle<P>,
    events: Vec<VaultEvent>,
}

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger,
    A: AssetLedger,
    S: SwapAdapter,
    P: PoolDirectory,
{
    /// Validate `config` and create the vault at `address`.
    ///
    /// With `seed_shares > 0` the manager pays that many numeraire units and
    /// the same number of shares goes to [`Address::BURN`], so the supply
    /// never returns to zero. Seeding records a snapshot of the initial
    /// supply.
    pub fn new(
        address: Address,
        config: VaultConfig,
        shares: L,
        assets: A,
        swapper: S,
        pools: P,
        ctx: &CallContext,
    ) -> VaultResult<Self> {
        config.validate()?;
        if address.is_zero() {
            return Err(VaultError::ZeroAddress("vault"));
        }
        if swapper.address().is_zero() {
            return Err(VaultError::ZeroAddress("swap adapter"));
        }

        let oracle = TwapOracle::new(pools, config.numeraire, config.oracle.clone());
        let state = VaultState::from_config(&config, ctx.now);
        let mut vault = Self {
            address,
            config,
            state,
            shares,
            assets,
            swapper,
            oracle,
            events: Vec::new(),
        };

        let seed = u128::from(vault.config.seed_shares);
        if seed > 0 {
            let (numeraire, manager) = (vault.config.numeraire, vault.config.manager);
            vault.locked(|v| {
                v.pull(&numeraire, &manager, seed)?;
                v.mint_shares(&Address::BURN, seed)?;
                v.emit_snapshot(ctx.now);
                Ok(())
            })?;
        }

        info!(
            vault = %vault.address,
            numeraire = %vault.config.numeraire,
            assets = vault.config.allowed_assets.len(),
            seed,
            "vault created"
        );
        Ok(vault)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn state(&self) -> &VaultState {
        &self.state
    }

    pub fn shares(&self) -> &L {
        &self.shares
    }

    /// Host-side access to the share ledger, e.g. for holder-to-holder transfers
    pub fn shares_mut(&mut self) -> &mut L {
        &mut self.shares
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Host-side access to the asset ledger, e.g. to fund depositors
    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    pub fn swapper(&self) -> &S {
        &self.swapper
    }

    pub fn swapper_mut(&mut self) -> &mut S {
        &mut self.swapper
    }

    pub fn oracle(&self) -> &TwapOracle<P> {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut TwapOracle<P> {
        &mut self.oracle
    }

    pub fn is_locked(&self) -> bool {
        ReentrancyGuard::is_locked(&self.state.reentrancy)
    }

    // ========================================================================
    // Valuation
    // ========================================================================

    /// Vault balance of every allowed asset, in basket order
    pub fn holdings(&self) -> Vec<AssetAmount> {
        self.config
            .allowed_assets
            .iter()
            .map(|asset| AssetAmount::new(*asset, self.assets.balance_of(asset, &self.address)))
            .collect()
    }

    /// NAV with its per-asset breakdown
    pub fn total_assets(&self, mode: ValuationMode) -> VaultResult<NavReport> {
        compute_nav(&self.oracle, &self.holdings(), mode)
    }

    pub fn nav(&self, mode: ValuationMode) -> VaultResult<u128> {
        Ok(self.total_assets(mode)?.total)
    }

    /// Display share price, scaled by 1e18. Unpriced holdings count as zero.
    pub fn share_price(&self) -> VaultResult<u128> {
        let nav = self.nav(ValuationMode::Tolerant)?;
        Ok(share_price(self.shares.total_supply(), nav)?)
    }

    /// Snapshot record of the current state, valued tolerantly
    pub fn snapshot(&self, now: u64) -> VaultResult<VaultEvent> {
        let report = self.total_assets(ValuationMode::Tolerant)?;
        let total_supply = self.shares.total_supply();
        Ok(VaultEvent::Snapshot {
            nav: report.total,
            share_price: share_price(total_supply, report.total)?,
            total_supply,
            weights: self.state.target_weights.clone(),
            fully_priced: report.fully_priced(),
            state_version: self.state.state_version,
            timestamp: now,
        })
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn events(&self) -> &[VaultEvent] {
        &self.events
    }

    /// Drain buffered state records
    pub fn take_events(&mut self) -> Vec<VaultEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: VaultEvent) {
        debug!(event = event.name(), ?event, "vault event");
        self.events.push(event);
    }

    pub(crate) fn emit_snapshot(&mut self, now: u64) {
        match self.snapshot(now) {
            Ok(event) => self.emit(event),
            Err(err) => warn!(error = %err, "snapshot skipped"),
        }
    }

    // ========================================================================
    // Call Plumbing
    // ========================================================================

    /// Run `f` as an entry point, holding the reentrancy lock
    pub(crate) fn locked<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> VaultResult<T>,
    ) -> VaultResult<T> {
        ReentrancyGuard::acquire(&mut self.state.reentrancy)?;
        let result = f(self);
        ReentrancyGuard::release(&mut self.state.reentrancy);
        result
    }

    /// Run an external call with the lock in its external-call phase
    pub(crate) fn external<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> VaultResult<T>,
    ) -> VaultResult<T> {
        ReentrancyGuard::enter_external_call(&mut self.state.reentrancy)?;
        let result = f(self);
        let exited = ReentrancyGuard::exit_external_call(&mut self.state.reentrancy);
        let value = result?;
        exited?;
        Ok(value)
    }

    /// Reject reads from inside a running entry point
    pub(crate) fn ensure_settled(&self) -> VaultResult<()> {
        ReentrancyGuard::ensure_unlocked(&self.state.reentrancy)
    }

    pub(crate) fn ensure_manager(&self, ctx: &CallContext) -> VaultResult<()> {
        if ctx.caller != self.config.manager {
            return Err(VaultError::Unauthorized { caller: ctx.caller });
        }
        Ok(())
    }

    /// Pull `amount` of `asset` from `from` and check that it arrived
    pub(crate) fn pull(&mut self, asset: &Address, from: &Address, amount: u128) -> VaultResult<()> {
        let before = self.assets.balance_of(asset, &self.address);
        self.external(|v| {
            v.assets
                .transfer_from(asset, &v.address, from, &v.address, amount)
                .map_err(VaultError::from)
        })?;
        let actual = self.assets.balance_of(asset, &self.address).saturating_sub(before);
        if actual != amount {
            return Err(VaultError::BalanceMismatch {
                asset: *asset,
                expected: amount,
                actual,
            });
        }
        Ok(())
    }

    /// Send `amount` of `asset` from the vault to `to`
    pub(crate) fn push(&mut self, asset: &Address, to: &Address, amount: u128) -> VaultResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.external(|v| {
            v.assets
                .transfer(asset, &v.address, to, amount)
                .map_err(VaultError::from)
        })
    }

    pub(crate) fn mint_shares(&mut self, to: &Address, amount: u128) -> VaultResult<()> {
        if amount == 0 {
            return Ok(());
        }
        Ok(self.shares.mint(to, amount)?)
    }

    /// Treat a valuation failure as skippable in best-effort mode
    pub(crate) fn tolerate<T>(
        mode: CheckMode,
        step: &'static str,
        result: VaultResult<T>,
    ) -> VaultResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if mode == CheckMode::BestEffort && err.kind() == ErrorKind::Valuation => {
                warn!(step, error = %err, "skipped after valuation failure");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger + Clone,
    A: AssetLedger + Clone,
    S: SwapAdapter + Clone,
    P: PoolDirectory + Clone,
{
    /// Run `f` all-or-nothing: on error every ledger, the oracle, the swap
    /// adapter and the vault state are restored to their values before the
    /// call. For in-memory hosts; a chain host provides this itself.
    pub fn transact<T>(&mut self, f: impl FnOnce(&mut Self) -> VaultResult<T>) -> VaultResult<T> {
        let checkpoint = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = checkpoint;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DepositLimits, FeeConfig, FeeSinks, OracleConfig, RebalanceConfig, WithdrawalMode,
    };
    use crate::testing::{MarketBuilder, MemoryVault};

    const NUMERAIRE: Address = Address::repeat_byte(1);
    const ASSET: Address = Address::repeat_byte(2);
    const MANAGER: Address = Address::repeat_byte(9);

    fn vault() -> MemoryVault {
        let config = VaultConfig {
            numeraire: NUMERAIRE,
            manager: MANAGER,
            allowed_assets: vec![NUMERAIRE, ASSET],
            initial_weights: vec![5_000, 5_000],
            fees: FeeConfig::default(),
            sinks: FeeSinks {
                dev_wallet: Address::repeat_byte(10),
                rewards: Address::repeat_byte(11),
                protocol: Address::repeat_byte(12),
            },
            oracle: OracleConfig::default(),
            rebalance: RebalanceConfig::default(),
            limits: DepositLimits::default(),
            withdrawal_mode: WithdrawalMode::Both,
            auto_rebalance: true,
            seed_shares: 0,
            swap_deadline_secs: 300,
        };
        MarketBuilder::new(NUMERAIRE, Address::repeat_byte(0xee))
            .asset(ASSET, 0, 1_000_000_000)
            .build()
            .unwrap()
            .into_vault(Address::repeat_byte(0xaa), config, 1_700_000_000)
            .unwrap()
    }

    #[test]
    fn test_previews_rejected_mid_call() {
        let mut vault = vault();
        assert!(vault.preview_deposit(1_000).is_ok());
        assert!(vault.preview_redeem(0).is_ok());

        let results = vault.locked(|v| {
            Ok([
                v.preview_deposit(1_000).map(|_| ()),
                v.preview_mint(1_000).map(|_| ()),
                v.preview_redeem(0).map(|_| ()),
                v.convert_to_shares(1_000).map(|_| ()),
                v.convert_to_assets(1_000).map(|_| ()),
            ])
        });
        for result in results.unwrap() {
            assert_eq!(result, Err(VaultError::Reentrancy));
        }

        assert!(!vault.is_locked());
        assert!(vault.preview_mint(1_000).is_ok());
    }
}
