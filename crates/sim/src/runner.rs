//! Drives a vault through a scenario's steps.
//!
//! Host actions (funding, donations, price moves) edit the in-memory market
//! directly. Vault actions run atomically through [`Vault::transact`], so a
//! failed step leaves no trace beyond its error.
//!
//! [`Vault::transact`]: meridian_core::Vault::transact

use anyhow::{anyhow, bail, Result};
use meridian_core::interfaces::{AssetLedger, SwapInstruction};
use meridian_core::testing::{pool_tick, MarketBuilder, MemoryVault};
use meridian_core::{
    Address, AssetAmount, CallContext, RebalanceReport, SingleAssetRedeem, VaultError,
    VaultEvent, VaultResult,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::scenario::{Action, Scenario, Step, SwapSpec};

/// Deadline given to redemption swap legs, relative to the step time
const REDEEM_SWAP_DEADLINE_SECS: u64 = 60;

/// Result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Shares(u128),
    Assets(u128),
    Payouts(Vec<AssetAmount>),
    Rebalance(RebalanceReport),
    Failed { kind: String, error: String },
}

/// What a step did, as printed by the binary
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub time: u64,
    pub caller: Address,
    pub action: Action,
    pub outcome: Outcome,
    pub events: Vec<VaultEvent>,
}

pub struct Runner {
    vault: MemoryVault,
    now: u64,
    fee_tier: u32,
}

impl Runner {
    /// Build the market and create the vault at the scenario start time
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let market = &scenario.market;
        let mut builder = MarketBuilder::new(scenario.vault.numeraire, market.router)
            .fee_tier(market.fee_tier)
            .reserve(u128::from(market.reserve));
        for listing in &market.assets {
            builder = builder.asset(listing.address, listing.price_tick, u128::from(listing.liquidity));
        }

        let vault = builder.build()?.into_vault(
            scenario.vault_address,
            scenario.vault.clone(),
            scenario.start_time,
        )?;
        info!(
            scenario = %scenario.name,
            vault = %scenario.vault_address,
            listings = market.assets.len(),
            "market ready"
        );

        Ok(Self {
            vault,
            now: scenario.start_time,
            fee_tier: market.fee_tier,
        })
    }

    pub fn vault(&self) -> &MemoryVault {
        &self.vault
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    /// Run every step in order, handing each record to `sink`
    pub fn run(&mut self, steps: &[Step], mut sink: impl FnMut(&StepRecord) -> Result<()>) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            let record = self.step(index, step)?;
            sink(&record)?;
        }
        Ok(())
    }

    /// Execute one step. Fails only when the outcome contradicts
    /// `expect_error` or a host action is malformed.
    pub fn step(&mut self, index: usize, step: &Step) -> Result<StepRecord> {
        self.now = self
            .now
            .checked_add(step.advance_secs)
            .ok_or_else(|| anyhow!("step {index}: clock overflow"))?;
        let ctx = CallContext::new(step.caller, self.now);
        debug!(step = index, time = self.now, action = ?step.action, "running step");

        let result = match &step.action {
            Action::Fund { amount } => self.fund(&step.caller, u128::from(*amount)),
            Action::Donate { asset, amount } => self.donate(asset, u128::from(*amount)),
            Action::SetPrice { asset, price_tick } => self.set_price(asset, *price_tick),
            action => Ok(self.vault.transact(|v| apply(v, &ctx, action))),
        }?;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(step = index, error = %err, "step failed");
                Outcome::Failed {
                    kind: format!("{:?}", err.kind()),
                    error: err.to_string(),
                }
            }
        };

        let failed = matches!(outcome, Outcome::Failed { .. });
        if failed != step.expect_error {
            bail!(
                "step {index} ({:?}): expected {}, got {:?}",
                step.action,
                if step.expect_error { "an error" } else { "success" },
                outcome
            );
        }

        Ok(StepRecord {
            step: index,
            time: self.now,
            caller: step.caller,
            action: step.action.clone(),
            outcome,
            events: self.vault.take_events(),
        })
    }

    // ========================================================================
    // Host Actions
    // ========================================================================

    fn fund(&mut self, who: &Address, amount: u128) -> Result<VaultResult<Outcome>> {
        let numeraire = self.vault.config().numeraire;
        let spender = self.vault.address();
        let assets = self.vault.assets_mut();
        assets.mint(&numeraire, who, amount)?;
        let allowance = assets.allowance(&numeraire, who, &spender);
        let approved = allowance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("allowance overflow for {who}"))?;
        assets.approve(&numeraire, who, &spender, approved)?;
        Ok(Ok(Outcome::Done))
    }

    fn donate(&mut self, asset: &Address, amount: u128) -> Result<VaultResult<Outcome>> {
        let vault = self.vault.address();
        self.vault.assets_mut().mint(asset, &vault, amount)?;
        Ok(Ok(Outcome::Done))
    }

    fn set_price(&mut self, asset: &Address, price_tick: i32) -> Result<VaultResult<Outcome>> {
        let numeraire = self.vault.config().numeraire;
        let tick = pool_tick(asset, &numeraire, price_tick);
        let fee_tier = self.fee_tier;
        let pool = self
            .vault
            .oracle_mut()
            .pools_mut()
            .pool_mut(asset, &numeraire, fee_tier)
            .ok_or_else(|| anyhow!("no pool for {asset} at fee tier {fee_tier}"))?;
        pool.set_tick(tick);
        self.vault.swapper_mut().set_tick(*asset, tick);
        info!(%asset, price_tick, pool_tick = tick, "price moved");
        Ok(Ok(Outcome::Done))
    }
}

/// Dispatch a vault action
fn apply(vault: &mut MemoryVault, ctx: &CallContext, action: &Action) -> VaultResult<Outcome> {
    let caller = ctx.caller;
    match action {
        Action::Deposit { amount, receiver } => vault
            .deposit(ctx, u128::from(*amount), &receiver.unwrap_or(caller))
            .map(Outcome::Shares),
        Action::Mint { shares, receiver } => vault
            .mint(ctx, u128::from(*shares), &receiver.unwrap_or(caller))
            .map(Outcome::Assets),
        Action::Redeem { shares, receiver, owner } => vault
            .redeem(
                ctx,
                u128::from(*shares),
                &receiver.unwrap_or(caller),
                &owner.unwrap_or(caller),
            )
            .map(Outcome::Payouts),
        Action::RedeemSingle {
            shares,
            asset_out,
            min_amount_out,
            swaps,
            receiver,
        } => {
            let request = SingleAssetRedeem {
                shares: u128::from(*shares),
                asset_out: *asset_out,
                min_amount_out: u128::from(*min_amount_out),
                swaps: swaps.iter().map(|s| instruction(s, asset_out, ctx.now)).collect(),
            };
            vault
                .redeem_single(ctx, &request, &receiver.unwrap_or(caller), &caller)
                .map(Outcome::Assets)
        }
        Action::SetWeights { weights } => vault
            .set_target_weights(ctx, weights.clone())
            .map(|()| Outcome::Done),
        Action::SetAutoRebalance { enabled } => vault
            .set_auto_rebalance(ctx, *enabled)
            .map(|()| Outcome::Done),
        Action::SetDevWallet { dev_wallet } => vault
            .set_dev_wallet(ctx, *dev_wallet)
            .map(|()| Outcome::Done),
        Action::Rebalance => vault.rebalance(ctx).map(Outcome::Rebalance),
        Action::CollectFees => vault.collect_fees(ctx).map(Outcome::Shares),
        Action::Fund { .. } | Action::Donate { .. } | Action::SetPrice { .. } => {
            Err(VaultError::InvalidInstruction(format!("{action:?} is a host action")))
        }
    }
}

fn instruction(leg: &SwapSpec, asset_out: &Address, now: u64) -> SwapInstruction {
    SwapInstruction {
        token_in: leg.token_in,
        token_out: *asset_out,
        amount_in: u128::from(leg.amount_in),
        min_amount_out: u128::from(leg.min_amount_out),
        deadline: now.saturating_add(REDEEM_SWAP_DEADLINE_SECS),
        route: Vec::new(),
    }
}
