//! Two-phase rebalance execution and the post-mutation deviation check.

use meridian_math::{mul_div_u128, BPS_DENOMINATOR};
use tracing::{debug, info};

use crate::accounting::ValuationMode;
use crate::errors::{OracleError, VaultError, VaultResult};
use crate::events::{NoopReason, VaultEvent};
use crate::interfaces::{
    force_approve, AssetLedger, ExactInputSingle, OwnershipLedger, PoolDirectory, SwapAdapter,
};
use crate::oracle::select_most_liquid;
use crate::rebalance::{RebalancePlan, RebalanceReport};
use crate::types::{Address, CallContext};
use crate::vault::{CheckMode, Vault};

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger,
    A: AssetLedger,
    S: SwapAdapter,
    P: PoolDirectory,
{
    /// Manager-requested rebalance. Nothing to do is reported, not an error.
    pub fn rebalance(&mut self, ctx: &CallContext) -> VaultResult<RebalanceReport> {
        self.ensure_manager(ctx)?;

        self.locked(|v| {
            let plan = v.plan(ValuationMode::Strict)?;
            let report = if plan.nav == 0 {
                RebalanceReport::noop(NoopReason::ZeroNav)
            } else if !plan.needs_rebalance() {
                RebalanceReport::noop(NoopReason::WithinBand)
            } else {
                v.execute_rebalance(ctx.now, &plan)?
            };

            if report.sells + report.buys > 0 {
                v.state.bump_version();
            }
            v.emit(VaultEvent::Rebalanced {
                sells: report.sells,
                buys: report.buys,
                noop: report.noop,
                timestamp: ctx.now,
            });
            v.emit_snapshot(ctx.now);
            Ok(report)
        })
    }

    /// Current deviation plan against the target weights
    pub fn plan(&self, mode: ValuationMode) -> VaultResult<RebalancePlan> {
        let report = self.total_assets(mode)?;
        RebalancePlan::new(
            &report,
            &self.state.target_weights,
            self.config.numeraire,
            self.config.rebalance.band_bps,
        )
    }

    /// Rebalance or signal after a deposit, withdrawal or weight change
    pub(crate) fn post_mutation_check(&mut self, now: u64, mode: CheckMode) -> VaultResult<()> {
        let Some(plan) = Self::tolerate(mode, "rebalance check", self.plan(ValuationMode::Strict))?
        else {
            return Ok(());
        };
        if !plan.needs_rebalance() {
            return Ok(());
        }

        if self.state.auto_rebalance {
            let report = self.execute_rebalance(now, &plan)?;
            self.emit(VaultEvent::Rebalanced {
                sells: report.sells,
                buys: report.buys,
                noop: report.noop,
                timestamp: now,
            });
        } else if let Some(entry) = plan.most_deviated() {
            info!(
                asset = %entry.asset,
                deviation_bps = entry.deviation_bps,
                band_bps = plan.band_bps,
                "rebalance needed"
            );
            let event = VaultEvent::RebalanceNeeded {
                asset: entry.asset,
                deviation_bps: entry.deviation_bps,
                band_bps: plan.band_bps,
                timestamp: now,
            };
            self.emit(event);
        }
        Ok(())
    }

    /// Phase 1 sells every overweight asset's excess into the numeraire.
    /// Phase 2 spreads the numeraire above its own target over the
    /// underweight assets in proportion to their deficits. Any failed leg
    /// aborts the whole pass.
    fn execute_rebalance(&mut self, now: u64, plan: &RebalancePlan) -> VaultResult<RebalanceReport> {
        let numeraire = self.config.numeraire;
        let mut report = RebalanceReport::default();

        for entry in plan.overweight() {
            let asset = entry.asset;
            let amount = self
                .oracle
                .amount_for_value(&asset, entry.excess())
                .map_err(|err| VaultError::valuation(asset, err))?
                .min(self.assets.balance_of(&asset, &self.address));
            if amount == 0 {
                continue;
            }
            let expected = self
                .oracle
                .value_in_numeraire(&asset, amount)
                .map_err(|err| VaultError::valuation(asset, err))?;
            let min_out = self.apply_slippage(expected)?;
            self.swap_exact_input(now, &asset, &numeraire, amount, min_out)?;
            report.sells += 1;
        }

        let total_deficit = plan.total_deficit()?;
        if total_deficit == 0 {
            report.noop = Some(NoopReason::NoDeficit);
            return Ok(report);
        }
        let available = self
            .assets
            .balance_of(&numeraire, &self.address)
            .saturating_sub(plan.numeraire_target());
        if available == 0 {
            report.noop = Some(NoopReason::NoNumeraire);
            return Ok(report);
        }
        let budget = available.min(total_deficit);
        debug!(available, total_deficit, budget, "rebalance buy budget");

        for entry in plan.deficits() {
            let asset = entry.asset;
            let allocation = mul_div_u128(entry.deficit(), budget, total_deficit)?
                .min(self.assets.balance_of(&numeraire, &self.address));
            if allocation == 0 {
                continue;
            }
            let expected = self
                .oracle
                .amount_for_value(&asset, allocation)
                .map_err(|err| VaultError::valuation(asset, err))?;
            let min_out = self.apply_slippage(expected)?;
            self.swap_exact_input(now, &numeraire, &asset, allocation, min_out)?;
            report.buys += 1;
        }

        info!(sells = report.sells, buys = report.buys, nav = plan.nav, "rebalanced");
        Ok(report)
    }

    fn apply_slippage(&self, expected: u128) -> VaultResult<u128> {
        let keep = BPS_DENOMINATOR - u128::from(self.config.rebalance.max_slippage_bps);
        Ok(mul_div_u128(expected, keep, BPS_DENOMINATOR)?)
    }

    /// Swap through the adapter on the most liquid tier, checking the
    /// received amount on the vault's own balance
    fn swap_exact_input(
        &mut self,
        now: u64,
        token_in: &Address,
        token_out: &Address,
        amount_in: u128,
        min_amount_out: u128,
    ) -> VaultResult<u128> {
        let fee_tier = match select_most_liquid(
            self.oracle.pools(),
            token_in,
            token_out,
            &self.config.oracle.fee_tiers,
        ) {
            Ok((tier, _)) => tier,
            Err(err) => {
                debug!(error = %err, "no liquid tier found, using the default");
                self.config
                    .oracle
                    .default_tier()
                    .ok_or_else(|| VaultError::valuation(*token_out, OracleError::NoLiquidPool))?
            }
        };

        let params = ExactInputSingle {
            token_in: *token_in,
            token_out: *token_out,
            fee_tier,
            recipient: self.address,
            amount_in,
            min_amount_out,
            deadline: now.saturating_add(self.config.swap_deadline_secs),
        };

        let before = self.assets.balance_of(token_out, &self.address);
        let spender = self.swapper.address();
        self.external(|v| {
            let owner = v.address;
            force_approve(&mut v.assets, token_in, &owner, &spender, amount_in)?;
            v.swapper.exact_input_single(&mut v.assets, &owner, &params, now)?;
            force_approve(&mut v.assets, token_in, &owner, &spender, 0)?;
            Ok(())
        })?;
        let received = self
            .assets
            .balance_of(token_out, &self.address)
            .saturating_sub(before);
        if received < min_amount_out {
            return Err(VaultError::SlippageExceeded {
                asset: *token_out,
                received,
                minimum: min_amount_out,
            });
        }

        info!(
            token_in = %token_in,
            token_out = %token_out,
            amount_in,
            amount_out = received,
            fee_tier,
            "swap executed"
        );
        self.emit(VaultEvent::SwapExecuted {
            token_in: *token_in,
            token_out: *token_out,
            amount_in,
            amount_out: received,
            min_amount_out,
            timestamp: now,
        });
        Ok(received)
    }
}
