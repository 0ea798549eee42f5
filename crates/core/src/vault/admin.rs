//! Manager-only settings and AUM fee accrual.

use tracing::info;

use crate::accounting::{
    accrue_aum_fee, convert_to_assets, convert_to_shares, split_fee, Rounding, ValuationMode,
};
use crate::config::validate_weights;
use crate::errors::{VaultError, VaultResult};
use crate::events::{FeeKind, VaultEvent};
use crate::interfaces::{AssetLedger, OwnershipLedger, PoolDirectory, SwapAdapter};
use crate::types::{Address, CallContext};
use crate::vault::{CheckMode, Vault};

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger,
    A: AssetLedger,
    S: SwapAdapter,
    P: PoolDirectory,
{
    // ========================================================================
    // Manager Settings
    // ========================================================================

    /// Replace the target weights, then signal or rebalance. Nothing is
    /// minted or burned, so an unpriceable holding only skips the follow-up.
    pub fn set_target_weights(&mut self, ctx: &CallContext, weights: Vec<u32>) -> VaultResult<()> {
        self.ensure_manager(ctx)?;
        validate_weights(&weights, self.config.allowed_assets.len())?;

        self.locked(|v| {
            v.state.target_weights = weights;
            v.state.bump_version();
            info!(weights = ?v.state.target_weights, "target weights updated");
            v.emit(VaultEvent::WeightsUpdated {
                weights: v.state.target_weights.clone(),
                timestamp: ctx.now,
            });

            v.post_mutation_check(ctx.now, CheckMode::BestEffort)?;
            v.emit_snapshot(ctx.now);
            Ok(())
        })
    }

    pub fn set_dev_wallet(&mut self, ctx: &CallContext, dev_wallet: Address) -> VaultResult<()> {
        self.ensure_manager(ctx)?;
        if dev_wallet.is_zero() {
            return Err(VaultError::ZeroAddress("dev wallet"));
        }

        self.locked(|v| {
            v.state.dev_wallet = dev_wallet;
            v.state.bump_version();
            info!(%dev_wallet, "dev wallet updated");
            v.emit(VaultEvent::DevWalletUpdated {
                dev_wallet,
                timestamp: ctx.now,
            });
            Ok(())
        })
    }

    pub fn set_auto_rebalance(&mut self, ctx: &CallContext, enabled: bool) -> VaultResult<()> {
        self.ensure_manager(ctx)?;

        self.locked(|v| {
            v.state.auto_rebalance = enabled;
            v.state.bump_version();
            info!(enabled, "auto-rebalance toggled");
            v.emit(VaultEvent::AutoRebalanceUpdated {
                enabled,
                timestamp: ctx.now,
            });
            Ok(())
        })
    }

    // ========================================================================
    // AUM Fees
    // ========================================================================

    /// Accrue the AUM fee up to `ctx.now`. Anyone may call it; returns the
    /// shares minted.
    pub fn collect_fees(&mut self, ctx: &CallContext) -> VaultResult<u128> {
        self.locked(|v| {
            let minted = v.accrue_aum_fees(ctx.now, CheckMode::Strict)?;
            if minted > 0 {
                v.state.bump_version();
                v.emit_snapshot(ctx.now);
            }
            Ok(minted)
        })
    }

    /// Mint the AUM fee owed since the last accrual as new shares, split
    /// between the dev wallet and the protocol sink.
    ///
    /// Idempotent in time: a second call at the same `now` mints nothing.
    /// Value too small to buy a whole share stays pending for the next call,
    /// so frequent calls mint the same fee as one late call. In best-effort
    /// mode a valuation failure skips the accrual and leaves the fee clock
    /// where it was.
    pub(crate) fn accrue_aum_fees(&mut self, now: u64, mode: CheckMode) -> VaultResult<u128> {
        let elapsed = now.saturating_sub(self.state.last_fee_collection);
        if elapsed == 0 {
            return Ok(0);
        }

        let supply = self.shares.total_supply();
        let annual_bps = self.config.fees.aum_fee_bps;
        if annual_bps == 0 || supply == 0 {
            self.state.advance_fee_clock(now);
            self.state.pending_aum_fee = 0;
            self.state.aum_fee_remainder = 0;
            return Ok(0);
        }

        let nav = match Self::tolerate(mode, "aum fee accrual", self.nav(ValuationMode::Strict))? {
            Some(nav) => nav,
            None => return Ok(0),
        };

        let accrual = accrue_aum_fee(nav, annual_bps, elapsed, self.state.aum_fee_remainder)?;
        let fee_value = self
            .state
            .pending_aum_fee
            .checked_add(accrual.value)
            .ok_or_else(VaultError::overflow)?;
        let fee_shares = convert_to_shares(fee_value, supply, nav, Rounding::Down)?;
        let charged = match fee_shares {
            0 => 0,
            shares => convert_to_assets(shares, supply, nav, Rounding::Up)?.min(fee_value),
        };

        self.state.advance_fee_clock(now);
        self.state.aum_fee_remainder = accrual.remainder;
        self.state.pending_aum_fee = fee_value - charged;
        if fee_shares == 0 {
            return Ok(0);
        }

        let split = split_fee(fee_shares, self.config.fees.aum_agent_share_bps)?;
        let (agent, protocol) = (self.state.dev_wallet, self.config.sinks.protocol);
        self.mint_shares(&agent, split.primary)?;
        self.mint_shares(&protocol, split.secondary)?;

        info!(elapsed, nav, fee_value, fee_shares, "AUM fee accrued");
        self.emit(VaultEvent::FeesCollected {
            kind: FeeKind::Aum,
            primary_sink: agent,
            primary_amount: split.primary,
            secondary_sink: protocol,
            secondary_amount: split.secondary,
            nav,
            total_supply: supply,
            timestamp: now,
        });
        Ok(fee_shares)
    }
}
