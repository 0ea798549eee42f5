//! Deposit and mint flows, plus the previews that price them.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounting::{
    bps_of, convert_to_assets, convert_to_shares, gross_up, split_fee, Rounding, ValuationMode,
};
use crate::config::FeeBasis;
use crate::errors::{VaultError, VaultResult};
use crate::events::{FeeKind, VaultEvent};
use crate::interfaces::{AssetLedger, OwnershipLedger, PoolDirectory, SwapAdapter};
use crate::types::{Address, CallContext};
use crate::vault::{CheckMode, Vault};

/// What the depositor fixes: the numeraire paid in, or the net shares received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositRequest {
    Assets(u128),
    Shares(u128),
}

/// Priced deposit. Exactly one of `fee_shares` and `fee_assets` is non-zero,
/// depending on the configured fee basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositQuote {
    /// Numeraire units pulled from the depositor
    pub assets: u128,
    /// Shares minted to the receiver
    pub shares: u128,
    /// Shares minted to the fee sinks
    pub fee_shares: u128,
    /// Numeraire units forwarded to the fee sinks
    pub fee_assets: u128,
}

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger,
    A: AssetLedger,
    S: SwapAdapter,
    P: PoolDirectory,
{
    // ========================================================================
    // Entry Points
    // ========================================================================

    /// Deposit `assets` numeraire units, minting shares to `receiver`.
    /// Returns the net shares minted.
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        assets: u128,
        receiver: &Address,
    ) -> VaultResult<u128> {
        let quote = self.process_deposit(ctx, DepositRequest::Assets(assets), receiver)?;
        Ok(quote.shares)
    }

    /// Mint exactly `shares` net shares to `receiver`. Returns the numeraire
    /// units pulled, rounded against the depositor.
    pub fn mint(&mut self, ctx: &CallContext, shares: u128, receiver: &Address) -> VaultResult<u128> {
        let quote = self.process_deposit(ctx, DepositRequest::Shares(shares), receiver)?;
        Ok(quote.assets)
    }

    fn process_deposit(
        &mut self,
        ctx: &CallContext,
        request: DepositRequest,
        receiver: &Address,
    ) -> VaultResult<DepositQuote> {
        let requested = match request {
            DepositRequest::Assets(amount) | DepositRequest::Shares(amount) => amount,
        };
        if requested == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }

        self.locked(|v| {
            v.accrue_aum_fees(ctx.now, CheckMode::Strict)?;

            // Minting path: every holding must be priced
            let supply = v.shares.total_supply();
            let nav = v.nav(ValuationMode::Strict)?;
            let quote = v.quote(request, supply, nav)?;

            let minimum = if supply == 0 {
                v.config.limits.min_first_deposit
            } else {
                v.config.limits.min_deposit
            };
            if quote.assets < u128::from(minimum) {
                return Err(VaultError::BelowMinimumDeposit {
                    amount: quote.assets,
                    minimum: u128::from(minimum),
                });
            }
            if quote.shares == 0 {
                return Err(VaultError::ZeroShares);
            }

            let numeraire = v.config.numeraire;
            v.pull(&numeraire, &ctx.caller, quote.assets)?;

            let dev_share_bps = v.config.fees.deposit_dev_share_bps;
            let (dev_wallet, rewards) = (v.state.dev_wallet, v.config.sinks.rewards);
            let split = match v.config.fees.deposit_fee_basis {
                FeeBasis::Assets => {
                    let split = split_fee(quote.fee_assets, dev_share_bps)?;
                    v.push(&numeraire, &dev_wallet, split.primary)?;
                    v.push(&numeraire, &rewards, split.secondary)?;
                    v.mint_shares(receiver, quote.shares)?;
                    split
                }
                FeeBasis::GrossShares => {
                    v.mint_shares(receiver, quote.shares)?;
                    let split = split_fee(quote.fee_shares, dev_share_bps)?;
                    v.mint_shares(&dev_wallet, split.primary)?;
                    v.mint_shares(&rewards, split.secondary)?;
                    split
                }
            };

            if split.total() > 0 {
                v.emit(VaultEvent::FeesCollected {
                    kind: FeeKind::Deposit,
                    primary_sink: dev_wallet,
                    primary_amount: split.primary,
                    secondary_sink: rewards,
                    secondary_amount: split.secondary,
                    nav,
                    total_supply: supply,
                    timestamp: ctx.now,
                });
            }
            v.emit(VaultEvent::Deposited {
                caller: ctx.caller,
                receiver: *receiver,
                assets: quote.assets,
                shares: quote.shares,
                timestamp: ctx.now,
            });
            v.state.bump_version();

            info!(
                caller = %ctx.caller,
                receiver = %receiver,
                assets = quote.assets,
                shares = quote.shares,
                fee_shares = quote.fee_shares,
                fee_assets = quote.fee_assets,
                "deposit"
            );

            v.post_mutation_check(ctx.now, CheckMode::Strict)?;
            v.emit_snapshot(ctx.now);
            Ok(quote)
        })
    }

    // ========================================================================
    // Previews
    // ========================================================================

    /// Net shares a deposit of `assets` would mint at the current NAV.
    /// Ignores AUM fees not yet accrued.
    pub fn preview_deposit(&self, assets: u128) -> VaultResult<DepositQuote> {
        self.ensure_settled()?;
        let nav = self.nav(ValuationMode::Strict)?;
        self.quote(DepositRequest::Assets(assets), self.shares.total_supply(), nav)
    }

    /// Numeraire a mint of `shares` net shares would cost at the current NAV.
    /// Ignores AUM fees not yet accrued.
    pub fn preview_mint(&self, shares: u128) -> VaultResult<DepositQuote> {
        self.ensure_settled()?;
        let nav = self.nav(ValuationMode::Strict)?;
        self.quote(DepositRequest::Shares(shares), self.shares.total_supply(), nav)
    }

    /// Shares worth `assets` at the current NAV, rounded down, before fees
    pub fn convert_to_shares(&self, assets: u128) -> VaultResult<u128> {
        self.ensure_settled()?;
        let nav = self.nav(ValuationMode::Strict)?;
        Ok(convert_to_shares(assets, self.shares.total_supply(), nav, Rounding::Down)?)
    }

    /// Numeraire value of `shares` at the current NAV, rounded down
    pub fn convert_to_assets(&self, shares: u128) -> VaultResult<u128> {
        self.ensure_settled()?;
        let nav = self.nav(ValuationMode::Strict)?;
        Ok(convert_to_assets(shares, self.shares.total_supply(), nav, Rounding::Down)?)
    }

    /// Price `request` against `supply` and `nav`. Rounding always favors
    /// existing holders.
    fn quote(&self, request: DepositRequest, supply: u128, nav: u128) -> VaultResult<DepositQuote> {
        let fee_bps = self.config.fees.deposit_fee_bps;
        let quote = match (request, self.config.fees.deposit_fee_basis) {
            (DepositRequest::Assets(assets), FeeBasis::GrossShares) => {
                let gross = convert_to_shares(assets, supply, nav, Rounding::Down)?;
                let fee_shares = bps_of(gross, fee_bps)?;
                DepositQuote {
                    assets,
                    shares: gross - fee_shares,
                    fee_shares,
                    fee_assets: 0,
                }
            }
            (DepositRequest::Assets(assets), FeeBasis::Assets) => {
                let fee_assets = bps_of(assets, fee_bps)?;
                DepositQuote {
                    assets,
                    shares: convert_to_shares(assets - fee_assets, supply, nav, Rounding::Down)?,
                    fee_shares: 0,
                    fee_assets,
                }
            }
            (DepositRequest::Shares(shares), FeeBasis::GrossShares) => {
                let gross = gross_up(shares, fee_bps)?;
                DepositQuote {
                    assets: convert_to_assets(gross, supply, nav, Rounding::Up)?,
                    shares,
                    fee_shares: gross - shares,
                    fee_assets: 0,
                }
            }
            (DepositRequest::Shares(shares), FeeBasis::Assets) => {
                let net_assets = convert_to_assets(shares, supply, nav, Rounding::Up)?;
                let assets = gross_up(net_assets, fee_bps)?;
                DepositQuote {
                    assets,
                    shares,
                    fee_shares: 0,
                    fee_assets: assets - net_assets,
                }
            }
        };
        Ok(quote)
    }
}
