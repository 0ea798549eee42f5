//! Basket and single-asset redemption.
//!
//! Shares are burned before anything leaves the vault. Basket redemption
//! pays the current per-asset balances pro rata and needs no price; the
//! single-asset flow runs caller-supplied swap instructions over the
//! caller's own proceeds.

use std::collections::BTreeMap;

use tracing::info;

use crate::accounting::pro_rata;
use crate::errors::{LedgerError, VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::interfaces::{
    force_approve, AssetLedger, OwnershipLedger, PoolDirectory, SwapAdapter, SwapInstruction,
};
use crate::types::{Address, AssetAmount, CallContext};
use crate::vault::{CheckMode, Vault};

/// Redemption into one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleAssetRedeem {
    pub shares: u128,
    pub asset_out: Address,
    /// Minimum of `asset_out` the receiver must get
    pub min_amount_out: u128,
    /// Executed in order; each must sell an allowed asset for `asset_out`
    pub swaps: Vec<SwapInstruction>,
}

impl<L, A, S, P> Vault<L, A, S, P>
where
    L: OwnershipLedger,
    A: AssetLedger,
    S: SwapAdapter,
    P: PoolDirectory,
{
    /// Burn `shares` of `owner` and pay `receiver` a pro-rata slice of every
    /// held asset. Returns the payouts in basket order.
    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        shares: u128,
        receiver: &Address,
        owner: &Address,
    ) -> VaultResult<Vec<AssetAmount>> {
        if !self.config.withdrawal_mode.allows_basket() {
            return Err(VaultError::WithdrawalModeDisabled(self.config.withdrawal_mode));
        }

        self.locked(|v| {
            let proceeds = v.burn_for_proceeds(ctx, shares, receiver, owner)?;
            for payout in &proceeds {
                v.push(&payout.asset, receiver, payout.amount)?;
            }

            v.finish_withdrawal(ctx, shares, receiver, owner, proceeds.clone())?;
            Ok(proceeds)
        })
    }

    /// Burn shares of `owner` and pay `receiver` in `request.asset_out` only,
    /// converting the other proceeds with the supplied swap instructions.
    /// Proceeds the instructions leave unspent are paid out as well. Returns
    /// the amount of `asset_out` paid.
    pub fn redeem_single(
        &mut self,
        ctx: &CallContext,
        request: &SingleAssetRedeem,
        receiver: &Address,
        owner: &Address,
    ) -> VaultResult<u128> {
        if !self.config.withdrawal_mode.allows_single_asset() {
            return Err(VaultError::WithdrawalModeDisabled(self.config.withdrawal_mode));
        }
        let asset_out = request.asset_out;
        if !self.config.is_allowed(&asset_out) {
            return Err(VaultError::AssetNotAllowed(asset_out));
        }
        self.validate_instructions(ctx, request)?;

        self.locked(|v| {
            let proceeds = v.burn_for_proceeds(ctx, request.shares, receiver, owner)?;
            let mut remaining: BTreeMap<Address, u128> =
                proceeds.iter().map(|p| (p.asset, p.amount)).collect();

            let mut received = 0u128;
            for instruction in &request.swaps {
                let (spent, out) = v.execute_instruction(ctx, instruction)?;
                let allowed = remaining.get(&instruction.token_in).copied().unwrap_or(0);
                if spent > allowed {
                    return Err(VaultError::SwapOverspend {
                        asset: instruction.token_in,
                        spent,
                        allowed,
                    });
                }
                remaining.insert(instruction.token_in, allowed - spent);
                received = received.checked_add(out).ok_or_else(VaultError::overflow)?;
            }

            let own = remaining.remove(&asset_out).unwrap_or(0);
            let amount_out = own.checked_add(received).ok_or_else(VaultError::overflow)?;
            if amount_out < request.min_amount_out {
                return Err(VaultError::SlippageExceeded {
                    asset: asset_out,
                    received: amount_out,
                    minimum: request.min_amount_out,
                });
            }

            let mut payouts = vec![AssetAmount::new(asset_out, amount_out)];
            payouts.extend(
                remaining
                    .into_iter()
                    .filter(|(_, amount)| *amount > 0)
                    .map(|(asset, amount)| AssetAmount::new(asset, amount)),
            );
            for payout in &payouts {
                v.push(&payout.asset, receiver, payout.amount)?;
            }

            v.finish_withdrawal(ctx, request.shares, receiver, owner, payouts)?;
            Ok(amount_out)
        })
    }

    /// Basket amounts `shares` would redeem for right now
    pub fn preview_redeem(&self, shares: u128) -> VaultResult<Vec<AssetAmount>> {
        self.ensure_settled()?;
        let supply = self.shares.total_supply();
        if shares > supply {
            return Err(VaultError::InsufficientShares {
                available: supply,
                requested: shares,
            });
        }
        self.holdings()
            .into_iter()
            .map(|holding| -> VaultResult<AssetAmount> {
                let amount = if supply == 0 { 0 } else { pro_rata(holding.amount, shares, supply)? };
                Ok(AssetAmount::new(holding.asset, amount))
            })
            .collect()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Shared prologue: checks, allowance, fee accrual, proceeds, burn
    fn burn_for_proceeds(
        &mut self,
        ctx: &CallContext,
        shares: u128,
        receiver: &Address,
        owner: &Address,
    ) -> VaultResult<Vec<AssetAmount>> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        if receiver.is_zero() {
            return Err(VaultError::ZeroAddress("receiver"));
        }
        let available = self.shares.balance_of(owner);
        if available < shares {
            return Err(VaultError::InsufficientShares {
                available,
                requested: shares,
            });
        }
        if ctx.caller != *owner {
            self.shares
                .spend_allowance(owner, &ctx.caller, shares)
                .map_err(|err| match err {
                    LedgerError::InsufficientAllowance { available, requested } => {
                        VaultError::InsufficientAllowance { available, requested }
                    }
                    other => VaultError::Ledger(other),
                })?;
        }

        self.accrue_aum_fees(ctx.now, CheckMode::BestEffort)?;

        // Proceeds come from balances before the burn; the supply includes any
        // AUM fee shares just minted
        let supply = self.shares.total_supply();
        let proceeds = self
            .holdings()
            .into_iter()
            .map(|holding| -> VaultResult<AssetAmount> {
                Ok(AssetAmount::new(holding.asset, pro_rata(holding.amount, shares, supply)?))
            })
            .collect::<VaultResult<Vec<_>>>()?;

        self.shares.burn(owner, shares)?;
        Ok(proceeds)
    }

    fn finish_withdrawal(
        &mut self,
        ctx: &CallContext,
        shares: u128,
        receiver: &Address,
        owner: &Address,
        payouts: Vec<AssetAmount>,
    ) -> VaultResult<()> {
        info!(
            caller = %ctx.caller,
            owner = %owner,
            receiver = %receiver,
            shares,
            legs = payouts.len(),
            "withdrawal"
        );
        self.emit(VaultEvent::Withdrawn {
            caller: ctx.caller,
            receiver: *receiver,
            owner: *owner,
            shares,
            payouts,
            timestamp: ctx.now,
        });
        self.state.bump_version();

        self.post_mutation_check(ctx.now, CheckMode::BestEffort)?;
        self.emit_snapshot(ctx.now);
        Ok(())
    }

    fn validate_instructions(&self, ctx: &CallContext, request: &SingleAssetRedeem) -> VaultResult<()> {
        for instruction in &request.swaps {
            if instruction.token_out != request.asset_out {
                return Err(VaultError::InvalidInstruction(format!(
                    "instruction buys {}, redemption asks for {}",
                    instruction.token_out, request.asset_out
                )));
            }
            if instruction.token_in == request.asset_out {
                return Err(VaultError::InvalidInstruction(
                    "instruction sells the output asset".to_string(),
                ));
            }
            if !self.config.is_allowed(&instruction.token_in) {
                return Err(VaultError::AssetNotAllowed(instruction.token_in));
            }
            if instruction.amount_in == 0 {
                return Err(VaultError::InvalidInstruction("zero input amount".to_string()));
            }
            if instruction.deadline < ctx.now {
                return Err(VaultError::DeadlineExpired {
                    deadline: instruction.deadline,
                    now: ctx.now,
                });
            }
        }
        Ok(())
    }

    /// Run one instruction through the adapter. Returns what the vault
    /// actually spent and received, measured on its own balances.
    fn execute_instruction(
        &mut self,
        ctx: &CallContext,
        instruction: &SwapInstruction,
    ) -> VaultResult<(u128, u128)> {
        let (token_in, token_out) = (instruction.token_in, instruction.token_out);
        let in_before = self.assets.balance_of(&token_in, &self.address);
        let out_before = self.assets.balance_of(&token_out, &self.address);

        let spender = self.swapper.address();
        self.external(|v| {
            let owner = v.address;
            force_approve(&mut v.assets, &token_in, &owner, &spender, instruction.amount_in)?;
            v.swapper.execute(&mut v.assets, &owner, instruction, ctx.now)?;
            force_approve(&mut v.assets, &token_in, &owner, &spender, 0)?;
            Ok(())
        })?;

        let spent = in_before.saturating_sub(self.assets.balance_of(&token_in, &self.address));
        let out = self
            .assets
            .balance_of(&token_out, &self.address)
            .saturating_sub(out_before);
        if out < instruction.min_amount_out {
            return Err(VaultError::SlippageExceeded {
                asset: token_out,
                received: out,
                minimum: instruction.min_amount_out,
            });
        }

        info!(
            token_in = %token_in,
            token_out = %token_out,
            spent,
            received = out,
            "redemption swap"
        );
        self.emit(VaultEvent::SwapExecuted {
            token_in,
            token_out,
            amount_in: spent,
            amount_out: out,
            min_amount_out: instruction.min_amount_out,
            timestamp: ctx.now,
        });
        Ok((spent, out))
    }
}
