//! # External Interfaces
//!
//! Capabilities the vault holds references to instead of implementing: asset
//! balances, the share ledger, AMM pool reads and the swap venue. A chain
//! integration implements these over its own accounts; tests use the
//! in-memory versions in [`crate::testing`].

use meridian_math::U256;

use crate::errors::{LedgerError, OracleResult, SwapError};
use crate::types::Address;

// ============================================================================
// Ledgers
// ============================================================================

/// Balances and allowances for every asset the vault touches
pub trait AssetLedger {
    fn balance_of(&self, asset: &Address, owner: &Address) -> u128;

    fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> u128;

    /// Move `amount` of `asset` from `from`, acting as `from`
    fn transfer(
        &mut self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Move `amount` of `asset` from `from`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        asset: &Address,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Set `spender`'s allowance over `owner`'s balance. Some assets refuse to
    /// change a non-zero allowance to another non-zero value.
    fn approve(
        &mut self,
        asset: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// Fungible ownership units of the vault
pub trait OwnershipLedger {
    fn total_supply(&self) -> u128;

    fn balance_of(&self, holder: &Address) -> u128;

    fn mint(&mut self, to: &Address, amount: u128) -> Result<(), LedgerError>;

    fn burn(&mut self, from: &Address, amount: u128) -> Result<(), LedgerError>;

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError>;

    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    fn spend_allowance(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), LedgerError>;
}

/// Reset-then-set approval, safe for assets that reject changing a non-zero
/// allowance directly.
pub fn force_approve<L: AssetLedger + ?Sized>(
    assets: &mut L,
    asset: &Address,
    owner: &Address,
    spender: &Address,
    amount: u128,
) -> Result<(), LedgerError> {
    if assets.allowance(asset, owner, spender) != 0 {
        assets.approve(asset, owner, spender, 0)?;
    }
    if amount != 0 {
        assets.approve(asset, owner, spender, amount)?;
    }
    Ok(())
}

// ============================================================================
// AMM Pools
// ============================================================================

/// Current pool price and oracle buffer size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Q64.96 sqrt of token1/token0
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub observation_cardinality: u16,
}

/// Cumulatives at each requested `seconds_ago`, in request order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observations {
    pub tick_cumulatives: Vec<i64>,
    /// Q128 seconds per unit of in-range liquidity
    pub seconds_per_liquidity_cumulatives: Vec<U256>,
}

/// Read-only view of a concentrated-liquidity pool
pub trait AmmPool {
    /// Lower address of the pair
    fn token0(&self) -> Address;

    fn token1(&self) -> Address;

    /// Fee tier in hundredths of a bip
    fn fee(&self) -> u32;

    fn current_state(&self) -> OracleResult<PoolState>;

    fn observe(&self, seconds_agos: &[u32]) -> OracleResult<Observations>;

    fn liquidity(&self) -> OracleResult<u128>;
}

/// Pool lookup by pair and fee tier. Pair order does not matter.
pub trait PoolDirectory {
    fn pool(&self, token_a: &Address, token_b: &Address, fee: u32) -> Option<&dyn AmmPool>;
}

// ============================================================================
// Swap Venue
// ============================================================================

/// Single-pool exact-input swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactInputSingle {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: u32,
    pub recipient: Address,
    pub amount_in: u128,
    pub min_amount_out: u128,
    pub deadline: u64,
}

/// Caller-supplied swap, executed as-is by the adapter. `route` is opaque to
/// the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapInstruction {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: u128,
    pub min_amount_out: u128,
    pub deadline: u64,
    pub route: Vec<u8>,
}

/// Amounts an adapter reports for an executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    pub amount_in: u128,
    pub amount_out: u128,
}

/// Exchange venue. Untrusted: the vault checks balance deltas instead of
/// relying on reported amounts.
pub trait SwapAdapter {
    /// Address the vault approves before handing over input tokens
    fn address(&self) -> Address;

    /// Swap `amount_in` of `payer`'s `token_in`, delivering to `recipient`
    fn exact_input_single(
        &mut self,
        assets: &mut dyn AssetLedger,
        payer: &Address,
        params: &ExactInputSingle,
        now: u64,
    ) -> Result<u128, SwapError>;

    /// Execute an opaque instruction on behalf of `payer`
    fn execute(
        &mut self,
        assets: &mut dyn AssetLedger,
        payer: &Address,
        instruction: &SwapInstruction,
        now: u64,
    ) -> Result<SwapOutcome, SwapError>;
}
