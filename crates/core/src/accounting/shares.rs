//! # Share Conversion
//!
//! Conversions between numeraire value and vault shares. Both sides carry a
//! small virtual offset so the first depositors cannot move the share price
//! by donating assets to an almost empty vault.

use meridian_math::{mul_div, mul_div_rounding_up, narrow_u128, MathResult, U256};

/// Virtual shares added to the supply in every conversion
pub const VIRTUAL_SHARES: u128 = 1_000;

/// Virtual numeraire units added to NAV in every conversion
pub const VIRTUAL_ASSETS: u128 = 1_000;

/// Fixed-point scale of the share price
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// `a * b / d` in 256-bit precision, narrowed back to `u128`
pub fn mul_div_rounded(a: u128, b: u128, d: u128, rounding: Rounding) -> MathResult<u128> {
    let (a, b, d) = (U256::new(a), U256::new(b), U256::new(d));
    let result = match rounding {
        Rounding::Down => mul_div(a, b, d)?,
        Rounding::Up => mul_div_rounding_up(a, b, d)?,
    };
    narrow_u128(result)
}

/// Shares worth `assets` numeraire units. 1:1 while the supply is zero.
pub fn convert_to_shares(
    assets: u128,
    total_supply: u128,
    nav: u128,
    rounding: Rounding,
) -> MathResult<u128> {
    if total_supply == 0 {
        return Ok(assets);
    }
    mul_div_rounded(
        assets,
        total_supply.saturating_add(VIRTUAL_SHARES),
        nav.saturating_add(VIRTUAL_ASSETS),
        rounding,
    )
}

/// Numeraire value of `shares`. 1:1 while the supply is zero.
pub fn convert_to_assets(
    shares: u128,
    total_supply: u128,
    nav: u128,
    rounding: Rounding,
) -> MathResult<u128> {
    if total_supply == 0 {
        return Ok(shares);
    }
    mul_div_rounded(
        shares,
        nav.saturating_add(VIRTUAL_ASSETS),
        total_supply.saturating_add(VIRTUAL_SHARES),
        rounding,
    )
}

/// Numeraire value of one share, scaled by [`PRICE_SCALE`]
pub fn share_price(total_supply: u128, nav: u128) -> MathResult<u128> {
    convert_to_assets(PRICE_SCALE, total_supply, nav, Rounding::Down)
}

/// `balance * shares / total_supply`, rounded down
pub fn pro_rata(balance: u128, shares: u128, total_supply: u128) -> MathResult<u128> {
    mul_div_rounded(balance, shares, total_supply, Rounding::Down)
}
