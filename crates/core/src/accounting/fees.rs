//! # Fee Math
//!
//! Upfront deposit fees, the continuous AUM fee and the split between sinks.

use meridian_math::{narrow_u128, MathError, MathResult, BPS_DENOMINATOR, U256};

use crate::accounting::shares::{mul_div_rounded, Rounding};

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// A fee divided between two sinks. The parts always add up to the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeSplit {
    pub primary: u128,
    pub secondary: u128,
}

impl FeeSplit {
    pub fn total(&self) -> u128 {
        self.primary + self.secondary
    }
}

/// Give `primary_share_bps` of `total` to the primary sink, the remainder
/// (including rounding dust) to the secondary.
pub fn split_fee(total: u128, primary_share_bps: u32) -> MathResult<FeeSplit> {
    let primary = mul_div_rounded(
        total,
        u128::from(primary_share_bps),
        BPS_DENOMINATOR,
        Rounding::Down,
    )?;
    Ok(FeeSplit {
        primary,
        secondary: total - primary,
    })
}

/// `amount * fee_bps / 10000`, rounded down
pub fn bps_of(amount: u128, fee_bps: u32) -> MathResult<u128> {
    mul_div_rounded(amount, u128::from(fee_bps), BPS_DENOMINATOR, Rounding::Down)
}

/// Gross amount, rounded up, whose net after `fee_bps` is at least `net`
pub fn gross_up(net: u128, fee_bps: u32) -> MathResult<u128> {
    mul_div_rounded(
        net,
        BPS_DENOMINATOR,
        BPS_DENOMINATOR - u128::from(fee_bps),
        Rounding::Up,
    )
}

/// AUM fee owed for one accrual period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AumAccrual {
    /// Whole numeraire units owed
    pub value: u128,
    /// Fraction of a unit left over, in units of `1 / (10000 * year)`
    pub remainder: u64,
}

/// Numeraire value owed for `elapsed` seconds of an annual `annual_bps` fee
/// on `nav`: `elapsed * annual_bps * nav / (10000 * year)`.
pub fn aum_fee_value(nav: u128, annual_bps: u32, elapsed: u64) -> MathResult<u128> {
    Ok(accrue_aum_fee(nav, annual_bps, elapsed, 0)?.value)
}

/// [`aum_fee_value`] plus a `carried` remainder from the previous period.
/// Sub-unit fees add up across periods instead of rounding away.
pub fn accrue_aum_fee(
    nav: u128,
    annual_bps: u32,
    elapsed: u64,
    carried: u64,
) -> MathResult<AumAccrual> {
    let rate = u128::from(annual_bps) * u128::from(elapsed);
    let denominator = U256::new(BPS_DENOMINATOR * u128::from(SECONDS_PER_YEAR));
    let numerator = U256::new(nav)
        .checked_mul(U256::new(rate))
        .and_then(|n| n.checked_add(U256::new(u128::from(carried))))
        .ok_or(MathError::Overflow)?;

    let value = narrow_u128(numerator / denominator)?;
    let remainder = u64::try_from(narrow_u128(numerator % denominator)?)
        .map_err(|_| MathError::Overflow)?;
    Ok(AumAccrual { value, remainder })
}
