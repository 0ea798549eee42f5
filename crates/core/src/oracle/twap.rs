//! # TWAP (Time-Weighted Average Price) Oracle
//!
//! Derives prices from the cumulative tick observations AMM pools record.
//! The pool does the accumulation; this module only reads two points of the
//! accumulator and turns the difference into a mean tick, then a quote.

use meridian_math::{
    get_sqrt_price_at_tick, mul_div, narrow_u128, MathError, Q128, Q192, U256,
};

use crate::errors::{OracleError, OracleResult};
use crate::interfaces::{AmmPool, PoolDirectory};
use crate::types::Address;

/// Means derived from a window of pool observations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsultOutcome {
    /// Arithmetic mean tick, floored toward negative infinity
    pub arithmetic_mean_tick: i32,
    /// Harmonic mean in-range liquidity over the window
    pub harmonic_mean_liquidity: u128,
}

/// Which pool of a pair to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSelection {
    Tier(u32),
    MostLiquid,
}

// ============================================================================
// Consult
// ============================================================================

/// Mean tick and liquidity of `pool` over the last `window` seconds.
pub fn consult(pool: &dyn AmmPool, window: u32) -> OracleResult<ConsultOutcome> {
    if window == 0 {
        return Err(OracleError::ZeroWindow);
    }

    let observations = pool.observe(&[window, 0])?;
    let (ticks, liquidities) = (
        &observations.tick_cumulatives,
        &observations.seconds_per_liquidity_cumulatives,
    );
    if ticks.len() != 2 || liquidities.len() != 2 {
        return Err(OracleError::PoolRead(format!(
            "expected 2 observations, got {} tick and {} liquidity",
            ticks.len(),
            liquidities.len()
        )));
    }

    let tick_delta = ticks[1]
        .checked_sub(ticks[0])
        .ok_or(OracleError::Math(MathError::Overflow))?;

    Ok(ConsultOutcome {
        arithmetic_mean_tick: mean_tick(tick_delta, window)?,
        harmonic_mean_liquidity: harmonic_mean_liquidity(liquidities[0], liquidities[1], window)?,
    })
}

/// `floor(tick_delta / window)`, rounding toward negative infinity
pub fn mean_tick(tick_delta: i64, window: u32) -> OracleResult<i32> {
    if window == 0 {
        return Err(OracleError::ZeroWindow);
    }
    let window = i64::from(window);
    let mut tick = tick_delta / window;
    if tick_delta < 0 && tick_delta % window != 0 {
        tick -= 1;
    }
    i32::try_from(tick).map_err(|_| OracleError::Math(MathError::Overflow))
}

fn harmonic_mean_liquidity(older: U256, newer: U256, window: u32) -> OracleResult<u128> {
    if newer < older {
        return Err(OracleError::PoolRead(
            "seconds-per-liquidity cumulative decreased".to_string(),
        ));
    }
    let delta = newer - older;
    if delta == U256::ZERO {
        return Ok(0);
    }
    // window * (2^160 - 1) / (delta << 32)
    let window_x160 = U256::new(u128::from(window)) * ((U256::ONE << 160u32) - U256::ONE);
    let denominator = delta << 32u32;
    if denominator == U256::ZERO {
        return Err(OracleError::Math(MathError::Overflow));
    }
    narrow_u128(window_x160 / denominator).map_err(OracleError::Math)
}

// ============================================================================
// Quotes
// ============================================================================

/// Amount of `quote_token` worth `base_amount` of `base_token` at `tick`,
/// where `tick` is the pool tick of the (lower, higher) address pair.
pub fn quote_at_tick(
    tick: i32,
    base_amount: u128,
    base_token: &Address,
    quote_token: &Address,
) -> OracleResult<u128> {
    let sqrt_ratio = get_sqrt_price_at_tick(tick)?;
    let base_amount = U256::new(base_amount);

    // Square in 256 bits while it fits, otherwise drop 64 bits first
    let quote = if sqrt_ratio <= U256::new(u128::MAX) {
        let ratio_x192 = sqrt_ratio * sqrt_ratio;
        if base_token < quote_token {
            mul_div(ratio_x192, base_amount, Q192)?
        } else {
            mul_div(Q192, base_amount, ratio_x192)?
        }
    } else {
        let ratio_x128 = mul_div(sqrt_ratio, sqrt_ratio, U256::ONE << 64u32)?;
        if base_token < quote_token {
            mul_div(ratio_x128, base_amount, Q128)?
        } else {
            mul_div(Q128, base_amount, ratio_x128)?
        }
    };

    Ok(narrow_u128(quote)?)
}

// ============================================================================
// Pool Selection
// ============================================================================

/// A pool is usable for TWAP only with enough buffered observations
pub fn ensure_observations(pool: &dyn AmmPool, min_cardinality: u16) -> OracleResult<()> {
    let state = pool.current_state()?;
    if state.observation_cardinality < min_cardinality {
        return Err(OracleError::InsufficientObservations {
            have: state.observation_cardinality,
            need: min_cardinality,
        });
    }
    Ok(())
}

/// Among `tiers`, the pool of the pair with the greatest liquidity.
/// Pools without liquidity are not candidates; ties keep the earlier tier.
pub fn select_most_liquid<'a, P: PoolDirectory + ?Sized>(
    pools: &'a P,
    token_a: &Address,
    token_b: &Address,
    tiers: &[u32],
) -> OracleResult<(u32, &'a dyn AmmPool)> {
    let mut best: Option<(u32, &'a dyn AmmPool, u128)> = None;

    for &tier in tiers {
        let Some(pool) = pools.pool(token_a, token_b, tier) else {
            continue;
        };
        let liquidity = pool.liquidity()?;
        if liquidity == 0 {
            continue;
        }
        if best.map_or(true, |(_, _, current)| liquidity > current) {
            best = Some((tier, pool, liquidity));
        }
    }

    best.map(|(tier, pool, _)| (tier, pool))
        .ok_or(OracleError::NoLiquidPool)
}

/// Resolve a [`FeeSelection`] to a pool of the pair holding liquidity
pub fn select_pool<'a, P: PoolDirectory + ?Sized>(
    pools: &'a P,
    token_a: &Address,
    token_b: &Address,
    selection: FeeSelection,
    tiers: &[u32],
) -> OracleResult<(u32, &'a dyn AmmPool)> {
    match selection {
        FeeSelection::Tier(tier) => {
            let pool = pools
                .pool(token_a, token_b, tier)
                .ok_or(OracleError::NoLiquidPool)?;
            if pool.liquidity()? == 0 {
                return Err(OracleError::NoLiquidPool);
            }
            Ok((tier, pool))
        }
        FeeSelection::MostLiquid => select_most_liquid(pools, token_a, token_b, tiers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryPoolDirectory, MockPool};

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_mean_tick_rounds_toward_negative_infinity() {
        assert_eq!(mean_tick(-7, 2).unwrap(), -4);
        assert_eq!(mean_tick(-8, 2).unwrap(), -4);
        assert_eq!(mean_tick(7, 2).unwrap(), 3);
        assert_eq!(mean_tick(-1, 1_800).unwrap(), -1);
        assert_eq!(mean_tick(0, 1_800).unwrap(), 0);
        assert_eq!(mean_tick(5, 0), Err(OracleError::ZeroWindow));
    }

    #[test]
    fn test_consult_negative_remainder() {
        // Δ = -18001 over 1800s: truncation would give -10, the floor is -11
        let mut pool = MockPool::new(token(1), token(2), 3_000, 0, 1_000_000);
        pool.set_tick_cumulatives(Some((1_000_000, 1_000_000 - 18_001)));
        let outcome = consult(&pool, 1_800).unwrap();
        assert_eq!(outcome.arithmetic_mean_tick, -11);
    }

    #[test]
    fn test_consult_constant_tick() {
        let pool = MockPool::new(token(1), token(2), 3_000, -2_500, 5_000_000);
        let outcome = consult(&pool, 600).unwrap();
        assert_eq!(outcome.arithmetic_mean_tick, -2_500);
        let liquidity = outcome.harmonic_mean_liquidity;
        assert!(liquidity == 5_000_000 || liquidity == 4_999_999, "{}", liquidity);
    }

    #[test]
    fn test_consult_rejects_short_history() {
        let mut pool = MockPool::new(token(1), token(2), 3_000, 10, 1);
        pool.set_max_history(Some(60));
        assert!(matches!(consult(&pool, 1_800), Err(OracleError::PoolRead(_))));
        assert_eq!(consult(&pool, 0), Err(OracleError::ZeroWindow));
    }

    #[test]
    fn test_quote_at_tick_zero_is_identity() {
        let (a, b) = (token(1), token(2));
        assert_eq!(quote_at_tick(0, 12_345, &a, &b).unwrap(), 12_345);
        assert_eq!(quote_at_tick(0, 12_345, &b, &a).unwrap(), 12_345);
    }

    #[test]
    fn test_quote_direction() {
        let (low, high) = (token(1), token(2));
        // price(token1/token0) = 1.0001^6932 ~= 2.0
        let forward = quote_at_tick(6_932, 1_000_000, &low, &high).unwrap();
        let backward = quote_at_tick(6_932, 1_000_000, &high, &low).unwrap();
        assert!((1_999_000..2_001_000).contains(&forward), "{}", forward);
        assert!((499_800..500_200).contains(&backward), "{}", backward);
    }

    #[test]
    fn test_quote_at_extreme_ticks() {
        let (low, high) = (token(1), token(2));
        // Above u128::MAX sqrt ratio the ratio_x128 branch is taken
        // price ~2.5e30, so 1e10 units quote beyond u128
        let big = quote_at_tick(700_000, 10_000_000_000, &low, &high);
        assert!(matches!(big, Err(OracleError::Math(MathError::Overflow))));
        assert!(quote_at_tick(700_000, 1, &low, &high).unwrap() > u128::from(u64::MAX));
        assert_eq!(quote_at_tick(700_000, 10_000_000_000, &high, &low).unwrap(), 0);
        assert!(quote_at_tick(887_273, 1, &low, &high).is_err());
    }

    #[test]
    fn test_select_most_liquid() {
        let (a, b) = (token(1), token(2));
        let mut pools = MemoryPoolDirectory::new();
        pools.insert(MockPool::new(a, b, 500, 0, 10));
        pools.insert(MockPool::new(a, b, 3_000, 0, 300));
        pools.insert(MockPool::new(a, b, 10_000, 0, 300));

        let (tier, _) = select_most_liquid(&pools, &a, &b, &[500, 3_000, 10_000]).unwrap();
        assert_eq!(tier, 3_000);
        let (tier, _) = select_most_liquid(&pools, &b, &a, &[10_000, 3_000]).unwrap();
        assert_eq!(tier, 10_000);
        assert_eq!(
            select_most_liquid(&pools, &a, &token(3), &[500]).err(),
            Some(OracleError::NoLiquidPool)
        );
    }

    #[test]
    fn test_zero_liquidity_is_not_a_candidate() {
        let (a, b) = (token(1), token(2));
        let mut pools = MemoryPoolDirectory::new();
        pools.insert(MockPool::new(a, b, 500, 0, 0));
        assert_eq!(
            select_most_liquid(&pools, &a, &b, &[500]).err(),
            Some(OracleError::NoLiquidPool)
        );
    }

    #[test]
    fn test_observation_cardinality() {
        let mut pool = MockPool::new(token(1), token(2), 500, 0, 1);
        pool.set_cardinality(4);
        assert_eq!(
            ensure_observations(&pool, 10),
            Err(OracleError::InsufficientObservations { have: 4, need: 10 })
        );
        assert!(ensure_observations(&pool, 4).is_ok());
    }
}
