//! # Tick Math
//!
//! Conversions between ticks and Q64.96 sqrt prices, where
//! `sqrt_price(tick) = sqrt(1.0001^tick) * 2^96`.
//!
//! Both directions must agree bit-for-bit with the AMM pools whose
//! observations the oracle consumes, so the constants below are the pools'
//! own ladder and log2 coefficients. They are checked against golden vectors,
//! never re-derived.

use ethnum::{I256, U256};

use crate::constants::{MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO};
use crate::errors::{MathError, MathResult};

/// `2^128 / sqrt(1.0001)`, the starting ratio when bit 0 of |tick| is set.
const SQRT_RATIO_BIT_0: u128 = 0xfffc_b933_bd6f_ad37_aa2d_162d_1a59_4001;

/// `2^128 / sqrt(1.0001)^(2^i)` for i = 1..=19, applied for each set bit of
/// |tick| above bit 0.
const SQRT_RATIO_LADDER: [u128; 19] = [
    0xfff9_7272_373d_4132_59a4_6990_580e_213a,
    0xfff2_e50f_5f65_6932_ef12_357c_f3c7_fdcc,
    0xffe5_caca_7e10_e4e6_1c36_24ea_a094_1cd0,
    0xffcb_9843_d60f_6159_c9db_5883_5c92_6644,
    0xff97_3b41_fa98_c081_472e_6896_dfb2_54c0,
    0xff2e_a164_66c9_6a38_43ec_78b3_26b5_2861,
    0xfe5d_ee04_6a99_a2a8_11c4_61f1_969c_3053,
    0xfcbe_86c7_900a_88ae_dcff_c83b_479a_a3a4,
    0xf987_a725_3ac4_1317_6f2b_074c_f781_5e54,
    0xf339_2b08_22b7_0005_940c_7a39_8e4b_70f3,
    0xe715_9475_a2c2_9b74_43b2_9c7f_a6e8_89d9,
    0xd097_f3bd_fd20_22b8_845a_d8f7_92aa_5825,
    0xa9f7_4646_2d87_0fdf_8a65_dc1f_90e0_61e5,
    0x70d8_69a1_56d2_a1b8_90bb_3df6_2baf_32f7,
    0x31be_135f_97d0_8fd9_8123_1505_542f_cfa6,
    0x09aa_508b_5b7a_84e1_c677_de54_f3e9_9bc9,
    0x005d_6af8_dedb_8119_6699_c329_225e_e604,
    0x0000_2216_e584_f5fa_1ea9_2604_1bed_fe98,
    0x0000_0000_048a_1703_91f7_dc42_444e_8fa2,
];

/// log_sqrt(1.0001)(2) as a 128.128 fixed-point multiplier applied to a
/// 64.64 log2.
const LOG_SQRT_10001_COEFFICIENT: i128 = 255_738_958_999_603_826_347_141;

/// Error bounds of the log approximation, in 128.128. Subtracting the first
/// gives a tick that is never too high, adding the second one that is never
/// too low.
const TICK_LOW_ERROR: u128 = 3_402_992_956_809_132_418_596_140_100_660_247_210;
const TICK_HIGH_ERROR: u128 = 291_339_464_771_989_622_907_027_621_153_398_088_495;

// ============================================================================
// Tick -> Sqrt Price
// ============================================================================

/// Calculates `sqrt(1.0001^tick) * 2^96`.
///
/// Builds `1 / sqrt(1.0001^|tick|)` in Q128.128 from the ladder, inverts it
/// for positive ticks and rounds up into Q64.96.
pub fn get_sqrt_price_at_tick(tick: i32) -> MathResult<U256> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK as u32 {
        return Err(MathError::TickOutOfRange(tick));
    }

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::new(SQRT_RATIO_BIT_0)
    } else {
        U256::from_words(1, 0)
    };

    for (i, multiplier) in SQRT_RATIO_LADDER.iter().enumerate() {
        if abs_tick & (0x2 << i) != 0 {
            ratio = (ratio * U256::new(*multiplier)) >> 128u32;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so get_tick_at_sqrt_price is consistent
    let round_up = if ratio & U256::new(0xffff_ffff) == U256::ZERO {
        U256::ZERO
    } else {
        U256::ONE
    };
    Ok((ratio >> 32u32) + round_up)
}

// ============================================================================
// Sqrt Price -> Tick
// ============================================================================

/// Calculates the greatest tick whose sqrt price is `<= sqrt_price`.
///
/// Valid for `MIN_SQRT_RATIO <= sqrt_price < MAX_SQRT_RATIO`.
pub fn get_tick_at_sqrt_price(sqrt_price: U256) -> MathResult<i32> {
    if sqrt_price < MIN_SQRT_RATIO || sqrt_price >= MAX_SQRT_RATIO {
        return Err(MathError::SqrtPriceOutOfRange);
    }

    // Work on the ratio in Q128.128
    let ratio = sqrt_price << 32u32;
    let msb = 255 - ratio.leading_zeros();

    // Normalize into [2^127, 2^128)
    let mut r = if msb >= 128 {
        ratio >> (msb - 127)
    } else {
        ratio << (127 - msb)
    };

    // Integer part of log2, as 64.64
    let mut log_2: i128 = (msb as i128 - 128) << 64;

    // Fractional bits by repeated squaring: if r^2 >= 2 the next bit is set
    for bit in (50..=63).rev() {
        r = (r * r) >> 127u32;
        if r >> 128u32 == U256::ONE {
            log_2 |= 1i128 << bit;
            r >>= 1u32;
        }
    }

    let log_sqrt10001 = I256::new(log_2) * I256::new(LOG_SQRT_10001_COEFFICIENT);

    let tick_low = tick_from_q128(log_sqrt10001 - I256::from_words(0, TICK_LOW_ERROR as i128));
    let tick_high = tick_from_q128(log_sqrt10001 + I256::from_words(0, TICK_HIGH_ERROR as i128));

    if tick_low == tick_high {
        return Ok(tick_low);
    }

    if get_sqrt_price_at_tick(tick_high)? <= sqrt_price {
        Ok(tick_high)
    } else {
        Ok(tick_low)
    }
}

/// Floor a 128.128 value to its integer part.
fn tick_from_q128(value: I256) -> i32 {
    let (_, lo) = (value >> 128u32).into_words();
    lo as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{MIN_TICK, Q96};

    #[test]
    fn test_tick_zero_is_q96() {
        assert_eq!(get_sqrt_price_at_tick(0).unwrap(), Q96);
        assert_eq!(get_tick_at_sqrt_price(Q96).unwrap(), 0);
    }

    #[test]
    fn test_domain_bounds() {
        assert_eq!(get_sqrt_price_at_tick(MIN_TICK).unwrap(), MIN_SQRT_RATIO);
        assert_eq!(get_sqrt_price_at_tick(MAX_TICK).unwrap(), MAX_SQRT_RATIO);
        assert_eq!(
            get_sqrt_price_at_tick(MIN_TICK - 1),
            Err(MathError::TickOutOfRange(MIN_TICK - 1))
        );
        assert_eq!(
            get_sqrt_price_at_tick(MAX_TICK + 1),
            Err(MathError::TickOutOfRange(MAX_TICK + 1))
        );
        assert_eq!(
            get_sqrt_price_at_tick(i32::MIN),
            Err(MathError::TickOutOfRange(i32::MIN))
        );
    }

    #[test]
    fn test_sqrt_price_domain() {
        assert_eq!(get_tick_at_sqrt_price(MIN_SQRT_RATIO).unwrap(), MIN_TICK);
        assert_eq!(
            get_tick_at_sqrt_price(MAX_SQRT_RATIO - U256::ONE).unwrap(),
            MAX_TICK - 1
        );
        assert_eq!(
            get_tick_at_sqrt_price(MIN_SQRT_RATIO - U256::ONE),
            Err(MathError::SqrtPriceOutOfRange)
        );
        assert_eq!(
            get_tick_at_sqrt_price(MAX_SQRT_RATIO),
            Err(MathError::SqrtPriceOutOfRange)
        );
    }

    #[test]
    fn test_symmetry_around_zero() {
        // price(t) * price(-t) == 1 within rounding, so sqrt(t) * sqrt(-t) ~ 2^192
        for tick in [1, 10, 1_000, 50_000, 400_000] {
            let up = get_sqrt_price_at_tick(tick).unwrap();
            let down = get_sqrt_price_at_tick(-tick).unwrap();
            let product = up * down;
            let q192 = U256::ONE << 192u32;
            let diff = if product > q192 { product - q192 } else { q192 - product };
            // relative error below 2^-64
            assert!(diff < q192 >> 64u32, "tick {}", tick);
        }
    }

    #[test]
    fn test_neighbouring_prices_bracket() {
        for tick in [-200_000, -1, 0, 1, 123_456] {
            let at = get_sqrt_price_at_tick(tick).unwrap();
            let next = get_sqrt_price_at_tick(tick + 1).unwrap();
            assert!(at < next);
            assert_eq!(get_tick_at_sqrt_price(at).unwrap(), tick);
            assert_eq!(get_tick_at_sqrt_price(next - U256::ONE).unwrap(), tick);
        }
    }
}
