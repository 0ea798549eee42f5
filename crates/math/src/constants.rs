//! # Math Constants
//!
//! Fixed-point scales and the legal tick / sqrt-price domain.

use ethnum::U256;

// ============================================================================
// Fixed-Point Scales
// ============================================================================

/// Q96 scale used by sqrt prices: 2^96
pub const Q96: U256 = U256::from_words(0, 1u128 << 96);

/// Q128 scale: 2^128
pub const Q128: U256 = U256::from_words(1, 0);

/// Q192 scale, the square of Q96: 2^192
pub const Q192: U256 = U256::from_words(1u128 << 64, 0);

// ============================================================================
// Tick Domain
// ============================================================================

/// Minimum tick, log base 1.0001 of 2^-128
pub const MIN_TICK: i32 = -887_272;

/// Maximum tick, log base 1.0001 of 2^128
pub const MAX_TICK: i32 = -MIN_TICK;

/// `get_sqrt_price_at_tick(MIN_TICK)`
pub const MIN_SQRT_RATIO: U256 = U256::from_words(0, 4_295_128_739);

/// `get_sqrt_price_at_tick(MAX_TICK)`
pub const MAX_SQRT_RATIO: U256 = U256::from_words(
    0xfffd_8963,
    0xefd1_fc6a_5064_8849_5d95_1d52_6398_8d26,
);

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u128 = 10_000;
