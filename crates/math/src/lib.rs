//! # Meridian Math
//!
//! Fixed-point price math shared by the fund's oracle and accounting layers:
//!
//! - Full-precision `mul_div` over 256-bit operands with a 512-bit
//!   intermediate product
//! - Tick <-> sqrt-price conversion in Q64.96, bit-exact with the AMM pools
//!   the oracle reads
//!
//! Everything here is pure and deterministic. Errors are reported as
//! [`MathError`] and are always fatal to the caller.

pub mod constants;
pub mod errors;
pub mod full_math;
pub mod tick_math;

pub use constants::*;
pub use errors::{MathError, MathResult};
pub use full_math::{full_mul, mul_div, mul_div_rounding_up, mul_div_u128, mul_mod, narrow_u128};
pub use tick_math::{get_sqrt_price_at_tick, get_tick_at_sqrt_price};

/// 256-bit unsigned integer used for every intermediate price value.
pub use ethnum::U256;
