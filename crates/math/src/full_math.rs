//! # Full-Precision Multiply-Divide
//!
//! `floor(a * b / denominator)` for 256-bit operands where the product may
//! need up to 512 bits. The 512-bit product is split into two words, the
//! remainder is subtracted out so the division becomes exact, and the exact
//! division is finished with a multiplicative inverse modulo 2^256.

use ethnum::U256;

use crate::errors::{MathError, MathResult};

// ============================================================================
// 512-bit Helpers
// ============================================================================

/// Multiply two 256-bit values, returning the full product as `(lo, hi)`
/// words: `a * b == hi * 2^256 + lo`.
pub fn full_mul(a: U256, b: U256) -> (U256, U256) {
    let (a_hi, a_lo) = a.into_words();
    let (b_hi, b_lo) = b.into_words();

    // 128x128 partial products always fit in 256 bits
    let ll = U256::new(a_lo) * U256::new(b_lo);
    let lh = U256::new(a_lo) * U256::new(b_hi);
    let hl = U256::new(a_hi) * U256::new(b_lo);
    let hh = U256::new(a_hi) * U256::new(b_hi);

    let (mid, mid_carry) = lh.overflowing_add(hl);
    let (mid_hi, mid_lo) = mid.into_words();

    let (lo, lo_carry) = ll.overflowing_add(U256::from_words(mid_lo, 0));
    let hi = hh
        .wrapping_add(U256::new(mid_hi))
        .wrapping_add(U256::from_words(mid_carry as u128, 0))
        .wrapping_add(U256::new(lo_carry as u128));

    (lo, hi)
}

/// Reduce the 512-bit value `hi * 2^256 + lo` modulo `modulus`.
fn reduce_512(lo: U256, hi: U256, modulus: U256) -> U256 {
    let mut rem = hi % modulus;
    for bit in (0..256u32).rev() {
        // rem < modulus, so 2 * rem < 2 * modulus and one subtraction suffices
        let (doubled, carry) = rem.overflowing_add(rem);
        rem = if carry || doubled >= modulus {
            doubled.wrapping_sub(modulus)
        } else {
            doubled
        };

        if (lo >> bit) & U256::ONE == U256::ONE {
            rem += U256::ONE;
            if rem == modulus {
                rem = U256::ZERO;
            }
        }
    }
    rem
}

/// `(a * b) % modulus` without intermediate overflow.
pub fn mul_mod(a: U256, b: U256, modulus: U256) -> MathResult<U256> {
    if modulus == U256::ZERO {
        return Err(MathError::DivisionByZero);
    }
    let (lo, hi) = full_mul(a, b);
    Ok(reduce_512(lo, hi, modulus))
}

// ============================================================================
// Multiply-Divide
// ============================================================================

/// Calculates `floor(a * b / denominator)` with full precision.
///
/// Fails with [`MathError::DivisionByZero`] when `denominator == 0` and with
/// [`MathError::MulDivOverflow`] when the result does not fit in 256 bits,
/// which is exactly the case `denominator <= hi(a * b)`.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> MathResult<U256> {
    if denominator == U256::ZERO {
        return Err(MathError::DivisionByZero);
    }

    let (mut prod0, mut prod1) = full_mul(a, b);

    // Product fits in 256 bits: plain division
    if prod1 == U256::ZERO {
        return Ok(prod0 / denominator);
    }

    if denominator <= prod1 {
        return Err(MathError::MulDivOverflow);
    }

    // Make the division exact by subtracting the remainder from [prod1 prod0]
    let remainder = reduce_512(prod0, prod1, denominator);
    if remainder > prod0 {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }
    prod0 = prod0.wrapping_sub(remainder);

    // Factor powers of two out of the denominator. `twos` is the largest
    // power of two dividing it.
    let twos = denominator & (!denominator).wrapping_add(U256::ONE);
    let denominator = denominator / twos;
    prod0 /= twos;

    // Shift the bits of prod1 into prod0: twos becomes 2^256 / twos
    let twos = (U256::ZERO.wrapping_sub(twos) / twos).wrapping_add(U256::ONE);
    prod0 |= prod1.wrapping_mul(twos);

    // denominator is now odd and invertible modulo 2^256. Seed with an inverse
    // correct to four bits, then Newton-Raphson doubles the correct bits on
    // each step: 8, 16, 32, 64, 128, 256.
    let two = U256::new(2);
    let mut inv = denominator.wrapping_mul(U256::new(3)) ^ two;
    for _ in 0..6 {
        inv = inv.wrapping_mul(two.wrapping_sub(denominator.wrapping_mul(inv)));
    }

    // The division is exact, so multiplying by the inverse yields the quotient
    Ok(prod0.wrapping_mul(inv))
}

/// Calculates `ceil(a * b / denominator)` with full precision.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> MathResult<U256> {
    let result = mul_div(a, b, denominator)?;
    if mul_mod(a, b, denominator)? > U256::ZERO {
        if result == U256::MAX {
            return Err(MathError::MulDivOverflow);
        }
        return Ok(result + U256::ONE);
    }
    Ok(result)
}

/// `floor(a * b / denominator)` for 128-bit operands, failing when the
/// quotient does not fit back into 128 bits.
pub fn mul_div_u128(a: u128, b: u128, denominator: u128) -> MathResult<u128> {
    let result = mul_div(U256::new(a), U256::new(b), U256::new(denominator))?;
    narrow_u128(result)
}

/// Narrow a 256-bit value to `u128`.
pub fn narrow_u128(value: U256) -> MathResult<u128> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(MathError::Overflow);
    }
    Ok(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_mul_small() {
        let (lo, hi) = full_mul(U256::new(1_000), U256::new(3));
        assert_eq!(lo, U256::new(3_000));
        assert_eq!(hi, U256::ZERO);
    }

    #[test]
    fn test_full_mul_max() {
        // (2^256 - 1)^2 = 2^512 - 2^257 + 1
        let (lo, hi) = full_mul(U256::MAX, U256::MAX);
        assert_eq!(lo, U256::ONE);
        assert_eq!(hi, U256::MAX - U256::ONE);
    }

    #[test]
    fn test_mul_div_basic() {
        assert_eq!(mul_div(U256::new(10), U256::new(3), U256::new(4)).unwrap(), U256::new(7));
        assert_eq!(
            mul_div_rounding_up(U256::new(10), U256::new(3), U256::new(4)).unwrap(),
            U256::new(8)
        );
        assert_eq!(
            mul_div_rounding_up(U256::new(10), U256::new(4), U256::new(5)).unwrap(),
            U256::new(8)
        );
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(
            mul_div(U256::new(5), U256::new(5), U256::ZERO),
            Err(MathError::DivisionByZero)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::ZERO),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn test_mul_div_overflow_when_denominator_not_above_high_word() {
        // hi(MAX * MAX) = MAX - 1
        assert_eq!(
            mul_div(U256::MAX, U256::MAX, U256::MAX - U256::ONE),
            Err(MathError::MulDivOverflow)
        );
        assert_eq!(
            mul_div(U256::MAX, U256::new(2), U256::ONE),
            Err(MathError::MulDivOverflow)
        );
    }

    #[test]
    fn test_mul_div_phantom_overflow() {
        // Product overflows 256 bits but the quotient does not
        let q128 = U256::ONE << 128;
        assert_eq!(
            mul_div(q128, U256::new(50) * q128, U256::new(150) * q128).unwrap(),
            q128 / U256::new(3)
        );
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::MAX).unwrap(), U256::MAX);
    }

    #[test]
    fn test_mul_div_rounding_up_exact_at_max() {
        assert_eq!(
            mul_div_rounding_up(U256::MAX, U256::MAX, U256::MAX).unwrap(),
            U256::MAX
        );
        assert_eq!(
            mul_div_rounding_up(U256::MAX, U256::MAX - U256::ONE, U256::MAX).unwrap(),
            U256::MAX - U256::ONE
        );
    }

    #[test]
    fn test_mul_mod() {
        assert_eq!(mul_mod(U256::new(7), U256::new(9), U256::new(10)).unwrap(), U256::new(3));
        assert_eq!(mul_mod(U256::MAX, U256::MAX, U256::MAX).unwrap(), U256::ZERO);
        assert_eq!(
            mul_mod(U256::MAX, U256::MAX, U256::new(1_000_003)).unwrap(),
            // (2^256 - 1)^2 mod p computed independently: ((2^256 - 1) mod p)^2 mod p
            {
                let r = U256::MAX % U256::new(1_000_003);
                (r * r) % U256::new(1_000_003)
            }
        );
    }

    #[test]
    fn test_mul_div_u128_narrowing() {
        assert_eq!(mul_div_u128(u128::MAX, 2, 2).unwrap(), u128::MAX);
        assert_eq!(mul_div_u128(u128::MAX, 2, 1), Err(MathError::Overflow));
    }
}
