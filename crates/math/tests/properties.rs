/// Property tests for the fixed-point price math.
/// mul_div is checked against an independent bit-serial 512-bit reference,
/// tick conversion against its own inverse across the legal domain.
use meridian_math::*;
use proptest::prelude::*;

// ============================================================================
// Reference Arithmetic
// ============================================================================

/// Little-endian 64-bit limbs, one spare limb for the running remainder.
type Wide = [u64; 9];

fn limbs(value: U256) -> Wide {
    let (hi, lo) = value.into_words();
    let mut out = [0u64; 9];
    out[0] = lo as u64;
    out[1] = (lo >> 64) as u64;
    out[2] = hi as u64;
    out[3] = (hi >> 64) as u64;
    out
}

fn reference_mul(a: &Wide, b: &Wide) -> Wide {
    let mut out = [0u64; 9];
    for i in 0..4 {
        let mut carry: u128 = 0;
        for j in 0..4 {
            let cur = out[i + j] as u128 + (a[i] as u128) * (b[j] as u128) + carry;
            out[i + j] = cur as u64;
            carry = cur >> 64;
        }
        let mut k = i + 4;
        while carry > 0 {
            let cur = out[k] as u128 + carry;
            out[k] = cur as u64;
            carry = cur >> 64;
            k += 1;
        }
    }
    out
}

fn shl1(x: &mut Wide) {
    let mut carry = 0u64;
    for limb in x.iter_mut() {
        let next = *limb >> 63;
        *limb = (*limb << 1) | carry;
        carry = next;
    }
}

fn at_least(a: &Wide, b: &Wide) -> bool {
    for i in (0..9).rev() {
        if a[i] != b[i] {
            return a[i] > b[i];
        }
    }
    true
}

fn sub_in_place(a: &mut Wide, b: &Wide) {
    let mut borrow = 0u64;
    for i in 0..9 {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        a[i] = d2;
        borrow = (b1 || b2) as u64;
    }
}

/// floor(n / d) by schoolbook long division, one bit at a time.
fn reference_div(n: &Wide, d: &Wide) -> Wide {
    let mut quotient = [0u64; 9];
    let mut rem = [0u64; 9];
    for bit in (0..512).rev() {
        shl1(&mut rem);
        rem[0] |= (n[bit / 64] >> (bit % 64)) & 1;
        if at_least(&rem, d) {
            sub_in_place(&mut rem, d);
            quotient[bit / 64] |= 1 << (bit % 64);
        }
    }
    quotient
}

/// Reference floor(a * b / d), or None when it needs more than 256 bits.
fn reference_mul_div(a: U256, b: U256, d: U256) -> Option<U256> {
    let q = reference_div(&reference_mul(&limbs(a), &limbs(b)), &limbs(d));
    if q[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    let lo = (q[0] as u128) | ((q[1] as u128) << 64);
    let hi = (q[2] as u128) | ((q[3] as u128) << 64);
    Some(U256::from_words(hi, lo))
}

// ============================================================================
// Strategies
// ============================================================================

fn any_u256() -> impl Strategy<Value = U256> {
    prop_oneof![
        (any::<u128>(), any::<u128>()).prop_map(|(hi, lo)| U256::from_words(hi, lo)),
        any::<u128>().prop_map(U256::new),
        (0u32..256).prop_map(|shift| U256::ONE << shift),
        Just(U256::MAX),
    ]
}

fn nonzero_u256() -> impl Strategy<Value = U256> {
    any_u256().prop_map(|value| if value == U256::ZERO { U256::ONE } else { value })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_mul_div_matches_reference(a in any_u256(), b in any_u256(), d in nonzero_u256()) {
        match reference_mul_div(a, b, d) {
            Some(expected) => prop_assert_eq!(mul_div(a, b, d), Ok(expected)),
            None => prop_assert_eq!(mul_div(a, b, d), Err(MathError::MulDivOverflow)),
        }
    }

    #[test]
    fn prop_mul_div_large_products_match_reference(
        a_hi in (1u128 << 64)..=u128::MAX, a_lo in any::<u128>(),
        b_hi in (1u128 << 64)..=u128::MAX, b_lo in any::<u128>(),
        d_hi in any::<u128>(), d_lo in any::<u128>(),
    ) {
        // Products here always exceed 256 bits
        let a = U256::from_words(a_hi, a_lo);
        let b = U256::from_words(b_hi, b_lo);
        let d = U256::from_words(d_hi, d_lo.max(1));
        let (_, high_word) = full_mul(a, b);
        prop_assert!(high_word > U256::ZERO);

        let result = mul_div(a, b, d);
        if d <= high_word {
            prop_assert_eq!(result, Err(MathError::MulDivOverflow));
        } else {
            prop_assert_eq!(Some(result.unwrap()), reference_mul_div(a, b, d));
        }
    }

    #[test]
    fn prop_rounding_up_is_floor_or_next(a in any_u256(), b in any_u256(), d in nonzero_u256()) {
        if let Ok(floor) = mul_div(a, b, d) {
            let exact = mul_mod(a, b, d).unwrap() == U256::ZERO;
            match mul_div_rounding_up(a, b, d) {
                Ok(ceil) if exact => prop_assert_eq!(ceil, floor),
                Ok(ceil) => prop_assert_eq!(ceil, floor + U256::ONE),
                Err(err) => {
                    prop_assert_eq!(err, MathError::MulDivOverflow);
                    prop_assert_eq!(floor, U256::MAX);
                }
            }
        }
    }

    #[test]
    fn prop_tick_round_trip(tick in MIN_TICK..=MAX_TICK) {
        let sqrt_price = get_sqrt_price_at_tick(tick).unwrap();
        if tick < MAX_TICK {
            prop_assert_eq!(get_tick_at_sqrt_price(sqrt_price).unwrap(), tick);
            let next = get_sqrt_price_at_tick(tick + 1).unwrap();
            prop_assert_eq!(get_tick_at_sqrt_price(next - U256::ONE).unwrap(), tick);
        }
    }

    #[test]
    fn prop_sqrt_price_is_monotonic(tick in MIN_TICK..MAX_TICK) {
        prop_assert!(get_sqrt_price_at_tick(tick).unwrap() < get_sqrt_price_at_tick(tick + 1).unwrap());
    }

    #[test]
    fn prop_tick_at_arbitrary_price_is_greatest_lower(hi in 0u128..0xfffd_8963, lo in any::<u128>()) {
        let sqrt_price = U256::from_words(hi, lo);
        prop_assume!(sqrt_price >= MIN_SQRT_RATIO && sqrt_price < MAX_SQRT_RATIO);
        let tick = get_tick_at_sqrt_price(sqrt_price).unwrap();
        prop_assert!(get_sqrt_price_at_tick(tick).unwrap() <= sqrt_price);
        prop_assert!(get_sqrt_price_at_tick(tick + 1).unwrap() > sqrt_price);
    }
}

#[test]
fn test_reference_self_check() {
    assert_eq!(
        reference_mul_div(U256::new(10), U256::new(3), U256::new(4)),
        Some(U256::new(7))
    );
    assert_eq!(reference_mul_div(U256::MAX, U256::MAX, U256::MAX), Some(U256::MAX));
    assert_eq!(reference_mul_div(U256::MAX, U256::new(2), U256::ONE), None);
}

#[test]
fn test_tick_round_trip_strided() {
    let mut tick = MIN_TICK;
    while tick < MAX_TICK {
        let sqrt_price = get_sqrt_price_at_tick(tick).unwrap();
        assert_eq!(get_tick_at_sqrt_price(sqrt_price).unwrap(), tick);
        tick += 97;
    }
}

/// Every tick of the legal domain. Slow in debug builds.
#[test]
#[ignore]
fn test_tick_round_trip_exhaustive() {
    for tick in MIN_TICK..MAX_TICK {
        let sqrt_price = get_sqrt_price_at_tick(tick).unwrap();
        assert_eq!(get_tick_at_sqrt_price(sqrt_price).unwrap(), tick, "tick {}", tick);
    }
}
