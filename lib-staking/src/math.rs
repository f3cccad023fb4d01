//! Full-precision fixed-point arithmetic
//!
//! Accumulators are Q128 fixed-point values stored in 256 bits. Every
//! proportional computation goes through [`mul_div`], which keeps the full
//! 512-bit product before dividing, and always floors.
//!
//! # Rounding
//!
//! Flooring means a settled claim can never exceed what was injected. The
//! unclaimed remainder ("dust") stays in the accumulator domain and is at most
//! one unit per settlement.

use lib_types::Amount;
pub use primitive_types::{U256, U512};

use crate::errors::{StakingError, StakingResult};

/// 2^128, the accumulator scale
pub const Q128: U256 = U256([0, 0, 1, 0]);

/// Compute `floor(a * b / denominator)` without intermediate overflow.
///
/// # Errors
/// * `DivisionByZero` if `denominator` is zero
/// * `ArithmeticOverflow` if the quotient does not fit in 256 bits
pub fn mul_div(a: U256, b: U256, denominator: U256) -> StakingResult<U256> {
    if denominator.is_zero() {
        return Err(StakingError::DivisionByZero);
    }

    let product: U512 = a.full_mul(b);
    let quotient = product / U512::from(denominator);

    U256::try_from(quotient).map_err(|_| StakingError::ArithmeticOverflow)
}

/// [`mul_div`] for a share amount, returning a share amount.
pub fn mul_div_amount(amount: Amount, b: U256, denominator: U256) -> StakingResult<Amount> {
    to_amount(mul_div(U256::from(amount), b, denominator)?)
}

/// Narrow a 256-bit value into an [`Amount`].
pub fn to_amount(value: U256) -> StakingResult<Amount> {
    if value > U256::from(Amount::MAX) {
        return Err(StakingError::ArithmeticOverflow);
    }
    Ok(value.as_u128())
}

/// Checked addition on amounts, mapped to the ledger error.
pub fn add_amount(a: Amount, b: Amount) -> StakingResult<Amount> {
    a.checked_add(b).ok_or(StakingError::ArithmeticOverflow)
}

/// Per-unit Q128 increment for distributing `amount` over `total` units.
///
/// `total == 0` has no meaningful per-unit share and is rejected as an
/// invalid pool state rather than a bare division error.
pub fn per_unit(amount: Amount, total: Amount) -> StakingResult<U256> {
    if total == 0 {
        return Err(StakingError::InvalidPoolState(
            "pool has no committed stake".to_string(),
        ));
    }
    mul_div(U256::from(amount), Q128, U256::from(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q128_is_two_pow_128() {
        assert_eq!(Q128, U256::one() << 128u32);
    }

    #[test]
    fn test_mul_div_floors() {
        // 7 * 3 / 2 = 10.5
        assert_eq!(
            mul_div(U256::from(7u64), U256::from(3u64), U256::from(2u64)).unwrap(),
            U256::from(10u64)
        );
        // 1 * 1 / 3 = 0.33
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::from(3u64)).unwrap(),
            U256::zero()
        );
        // exact
        assert_eq!(
            mul_div(U256::from(6u64), U256::from(4u64), U256::from(8u64)).unwrap(),
            U256::from(3u64)
        );
    }

    #[test]
    fn test_mul_div_intermediate_exceeds_256_bits() {
        // MAX * MAX / MAX = MAX, product needs 512 bits
        assert_eq!(mul_div(U256::MAX, U256::MAX, U256::MAX).unwrap(), U256::MAX);

        // MAX * 2 / 4 = floor(MAX / 2)
        assert_eq!(
            mul_div(U256::MAX, U256::from(2u64), U256::from(4u64)).unwrap(),
            U256::MAX >> 1u32
        );
    }

    #[test]
    fn test_mul_div_quotient_overflow() {
        assert_eq!(
            mul_div(U256::MAX, U256::from(2u64), U256::one()),
            Err(StakingError::ArithmeticOverflow)
        );
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(
            mul_div(U256::one(), U256::one(), U256::zero()),
            Err(StakingError::DivisionByZero)
        );
    }

    #[test]
    fn test_q128_roundtrip_with_exact_divisor() {
        // 250 / 1000 = 1/4 is exact in binary fixed point
        let acc = per_unit(250, 1_000).unwrap();
        assert_eq!(acc, U256::one() << 126u32);
        assert_eq!(mul_div_amount(500, acc, Q128).unwrap(), 125);
    }

    #[test]
    fn test_q128_roundtrip_with_inexact_divisor() {
        // 100 / 1000 = 1/10 is not representable; the increment is floored,
        // so 600 units settle one less than the real-valued 60.
        let acc = per_unit(100, 1_000).unwrap();
        assert_eq!(mul_div_amount(600, acc, Q128).unwrap(), 59);
        assert_eq!(mul_div_amount(400, acc, Q128).unwrap(), 39);
        assert_eq!(mul_div_amount(1_000, acc, Q128).unwrap(), 99);
    }

    #[test]
    fn test_per_unit_rejects_empty_pool() {
        assert!(matches!(
            per_unit(100, 0),
            Err(StakingError::InvalidPoolState(_))
        ));
    }

    #[test]
    fn test_to_amount_bounds() {
        assert_eq!(to_amount(U256::from(Amount::MAX)).unwrap(), Amount::MAX);
        assert_eq!(
            to_amount(U256::from(Amount::MAX) + U256::one()),
            Err(StakingError::ArithmeticOverflow)
        );
    }
}
