//! Lazy Settlement
//!
//! Pure state transitions over one [`PoolAccumulator`] and one
//! [`StakeRecord`]. No storage, no events, no logging.
//!
//! # Accumulator + correction
//!
//! Pool-wide injections only bump a Q128 accumulator. An owner's share of
//! everything injected since their last settlement is
//!
//! ```text
//! balance * (acc - correction) / 2^128
//! ```
//!
//! after which `correction = acc`. Settlement is O(1) per owner and a second
//! consecutive settlement yields zero.
//!
//! # Atomicity
//!
//! Every function either returns `Ok` with the inputs updated, or returns
//! `Err` with the inputs untouched. Callers composing several steps still
//! need to work on copies (see the ledger overlay).

use lib_types::Amount;

use crate::errors::{StakingError, StakingResult};
use crate::math::{add_amount, mul_div_amount, per_unit, Q128};
use crate::state::{PoolAccumulator, StakeRecord};

/// Dividend `add_dividend` would settle right now.
pub fn pending_dividend(pool: &PoolAccumulator, record: &StakeRecord) -> StakingResult<Amount> {
    let delta = pool
        .dividend_acc
        .checked_sub(record.dividend_correction)
        .ok_or_else(|| {
            StakingError::CorruptedState(
                "dividend correction ahead of pool accumulator".to_string(),
            )
        })?;
    mul_div_amount(record.freezed, delta, Q128)
}

/// Unlock `cancel` would settle right now.
pub fn pending_unlock(pool: &PoolAccumulator, record: &StakeRecord) -> StakingResult<Amount> {
    let delta = pool
        .unlocked_acc
        .checked_sub(record.unlocked_correction)
        .ok_or_else(|| {
            StakingError::CorruptedState("unlock correction ahead of pool accumulator".to_string())
        })?;
    mul_div_amount(record.locked, delta, Q128)
}

/// Settle accrued dividend for one owner.
///
/// With `restake` the dividend is compounded into `freezed` (and into the pool
/// total unless `is_transfer`); otherwise it becomes withdrawable.
///
/// Returns the settled amount.
pub fn add_dividend(
    pool: &mut PoolAccumulator,
    record: &mut StakeRecord,
    restake: bool,
    is_transfer: bool,
) -> StakingResult<Amount> {
    let amount = pending_dividend(pool, record)?;

    let mut next = *record;
    let mut total = pool.total;
    next.dividend_correction = pool.dividend_acc;

    if restake {
        next.freezed = add_amount(next.freezed, amount)?;
        if !is_transfer {
            total = add_amount(total, amount)?;
        }
    } else {
        next.actived = add_amount(next.actived, amount)?;
    }

    *record = next;
    pool.total = total;
    Ok(amount)
}

/// Settle pool-wide unlocks against one owner's reservation.
///
/// Moves the owner's share of released shares from `locked` to `actived`.
/// Returns the settled amount.
pub fn cancel(pool: &PoolAccumulator, record: &mut StakeRecord) -> StakingResult<Amount> {
    let unlocked = pending_unlock(pool, record)?;
    if unlocked > record.locked {
        return Err(StakingError::CorruptedState(format!(
            "settled unlock {} exceeds locked {}",
            unlocked, record.locked
        )));
    }

    let actived = add_amount(record.actived, unlocked)?;
    record.locked -= unlocked;
    record.actived = actived;
    record.unlocked_correction = pool.unlocked_acc;
    Ok(unlocked)
}

/// Commit `amount` shares to an owner.
///
/// Returns the dividend settled beforehand.
pub fn deposit(
    pool: &mut PoolAccumulator,
    record: &mut StakeRecord,
    amount: Amount,
    restake: bool,
    is_transfer: bool,
) -> StakingResult<Amount> {
    let mut next_pool = *pool;
    let mut next = *record;

    let dividend = add_dividend(&mut next_pool, &mut next, restake, is_transfer)?;
    next.freezed = add_amount(next.freezed, amount)?;
    if !is_transfer {
        next_pool.total = add_amount(next_pool.total, amount)?;
    }

    *pool = next_pool;
    *record = next;
    Ok(dividend)
}

/// Take `amount` committed shares back from an owner.
///
/// Only the unreserved part of `freezed` can be released.
/// Returns the dividend settled beforehand.
pub fn release(
    pool: &mut PoolAccumulator,
    record: &mut StakeRecord,
    amount: Amount,
    restake: bool,
    is_transfer: bool,
) -> StakingResult<Amount> {
    let mut next_pool = *pool;
    let mut next = *record;

    let dividend = add_dividend(&mut next_pool, &mut next, restake, is_transfer)?;

    let available = next.available();
    if available < amount {
        return Err(StakingError::InsufficientBalance {
            have: available,
            need: amount,
        });
    }

    next.freezed -= amount;
    if !is_transfer {
        next_pool.total = next_pool.total.checked_sub(amount).ok_or_else(|| {
            StakingError::CorruptedState(format!(
                "pool total {} below released amount {}",
                next_pool.total, amount
            ))
        })?;
    }

    *pool = next_pool;
    *record = next;
    Ok(dividend)
}

/// Grow an owner's reservation by `amount`.
///
/// Increase-only: when `locked` already covers `amount` nothing changes.
/// Otherwise `amount` is added on top of the current reservation, so callers
/// pass the increment and repeated calls accumulate.
///
/// Returns `(settled_unlock, applied)`.
pub fn lock(
    pool: &PoolAccumulator,
    record: &mut StakeRecord,
    amount: Amount,
) -> StakingResult<(Amount, bool)> {
    let mut next = *record;
    let settled = cancel(pool, &mut next)?;

    if next.locked >= amount {
        *record = next;
        return Ok((settled, false));
    }

    let target = add_amount(next.locked, amount)?;
    if target > next.freezed {
        return Err(StakingError::InsufficientBalance {
            have: next.available(),
            need: amount,
        });
    }

    next.locked = target;
    *record = next;
    Ok((settled, true))
}

/// Drop `amount` from an owner's reservation without moving funds.
///
/// Returns the unlock settled beforehand.
pub fn unlock(
    pool: &PoolAccumulator,
    record: &mut StakeRecord,
    amount: Amount,
) -> StakingResult<Amount> {
    let mut next = *record;
    let settled = cancel(pool, &mut next)?;

    if next.locked < amount {
        return Err(StakingError::InsufficientBalance {
            have: next.locked,
            need: amount,
        });
    }

    next.locked -= amount;
    *record = next;
    Ok(settled)
}

/// Take and zero the withdrawable balance. Performs no settlement.
pub fn withdraw(record: &mut StakeRecord) -> Amount {
    std::mem::take(&mut record.actived)
}

/// Make `amount` locked shares releasable pool-wide, pro rata.
pub fn refund(pool: &mut PoolAccumulator, amount: Amount) -> StakingResult<()> {
    let increment = per_unit(amount, pool.total)?;
    pool.unlocked_acc = pool
        .unlocked_acc
        .checked_add(increment)
        .ok_or(StakingError::ArithmeticOverflow)?;
    Ok(())
}

/// Distribute `amount` of dividend pool-wide, pro rata to committed shares.
pub fn update_dividend(pool: &mut PoolAccumulator, amount: Amount) -> StakingResult<()> {
    let increment = per_unit(amount, pool.total)?;
    pool.dividend_acc = pool
        .dividend_acc
        .checked_add(increment)
        .ok_or(StakingError::ArithmeticOverflow)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::U256;

    fn staked(pool: &mut PoolAccumulator, freezed: Amount) -> StakeRecord {
        let mut record = StakeRecord::default();
        deposit(pool, &mut record, freezed, false, false).unwrap();
        record
    }

    #[test]
    fn test_deposit_and_release_track_total() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        let b = staked(&mut pool, 400);
        assert_eq!(pool.total, 1_000);
        assert_eq!(a.freezed + b.freezed, pool.total);

        release(&mut pool, &mut a, 100, false, false).unwrap();
        assert_eq!(a.freezed, 500);
        assert_eq!(pool.total, 900);
    }

    #[test]
    fn test_transfer_path_leaves_total() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);

        deposit(&mut pool, &mut a, 50, false, true).unwrap();
        assert_eq!(a.freezed, 650);
        assert_eq!(pool.total, 600);

        release(&mut pool, &mut a, 50, false, true).unwrap();
        assert_eq!(a.freezed, 600);
        assert_eq!(pool.total, 600);
    }

    #[test]
    fn test_dividend_is_settled_pro_rata() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        let mut b = staked(&mut pool, 400);

        update_dividend(&mut pool, 100).unwrap();
        assert_eq!(
            pool.dividend_acc,
            U256::from(100u64) * crate::math::Q128 / U256::from(1_000u64)
        );

        let settled_a = add_dividend(&mut pool, &mut a, false, false).unwrap();
        let settled_b = add_dividend(&mut pool, &mut b, false, false).unwrap();

        // floor dust: at most one unit per settlement
        assert!((59..=60).contains(&settled_a));
        assert!((39..=40).contains(&settled_b));
        assert!(settled_a + settled_b <= 100);
        assert!(settled_a + settled_b >= 98);
        assert_eq!(a.actived, settled_a);
        assert_eq!(b.actived, settled_b);
    }

    #[test]
    fn test_add_dividend_is_idempotent() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 512);
        update_dividend(&mut pool, 64).unwrap();

        let first = add_dividend(&mut pool, &mut a, false, false).unwrap();
        let second = add_dividend(&mut pool, &mut a, false, false).unwrap();
        assert_eq!(first, 64);
        assert_eq!(second, 0);
    }

    #[test]
    fn test_restake_compounds_into_total() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 256);
        update_dividend(&mut pool, 32).unwrap();

        let settled = add_dividend(&mut pool, &mut a, true, false).unwrap();
        assert_eq!(settled, 32);
        assert_eq!(a.freezed, 288);
        assert_eq!(a.actived, 0);
        assert_eq!(pool.total, 288);
    }

    #[test]
    fn test_restake_on_transfer_path_skips_total() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 256);
        update_dividend(&mut pool, 32).unwrap();

        add_dividend(&mut pool, &mut a, true, true).unwrap();
        assert_eq!(a.freezed, 288);
        assert_eq!(pool.total, 256);
    }

    #[test]
    fn test_cancel_moves_released_share_to_actived() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        let _b = staked(&mut pool, 400);

        lock(&pool, &mut a, 500).unwrap();
        refund(&mut pool, 250).unwrap();

        let unlocked = cancel(&pool, &mut a).unwrap();
        assert_eq!(unlocked, 125);
        assert_eq!(a.locked, 375);
        assert_eq!(a.actived, 125);
        assert_eq!(a.freezed, 600);

        assert_eq!(cancel(&pool, &mut a).unwrap(), 0);
    }

    #[test]
    fn test_lock_is_increase_only() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);

        assert_eq!(lock(&pool, &mut a, 200).unwrap(), (0, true));
        assert_eq!(a.locked, 200);

        // already covered: no-op
        assert_eq!(lock(&pool, &mut a, 150).unwrap(), (0, false));
        assert_eq!(a.locked, 200);

        // not covered: the increment stacks on top
        assert_eq!(lock(&pool, &mut a, 300).unwrap(), (0, true));
        assert_eq!(a.locked, 500);
    }

    #[test]
    fn test_lock_beyond_freezed_fails_untouched() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        lock(&pool, &mut a, 400).unwrap();
        let before = a;

        let result = lock(&pool, &mut a, 500);
        assert_eq!(
            result,
            Err(StakingError::InsufficientBalance { have: 200, need: 500 })
        );
        assert_eq!(a, before);
    }

    #[test]
    fn test_unlock_requires_reservation() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        lock(&pool, &mut a, 100).unwrap();

        assert!(matches!(
            unlock(&pool, &mut a, 101),
            Err(StakingError::InsufficientBalance { have: 100, need: 101 })
        ));

        unlock(&pool, &mut a, 100).unwrap();
        assert_eq!(a.locked, 0);
        assert_eq!(a.actived, 0);
    }

    #[test]
    fn test_release_respects_reservation() {
        let mut pool = PoolAccumulator::default();
        let mut a = staked(&mut pool, 600);
        lock(&pool, &mut a, 500).unwrap();
        let (pool_before, record_before) = (pool, a);

        let result = release(&mut pool, &mut a, 101, false, false);
        assert_eq!(
            result,
            Err(StakingError::InsufficientBalance { have: 100, need: 101 })
        );
        assert_eq!(a, record_before);
        assert_eq!(pool, pool_before);
    }

    #[test]
    fn test_withdraw_zeroes_actived() {
        let mut record = StakeRecord {
            actived: 42,
            ..Default::default()
        };
        assert_eq!(withdraw(&mut record), 42);
        assert_eq!(withdraw(&mut record), 0);
    }

    #[test]
    fn test_injections_require_stake() {
        let mut pool = PoolAccumulator::default();
        assert!(matches!(
            update_dividend(&mut pool, 1),
            Err(StakingError::InvalidPoolState(_))
        ));
        assert!(matches!(
            refund(&mut pool, 1),
            Err(StakingError::InvalidPoolState(_))
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_accumulator_overflow_is_reported() {
        let mut pool = PoolAccumulator {
            total: 1,
            dividend_acc: U256::MAX,
            ..Default::default()
        };
        assert_eq!(
            update_dividend(&mut pool, 1),
            Err(StakingError::ArithmeticOverflow)
        );
        assert_eq!(pool.dividend_acc, U256::MAX);
    }

    #[test]
    fn test_correction_ahead_of_pool_is_corrupt() {
        let pool = PoolAccumulator::default();
        let mut record = StakeRecord {
            locked: 10,
            freezed: 10,
            unlocked_correction: U256::one(),
            ..Default::default()
        };
        assert!(matches!(
            cancel(&pool, &mut record),
            Err(StakingError::CorruptedState(_))
        ));
    }
}
