//! Pool accumulators and stake records
//!
//! Both types are plain `Copy` values. A missing entry in any store is the
//! same as a zeroed value, so records and pools come into existence on first
//! reference and are never destroyed.

use lib_types::Amount;
use serde::{Deserialize, Serialize};

use crate::math::U256;

/// Pool-wide totals and accumulators for one (chain, pool).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccumulator {
    /// Sum of committed balances. Transfer-path credits and debits move shares
    /// between records without touching this.
    pub total: Amount,

    /// Cumulative fraction of locked shares released pool-wide (Q128).
    /// Never decreases.
    pub unlocked_acc: U256,

    /// Cumulative dividend per unit of committed share (Q128).
    /// Never decreases.
    pub dividend_acc: U256,
}

impl PoolAccumulator {
    /// Whether anything has ever been staked or injected here
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.unlocked_acc.is_zero() && self.dividend_acc.is_zero()
    }
}

/// One owner's balances within a pool.
///
/// # Invariant
/// `locked <= freezed` after every operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    /// Committed shares (principal plus restaked earnings)
    pub freezed: Amount,

    /// Subset of `freezed` reserved for an external action
    pub locked: Amount,

    /// Withdrawable balance accrued from settled dividends and unlocks
    pub actived: Amount,

    /// `dividend_acc` at the last dividend settlement
    pub dividend_correction: U256,

    /// `unlocked_acc` at the last lock settlement
    pub unlocked_correction: U256,
}

impl StakeRecord {
    /// Committed shares not covered by a reservation
    pub fn available(&self) -> Amount {
        self.freezed.saturating_sub(self.locked)
    }

    /// Whether every balance is zero. Corrections are ignored.
    pub fn is_empty(&self) -> bool {
        self.freezed == 0 && self.locked == 0 && self.actived == 0
    }
}
