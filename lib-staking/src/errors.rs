//! Staking Ledger Errors

use lib_types::Amount;
use thiserror::Error;

/// Error during ledger operations
///
/// Every variant aborts the whole operation; nothing is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Invalid pool state: {0}")]
    InvalidPoolState(String),

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Corrupted ledger state: {0}")]
    CorruptedState(String),

    #[error("Zero amount not allowed")]
    ZeroAmount,

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for ledger operations
pub type StakingResult<T> = Result<T, StakingError>;
