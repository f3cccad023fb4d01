//! Staking Ledger
//!
//! Tracks staked shares per owner per pool and distributes pool-wide
//! dividends and unlocks proportionally to stake, without iterating over
//! stakers.
//!
//! Each owner's balance is split three ways:
//! - `freezed`: committed shares
//! - `locked`: the part of `freezed` reserved for an external action
//! - `actived`: withdrawable, filled by settlement
//!
//! # Key Types
//!
//! - [`StakingLedger`]: store-backed ledger, all-or-nothing operations
//! - [`PoolAccumulator`] / [`StakeRecord`]: persisted state
//! - [`StakingStore`]: storage seam, with [`MemoryStakingStore`]
//!
//! # Execution
//!
//! The pure transitions in [`settlement`] can be used directly against
//! caller-held state; [`StakingLedger`] wraps them with storage, atomic
//! commits, events and logging.

pub mod config;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod math;
pub mod settlement;
pub mod state;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use errors::*;
pub use events::{EventLog, LedgerEvent};
pub use ledger::StakingLedger;
pub use math::{mul_div, Q128, U256};
pub use state::{PoolAccumulator, StakeRecord};
pub use store::{MemoryStakingStore, StakingStore};

pub use lib_types::{Address, Amount, ChainId, PoolId, PoolKey};
