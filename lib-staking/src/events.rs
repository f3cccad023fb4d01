//! Ledger Event Log
//!
//! Every committed ledger operation records what it did. Rejected operations
//! record nothing. The log is bounded; once full, the oldest events are
//! dropped and counted.

use std::collections::VecDeque;
use std::fmt;

use lib_types::{Address, Amount, PoolKey};
use serde::{Deserialize, Serialize};

// ============================================================================
// EVENT TYPES
// ============================================================================

/// State changes emitted by the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Shares committed to an owner
    Deposited {
        key: PoolKey,
        owner: Address,
        amount: Amount,
        is_transfer: bool,
    },

    /// Committed shares taken back from an owner
    Released {
        key: PoolKey,
        owner: Address,
        amount: Amount,
        is_transfer: bool,
    },

    /// Reservation grew
    Locked {
        key: PoolKey,
        owner: Address,
        amount: Amount,
    },

    /// Reservation dropped without moving funds
    Unlocked {
        key: PoolKey,
        owner: Address,
        amount: Amount,
    },

    /// Reserved shares moved between owners
    Transferred {
        key: PoolKey,
        from: Address,
        to: Address,
        amount: Amount,
    },

    /// Withdrawable balance paid out
    Withdrawn {
        key: PoolKey,
        owner: Address,
        amount: Amount,
    },

    /// Pool-wide dividend injection
    DividendDistributed { key: PoolKey, amount: Amount },

    /// Pool-wide unlock injection
    UnlockDistributed { key: PoolKey, amount: Amount },

    /// Dividend settled for one owner
    DividendSettled {
        key: PoolKey,
        owner: Address,
        amount: Amount,
        restaked: bool,
    },

    /// Pool-wide unlocks settled against one owner's reservation
    LockSettled {
        key: PoolKey,
        owner: Address,
        amount: Amount,
    },
}

impl LedgerEvent {
    /// Pool the event belongs to
    pub fn key(&self) -> &PoolKey {
        match self {
            LedgerEvent::Deposited { key, .. }
            | LedgerEvent::Released { key, .. }
            | LedgerEvent::Locked { key, .. }
            | LedgerEvent::Unlocked { key, .. }
            | LedgerEvent::Transferred { key, .. }
            | LedgerEvent::Withdrawn { key, .. }
            | LedgerEvent::DividendDistributed { key, .. }
            | LedgerEvent::UnlockDistributed { key, .. }
            | LedgerEvent::DividendSettled { key, .. }
            | LedgerEvent::LockSettled { key, .. } => key,
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::Deposited { key, amount, .. } => {
                write!(f, "Deposited({}, {})", key, amount)
            }
            LedgerEvent::Released { key, amount, .. } => write!(f, "Released({}, {})", key, amount),
            LedgerEvent::Locked { key, amount, .. } => write!(f, "Locked({}, {})", key, amount),
            LedgerEvent::Unlocked { key, amount, .. } => write!(f, "Unlocked({}, {})", key, amount),
            LedgerEvent::Transferred { key, amount, .. } => {
                write!(f, "Transferred({}, {})", key, amount)
            }
            LedgerEvent::Withdrawn { key, amount, .. } => {
                write!(f, "Withdrawn({}, {})", key, amount)
            }
            LedgerEvent::DividendDistributed { key, amount } => {
                write!(f, "DividendDistributed({}, {})", key, amount)
            }
            LedgerEvent::UnlockDistributed { key, amount } => {
                write!(f, "UnlockDistributed({}, {})", key, amount)
            }
            LedgerEvent::DividendSettled { key, amount, .. } => {
                write!(f, "DividendSettled({}, {})", key, amount)
            }
            LedgerEvent::LockSettled { key, amount, .. } => {
                write!(f, "LockSettled({}, {})", key, amount)
            }
        }
    }
}

// ============================================================================
// EVENT LOG
// ============================================================================

/// Bounded FIFO of ledger events
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<LedgerEvent>,
    capacity: usize,
    dropped: u64,
}

impl EventLog {
    /// Create a log holding at most `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event, evicting the oldest when full
    pub fn record(&mut self, event: LedgerEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Take every buffered event, oldest first
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        self.events.drain(..).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LedgerEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted or refused since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
