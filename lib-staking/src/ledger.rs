//! Staking Ledger
//!
//! [`StakingLedger`] applies the settlement transitions to state held in a
//! [`StakingStore`], keyed by (chain, pool) and owner.
//!
//! # Atomicity
//!
//! Every mutating call loads what it touches into an overlay, runs all steps
//! against the overlay, and writes back only once every check has passed.
//! A rejected call leaves the store and the event log untouched.
//!
//! # Concurrency
//!
//! Mutating calls take `&mut self`, so writers on one ledger are serialized by
//! the borrow checker. Queries take `&self` and never settle or write.

use std::collections::BTreeMap;

use lib_types::{Address, Amount, PoolKey};
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::errors::{StakingError, StakingResult};
use crate::events::{EventLog, LedgerEvent};
use crate::settlement;
use crate::state::{PoolAccumulator, StakeRecord};
use crate::store::StakingStore;

// =============================================================================
// OVERLAY
// =============================================================================

/// Staged writes for one pool
struct PoolTxn<'a, S: StakingStore> {
    store: &'a S,
    key: PoolKey,
    pool: PoolAccumulator,
    records: BTreeMap<Address, StakeRecord>,
    events: Vec<LedgerEvent>,
}

impl<'a, S: StakingStore> PoolTxn<'a, S> {
    fn begin(store: &'a S, key: PoolKey) -> StakingResult<Self> {
        let pool = store.get_pool(&key)?.unwrap_or_default();
        Ok(Self {
            store,
            key,
            pool,
            records: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    /// Current record for `owner`, staged writes first
    fn record(&self, owner: &Address) -> StakingResult<StakeRecord> {
        if let Some(record) = self.records.get(owner) {
            return Ok(*record);
        }
        Ok(self.store.get_stake(&self.key, owner)?.unwrap_or_default())
    }

    fn put(&mut self, owner: Address, record: StakeRecord) {
        self.records.insert(owner, record);
    }

    fn emit(&mut self, event: LedgerEvent) {
        self.events.push(event);
    }

    fn dividend_settled(&mut self, owner: Address, amount: Amount, restaked: bool) {
        if amount == 0 {
            return;
        }
        debug!(
            chain = self.key.chain,
            pool = %self.key.pool,
            %owner,
            amount,
            restaked,
            "dividend settled"
        );
        self.emit(LedgerEvent::DividendSettled {
            key: self.key,
            owner,
            amount,
            restaked,
        });
    }

    fn lock_settled(&mut self, owner: Address, amount: Amount) {
        if amount == 0 {
            return;
        }
        debug!(chain = self.key.chain, pool = %self.key.pool, %owner, amount, "unlock settled");
        self.emit(LedgerEvent::LockSettled {
            key: self.key,
            owner,
            amount,
        });
    }

    /// Hand the pool and every staged record to the store as one batch
    fn commit(self) -> StakingResult<Vec<LedgerEvent>> {
        let stakes: Vec<(Address, StakeRecord)> = self.records.into_iter().collect();
        self.store.commit(&self.key, &self.pool, &stakes)?;
        Ok(self.events)
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Multi-pool staking ledger over a store
#[derive(Debug)]
pub struct StakingLedger<S: StakingStore> {
    store: S,
    config: LedgerConfig,
    events: EventLog,
}

impl<S: StakingStore> StakingLedger<S> {
    /// Create a ledger with the default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    /// Create a ledger with an explicit configuration
    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        let events = EventLog::with_capacity(config.event_capacity);
        Self {
            store,
            config,
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Buffered events of committed operations
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Take every buffered event, oldest first
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    /// Run `f` against an overlay of `key`, committing only on success
    fn apply<T>(
        &mut self,
        op: &'static str,
        key: PoolKey,
        f: impl FnOnce(&mut PoolTxn<'_, S>) -> StakingResult<T>,
    ) -> StakingResult<T> {
        let outcome = PoolTxn::begin(&self.store, key).and_then(|mut txn| {
            let value = f(&mut txn)?;
            let events = txn.commit()?;
            Ok((value, events))
        });

        match outcome {
            Ok((value, events)) => {
                if self.config.record_events {
                    for event in events {
                        self.events.record(event);
                    }
                }
                Ok(value)
            }
            Err(err) => Err(self.rejected(op, &key, err)),
        }
    }

    fn rejected(&self, op: &'static str, key: &PoolKey, err: StakingError) -> StakingError {
        warn!(op, chain = key.chain, pool = %key.pool, error = %err, "ledger operation rejected");
        err
    }

    fn guard_amount(&self, op: &'static str, key: &PoolKey, amount: Amount) -> StakingResult<()> {
        if self.config.reject_zero_amounts && amount == 0 {
            return Err(self.rejected(op, key, StakingError::ZeroAmount));
        }
        Ok(())
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    /// Settle accrued dividend for `owner`.
    ///
    /// Returns the settled amount; zero when already settled.
    pub fn add_dividend(
        &mut self,
        key: PoolKey,
        owner: Address,
        restake: bool,
        is_transfer: bool,
    ) -> StakingResult<Amount> {
        self.apply("add_dividend", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let amount =
                settlement::add_dividend(&mut txn.pool, &mut record, restake, is_transfer)?;
            txn.put(owner, record);
            txn.dividend_settled(owner, amount, restake);
            Ok(amount)
        })
    }

    /// Settle pool-wide unlocks against `owner`'s reservation.
    ///
    /// Returns the amount moved from `locked` to `actived`.
    pub fn cancel(&mut self, key: PoolKey, owner: Address) -> StakingResult<Amount> {
        self.apply("cancel", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let amount = settlement::cancel(&txn.pool, &mut record)?;
            txn.put(owner, record);
            txn.lock_settled(owner, amount);
            Ok(amount)
        })
    }

    // =========================================================================
    // Owner operations
    // =========================================================================

    /// Commit `amount` shares to `owner`.
    ///
    /// # Arguments
    ///
    /// * `restake` - compound the dividend settled beforehand into `freezed`
    /// * `is_transfer` - leave the pool total untouched
    ///
    /// # Returns
    ///
    /// The dividend settled before the deposit.
    pub fn deposit(
        &mut self,
        key: PoolKey,
        owner: Address,
        amount: Amount,
        restake: bool,
        is_transfer: bool,
    ) -> StakingResult<Amount> {
        self.guard_amount("deposit", &key, amount)?;
        self.apply("deposit", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let dividend =
                settlement::deposit(&mut txn.pool, &mut record, amount, restake, is_transfer)?;
            txn.put(owner, record);
            txn.dividend_settled(owner, dividend, restake);
            txn.emit(LedgerEvent::Deposited {
                key,
                owner,
                amount,
                is_transfer,
            });
            debug!(chain = key.chain, pool = %key.pool, %owner, amount, is_transfer, "deposited");
            Ok(dividend)
        })
    }

    /// Take `amount` unreserved shares back from `owner`.
    ///
    /// Fails with `InsufficientBalance` when `freezed - locked < amount`.
    /// Returns the dividend settled before the release.
    pub fn release(
        &mut self,
        key: PoolKey,
        owner: Address,
        amount: Amount,
        restake: bool,
        is_transfer: bool,
    ) -> StakingResult<Amount> {
        self.guard_amount("release", &key, amount)?;
        self.apply("release", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let dividend =
                settlement::release(&mut txn.pool, &mut record, amount, restake, is_transfer)?;
            txn.put(owner, record);
            txn.dividend_settled(owner, dividend, restake);
            txn.emit(LedgerEvent::Released {
                key,
                owner,
                amount,
                is_transfer,
            });
            debug!(chain = key.chain, pool = %key.pool, %owner, amount, is_transfer, "released");
            Ok(dividend)
        })
    }

    /// Grow `owner`'s reservation by `amount` (increase-only).
    ///
    /// Returns `false` when the current reservation already covered `amount`
    /// and nothing was added.
    pub fn lock(&mut self, key: PoolKey, owner: Address, amount: Amount) -> StakingResult<bool> {
        self.guard_amount("lock", &key, amount)?;
        self.apply("lock", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let (settled, applied) = settlement::lock(&txn.pool, &mut record, amount)?;
            txn.put(owner, record);
            txn.lock_settled(owner, settled);
            if applied {
                txn.emit(LedgerEvent::Locked { key, owner, amount });
                debug!(
                    chain = key.chain,
                    pool = %key.pool,
                    %owner,
                    amount,
                    locked = record.locked,
                    "locked"
                );
            }
            Ok(applied)
        })
    }

    /// Drop `amount` from `owner`'s reservation without moving funds.
    pub fn unlock(&mut self, key: PoolKey, owner: Address, amount: Amount) -> StakingResult<()> {
        self.guard_amount("unlock", &key, amount)?;
        self.apply("unlock", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let settled = settlement::unlock(&txn.pool, &mut record, amount)?;
            txn.put(owner, record);
            txn.lock_settled(owner, settled);
            txn.emit(LedgerEvent::Unlocked { key, owner, amount });
            debug!(chain = key.chain, pool = %key.pool, %owner, amount, "unlocked");
            Ok(())
        })
    }

    /// Move `amount` reserved shares from `from` to `to`.
    ///
    /// Unlocks and releases on the sender, deposits on the recipient, all on
    /// the transfer path so the pool total is unchanged. Either every leg is
    /// applied or none is.
    pub fn transfer(
        &mut self,
        key: PoolKey,
        from: Address,
        to: Address,
        amount: Amount,
        restake: bool,
    ) -> StakingResult<()> {
        self.guard_amount("transfer", &key, amount)?;
        self.apply("transfer", key, move |txn| {
            let mut sender = txn.record(&from)?;
            let settled = settlement::unlock(&txn.pool, &mut sender, amount)?;
            let dividend_from =
                settlement::release(&mut txn.pool, &mut sender, amount, restake, true)?;
            txn.put(from, sender);

            // Read after staging the sender so a self-transfer sees its own debit
            let mut recipient = txn.record(&to)?;
            let dividend_to =
                settlement::deposit(&mut txn.pool, &mut recipient, amount, restake, true)?;
            txn.put(to, recipient);

            txn.lock_settled(from, settled);
            txn.dividend_settled(from, dividend_from, restake);
            txn.dividend_settled(to, dividend_to, restake);
            txn.emit(LedgerEvent::Transferred {
                key,
                from,
                to,
                amount,
            });
            info!(chain = key.chain, pool = %key.pool, %from, %to, amount, "transferred");
            Ok(())
        })
    }

    /// Pay out and zero `owner`'s withdrawable balance.
    ///
    /// No settlement is performed; see [`StakingLedger::claim`].
    pub fn withdraw(&mut self, key: PoolKey, owner: Address) -> StakingResult<Amount> {
        self.apply("withdraw", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let amount = settlement::withdraw(&mut record);
            txn.put(owner, record);
            if amount > 0 {
                txn.emit(LedgerEvent::Withdrawn { key, owner, amount });
                debug!(chain = key.chain, pool = %key.pool, %owner, amount, "withdrawn");
            }
            Ok(amount)
        })
    }

    /// Settle dividend and unlocks for `owner`, then withdraw.
    pub fn claim(&mut self, key: PoolKey, owner: Address) -> StakingResult<Amount> {
        self.apply("claim", key, move |txn| {
            let mut record = txn.record(&owner)?;
            let dividend = settlement::add_dividend(&mut txn.pool, &mut record, false, false)?;
            let unlocked = settlement::cancel(&txn.pool, &mut record)?;
            let amount = settlement::withdraw(&mut record);
            txn.put(owner, record);

            txn.dividend_settled(owner, dividend, false);
            txn.lock_settled(owner, unlocked);
            if amount > 0 {
                txn.emit(LedgerEvent::Withdrawn { key, owner, amount });
                debug!(chain = key.chain, pool = %key.pool, %owner, amount, "claimed");
            }
            Ok(amount)
        })
    }

    // =========================================================================
    // Pool-wide injections
    // =========================================================================

    /// Make `amount` locked shares releasable pool-wide, pro rata.
    ///
    /// Fails with `InvalidPoolState` when the pool has no committed stake.
    pub fn refund(&mut self, key: PoolKey, amount: Amount) -> StakingResult<()> {
        self.apply("refund", key, move |txn| {
            settlement::refund(&mut txn.pool, amount)?;
            txn.emit(LedgerEvent::UnlockDistributed { key, amount });
            info!(
                chain = key.chain,
                pool = %key.pool,
                amount,
                total = txn.pool.total,
                "unlock distributed"
            );
            Ok(())
        })
    }

    /// Distribute `amount` of dividend pool-wide, pro rata.
    ///
    /// Fails with `InvalidPoolState` when the pool has no committed stake.
    pub fn update_dividend(&mut self, key: PoolKey, amount: Amount) -> StakingResult<()> {
        self.apply("update_dividend", key, move |txn| {
            settlement::update_dividend(&mut txn.pool, amount)?;
            txn.emit(LedgerEvent::DividendDistributed { key, amount });
            info!(
                chain = key.chain,
                pool = %key.pool,
                amount,
                total = txn.pool.total,
                "dividend distributed"
            );
            Ok(())
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Pool accumulator, zeroed if the pool was never referenced
    pub fn pool(&self, key: &PoolKey) -> StakingResult<PoolAccumulator> {
        Ok(self.store.get_pool(key)?.unwrap_or_default())
    }

    /// Stored stake record, zeroed if the owner was never referenced.
    /// Not settled.
    pub fn stake(&self, key: &PoolKey, owner: &Address) -> StakingResult<StakeRecord> {
        Ok(self.store.get_stake(key, owner)?.unwrap_or_default())
    }

    /// Unreserved committed shares
    pub fn available(&self, key: &PoolKey, owner: &Address) -> StakingResult<Amount> {
        Ok(self.stake(key, owner)?.available())
    }

    /// Dividend the next settlement of `owner` would yield
    pub fn pending_dividend(&self, key: &PoolKey, owner: &Address) -> StakingResult<Amount> {
        settlement::pending_dividend(&self.pool(key)?, &self.stake(key, owner)?)
    }

    /// Unlock the next lock settlement of `owner` would yield
    pub fn pending_unlock(&self, key: &PoolKey, owner: &Address) -> StakingResult<Amount> {
        settlement::pending_unlock(&self.pool(key)?, &self.stake(key, owner)?)
    }

    /// `owner`'s record as it would look fully settled, without writing it
    pub fn preview(&self, key: &PoolKey, owner: &Address) -> StakingResult<StakeRecord> {
        let mut pool = self.pool(key)?;
        let mut record = self.stake(key, owner)?;
        settlement::add_dividend(&mut pool, &mut record, false, false)?;
        settlement::cancel(&pool, &mut record)?;
        Ok(record)
    }
}
