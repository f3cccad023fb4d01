//! Ledger Storage
//!
//! [`StakingStore`] is the minimal storage interface the ledger needs.
//! Persistent backends live with the host; [`MemoryStakingStore`] is the
//! in-process implementation used for embedding and tests.

use std::collections::BTreeMap;

use lib_types::{Address, PoolKey};
use parking_lot::RwLock;

use crate::errors::StakingResult;
use crate::state::{PoolAccumulator, StakeRecord};

/// Trait for ledger storage operations
///
/// Absent entries are reported as `None`; the ledger treats them as zeroed.
/// Methods take `&self`; implementations provide their own interior
/// mutability.
pub trait StakingStore {
    /// Get a pool accumulator
    fn get_pool(&self, key: &PoolKey) -> StakingResult<Option<PoolAccumulator>>;

    /// Get an owner's stake record within a pool
    fn get_stake(&self, key: &PoolKey, owner: &Address) -> StakingResult<Option<StakeRecord>>;

    /// Write a pool accumulator together with the stake records changed
    /// alongside it.
    ///
    /// The batch is all-or-nothing: when this returns `Err`, none of the
    /// writes may be visible to later reads.
    fn commit(
        &self,
        key: &PoolKey,
        pool: &PoolAccumulator,
        stakes: &[(Address, StakeRecord)],
    ) -> StakingResult<()>;
}

impl<S: StakingStore + ?Sized> StakingStore for &S {
    fn get_pool(&self, key: &PoolKey) -> StakingResult<Option<PoolAccumulator>> {
        (**self).get_pool(key)
    }

    fn get_stake(&self, key: &PoolKey, owner: &Address) -> StakingResult<Option<StakeRecord>> {
        (**self).get_stake(key, owner)
    }

    fn commit(
        &self,
        key: &PoolKey,
        pool: &PoolAccumulator,
        stakes: &[(Address, StakeRecord)],
    ) -> StakingResult<()> {
        (**self).commit(key, pool, stakes)
    }
}

/// In-memory store.
///
/// Uses BTreeMap so iteration order is deterministic.
#[derive(Debug, Default)]
pub struct MemoryStakingStore {
    pools: RwLock<BTreeMap<PoolKey, PoolAccumulator>>,
    stakes: RwLock<BTreeMap<(PoolKey, Address), StakeRecord>>,
}

impl MemoryStakingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pools that have been written
    pub fn pool_count(&self) -> usize {
        self.pools.read().len()
    }

    /// All stake records of a pool, ordered by owner
    pub fn stakes_in_pool(&self, key: &PoolKey) -> Vec<(Address, StakeRecord)> {
        self.stakes
            .read()
            .range((*key, Address::zero())..=(*key, Address::new([0xff; 32])))
            .map(|((_, owner), record)| (*owner, *record))
            .collect()
    }

    /// Sum of `freezed` over every record of a pool
    pub fn total_freezed(&self, key: &PoolKey) -> u128 {
        self.stakes_in_pool(key)
            .iter()
            .map(|(_, record)| record.freezed)
            .sum()
    }
}

impl StakingStore for MemoryStakingStore {
    fn get_pool(&self, key: &PoolKey) -> StakingResult<Option<PoolAccumulator>> {
        Ok(self.pools.read().get(key).copied())
    }

    fn get_stake(&self, key: &PoolKey, owner: &Address) -> StakingResult<Option<StakeRecord>> {
        Ok(self.stakes.read().get(&(*key, *owner)).copied())
    }

    fn commit(
        &self,
        key: &PoolKey,
        pool: &PoolAccumulator,
        stakes: &[(Address, StakeRecord)],
    ) -> StakingResult<()> {
        // Both guards are held for the whole batch; lock order is pools, stakes
        let mut pools = self.pools.write();
        let mut records = self.stakes.write();
        pools.insert(*key, *pool);
        for (owner, record) in stakes {
            records.insert((*key, *owner), *record);
        }
        Ok(())
    }
}
