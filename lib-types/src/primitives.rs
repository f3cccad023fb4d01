//! Canonical Primitive Types for the Staking Ledger
//!
//! Rule: No String identifiers in ledger state. Ever.
//!
//! These types key every pool accumulator and stake record. They are:
//! - Fixed-size (no dynamic allocation)
//! - Deterministically serializable
//! - Totally ordered, so stores can use ordered maps

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Share amounts (supports up to ~340 undecillion units)
pub type Amount = u128;

/// Chain identifier of the network a pool lives on
pub type ChainId = u16;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// 32-byte owner address (derived from public key)
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Create a new Address from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a zeroed Address
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ============================================================================
// POOL TYPES
// ============================================================================

/// 32-byte opaque pool identifier, unique within a chain
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct PoolId(pub [u8; 32]);

impl PoolId {
    /// Create a new PoolId from raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Composite key of a pool: the chain it lives on plus its identifier
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct PoolKey {
    pub chain: ChainId,
    pub pool: PoolId,
}

impl PoolKey {
    pub const fn new(chain: ChainId, pool: PoolId) -> Self {
        Self { chain, pool }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chain, hex::encode(&self.pool.0[..8]))
    }
}

// ============================================================================
// TESTS
// ============================================================================
