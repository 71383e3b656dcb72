//! Shard Router Module
//!
//! Deterministic key→shard mapping and fixed-order fan-out.
//!
//! The shard count is fixed at construction (resharding under load is not
//! supported), so a key maps to the same shard for the cache's entire
//! lifetime. Whole-cache operations iterate shards in ascending index order,
//! which keeps lock-acquisition order deterministic for any operation that
//! must touch more than one shard.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::cache::shard::Shard;

/// Seed mixed into every key hash so routing is a fixed pure function.
const ROUTE_SEED: u64 = 0x51_73_68_72;

// == Shard Router ==
/// Owns the shard array and routes keys to shards.
#[derive(Debug)]
pub struct ShardRouter<V> {
    shards: Vec<Shard<V>>,
    mask: usize,
}

impl<V: Clone> ShardRouter<V> {
    // == Constructor ==
    /// Creates `shard_count` shards of `capacity_per_shard` bytes each.
    ///
    /// `shard_count` must already be validated as a positive power of two;
    /// routing relies on masking instead of a modulo.
    pub fn new(shard_count: usize, capacity_per_shard: usize) -> Self {
        debug_assert!(shard_count.is_power_of_two());
        let shards = (0..shard_count)
            .map(|_| Shard::new(capacity_per_shard))
            .collect();
        Self {
            shards,
            mask: shard_count - 1,
        }
    }

    // == Route Key ==
    /// Maps a key to its shard index. Stable and deterministic for the
    /// cache's lifetime.
    pub fn route_key(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        ROUTE_SEED.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) & self.mask
    }

    /// Returns the shard responsible for a key.
    pub fn shard_for(&self, key: &str) -> &Shard<V> {
        &self.shards[self.route_key(key)]
    }

    // == Fan-Out ==
    /// Returns all shards in fixed index order.
    pub fn shards(&self) -> &[Shard<V>] {
        &self.shards
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    // == Aggregate Accessors ==
    /// Sums entry counts across all shards.
    pub fn total_len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    /// Sums entry sizes across all shards.
    pub fn total_size_bytes(&self) -> usize {
        self.shards.iter().map(|shard| shard.size_bytes()).sum()
    }
}
