//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.
//!
//! Timestamps use the monotonic clock (`std::time::Instant`) so that wall
//! clock adjustments can never expire an entry early or resurrect one late.

use std::time::{Duration, Instant};

use crate::cache::recency::NodeId;

// == Cache Entry ==
/// A single cached value with its bookkeeping metadata.
///
/// The value is treated as an immutable blob once stored: replacing a key's
/// value is a delete+insert, never an in-place mutation. Only the access
/// bookkeeping (`last_accessed_at`, `access_count`) changes after insertion.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Approximate size used for capacity accounting
    pub size_bytes: usize,
    /// When the entry was inserted
    pub created_at: Instant,
    /// When the entry was last returned by a lookup
    pub last_accessed_at: Instant,
    /// Expiration instant, None = no TTL (capacity eviction only)
    pub expires_at: Option<Instant>,
    /// Number of lookups that returned this entry (diagnostics only,
    /// eviction ordering is strict LRU by recency, not frequency)
    pub access_count: u64,
    /// Handle of this entry's node in the shard's recency list
    pub node: NodeId,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `size_bytes` - Size charged against shard capacity
    /// * `ttl` - Optional TTL; None means the entry never expires
    /// * `node` - Recency-list handle assigned by the shard
    pub fn new(value: V, size_bytes: usize, ttl: Option<Duration>, node: NodeId) -> Self {
        let now = Instant::now();
        Self {
            value,
            size_bytes,
            created_at: now,
            last_accessed_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            access_count: 0,
            node,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so
    /// an entry whose TTL has fully elapsed is never returned, even if the
    /// sweeper has not visited it yet.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Touch ==
    /// Records a successful lookup of this entry.
    pub fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if the entry never expires.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now))
    }
}
