//! Configuration Module
//!
//! Handles loading and validating cache configuration.
//!
//! Unlike most runtime conditions, a bad configuration is a hard failure:
//! `CacheConfig::validate` is called by the cache constructor and rejects the
//! whole construction rather than producing a degraded cache.

use std::env;
use std::time::Duration;

use crate::error::{CacheError, Result};

// == Defaults ==
/// Default number of shards (must be a power of two)
pub const DEFAULT_SHARD_COUNT: usize = 16;

/// Default per-shard capacity in bytes (8 MiB)
pub const DEFAULT_CAPACITY_PER_SHARD: usize = 8 * 1024 * 1024;

/// Default entry TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default background sweep interval
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Cache configuration parameters.
///
/// All values can be loaded from environment variables with sensible
/// defaults, or set directly by the embedding service.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Number of shards the keyspace is partitioned into (power of two)
    pub shard_count: usize,
    /// Maximum summed entry size per shard, in bytes
    pub capacity_per_shard: usize,
    /// TTL applied to entries inserted without an explicit expiry
    pub default_ttl: Duration,
    /// Interval between background expired-entry sweeps
    pub sweep_interval: Duration,
}

impl CacheConfig {
    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SHARD_COUNT` - Number of shards (default: 16)
    /// - `CAPACITY_PER_SHARD` - Per-shard capacity in bytes (default: 8 MiB)
    /// - `DEFAULT_TTL_SECS` - Default TTL in seconds (default: 300)
    /// - `SWEEP_INTERVAL_SECS` - Sweep frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        Self {
            shard_count: env::var("SHARD_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SHARD_COUNT),
            capacity_per_shard: env::var("CAPACITY_PER_SHARD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_CAPACITY_PER_SHARD),
            default_ttl: env::var("DEFAULT_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TTL),
            sweep_interval: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_SWEEP_INTERVAL),
        }
    }

    // == Validation ==
    /// Checks that the configuration describes a usable cache.
    ///
    /// Shard count must be a positive power of two (routing uses a bitmask);
    /// capacity, default TTL, and sweep interval must all be positive.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 || !self.shard_count.is_power_of_two() {
            return Err(CacheError::InvalidConfig(format!(
                "shard_count must be a positive power of two, got {}",
                self.shard_count
            )));
        }
        if self.capacity_per_shard == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity_per_shard must be positive".to_string(),
            ));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be positive".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            capacity_per_shard: DEFAULT_CAPACITY_PER_SHARD,
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
