//! Cache Façade Module
//!
//! The public cache type composing the shard router, TTL sweeper,
//! invalidation bus, and metrics recorder. This is what the search API
//! calls: a search request computes a cache key from its normalized query,
//! filters, and pagination, tries `get`, computes the result externally on
//! a miss, and stores it with `put`.
//!
//! Every public method is synchronous and returns once its effect is
//! committed; the only background activity is the TTL sweeper, and `close`
//! is the only cancellation primitive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::router::ShardRouter;
use crate::cache::shard::GetOutcome;
use crate::cache::tags::InvalidationBus;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::tasks::TtlSweeper;

// == Expiry Policy ==
/// Per-put expiry policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expiry {
    /// Use the cache's configured default TTL
    #[default]
    DefaultTtl,
    /// Expire after the given duration
    After(Duration),
    /// Never expire; the entry leaves only through eviction or removal
    Never,
}

// == Put Options ==
/// Options for a single `put` call.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Expiry policy for this entry
    pub expiry: Expiry,
    /// Explicit size override; when absent the cache's weigher is used
    pub size_bytes: Option<usize>,
    /// Tags under which this key can later be bulk-invalidated
    pub tags: Vec<String>,
}

impl PutOptions {
    /// Creates options with the default expiry, weighed size, and no tags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expires the entry after `ttl`.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::After(ttl);
        self
    }

    /// Exempts the entry from TTL expiry entirely.
    pub fn never_expires(mut self) -> Self {
        self.expiry = Expiry::Never;
        self
    }

    /// Overrides the size charged against shard capacity.
    pub fn size_bytes(mut self, size_bytes: usize) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Adds an invalidation tag, e.g. `"category:VSAM"`.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

// == Query Cache ==
/// Sharded in-memory search-result cache with TTL expiration, LRU eviction,
/// and tag-based invalidation.
///
/// The cache is an explicit object with its own lifecycle (`new`/`close`)
/// rather than a process-wide singleton; share it behind an `Arc` with
/// whatever service needs it. The value type `V` is opaque to the cache,
/// stored as an immutable blob and cloned out on hits.
pub struct QueryCache<V> {
    config: CacheConfig,
    router: Arc<ShardRouter<V>>,
    bus: InvalidationBus,
    metrics: Arc<MetricsRecorder>,
    sweeper: TtlSweeper,
    weigher: Box<dyn Fn(&V) -> usize + Send + Sync>,
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds a cache from a validated configuration and starts the sweeper.
    ///
    /// The weigher supplies the size charged against shard capacity for puts
    /// that do not declare one; return a constant 1 for entry-count
    /// semantics, or an approximate byte size for memory-bounded semantics.
    ///
    /// Fails with [`CacheError::InvalidConfig`] rather than constructing a
    /// degraded cache.
    pub fn new<W>(config: CacheConfig, weigher: W) -> Result<Self>
    where
        W: Fn(&V) -> usize + Send + Sync + 'static,
    {
        config.validate()?;

        let router = Arc::new(ShardRouter::new(
            config.shard_count,
            config.capacity_per_shard,
        ));
        let metrics = Arc::new(MetricsRecorder::new());
        let sweeper = TtlSweeper::new();

        sweeper.start(
            config.sweep_interval,
            sweep_cycle(Arc::clone(&router), Arc::clone(&metrics)),
        );
        info!(
            "cache ready: {} shards x {} bytes, default ttl {}s, sweep every {}s",
            config.shard_count,
            config.capacity_per_shard,
            config.default_ttl.as_secs(),
            config.sweep_interval.as_secs()
        );

        Ok(Self {
            config,
            router,
            bus: InvalidationBus::new(),
            metrics,
            sweeper,
            weigher: Box::new(weigher),
        })
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` for missing or expired keys; an expired entry is
    /// removed on the way out and never returned, whether or not the sweeper
    /// has visited it. A hit promotes the entry to most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let start = Instant::now();

        let result = match self.router.shard_for(key).get(key) {
            GetOutcome::Hit(value) => {
                self.metrics.record_hit();
                Some(value)
            }
            GetOutcome::Miss => {
                self.metrics.record_miss();
                None
            }
            GetOutcome::Expired => {
                self.metrics.record_miss();
                self.metrics.record_ttl_evictions(1);
                None
            }
        };

        self.metrics.record_get_latency(start.elapsed());
        result
    }

    // == Put ==
    /// Stores a value under a key.
    ///
    /// Replacing an existing key is a delete+insert. Entries that would not
    /// fit a whole shard on their own are rejected with
    /// [`CacheError::EntryTooLarge`]; the caller simply proceeds without
    /// caching that result.
    pub fn put(&self, key: impl Into<String>, value: V, opts: PutOptions) -> Result<()> {
        let start = Instant::now();
        let key = key.into();

        let size_bytes = opts
            .size_bytes
            .unwrap_or_else(|| (self.weigher)(&value));
        let ttl = match opts.expiry {
            Expiry::DefaultTtl => Some(self.config.default_ttl),
            Expiry::After(ttl) => Some(ttl),
            Expiry::Never => None,
        };

        let result = self
            .router
            .shard_for(&key)
            .put(key.clone(), value, size_bytes, ttl);

        match &result {
            Ok(receipt) => {
                self.metrics
                    .record_capacity_evictions(receipt.evicted as u64);
                // Tag index is touched only after the shard lock is released.
                self.bus.record(&key, &opts.tags);
            }
            Err(CacheError::EntryTooLarge { size, capacity }) => {
                self.metrics.record_rejected_oversized_put();
                debug!(
                    "rejected oversized put for key '{}': {} bytes > {} byte shard",
                    key, size, capacity
                );
            }
            Err(_) => {}
        }

        self.metrics.record_put_latency(start.elapsed());
        result.map(|_| ())
    }

    // == Delete ==
    /// Removes a key, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.router.shard_for(key).delete(key)
    }

    // == Invalidate Tag ==
    /// Removes every cached key recorded under `tag`.
    ///
    /// Returns the number of entries actually removed. Invalidating a tag
    /// with no cached keys is a no-op, and invalidating the same tag twice
    /// in a row has no additional effect.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let keys = self.bus.take_keys(tag);
        let mut removed = 0;
        for key in &keys {
            if self.router.shard_for(key).delete(key) {
                removed += 1;
            }
        }

        self.metrics.record_invalidations(removed as u64);
        self.bus.notify(tag);

        if !keys.is_empty() {
            debug!(
                "invalidated tag '{}': {} of {} indexed keys removed",
                tag,
                removed,
                keys.len()
            );
        }
        removed
    }

    // == Subscribe ==
    /// Registers a callback fired whenever a tag with the given prefix is
    /// invalidated. The cache core never consumes these itself.
    pub fn subscribe<F>(&self, tag_prefix: impl Into<String>, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.bus.subscribe(tag_prefix, callback);
    }

    // == Clear ==
    /// Empties the whole cache.
    ///
    /// Acquires every shard's write lock in ascending index order, empties
    /// each, then releases in reverse order. This is the only operation that
    /// holds more than one lock at a time, and the fixed order is what keeps
    /// multi-shard operations deadlock-free.
    pub fn clear(&self) {
        let mut guards: Vec<_> = self
            .router
            .shards()
            .iter()
            .map(|shard| shard.lock_exclusive())
            .collect();

        let mut dropped = 0;
        for guard in guards.iter_mut() {
            dropped += guard.purge();
        }
        while guards.pop().is_some() {}

        self.bus.clear();
        info!("cache cleared: {} entries dropped", dropped);
    }

    // == Metrics ==
    /// Returns a point-in-time metrics snapshot.
    ///
    /// Counter reads are atomic and never contend with cache traffic; the
    /// entry and size totals are read-lock snapshots per shard.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.router.total_len(), self.router.total_size_bytes())
    }

    // == Snapshot Accessors ==
    /// Returns the current number of entries across all shards.
    pub fn len(&self) -> usize {
        self.router.total_len()
    }

    /// Returns true if no shard holds any entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the summed entry size across all shards.
    pub fn size_bytes(&self) -> usize {
        self.router.total_size_bytes()
    }

    // == Close ==
    /// Stops the background sweeper.
    ///
    /// Safe to call concurrently with in-flight `get`/`put` calls, which
    /// complete normally; only background sweeping stops. Idempotent. The
    /// cache remains readable afterwards with lazy expiry still enforced.
    pub fn close(&self) {
        self.sweeper.stop();
    }
}

impl<V> Drop for QueryCache<V> {
    fn drop(&mut self) {
        self.sweeper.stop();
    }
}

// == Sweep Cycle ==
/// Builds the closure the sweeper runs each tick: sweep shards one at a
/// time (never holding more than one shard lock), log and skip a shard
/// whose sweep fails, and account removals as TTL evictions.
fn sweep_cycle<V>(
    router: Arc<ShardRouter<V>>,
    metrics: Arc<MetricsRecorder>,
) -> impl Fn() + Send + 'static
where
    V: Clone + Send + Sync + 'static,
{
    move || {
        let now = Instant::now();
        let mut removed_total: u64 = 0;

        for (index, shard) in router.shards().iter().enumerate() {
            match shard.sweep_expired(now) {
                Ok(removed) => removed_total += removed as u64,
                Err(error) => {
                    // Never fatal: skip this shard for this cycle.
                    warn!("sweep failed on shard {}: {}", index, error);
                }
            }
        }

        metrics.record_ttl_evictions(removed_total);
        if removed_total > 0 {
            info!("ttl sweep removed {} expired entries", removed_total);
        } else {
            debug!("ttl sweep found no expired entries");
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    /// Entry-count semantics: every value weighs 1.
    fn unit_cache(shards: usize, capacity: usize) -> QueryCache<String> {
        let config = CacheConfig {
            shard_count: shards,
            capacity_per_shard: capacity,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        };
        QueryCache::new(config, |_: &String| 1).unwrap()
    }

    /// Byte semantics: values weigh their length.
    fn byte_cache(capacity: usize) -> QueryCache<String> {
        let config = CacheConfig {
            shard_count: 1,
            capacity_per_shard: capacity,
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        };
        QueryCache::new(config, |v: &String| v.len()).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let config = CacheConfig {
            shard_count: 3,
            ..CacheConfig::default()
        };
        let result: Result<QueryCache<String>> = QueryCache::new(config, |_| 1);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_put_and_get() {
        let cache = unit_cache(4, 100);

        cache
            .put("q1", "result1".to_string(), PutOptions::new())
            .unwrap();

        assert_eq!(cache.get("q1"), Some("result1".to_string()));
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.len(), 1);
        cache.close();
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = unit_cache(4, 100);

        cache.put("q1", "v1".to_string(), PutOptions::new()).unwrap();
        cache.put("q1", "v2".to_string(), PutOptions::new()).unwrap();

        assert_eq!(cache.get("q1"), Some("v2".to_string()));
        assert_eq!(cache.len(), 1);
        cache.close();
    }

    #[test]
    fn test_delete() {
        let cache = unit_cache(4, 100);

        cache.put("q1", "v1".to_string(), PutOptions::new()).unwrap();
        assert!(cache.delete("q1"));
        assert!(!cache.delete("q1"));
        assert_eq!(cache.get("q1"), None);
        cache.close();
    }

    #[test]
    fn test_lru_eviction_single_shard() {
        let cache = unit_cache(1, 3);

        cache.put("q1", "v1".to_string(), PutOptions::new()).unwrap();
        cache.put("q2", "v2".to_string(), PutOptions::new()).unwrap();
        cache.put("q3", "v3".to_string(), PutOptions::new()).unwrap();

        // q1 becomes most recently used, q2 is now the LRU candidate
        assert_eq!(cache.get("q1"), Some("v1".to_string()));

        cache.put("q4", "v4".to_string(), PutOptions::new()).unwrap();

        assert_eq!(cache.get("q2"), None);
        assert!(cache.get("q1").is_some());
        assert!(cache.get("q3").is_some());
        assert!(cache.get("q4").is_some());
        assert_eq!(cache.metrics().evictions_by_capacity, 1);
        cache.close();
    }

    #[test]
    fn test_byte_weigher() {
        let cache = byte_cache(10);

        cache.put("a", "12345".to_string(), PutOptions::new()).unwrap();
        cache.put("b", "12345".to_string(), PutOptions::new()).unwrap();
        assert_eq!(cache.size_bytes(), 10);

        // Third put must evict the least recently used entry
        cache.put("c", "1234".to_string(), PutOptions::new()).unwrap();
        assert!(cache.size_bytes() <= 10);
        assert_eq!(cache.get("a"), None);
        cache.close();
    }

    #[test]
    fn test_explicit_size_overrides_weigher() {
        let cache = byte_cache(10);

        cache
            .put("a", "xxxxxxxxxx".to_string(), PutOptions::new().size_bytes(2))
            .unwrap();
        assert_eq!(cache.size_bytes(), 2);
        cache.close();
    }

    #[test]
    fn test_oversized_put_rejected_and_counted() {
        let cache = byte_cache(10);

        let result = cache.put("big", "x".repeat(11), PutOptions::new());
        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().rejected_oversized_puts, 1);
        cache.close();
    }

    #[test]
    fn test_ttl_expiry_without_sweeper() {
        let cache = unit_cache(4, 100);

        cache
            .put(
                "short",
                "v".to_string(),
                PutOptions::new().ttl(Duration::from_millis(30)),
            )
            .unwrap();

        assert!(cache.get("short").is_some());
        sleep(Duration::from_millis(50));
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.metrics().evictions_by_ttl, 1);
        cache.close();
    }

    #[test]
    fn test_never_expires() {
        let cache = unit_cache(4, 100);

        cache
            .put("pin", "v".to_string(), PutOptions::new().never_expires())
            .unwrap();

        // Sweep everything; the untagged entry must survive
        for shard in cache.router.shards() {
            shard.sweep_expired(Instant::now() + Duration::from_secs(3600)).unwrap();
        }
        assert!(cache.get("pin").is_some());
        cache.close();
    }

    #[test]
    fn test_invalidate_tag() {
        let cache = unit_cache(4, 100);

        cache
            .put("q1", "v1".to_string(), PutOptions::new().tag("category:VSAM"))
            .unwrap();
        cache
            .put("q2", "v2".to_string(), PutOptions::new().tag("category:VSAM"))
            .unwrap();
        cache
            .put("q3", "v3".to_string(), PutOptions::new().tag("category:JCL"))
            .unwrap();
        cache.put("q4", "v4".to_string(), PutOptions::new()).unwrap();

        assert_eq!(cache.invalidate_tag("category:VSAM"), 2);

        assert_eq!(cache.get("q1"), None);
        assert_eq!(cache.get("q2"), None);
        assert!(cache.get("q3").is_some());
        assert!(cache.get("q4").is_some());
        assert_eq!(cache.metrics().invalidations, 2);
        cache.close();
    }

    #[test]
    fn test_invalidate_tag_idempotent() {
        let cache = unit_cache(4, 100);

        cache
            .put("q1", "v1".to_string(), PutOptions::new().tag("t"))
            .unwrap();

        assert_eq!(cache.invalidate_tag("t"), 1);
        assert_eq!(cache.invalidate_tag("t"), 0);
        assert_eq!(cache.invalidate_tag("unknown"), 0);
        assert_eq!(cache.metrics().invalidations, 1);
        cache.close();
    }

    #[test]
    fn test_untagged_entries_unaffected_by_invalidation() {
        let cache = unit_cache(4, 100);

        cache.put("q1", "v1".to_string(), PutOptions::new()).unwrap();
        cache.invalidate_tag("category:VSAM");
        assert!(cache.get("q1").is_some());
        cache.close();
    }

    #[test]
    fn test_clear() {
        let cache = unit_cache(4, 100);

        for i in 0..20 {
            cache
                .put(format!("q{}", i), "v".to_string(), PutOptions::new().tag("t"))
                .unwrap();
        }

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
        // Tag index was dropped with the entries
        assert_eq!(cache.invalidate_tag("t"), 0);
        cache.close();
    }

    #[test]
    fn test_metrics_hit_rate_arithmetic() {
        let cache = unit_cache(4, 100);

        cache.put("q1", "v".to_string(), PutOptions::new()).unwrap();
        cache.get("q1"); // hit
        cache.get("q1"); // hit
        cache.get("q1"); // hit
        cache.get("nope"); // miss

        let snapshot = cache.metrics();
        assert_eq!(snapshot.hits, 3);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.hit_rate, 0.75);
        assert_eq!(snapshot.total_entries, 1);
        cache.close();
    }

    #[test]
    fn test_close_is_idempotent_and_cache_survives() {
        let cache = unit_cache(4, 100);

        cache.put("q1", "v".to_string(), PutOptions::new()).unwrap();
        cache.close();
        cache.close();

        // Lookups still work after close; only sweeping has stopped
        assert!(cache.get("q1").is_some());
        cache
            .put("q2", "v".to_string(), PutOptions::new())
            .unwrap();
        assert!(cache.get("q2").is_some());
    }

    #[test]
    fn test_sweeper_reclaims_without_reads() {
        let config = CacheConfig {
            shard_count: 4,
            capacity_per_shard: 100,
            default_ttl: Duration::from_millis(20),
            sweep_interval: Duration::from_millis(20),
        };
        let cache: QueryCache<String> = QueryCache::new(config, |_| 1).unwrap();

        for i in 0..10 {
            cache
                .put(format!("q{}", i), "v".to_string(), PutOptions::new())
                .unwrap();
        }

        // Wait for expiry plus at least one sweep cycle, touching nothing
        sleep(Duration::from_millis(120));

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.metrics().evictions_by_ttl, 10);
        cache.close();
    }

    #[test]
    fn test_subscriber_sees_invalidation() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = unit_cache(4, 100);
        let fired = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&fired);
        cache.subscribe("category:", move |_tag| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cache.invalidate_tag("category:VSAM");
        cache.invalidate_tag("other:tag");

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        cache.close();
    }
}
