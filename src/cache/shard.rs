//! Cache Shard Module
//!
//! One lock-guarded LRU+TTL store covering a partition of the keyspace.
//!
//! Lock discipline: every mutation happens under this shard's single write
//! lock, which makes operations on a shard linearizable. The miss fast path
//! of `get` takes only the read lock, so lookups for absent keys never
//! contend with writers. A hit needs the write lock anyway, because
//! promotion to most-recently-used and access bookkeeping are mutations.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::cache::entry::CacheEntry;
use crate::cache::recency::RecencyList;
use crate::error::{CacheError, Result};

// == Lookup Outcome ==
/// Result of a shard lookup.
///
/// `Expired` is distinguished from `Miss` so the caller can account the
/// lazy removal as a TTL eviction; both are misses from the consumer's
/// point of view.
#[derive(Debug)]
pub enum GetOutcome<V> {
    /// Entry found and not expired
    Hit(V),
    /// No entry under this key
    Miss,
    /// Entry was present but past its TTL and has been removed
    Expired,
}

// == Put Receipt ==
/// Bookkeeping returned by a successful insert.
#[derive(Debug)]
pub struct PutReceipt {
    /// Number of entries evicted to make room under capacity pressure
    pub evicted: usize,
}

// == Shard ==
/// A single reader/writer-lock guarded LRU+TTL store.
#[derive(Debug)]
pub struct Shard<V> {
    capacity_bytes: usize,
    inner: RwLock<ShardInner<V>>,
}

/// Entry map, recency order, and running byte total; always mutated together
/// under the shard's write lock.
#[derive(Debug)]
pub struct ShardInner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    recency: RecencyList,
    size_bytes: usize,
}

impl<V: Clone> Shard<V> {
    // == Constructor ==
    /// Creates an empty shard with the given byte capacity.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes,
            inner: RwLock::new(ShardInner {
                entries: HashMap::new(),
                recency: RecencyList::new(),
                size_bytes: 0,
            }),
        }
    }

    // == Get ==
    /// Looks up a key, promoting it to most-recently-used on a hit.
    ///
    /// An expired entry is removed under a short-lived write lock and
    /// reported as [`GetOutcome::Expired`]; it is never returned to the
    /// caller, whether or not the sweeper has run.
    pub fn get(&self, key: &str) -> GetOutcome<V> {
        // Fast path: absent keys only ever take the read lock.
        {
            let inner = self.inner.read();
            if !inner.entries.contains_key(key) {
                return GetOutcome::Miss;
            }
        }

        let mut inner = self.inner.write();
        let now = Instant::now();

        // Re-check under the write lock; the entry may have been removed
        // between the two acquisitions.
        let expired = match inner.entries.get(key) {
            None => return GetOutcome::Miss,
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.remove_entry(key);
            return GetOutcome::Expired;
        }

        let (node, value) = match inner.entries.get_mut(key) {
            None => return GetOutcome::Miss,
            Some(entry) => {
                entry.touch(now);
                (entry.node, entry.value.clone())
            }
        };
        inner.recency.move_to_front(node);

        GetOutcome::Hit(value)
    }

    // == Put ==
    /// Inserts a value, evicting least-recently-used entries until the
    /// shard's byte total fits its capacity again.
    ///
    /// Replacing an existing key is a delete+insert: the old entry's size is
    /// released before the new entry is charged. A value larger than the
    /// whole shard is rejected up front, leaving any existing entry under
    /// the same key untouched.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - The value to store
    /// * `size_bytes` - Size charged against shard capacity
    /// * `ttl` - Optional TTL; None means capacity eviction only
    pub fn put(
        &self,
        key: String,
        value: V,
        size_bytes: usize,
        ttl: Option<Duration>,
    ) -> Result<PutReceipt> {
        if size_bytes > self.capacity_bytes {
            return Err(CacheError::EntryTooLarge {
                size: size_bytes,
                capacity: self.capacity_bytes,
            });
        }

        let mut inner = self.inner.write();

        if inner.entries.contains_key(&key) {
            inner.remove_entry(&key);
        }

        let node = inner.recency.push_front(key.clone());
        inner.size_bytes += size_bytes;
        inner
            .entries
            .insert(key, CacheEntry::new(value, size_bytes, ttl, node));

        let mut evicted = 0;
        while inner.size_bytes > self.capacity_bytes {
            match inner.recency.pop_back() {
                Some(victim) => {
                    if let Some(entry) = inner.entries.remove(&victim) {
                        inner.size_bytes -= entry.size_bytes;
                    }
                    evicted += 1;
                }
                None => break,
            }
        }

        Ok(PutReceipt { evicted })
    }

    // == Delete ==
    /// Removes an entry, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        inner.remove_entry(key)
    }

    // == Sweep Expired ==
    /// Removes every entry whose TTL has elapsed as of `now`.
    ///
    /// Runs under a single write-lock acquisition for the whole scan rather
    /// than one per entry, so a sweep cycle contends with concurrent callers
    /// at most once per shard. Returns the number of entries removed, or an
    /// internal error if the shard's bookkeeping has drifted.
    pub fn sweep_expired(&self, now: Instant) -> Result<usize> {
        let mut inner = self.inner.write();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove_entry(key);
        }

        if inner.entries.len() != inner.recency.len() {
            return Err(CacheError::Internal(format!(
                "entry map holds {} entries but recency list tracks {}",
                inner.entries.len(),
                inner.recency.len()
            )));
        }

        Ok(expired.len())
    }

    // == Clear ==
    /// Removes all entries, returning how many were dropped.
    pub fn clear(&self) -> usize {
        self.inner.write().purge()
    }

    // == Exclusive Lock ==
    /// Takes this shard's write lock for a multi-shard operation.
    ///
    /// Used only by the façade's `clear`, which acquires every shard's lock
    /// in fixed index order and releases in reverse order.
    pub(crate) fn lock_exclusive(&self) -> RwLockWriteGuard<'_, ShardInner<V>> {
        self.inner.write()
    }

    // == Snapshot Accessors ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the shard holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Returns the current summed entry size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.inner.read().size_bytes
    }

    /// Returns this shard's configured byte capacity.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }
}

impl<V> ShardInner<V> {
    /// Removes one entry and its recency node, releasing its size.
    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.recency.remove(entry.node);
                self.size_bytes -= entry.size_bytes;
                true
            }
            None => false,
        }
    }

    /// Drops every entry; used while the write lock is already held.
    pub(crate) fn purge(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.recency.clear();
        self.size_bytes = 0;
        dropped
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn put_unit(shard: &Shard<String>, key: &str, value: &str) {
        shard
            .put(key.to_string(), value.to_string(), 1, None)
            .unwrap();
    }

    #[test]
    fn test_shard_new() {
        let shard: Shard<String> = Shard::new(100);
        assert_eq!(shard.len(), 0);
        assert!(shard.is_empty());
        assert_eq!(shard.size_bytes(), 0);
        assert_eq!(shard.capacity_bytes(), 100);
    }

    #[test]
    fn test_shard_put_and_get() {
        let shard: Shard<String> = Shard::new(100);
        put_unit(&shard, "key1", "value1");

        match shard.get("key1") {
            GetOutcome::Hit(value) => assert_eq!(value, "value1"),
            other => panic!("expected hit, got {:?}", other),
        }
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.size_bytes(), 1);
    }

    #[test]
    fn test_shard_get_missing() {
        let shard: Shard<String> = Shard::new(100);
        assert!(matches!(shard.get("nope"), GetOutcome::Miss));
    }

    #[test]
    fn test_shard_delete() {
        let shard: Shard<String> = Shard::new(100);
        put_unit(&shard, "key1", "value1");

        assert!(shard.delete("key1"));
        assert!(!shard.delete("key1"));
        assert!(shard.is_empty());
        assert_eq!(shard.size_bytes(), 0);
    }

    #[test]
    fn test_shard_overwrite_releases_old_size() {
        let shard: Shard<String> = Shard::new(100);
        shard
            .put("key1".to_string(), "v1".to_string(), 40, None)
            .unwrap();
        shard
            .put("key1".to_string(), "v2".to_string(), 10, None)
            .unwrap();

        assert_eq!(shard.len(), 1);
        assert_eq!(shard.size_bytes(), 10);
        match shard.get("key1") {
            GetOutcome::Hit(value) => assert_eq!(value, "v2"),
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_shard_capacity_eviction_is_lru() {
        let shard: Shard<String> = Shard::new(3);
        put_unit(&shard, "q1", "v1");
        put_unit(&shard, "q2", "v2");
        put_unit(&shard, "q3", "v3");

        // Touch q1 so q2 becomes least recently used
        assert!(matches!(shard.get("q1"), GetOutcome::Hit(_)));

        let receipt = shard.put("q4".to_string(), "v4".to_string(), 1, None).unwrap();
        assert_eq!(receipt.evicted, 1);

        assert!(matches!(shard.get("q2"), GetOutcome::Miss));
        assert!(matches!(shard.get("q1"), GetOutcome::Hit(_)));
        assert!(matches!(shard.get("q3"), GetOutcome::Hit(_)));
        assert!(matches!(shard.get("q4"), GetOutcome::Hit(_)));
    }

    #[test]
    fn test_shard_large_put_evicts_several() {
        let shard: Shard<String> = Shard::new(10);
        shard.put("a".to_string(), "a".to_string(), 4, None).unwrap();
        shard.put("b".to_string(), "b".to_string(), 4, None).unwrap();

        // 8 bytes held; a 9-byte insert must evict both
        let receipt = shard.put("c".to_string(), "c".to_string(), 9, None).unwrap();
        assert_eq!(receipt.evicted, 2);
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.size_bytes(), 9);
    }

    #[test]
    fn test_shard_rejects_oversized_value() {
        let shard: Shard<String> = Shard::new(10);
        let result = shard.put("big".to_string(), "x".to_string(), 11, None);
        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));
        assert!(shard.is_empty());
    }

    #[test]
    fn test_shard_rejected_overwrite_keeps_old_value() {
        let shard: Shard<String> = Shard::new(10);
        shard
            .put("key".to_string(), "old".to_string(), 5, None)
            .unwrap();

        let result = shard.put("key".to_string(), "new".to_string(), 11, None);
        assert!(matches!(result, Err(CacheError::EntryTooLarge { .. })));

        match shard.get("key") {
            GetOutcome::Hit(value) => assert_eq!(value, "old"),
            other => panic!("expected old value to survive, got {:?}", other),
        }
    }

    #[test]
    fn test_shard_capacity_invariant_holds() {
        let shard: Shard<String> = Shard::new(16);
        for i in 0..50 {
            shard
                .put(format!("key{}", i), "v".to_string(), 1 + i % 5, None)
                .unwrap();
            assert!(shard.size_bytes() <= shard.capacity_bytes());
        }
    }

    #[test]
    fn test_shard_lazy_expiry_on_get() {
        let shard: Shard<String> = Shard::new(100);
        shard
            .put(
                "short".to_string(),
                "v".to_string(),
                1,
                Some(Duration::from_millis(30)),
            )
            .unwrap();

        assert!(matches!(shard.get("short"), GetOutcome::Hit(_)));
        sleep(Duration::from_millis(50));

        // Never swept, but still not returned
        assert!(matches!(shard.get("short"), GetOutcome::Expired));
        assert!(shard.is_empty());
        assert_eq!(shard.size_bytes(), 0);
    }

    #[test]
    fn test_shard_sweep_expired() {
        let shard: Shard<String> = Shard::new(100);
        shard
            .put(
                "soon".to_string(),
                "v".to_string(),
                1,
                Some(Duration::from_millis(20)),
            )
            .unwrap();
        shard
            .put(
                "later".to_string(),
                "v".to_string(),
                1,
                Some(Duration::from_secs(60)),
            )
            .unwrap();
        shard.put("never".to_string(), "v".to_string(), 1, None).unwrap();

        sleep(Duration::from_millis(40));
        let removed = shard.sweep_expired(Instant::now()).unwrap();

        assert_eq!(removed, 1);
        assert_eq!(shard.len(), 2);
        assert!(matches!(shard.get("later"), GetOutcome::Hit(_)));
        assert!(matches!(shard.get("never"), GetOutcome::Hit(_)));
    }

    #[test]
    fn test_shard_sweep_noop_when_nothing_expired() {
        let shard: Shard<String> = Shard::new(100);
        put_unit(&shard, "key", "value");

        let removed = shard.sweep_expired(Instant::now()).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn test_shard_clear() {
        let shard: Shard<String> = Shard::new(100);
        put_unit(&shard, "a", "1");
        put_unit(&shard, "b", "2");

        assert_eq!(shard.clear(), 2);
        assert!(shard.is_empty());
        assert_eq!(shard.size_bytes(), 0);
        assert!(matches!(shard.get("a"), GetOutcome::Miss));
    }
}
