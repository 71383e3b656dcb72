//! Invalidation Bus Module
//!
//! Translates external "this data changed" signals into cache-key removals
//! through a tag→key secondary index, so callers can invalidate every cached
//! query touching, say, `"category:VSAM"` without enumerating cache keys.
//!
//! The index is best-effort: it is updated when a tagged entry is inserted
//! and drained when its tag is invalidated, but keys that meanwhile fell out
//! of the cache through LRU eviction or TTL expiry may linger until their
//! tag is next invalidated. Deleting a vanished key is a no-op, so this
//! costs a little memory and never correctness.
//!
//! Lock discipline: the index has its own mutex, acquired only while no
//! shard lock is held. The façade records tags after the shard's put lock
//! has been released, so no call path ever holds both.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked with the tag that was invalidated.
type TagCallback = Arc<dyn Fn(&str) + Send + Sync>;

struct Subscriber {
    prefix: String,
    callback: TagCallback,
}

// == Invalidation Bus ==
/// Tag→key index plus subscriber hooks for invalidation events.
pub struct InvalidationBus {
    index: Mutex<HashMap<String, HashSet<String>>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InvalidationBus {
    // == Constructor ==
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    // == Record ==
    /// Associates a key with each of the given tags.
    ///
    /// Called on tagged puts. Entries inserted without tags never appear in
    /// the index and are invalidated only by TTL or LRU eviction.
    pub fn record(&self, key: &str, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        let mut index = self.index.lock();
        for tag in tags {
            index
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    // == Take Keys ==
    /// Removes a tag from the index and returns the keys it covered.
    ///
    /// Unknown tags yield an empty set, which makes invalidation idempotent:
    /// a second call for the same tag finds nothing left to return.
    pub fn take_keys(&self, tag: &str) -> Vec<String> {
        let mut index = self.index.lock();
        match index.remove(tag) {
            Some(keys) => keys.into_iter().collect(),
            None => Vec::new(),
        }
    }

    // == Subscribe ==
    /// Registers a callback fired whenever a tag with the given prefix is
    /// invalidated.
    ///
    /// The cache core never consumes these itself; they exist so the calling
    /// service can observe invalidations under its own key-prefix
    /// conventions.
    pub fn subscribe<F>(&self, tag_prefix: impl Into<String>, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribers.lock().push(Subscriber {
            prefix: tag_prefix.into(),
            callback: Arc::new(callback),
        });
    }

    // == Notify ==
    /// Invokes every subscriber whose prefix matches the invalidated tag.
    ///
    /// The matching callbacks are cloned out before any of them runs, so a
    /// callback may itself call `subscribe` or trigger another invalidation
    /// without deadlocking on the subscriber list.
    pub fn notify(&self, tag: &str) {
        let matching: Vec<TagCallback> = {
            let subscribers = self.subscribers.lock();
            subscribers
                .iter()
                .filter(|subscriber| tag.starts_with(&subscriber.prefix))
                .map(|subscriber| Arc::clone(&subscriber.callback))
                .collect()
        };

        for callback in matching {
            callback(tag);
        }
    }

    // == Clear ==
    /// Drops the whole index. Subscribers stay registered.
    pub fn clear(&self) {
        self.index.lock().clear();
    }

    // == Diagnostics ==
    /// Returns the number of tags currently indexed.
    pub fn tag_count(&self) -> usize {
        self.index.lock().len()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvalidationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationBus")
            .field("tags", &self.tag_count())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}
